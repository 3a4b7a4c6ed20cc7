//! Attempt history of one logical request.

use crate::domain::endpoint::EndpointId;

/// One forwarding attempt made for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Which endpoint the attempt went to
    pub endpoint: EndpointId,
    /// Whether the attempt ended in an error
    pub failed: bool,
}

/// Ordered list of prior attempts for the request being balanced.
///
/// The proxy's retry loop records each attempt here and hands the history
/// back to [`WeightedSelector::next`](crate::load_balancer::selector::WeightedSelector::next)
/// so failover can steer away from the endpoint that just failed.
#[derive(Debug, Clone, Default)]
pub struct RequestAttempts {
    attempts: Vec<Attempt>,
}

impl RequestAttempts {
    /// A request that has not been attempted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt.
    pub fn record(&mut self, endpoint: EndpointId, failed: bool) {
        self.attempts.push(Attempt { endpoint, failed });
    }

    /// All attempts, oldest first.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// The most recent attempt, if any.
    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// Whether `endpoint` was tried before.
    pub fn has_attempted(&self, endpoint: &EndpointId) -> bool {
        self.attempts.iter().any(|a| &a.endpoint == endpoint)
    }

    /// True if nothing has been attempted.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
