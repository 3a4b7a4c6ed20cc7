//! Per-endpoint weight state held by a selector.

use crate::domain::endpoint::{EndpointId, SharedEndpoint};
use crate::metrics::meter::RollingWindowMeter;

/// One endpoint inside a selector together with its weights and meter.
#[derive(Debug)]
pub struct WeightedEndpointEntry {
    pub(crate) endpoint: SharedEndpoint,
    pub(crate) base_weight: u32,
    pub(crate) effective_weight: u32,
    pub(crate) meter: RollingWindowMeter,
}

impl WeightedEndpointEntry {
    /// Wrap an endpoint. A zero weight is read as the default weight of 1.
    pub fn new(endpoint: SharedEndpoint, weight: u32, meter: RollingWindowMeter) -> Self {
        let weight = weight.max(1);
        Self {
            endpoint,
            base_weight: weight,
            effective_weight: weight,
            meter,
        }
    }

    /// The wrapped endpoint.
    pub fn endpoint(&self) -> &SharedEndpoint {
        &self.endpoint
    }

    /// Shorthand for the endpoint's identity.
    pub fn id(&self) -> &EndpointId {
        &self.endpoint.id
    }

    /// Operator-supplied weight.
    pub fn base_weight(&self) -> u32 {
        self.base_weight
    }

    /// Weight currently used for selection.
    pub fn effective_weight(&self) -> u32 {
        self.effective_weight
    }

    /// The endpoint's outcome meter.
    pub fn meter(&self) -> &RollingWindowMeter {
        &self.meter
    }

    /// Mutable access to the meter, e.g. to record outcomes.
    pub fn meter_mut(&mut self) -> &mut RollingWindowMeter {
        &mut self.meter
    }
}

pub(crate) fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// GCD of all effective weights; 0 if every weight is 0.
pub(crate) fn weights_gcd(entries: &[WeightedEndpointEntry]) -> u32 {
    entries
        .iter()
        .fold(0, |divisor, e| gcd(divisor, e.effective_weight))
}

/// Largest effective weight; 0 for an empty list.
pub(crate) fn max_weight(entries: &[WeightedEndpointEntry]) -> u32 {
    entries
        .iter()
        .map(|e| e.effective_weight)
        .max()
        .unwrap_or(0)
}
