//! Weighted round-robin endpoint selection.
//!
//! Selection uses the GCD-interleaved weighted round robin: a cursor walks
//! the entries, and every time it wraps the "current weight" drops by the
//! GCD of all weights (restarting at the maximum once it hits zero). The
//! first entry whose weight reaches the current level is picked. Over one
//! full cycle each endpoint is chosen `weight / gcd` times, interleaved,
//! without building a schedule.
//!
//! Concurrency: one mutex guards the entries, cursor, meters and controller
//! (single writer). The endpoint list itself is also republished through an
//! [`EndpointTable`] after every structural change so lookups stay lock-free.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, trace, warn};

use crate::clock::{SharedClock, SystemClock};
use crate::config::BalancerConfig;
use crate::domain::attempt::RequestAttempts;
use crate::domain::endpoint::{Endpoint, EndpointId, SharedEndpoint};
use crate::domain::routing::EndpointTable;
use crate::error::{BalancerError, Result};
use crate::load_balancer::controller::{AdaptiveWeightController, ControllerState, WeightProposal};
use crate::load_balancer::observer::{ControlObserver, NoopObserver};
use crate::load_balancer::weighted::{max_weight, weights_gcd, WeightedEndpointEntry};
use crate::metrics::meter::RollingWindowMeter;

/// Point-in-time view of one endpoint, for dashboards and the admin API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStats {
    /// Endpoint identity
    pub id: EndpointId,
    /// Endpoint address
    pub address: SocketAddr,
    /// Operator-supplied weight
    pub base_weight: u32,
    /// Weight currently used for selection
    pub effective_weight: u32,
    /// Failure rate over the rolling window
    pub failure_rate: f64,
    /// Whether the meter has covered a full window
    pub is_meter_ready: bool,
}

#[derive(Debug)]
struct Inner {
    entries: Vec<WeightedEndpointEntry>,
    /// Cursor into `entries`; `None` is "before the first".
    index: Option<usize>,
    current_weight: u32,
    controller: Option<AdaptiveWeightController>,
    observer: Arc<dyn ControlObserver>,
    max_weight: u32,
}

impl Inner {
    fn reset_iterator(&mut self) {
        self.index = None;
        self.current_weight = 0;
    }

    fn reset_state(&mut self) {
        self.reset_iterator();
        if let Some(controller) = self.controller.as_mut() {
            controller.reset();
        }
    }

    fn position(&self, id: &EndpointId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    fn adjust_weights(&mut self) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let proposals = controller.adjust(&mut self.entries);
        if self.apply(proposals) {
            self.reset_iterator();
        }
    }

    /// Apply proposals; returns whether any weight actually changed.
    fn apply(&mut self, proposals: Vec<WeightProposal>) -> bool {
        let mut changed = false;
        for proposal in proposals {
            let Some(entry) = self.entries.iter_mut().find(|e| e.id() == &proposal.endpoint) else {
                continue;
            };
            let weight = proposal.weight.min(self.max_weight);
            if entry.effective_weight == weight {
                continue;
            }
            info!(
                endpoint = %entry.endpoint,
                from = entry.effective_weight,
                to = weight,
                "setting effective weight"
            );
            self.observer
                .on_weight_change(&entry.endpoint, entry.effective_weight, weight);
            entry.effective_weight = weight;
            changed = true;
        }
        changed
    }

    fn next_endpoint(&mut self) -> Result<SharedEndpoint> {
        if self.entries.is_empty() {
            return Err(BalancerError::NoEndpoints);
        }

        self.adjust_weights();

        let gcd = weights_gcd(&self.entries);
        let max = max_weight(&self.entries);
        let len = self.entries.len();

        loop {
            let index = self.index.map_or(0, |i| (i + 1) % len);
            self.index = Some(index);
            if index == 0 {
                self.current_weight = if self.current_weight <= gcd {
                    if max == 0 {
                        return Err(BalancerError::AllZeroWeight);
                    }
                    max
                } else {
                    self.current_weight - gcd
                };
            }
            let entry = &self.entries[index];
            if entry.effective_weight >= self.current_weight {
                return Ok(entry.endpoint.clone());
            }
        }
    }
}

/// Dynamic weighted round-robin load balancer for one route.
#[derive(Debug)]
pub struct WeightedSelector {
    config: BalancerConfig,
    clock: SharedClock,
    table: EndpointTable,
    inner: Mutex<Inner>,
}

impl WeightedSelector {
    /// Create a selector reading the system clock.
    pub fn new(config: BalancerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a selector reading time from `clock`.
    pub fn with_clock(config: BalancerConfig, clock: SharedClock) -> Result<Self> {
        Self::with_observer(config, clock, Arc::new(NoopObserver))
    }

    /// Create a selector that reports controller activity to `observer`.
    pub fn with_observer(
        config: BalancerConfig,
        clock: SharedClock,
        observer: Arc<dyn ControlObserver>,
    ) -> Result<Self> {
        config.validate()?;
        let controller = config
            .adaptive
            .then(|| AdaptiveWeightController::new(&config, clock.clone(), observer.clone()));
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                index: None,
                current_weight: 0,
                controller,
                observer,
                max_weight: config.max_weight,
            }),
            table: EndpointTable::default(),
            clock,
            config,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.table
            .publish(inner.entries.iter().map(|e| e.endpoint.clone()).collect());
    }

    /// Register a new endpoint. A weight of 0 is treated as 1.
    pub fn add_endpoint(
        &self,
        id: impl Into<EndpointId>,
        addr: SocketAddr,
        weight: u32,
    ) -> Result<()> {
        let id = id.into();
        let mut inner = self.lock();
        if inner.position(&id).is_some() {
            return Err(BalancerError::AlreadyExists(id));
        }

        let weight = if weight > self.config.max_weight {
            warn!(
                endpoint = %id,
                weight,
                max_weight = self.config.max_weight,
                "weight above ceiling, clamping"
            );
            self.config.max_weight
        } else {
            weight
        };

        let meter = RollingWindowMeter::new(
            self.config.bucket_count,
            self.config.bucket_resolution(),
            self.clock.clone(),
        )?;
        let endpoint = Arc::new(Endpoint::new(id, addr));
        info!(endpoint = %endpoint, weight, "adding endpoint");
        inner
            .entries
            .push(WeightedEndpointEntry::new(endpoint, weight, meter));
        inner.reset_state();
        self.publish(&inner);
        Ok(())
    }

    /// Remove an endpoint by identity.
    pub fn remove_endpoint(&self, id: &EndpointId) -> Result<()> {
        let mut inner = self.lock();
        let Some(index) = inner.position(id) else {
            return Err(BalancerError::NotFound(id.clone()));
        };
        let removed = inner.entries.remove(index);
        info!(endpoint = %removed.endpoint, "removing endpoint");
        inner.reset_state();
        self.publish(&inner);
        Ok(())
    }

    /// Look an endpoint up by identity without taking the selector lock.
    pub fn find_endpoint(&self, id: &EndpointId) -> Option<SharedEndpoint> {
        self.table.find(id)
    }

    /// Look an endpoint up by address without taking the selector lock.
    pub fn find_endpoint_by_address(&self, addr: SocketAddr) -> Option<SharedEndpoint> {
        self.table.find_by_addr(addr)
    }

    /// All endpoints in selection order.
    pub fn endpoints(&self) -> Arc<Vec<SharedEndpoint>> {
        self.table.snapshot()
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Pick the endpoint for the next attempt of a request.
    ///
    /// If the pick equals the endpoint of the request's most recent attempt,
    /// selection runs once more. That lowers the odds of failing over onto
    /// the endpoint that just failed but does not rule it out.
    pub fn next(&self, attempts: &RequestAttempts) -> Result<SharedEndpoint> {
        let mut inner = self.lock();
        let endpoint = inner.next_endpoint()?;
        match attempts.last() {
            Some(last) if last.endpoint == endpoint.id => {
                trace!(endpoint = %endpoint, "picked the endpoint that just failed, selecting again");
                inner.next_endpoint()
            }
            _ => Ok(endpoint),
        }
    }

    /// Report how a request to `id` went.
    ///
    /// Outcomes for endpoints that are no longer registered are dropped.
    pub fn observe_outcome(&self, id: &EndpointId, failed: bool) {
        let mut inner = self.lock();
        let Some(index) = inner.position(id) else {
            trace!(endpoint = %id, "outcome for unknown endpoint ignored");
            return;
        };
        inner.entries[index].meter_mut().observe(!failed);
    }

    /// Weights and failure rates of every endpoint, in selection order.
    pub fn snapshot(&self) -> Vec<EndpointStats> {
        let mut inner = self.lock();
        inner
            .entries
            .iter_mut()
            .map(|e| EndpointStats {
                id: e.id().clone(),
                address: e.endpoint().addr,
                base_weight: e.base_weight(),
                effective_weight: e.effective_weight(),
                failure_rate: e.meter_mut().failure_rate(),
                is_meter_ready: e.meter().is_ready(),
            })
            .collect()
    }

    /// State of the weight controller; always `Start` when adaptation is off.
    pub fn controller_state(&self) -> ControllerState {
        self.lock()
            .controller
            .as_ref()
            .map_or(ControllerState::Start, AdaptiveWeightController::state)
    }

    /// The configuration this selector was built with.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }
}
