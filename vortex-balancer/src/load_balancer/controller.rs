//! Adaptive weight controller.
//!
//! A small state machine that watches every endpoint's failure rate and
//! proposes new effective weights. It raises the weight of endpoints that do
//! clearly better than their peers, holds the change for a probing period,
//! and undoes it if the probed endpoints got worse in the meantime. Once all
//! failures are gone it walks weights geometrically back to their base
//! values.
//!
//! ```text
//!            grow good endpoints               probed rates worse
//!   Start ─────────────────────────▶ Probing ─────────────────────▶ Rollback
//!     ▲ │                               │                               │
//!     │ │ no failures, weights          │ probed rates held             │
//!     │ │ off baseline                  ▼                               │
//!     │ └──────────▶ Revert ───────▶ Start ◀──────── timer elapsed ─────┘
//!     └──────────── timer elapsed ──────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::clock::SharedClock;
use crate::config::BalancerConfig;
use crate::domain::endpoint::EndpointId;
use crate::load_balancer::observer::ControlObserver;
use crate::load_balancer::weighted::WeightedEndpointEntry;
use crate::metrics::anomaly::{classify, greater_than, significantly_greater};

/// How many MADs above the median a failure rate must sit to be an outlier.
const OUTLIER_MULTIPLIER: f64 = 1.5;
/// A perfect failure rate, used to pad even-sized samples.
const OUTLIER_SENTINEL: f64 = 0.0;

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControllerState {
    /// Steady state; looking for something to change.
    Start,
    /// Grown weights are on trial until the backoff timer elapses.
    Probing,
    /// A failed probe was undone; waiting before deciding again.
    Rollback,
    /// Weights are being walked back toward baseline; waiting before the next step.
    Revert,
}

/// A new effective weight for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightProposal {
    /// Endpoint to change
    pub endpoint: EndpointId,
    /// Its new effective weight
    pub weight: u32,
}

/// What an endpoint looked like right before a probe changed its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedEndpoint {
    /// The probed endpoint
    pub endpoint: EndpointId,
    /// Effective weight before the probe
    pub weight: u32,
    /// Failure rate before the probe
    pub failure_rate: f64,
}

/// Proposes effective weights for one selector's endpoints.
#[derive(Debug)]
pub struct AdaptiveWeightController {
    clock: SharedClock,
    observer: Arc<dyn ControlObserver>,
    growth_factor: u32,
    max_weight: u32,
    probing_period: Duration,
    state: ControllerState,
    /// Backoff deadline; `None` means already expired.
    deadline: Option<Duration>,
    probed: Vec<ProbedEndpoint>,
}

impl AdaptiveWeightController {
    /// Build a controller in the `Start` state with an expired timer.
    pub fn new(
        config: &BalancerConfig,
        clock: SharedClock,
        observer: Arc<dyn ControlObserver>,
    ) -> Self {
        Self {
            clock,
            observer,
            growth_factor: config.growth_factor,
            max_weight: config.max_weight,
            probing_period: config.probing_period(),
            state: ControllerState::Start,
            deadline: None,
            probed: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Endpoints changed by the probe in flight, if any.
    pub fn probed(&self) -> &[ProbedEndpoint] {
        &self.probed
    }

    /// Back to `Start` with an expired timer and no probe in flight.
    pub fn reset(&mut self) {
        self.probed.clear();
        self.deadline = None;
        if self.state != ControllerState::Start {
            self.transition(ControllerState::Start);
        }
    }

    /// Run one step of the state machine against `entries` and return the
    /// weight changes to apply. An empty list means "leave weights alone".
    pub fn adjust(&mut self, entries: &mut [WeightedEndpointEntry]) -> Vec<WeightProposal> {
        match self.state {
            ControllerState::Start => self.plan(entries),
            ControllerState::Probing => {
                if !self.timer_elapsed() {
                    return Vec::new();
                }
                self.conclude_probe(entries)
            }
            ControllerState::Rollback | ControllerState::Revert => {
                if self.timer_elapsed() {
                    self.transition(ControllerState::Start);
                }
                Vec::new()
            }
        }
    }

    /// Decide from steady state: revert toward baseline, probe, or do nothing.
    fn plan(&mut self, entries: &mut [WeightedEndpointEntry]) -> Vec<WeightProposal> {
        let failures: u64 = entries.iter_mut().map(|e| e.meter.failure_count()).sum();

        if failures == 0 {
            let proposals: Vec<WeightProposal> = entries
                .iter()
                .filter(|e| e.effective_weight != e.base_weight)
                .map(|e| WeightProposal {
                    endpoint: e.id().clone(),
                    weight: self.decrease(e.base_weight, e.effective_weight),
                })
                .collect();
            if !proposals.is_empty() {
                debug!(count = proposals.len(), "no failures left, reverting weights toward baseline");
                self.arm_timer();
                self.transition(ControllerState::Revert);
            }
            return proposals;
        }

        // Not enough evidence to judge anyone yet.
        if !entries.iter().all(|e| e.meter().is_ready()) {
            return Vec::new();
        }

        let rates: Vec<f64> = entries.iter_mut().map(|e| e.meter.failure_rate()).collect();
        let verdicts = classify(greater_than, OUTLIER_MULTIPLIER, OUTLIER_SENTINEL, &rates);
        let bad = verdicts.iter().filter(|&&is_bad| is_bad).count();
        if bad == 0 || bad == verdicts.len() {
            return Vec::new();
        }

        let mut proposals = Vec::new();
        let mut probed = Vec::new();
        for ((entry, &rate), is_bad) in entries.iter().zip(&rates).zip(verdicts) {
            if is_bad {
                continue;
            }
            let grown = entry.effective_weight.saturating_mul(self.growth_factor);
            if grown > self.max_weight || grown == entry.effective_weight {
                continue;
            }
            probed.push(ProbedEndpoint {
                endpoint: entry.id().clone(),
                weight: entry.effective_weight,
                failure_rate: rate,
            });
            proposals.push(WeightProposal {
                endpoint: entry.id().clone(),
                weight: grown,
            });
        }

        // Every good endpoint already sits at the ceiling.
        if proposals.is_empty() {
            return proposals;
        }

        debug!(count = proposals.len(), outliers = bad, "probing higher weights for well-performing endpoints");
        self.probed = probed;
        self.arm_timer();
        self.transition(ControllerState::Probing);
        proposals
    }

    /// The probing period is over: keep the new weights or roll them back.
    fn conclude_probe(&mut self, entries: &mut [WeightedEndpointEntry]) -> Vec<WeightProposal> {
        let probed = std::mem::take(&mut self.probed);
        let mut proposals = Vec::new();
        for probe in probed {
            // Removed endpoints reset the controller, but stay tolerant.
            let Some(entry) = entries.iter_mut().find(|e| e.id() == &probe.endpoint) else {
                continue;
            };
            let rate = entry.meter.failure_rate();
            if significantly_greater(rate, probe.failure_rate) {
                debug!(
                    endpoint = %probe.endpoint,
                    before = probe.failure_rate,
                    after = rate,
                    "probe made endpoint worse, rolling back"
                );
                proposals.push(WeightProposal {
                    endpoint: probe.endpoint,
                    weight: probe.weight,
                });
            }
        }

        if proposals.is_empty() {
            self.transition(ControllerState::Start);
        } else {
            self.arm_timer();
            self.transition(ControllerState::Rollback);
        }
        proposals
    }

    fn decrease(&self, target: u32, current: u32) -> u32 {
        (current / self.growth_factor).max(target)
    }

    fn arm_timer(&mut self) {
        self.deadline = Some(self.clock.now() + self.probing_period);
    }

    fn timer_elapsed(&self) -> bool {
        self.deadline
            .map_or(true, |deadline| self.clock.now() >= deadline)
    }

    fn transition(&mut self, to: ControllerState) {
        let from = self.state;
        debug!(?from, ?to, "weight controller transition");
        self.state = to;
        self.observer.on_transition(from, to);
    }
}
