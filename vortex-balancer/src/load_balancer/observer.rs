//! Hooks for watching the weight controller from outside.

use std::fmt::Debug;

use crate::domain::endpoint::Endpoint;
use crate::load_balancer::controller::ControllerState;

/// Receives controller transitions and applied weight changes.
///
/// Callbacks run while the selector lock is held and must not call back
/// into the selector.
pub trait ControlObserver: Send + Sync + Debug {
    /// The controller moved from `from` to `to`.
    fn on_transition(&self, from: ControllerState, to: ControllerState) {
        let _ = (from, to);
    }

    /// The selector changed an endpoint's effective weight.
    fn on_weight_change(&self, endpoint: &Endpoint, old: u32, new: u32) {
        let _ = (endpoint, old, new);
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ControlObserver for NoopObserver {}
