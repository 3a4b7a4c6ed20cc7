//! Published endpoint list for lock-free lookups.

use arc_swap::ArcSwap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::domain::endpoint::{EndpointId, SharedEndpoint};

/// A lock-free, copy-on-write view of a selector's endpoints.
///
/// The selector republishes the whole list after every structural change
/// while holding its own lock, so readers (management API, routing code
/// that only needs to resolve an identity) never contend with the request
/// path the way they would behind a `RwLock`.
#[derive(Debug)]
pub struct EndpointTable {
    endpoints: ArcSwap<Vec<SharedEndpoint>>,
}

impl EndpointTable {
    /// Create a table with the initial set of endpoints.
    pub fn new(initial_endpoints: Vec<SharedEndpoint>) -> Self {
        Self {
            endpoints: ArcSwap::from_pointee(initial_endpoints),
        }
    }

    /// Atomically replace the published list.
    pub fn publish(&self, endpoints: Vec<SharedEndpoint>) {
        self.endpoints.store(Arc::new(endpoints));
    }

    /// Look an endpoint up by identity.
    pub fn find(&self, id: &EndpointId) -> Option<SharedEndpoint> {
        let guard = self.endpoints.load();
        guard.iter().find(|e| &e.id == id).cloned()
    }

    /// Look an endpoint up by socket address.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<SharedEndpoint> {
        let guard = self.endpoints.load();
        guard.iter().find(|e| e.addr == addr).cloned()
    }

    /// Retrieve a snapshot of all current endpoints in selection order.
    pub fn snapshot(&self) -> Arc<Vec<SharedEndpoint>> {
        self.endpoints.load_full()
    }

    /// Number of published endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    /// Whether no endpoints are published.
    pub fn is_empty(&self) -> bool {
        self.endpoints.load().is_empty()
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
