//! Endpoint models.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque identity of a backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub String);

impl EndpointId {
    /// Borrow the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single upstream destination serving a route.
///
/// Immutable once created. Two endpoints are equal when their identities
/// are equal, whatever their addresses.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// The unique identity of the endpoint
    pub id: EndpointId,
    /// The socket address requests are forwarded to
    pub addr: SocketAddr,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(id: impl Into<EndpointId>, addr: SocketAddr) -> Self {
        Self { id: id.into(), addr }
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}

/// A thread-safe reference to an Endpoint.
pub type SharedEndpoint = Arc<Endpoint>;
