//! Error taxonomy for the balancing core.

use thiserror::Error;

use crate::domain::endpoint::EndpointId;

/// Errors surfaced by the selector, its meters and its configuration.
///
/// The core never retries on its own; every variant is handed straight back
/// to the caller.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Invalid constructor parameters. Fatal to construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The configuration document could not be parsed.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// `next` was called on an empty pool.
    #[error("no endpoints available")]
    NoEndpoints,

    /// Every endpoint's effective weight is zero.
    #[error("all endpoints have zero weight")]
    AllZeroWeight,

    /// An endpoint with the same identity is already registered.
    #[error("endpoint {0} already exists")]
    AlreadyExists(EndpointId),

    /// No endpoint with this identity is registered.
    #[error("endpoint {0} not found")]
    NotFound(EndpointId),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BalancerError>;
