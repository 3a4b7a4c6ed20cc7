//! Vortex adaptive load balancing.
//!
//! Given the pool of endpoints serving one route, this crate picks the
//! endpoint for each request with GCD-interleaved weighted round robin,
//! measures every endpoint's recent failure rate from reported outcomes,
//! and shifts weight toward endpoints that clearly do better than their
//! peers. Each shift is probed and rolled back if it made things worse.
//!
//! All work happens synchronously inside the caller's request path; time is
//! read through an injectable [`Clock`](clock::Clock).
//!
//! ```no_run
//! use vortex_balancer::{BalancerConfig, RequestAttempts, WeightedSelector};
//!
//! # fn main() -> vortex_balancer::Result<()> {
//! let selector = WeightedSelector::new(BalancerConfig::default())?;
//! selector.add_endpoint("api-1", "10.0.0.1:8080".parse().unwrap(), 1)?;
//! selector.add_endpoint("api-2", "10.0.0.2:8080".parse().unwrap(), 2)?;
//!
//! let mut attempts = RequestAttempts::new();
//! let endpoint = selector.next(&attempts)?;
//! // ... forward the request ...
//! let failed = false;
//! selector.observe_outcome(&endpoint.id, failed);
//! attempts.record(endpoint.id.clone(), failed);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod load_balancer;
pub mod metrics;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::BalancerConfig;
pub use domain::attempt::{Attempt, RequestAttempts};
pub use domain::endpoint::{Endpoint, EndpointId, SharedEndpoint};
pub use error::{BalancerError, Result};
pub use load_balancer::controller::{AdaptiveWeightController, ControllerState, WeightProposal};
pub use load_balancer::observer::{ControlObserver, NoopObserver};
pub use load_balancer::selector::{EndpointStats, WeightedSelector};
pub use metrics::meter::RollingWindowMeter;
