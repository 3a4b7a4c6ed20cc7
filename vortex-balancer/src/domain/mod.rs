//! Domain models shared by the balancing components.

pub mod attempt;
pub mod endpoint;
pub mod routing;
