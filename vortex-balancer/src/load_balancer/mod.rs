//! Adaptive weighted round-robin load balancing.

pub mod controller;
pub mod observer;
pub mod selector;
pub mod weighted;
