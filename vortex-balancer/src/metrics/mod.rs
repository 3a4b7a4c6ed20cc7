//! Outcome statistics: per-endpoint rolling meters and outlier detection.

pub mod anomaly;
pub mod meter;
