//! Differential privacy for aggregate token statistics.

pub mod mechanism;
pub mod simulation;
