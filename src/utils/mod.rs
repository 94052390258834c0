//! Numeric helpers shared across the crate.

pub mod stats;

pub use stats::{finite_range, percentile};
