//! # cytoflow-kmeans
//!
//! K-means clustering of flow cytometry events.
//!
//! Provides an in-memory experiment model with grouping, subset queries and
//! per-operation statistics, fitted channel scales (linear, log, logicle),
//! k-means clustering, and the [`KMeansOp`](operations::KMeansOp) operation
//! that ties them together, along with diagnostic views of its centers.

#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod clustering;
pub mod core;
pub mod error;
pub mod operations;
pub mod transform;
pub mod utils;
pub mod views;

pub use error::{CytoflowError, Result};

pub mod prelude {
    pub use crate::core::{Column, Experiment, GroupKey, Statistic, Value};
    pub use crate::error::{CytoflowError, Result};
    pub use crate::operations::{KMeansOp, Operation};
    pub use crate::transform::ScaleKind;
    pub use crate::views::{KMeansView, Mark, PlotSurface};
}
