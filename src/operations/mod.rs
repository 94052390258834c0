//! Operations on experiments.

mod traits;

pub mod kmeans;

pub use kmeans::{KMeansOp, KMEANS_FRIENDLY_ID, KMEANS_ID, MAX_GROUP_VALUES};
pub use traits::{BoxedOperation, Operation};
