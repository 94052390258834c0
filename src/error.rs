//! Error types for the cytoflow-kmeans library.

use thiserror::Error;

/// Result type alias for experiment operations.
pub type Result<T> = std::result::Result<T, CytoflowError>;

/// Errors that can occur while building experiments, estimating or applying
/// operations, and constructing diagnostic views.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CytoflowError {
    /// The experiment contains no events.
    #[error("experiment has no events")]
    EmptyExperiment,

    /// Fewer than two clusters requested.
    #[error("num_clusters must be >= 2, got {0}")]
    InvalidClusterCount(usize),

    /// No channels configured.
    #[error("must set at least one channel")]
    NoChannels,

    /// A configured channel is missing from the experiment.
    #[error("channel {0} not found in the experiment")]
    ChannelNotFound(String),

    /// A scale override names a channel the operation doesn't use.
    #[error("scale set for channel {0}, but it isn't in the operation's channels")]
    ScaleWithoutChannel(String),

    /// A grouping column is missing from the experiment.
    #[error("aggregation metadata {0} not found in the experiment")]
    GroupingNotFound(String),

    /// A grouping column has too many distinct values.
    #[error(
        "more than {limit} unique values found for aggregation metadata {name}; \
         did you accidentally specify a data channel?"
    )]
    TooManyValues { name: String, limit: usize },

    /// A subset expression failed to parse or evaluate.
    #[error("subset '{subset}' isn't valid: {reason}")]
    InvalidSubset { subset: String, reason: String },

    /// A subset expression selected no events.
    #[error("subset '{0}' returned no events")]
    EmptySubset(String),

    /// A group had no events.
    #[error("group {0} had no data")]
    EmptyGroup(String),

    /// A group has fewer usable events than requested clusters.
    #[error("group {group} has {got} usable events, need at least {needed}")]
    InsufficientEvents {
        group: String,
        needed: usize,
        got: usize,
    },

    /// The operation's output name is empty.
    #[error("the operation's name must be set before applying it")]
    NameNotSet,

    /// The experiment already has a column with this name.
    #[error("experiment already has a column named {0}")]
    DuplicateColumn(String),

    /// A column holds the wrong kind of values.
    #[error("column {name} must be {expected}")]
    ColumnType { name: String, expected: &'static str },

    /// Column lengths don't agree.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// `apply` or a view was used before `estimate`.
    #[error("operation must be estimated before it is applied")]
    NotEstimated,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A diagnostic view could not be built.
    #[error("view error: {0}")]
    View(String),

    /// An operation record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CytoflowError {
    fn from(err: serde_json::Error) -> Self {
        CytoflowError::Serialization(err.to_string())
    }
}
