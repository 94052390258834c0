//! Operation trait defining the common interface for experiment operations.

use crate::core::{Experiment, OperationRecord};
use crate::error::Result;

/// Common interface for operations on an [`Experiment`].
///
/// An operation may learn parameters from an experiment with `estimate`
/// and then produce a new, annotated experiment with `apply`. Applying
/// never changes the input experiment.
///
/// This trait is object-safe and can be used with `Box<dyn Operation>`.
pub trait Operation {
    /// Stable identifier of the operation type.
    fn id(&self) -> &'static str;

    /// Human readable name of the operation type.
    fn friendly_id(&self) -> &'static str;

    /// Learn the operation's parameters from (a subset of) an experiment.
    ///
    /// `subset` is a boolean expression over condition columns; `None` or
    /// an empty string means every event.
    fn estimate(&mut self, experiment: &Experiment, subset: Option<&str>) -> Result<()>;

    /// Return a copy of the experiment with this operation's results added.
    fn apply(&self, experiment: &Experiment) -> Result<Experiment>;

    /// The history entry this operation leaves on the experiments it produces.
    fn record(&self) -> Result<OperationRecord>;
}

/// Type alias for boxed operation trait objects.
pub type BoxedOperation = Box<dyn Operation>;
