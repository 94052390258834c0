//! Core data structures: experiments, grouping, statistics and subsets.

mod experiment;
mod groupby;
mod history;
mod statistic;
mod subset;
mod value;

pub use experiment::{Column, ColumnRole, Experiment, ExperimentBuilder};
pub use groupby::group_by;
pub use history::OperationRecord;
pub use statistic::Statistic;
pub use subset::Subset;
pub use value::{GroupKey, Value};
