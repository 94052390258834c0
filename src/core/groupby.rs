//! Partitioning events by metadata values.

use super::experiment::Experiment;
use super::value::{GroupKey, Value};
use crate::error::{CytoflowError, Result};
use std::collections::BTreeMap;

/// Partition the experiment's events by the values of `keys`.
///
/// Returns one `(key, rows)` pair per combination of values that actually
/// occurs, in ascending key order. Rows with a NaN key value are left out
/// of every group. With no keys, every event falls into a
/// single group with the empty key (provided the experiment has events).
pub fn group_by(experiment: &Experiment, keys: &[String]) -> Result<Vec<(GroupKey, Vec<usize>)>> {
    let columns = keys
        .iter()
        .map(|k| {
            experiment
                .column(k)
                .ok_or_else(|| CytoflowError::GroupingNotFound(k.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    if columns.is_empty() {
        if experiment.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![(GroupKey::all(), (0..experiment.len()).collect())]);
    }

    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for row in 0..experiment.len() {
        let key: Vec<Value> = columns.iter().filter_map(|c| c.get(row)).collect();
        // rows with a missing (NaN) key value belong to no group
        if key.iter().any(|v| v.as_number().is_some_and(f64::is_nan)) {
            continue;
        }
        groups.entry(GroupKey(key)).or_default().push(row);
    }

    Ok(groups.into_iter().collect())
}
