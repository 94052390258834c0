//! The experiment: a table of events with channel and condition columns.

use super::history::OperationRecord;
use super::statistic::Statistic;
use super::subset::Subset;
use super::value::Value;
use crate::error::{CytoflowError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Column storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric values (channels, or numeric conditions such as a dose).
    Numeric(Vec<f64>),
    /// Categorical values.
    Categorical(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the value at `row`.
    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            Column::Numeric(v) => v.get(row).map(|&x| Value::Number(x)),
            Column::Categorical(v) => v.get(row).map(|s| Value::Text(s.clone())),
        }
    }

    /// Keep only the given rows, in the given order.
    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&i| v[i]).collect()),
            Column::Categorical(v) => {
                Column::Categorical(rows.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// Whether a column is a measured channel or experimental metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Channel,
    Condition,
}

#[derive(Debug, Clone, PartialEq)]
struct NamedColumn {
    name: String,
    role: ColumnRole,
    data: Column,
}

/// A flow cytometry experiment.
///
/// Holds per-event data in named columns, per-channel metadata, the
/// statistics computed by operations, and the history of applied operations.
/// Operations never mutate an experiment in place; `apply` returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    columns: Vec<NamedColumn>,
    index: HashMap<String, usize>,
    ranges: HashMap<String, f64>,
    statistics: BTreeMap<(String, String), Statistic>,
    history: Vec<OperationRecord>,
    len: usize,
}

/// Builder for constructing an [`Experiment`].
#[derive(Debug, Clone, Default)]
pub struct ExperimentBuilder {
    columns: Vec<NamedColumn>,
    ranges: HashMap<String, f64>,
}

impl ExperimentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a measured channel.
    pub fn channel(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.push(NamedColumn {
            name: name.into(),
            role: ColumnRole::Channel,
            data: Column::Numeric(values),
        });
        self
    }

    /// Add a condition (metadata) column.
    pub fn condition(mut self, name: impl Into<String>, values: Column) -> Self {
        self.columns.push(NamedColumn {
            name: name.into(),
            role: ColumnRole::Condition,
            data: values,
        });
        self
    }

    /// Declare the instrument range of a channel.
    pub fn range(mut self, channel: impl Into<String>, range: f64) -> Self {
        self.ranges.insert(channel.into(), range);
        self
    }

    pub fn build(self) -> Result<Experiment> {
        let len = self.columns.first().map_or(0, |c| c.data.len());
        let mut index = HashMap::with_capacity(self.columns.len());

        for (i, column) in self.columns.iter().enumerate() {
            if column.data.len() != len {
                return Err(CytoflowError::DimensionMismatch {
                    expected: len,
                    got: column.data.len(),
                });
            }
            if index.insert(column.name.clone(), i).is_some() {
                return Err(CytoflowError::DuplicateColumn(column.name.clone()));
            }
        }

        for (channel, &range) in &self.ranges {
            if !index.contains_key(channel) {
                return Err(CytoflowError::ChannelNotFound(channel.clone()));
            }
            if !(range.is_finite() && range > 0.0) {
                return Err(CytoflowError::InvalidParameter(format!(
                    "range for channel {channel} must be positive, got {range}"
                )));
            }
        }

        Ok(Experiment {
            columns: self.columns,
            index,
            ranges: self.ranges,
            statistics: BTreeMap::new(),
            history: Vec::new(),
            len,
        })
    }
}

impl Experiment {
    pub fn builder() -> ExperimentBuilder {
        ExperimentBuilder::new()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i].data)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Channel)
            .map(|c| c.name.as_str())
    }

    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Condition)
            .map(|c| c.name.as_str())
    }

    /// Get a numeric column, failing if it is missing or categorical.
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(values)) => Ok(values),
            Some(Column::Categorical(_)) => Err(CytoflowError::ColumnType {
                name: name.to_string(),
                expected: "numeric",
            }),
            None => Err(CytoflowError::ChannelNotFound(name.to_string())),
        }
    }

    pub fn value(&self, name: &str, row: usize) -> Option<Value> {
        self.column(name).and_then(|c| c.get(row))
    }

    /// Distinct values of a column, in ascending order.
    pub fn unique_values(&self, name: &str) -> Option<Vec<Value>> {
        let column = self.column(name)?;
        let unique: BTreeSet<Value> = (0..column.len()).filter_map(|i| column.get(i)).collect();
        Some(unique.into_iter().collect())
    }

    /// The declared instrument range of a channel.
    pub fn channel_range(&self, channel: &str) -> Option<f64> {
        self.ranges.get(channel).copied()
    }

    /// Keep only the given rows. Statistics and history are carried over.
    pub fn select(&self, rows: &[usize]) -> Experiment {
        Experiment {
            columns: self
                .columns
                .iter()
                .map(|c| NamedColumn {
                    name: c.name.clone(),
                    role: c.role,
                    data: c.data.take(rows),
                })
                .collect(),
            index: self.index.clone(),
            ranges: self.ranges.clone(),
            statistics: self.statistics.clone(),
            history: self.history.clone(),
            len: rows.len(),
        }
    }

    /// Keep only the events matching a subset expression.
    ///
    /// Fails if the expression is invalid or selects no events.
    pub fn query(&self, expression: &str) -> Result<Experiment> {
        let subset = Subset::parse(expression)?;
        let rows = subset.matching_rows(self)?;
        if rows.is_empty() {
            return Err(CytoflowError::EmptySubset(expression.to_string()));
        }
        Ok(self.select(&rows))
    }

    /// Add a new condition column.
    pub fn add_condition(&mut self, name: impl Into<String>, values: Column) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(CytoflowError::DuplicateColumn(name));
        }
        if values.len() != self.len {
            return Err(CytoflowError::DimensionMismatch {
                expected: self.len,
                got: values.len(),
            });
        }
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push(NamedColumn {
            name,
            role: ColumnRole::Condition,
            data: values,
        });
        Ok(())
    }

    /// Store a statistic under `(operation name, statistic name)`, replacing
    /// any previous one.
    pub fn add_statistic(
        &mut self,
        operation: impl Into<String>,
        name: impl Into<String>,
        statistic: Statistic,
    ) {
        self.statistics
            .insert((operation.into(), name.into()), statistic);
    }

    pub fn statistic(&self, operation: &str, name: &str) -> Option<&Statistic> {
        self.statistics
            .get(&(operation.to_string(), name.to_string()))
    }

    pub fn statistics(&self) -> impl Iterator<Item = (&(String, String), &Statistic)> {
        self.statistics.iter()
    }

    pub fn push_history(&mut self, record: OperationRecord) {
        self.history.push(record);
    }

    pub fn history(&self) -> &[OperationRecord] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Experiment {
        Experiment::builder()
            .channel("FSC-A", vec![1.0, 2.0, 3.0, 4.0])
            .channel("V2-A", vec![10.0, -5.0, 30.0, 40.0])
            .condition("Dox", Column::Numeric(vec![0.0, 0.0, 1.0, 1.0]))
            .condition(
                "Well",
                Column::Categorical(vec!["A".into(), "B".into(), "A".into(), "B".into()]),
            )
            .range("V2-A", 1024.0)
            .build()
            .unwrap()
    }

    // ==================== builder ====================

    #[test]
    fn builder_basic() {
        let ex = sample();
        assert_eq!(ex.len(), 4);
        assert!(!ex.is_empty());
        assert_eq!(ex.channels().collect::<Vec<_>>(), vec!["FSC-A", "V2-A"]);
        assert_eq!(ex.conditions().collect::<Vec<_>>(), vec!["Dox", "Well"]);
        assert_eq!(ex.channel_range("V2-A"), Some(1024.0));
        assert_eq!(ex.channel_range("FSC-A"), None);
    }

    #[test]
    fn builder_rejects_length_mismatch() {
        let err = Experiment::builder()
            .channel("A", vec![1.0, 2.0])
            .channel("B", vec![1.0])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            CytoflowError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn builder_rejects_duplicates() {
        let err = Experiment::builder()
            .channel("A", vec![1.0])
            .channel("A", vec![2.0])
            .build()
            .unwrap_err();
        assert_eq!(err, CytoflowError::DuplicateColumn("A".to_string()));
    }

    #[test]
    fn builder_rejects_bad_range() {
        let err = Experiment::builder()
            .channel("A", vec![1.0])
            .range("A", -1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, CytoflowError::InvalidParameter(_)));
    }

    // ==================== access ====================

    #[test]
    fn numeric_access() {
        let ex = sample();
        assert_eq!(ex.numeric("FSC-A").unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(
            ex.numeric("Well"),
            Err(CytoflowError::ColumnType { .. })
        ));
        assert_eq!(
            ex.numeric("nope"),
            Err(CytoflowError::ChannelNotFound("nope".to_string()))
        );
    }

    #[test]
    fn unique_values_sorted() {
        let ex = sample();
        assert_eq!(
            ex.unique_values("Well").unwrap(),
            vec![Value::from("A"), Value::from("B")]
        );
        assert_eq!(
            ex.unique_values("Dox").unwrap(),
            vec![Value::from(0.0), Value::from(1.0)]
        );
        assert!(ex.unique_values("missing").is_none());
    }

    #[test]
    fn select_rows() {
        let ex = sample();
        let sub = ex.select(&[3, 1]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.numeric("FSC-A").unwrap(), &[4.0, 2.0]);
        assert_eq!(sub.value("Well", 0), Some(Value::from("B")));
        assert_eq!(sub.channel_range("V2-A"), Some(1024.0));
    }

    #[test]
    fn query_filters_rows() {
        let ex = sample();
        let sub = ex.query("Dox == 1 and Well == 'A'").unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.numeric("FSC-A").unwrap(), &[3.0]);
    }

    #[test]
    fn query_empty_is_error() {
        let ex = sample();
        assert_eq!(
            ex.query("Dox > 5"),
            Err(CytoflowError::EmptySubset("Dox > 5".to_string()))
        );
    }

    // ==================== mutation ====================

    #[test]
    fn add_condition_checks() {
        let mut ex = sample();
        ex.add_condition("Clust", Column::Categorical(vec!["x".into(); 4]))
            .unwrap();
        assert!(ex.has_column("Clust"));
        assert_eq!(ex.conditions().last(), Some("Clust"));

        let err = ex
            .add_condition("Clust", Column::Categorical(vec!["x".into(); 4]))
            .unwrap_err();
        assert_eq!(err, CytoflowError::DuplicateColumn("Clust".to_string()));

        let err = ex
            .add_condition("Other", Column::Numeric(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, CytoflowError::DimensionMismatch { .. }));
    }

    #[test]
    fn statistics_are_keyed_by_operation() {
        let mut ex = sample();
        let mut stat = Statistic::new(vec!["Channel".to_string()]);
        stat.insert(vec![Value::from("V2-A")], 3.0).unwrap();
        ex.add_statistic("Clust", "centers", stat);
        assert_eq!(ex.statistic("Clust", "centers").map(|s| s.len()), Some(1));
        assert!(ex.statistic("Clust", "means").is_none());
        assert_eq!(ex.statistics().count(), 1);
    }

    #[test]
    fn clone_is_independent() {
        let ex = sample();
        let mut copy = ex.clone();
        copy.add_condition("New", Column::Numeric(vec![0.0; 4]))
            .unwrap();
        assert!(!ex.has_column("New"));
    }
}
