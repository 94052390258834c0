//! Sparse statistic tables indexed by metadata values.

use super::value::Value;
use crate::error::{CytoflowError, Result};
use std::collections::BTreeMap;

/// A sparse table of numeric values indexed by a tuple of [`Value`]s.
///
/// The index levels are named (for example `["Dox", "Cluster", "Channel"]`);
/// every key has exactly one value per level.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistic {
    index_names: Vec<String>,
    values: BTreeMap<Vec<Value>, f64>,
}

impl Statistic {
    pub fn new(index_names: Vec<String>) -> Self {
        Self {
            index_names,
            values: BTreeMap::new(),
        }
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: Vec<Value>, value: f64) -> Result<()> {
        if key.len() != self.index_names.len() {
            return Err(CytoflowError::DimensionMismatch {
                expected: self.index_names.len(),
                got: key.len(),
            });
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &[Value]) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[Value], f64)> {
        self.values.iter().map(|(k, &v)| (k.as_slice(), v))
    }

    /// Cross-section: the entries whose `level` equals `value`, with that
    /// level dropped from the returned table.
    pub fn xs(&self, level: &str, value: &Value) -> Option<Statistic> {
        let pos = self.index_names.iter().position(|n| n == level)?;

        let mut index_names = self.index_names.clone();
        index_names.remove(pos);

        let values = self
            .values
            .iter()
            .filter(|(k, _)| &k[pos] == value)
            .map(|(k, &v)| {
                let mut key = k.clone();
                key.remove(pos);
                (key, v)
            })
            .collect();

        Some(Statistic {
            index_names,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centers() -> Statistic {
        let mut stat = Statistic::new(vec!["Cluster".to_string(), "Channel".to_string()]);
        stat.insert(vec![Value::from(1usize), Value::from("X")], 1.0)
            .unwrap();
        stat.insert(vec![Value::from(1usize), Value::from("Y")], 2.0)
            .unwrap();
        stat.insert(vec![Value::from(2usize), Value::from("X")], 10.0)
            .unwrap();
        stat.insert(vec![Value::from(2usize), Value::from("Y")], 20.0)
            .unwrap();
        stat
    }

    #[test]
    fn insert_and_get() {
        let stat = centers();
        assert_eq!(stat.len(), 4);
        assert_eq!(
            stat.get(&[Value::from(2usize), Value::from("Y")]),
            Some(20.0)
        );
        assert_eq!(stat.get(&[Value::from(3usize), Value::from("Y")]), None);
    }

    #[test]
    fn insert_checks_arity() {
        let mut stat = centers();
        let err = stat.insert(vec![Value::from(1usize)], 0.0).unwrap_err();
        assert_eq!(
            err,
            CytoflowError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn cross_section_drops_level() {
        let stat = centers();
        let x = stat.xs("Channel", &Value::from("X")).unwrap();
        assert_eq!(x.index_names(), &["Cluster".to_string()]);
        let values: Vec<f64> = x.iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![1.0, 10.0]);
        assert!(stat.xs("Nope", &Value::from("X")).is_none());
    }

    #[test]
    fn empty_table() {
        let stat = Statistic::new(vec![]);
        assert!(stat.is_empty());
        assert_eq!(stat.iter().count(), 0);
    }
}
