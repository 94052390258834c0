//! Records of operations applied to an experiment.

use serde::{Deserialize, Serialize};

/// One entry of an experiment's operation history.
///
/// `config` is the operation's serialized configuration; fitted state is
/// never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: String,
    pub friendly_id: String,
    pub config: serde_json::Value,
}
