//! In-memory rollback ledger

use crate::resource::{InverseOp, ResourceTarget};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One recorded inverse operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    /// 1-based position in apply order
    pub seq: usize,
    pub description: String,
    pub target: ResourceTarget,
    pub op: InverseOp,
    pub recorded: DateTime<Local>,
}

/// Append-only list of rollback entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollbackLedger {
    entries: Vec<RollbackEntry>,
}

impl RollbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry after every existing one
    pub fn append(
        &mut self,
        target: ResourceTarget,
        description: impl Into<String>,
        op: InverseOp,
    ) -> &RollbackEntry {
        let entry = RollbackEntry {
            seq: self.entries.len() + 1,
            description: description.into(),
            target,
            op,
            recorded: Local::now(),
        };
        tracing::debug!(seq = entry.seq, op = %entry.op, "Recorded rollback entry");
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[RollbackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RollbackEntry> {
        self.entries.iter()
    }
}

impl From<Vec<RollbackEntry>> for RollbackLedger {
    fn from(entries: Vec<RollbackEntry>) -> Self {
        Self { entries }
    }
}
