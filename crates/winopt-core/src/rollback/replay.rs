//! Replaying rollback entries

use super::RollbackEntry;
use crate::Error;
use crate::execute::{ExecutionMode, ExecutionSession, Journal};
use crate::host::Host;
use serde::{Deserialize, Serialize};

/// An entry whose inverse could not be executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFailure {
    pub seq: usize,
    pub target: String,
    pub error: String,
}

/// Result of replaying a list of entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub attempted: usize,
    pub restored: usize,
    pub failures: Vec<ReplayFailure>,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every entry's inverse in recorded order
///
/// Each entry is isolated: a failure is logged and replay continues with the
/// next entry.
pub fn replay(entries: &[RollbackEntry], host: &mut dyn Host, journal: &mut Journal) -> ReplayReport {
    let mut report = ReplayReport::default();
    journal.header(format!("Rollback: replaying {} entries in apply order", entries.len()));

    for entry in entries {
        report.attempted += 1;
        match entry.op.execute(host) {
            Ok(()) => {
                report.restored += 1;
                journal.success(format!("[{}] {}: {}", entry.seq, entry.target, entry.op));
            }
            Err(e) => {
                let failure = Error::RollbackFailed {
                    target: entry.target.to_string(),
                    reason: e.to_string(),
                };
                journal.error(format!("[{}] {}", entry.seq, failure));
                report.failures.push(ReplayFailure {
                    seq: entry.seq,
                    target: entry.target.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    journal.header(format!(
        "Rollback finished: {} restored, {} failed",
        report.restored,
        report.failures.len()
    ));
    report
}

/// Replays a session's ledger when a commit run ends with failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoRollback {
    enabled: bool,
}

impl AutoRollback {
    /// `enabled` is the caller's opt-in
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Opted in, commit mode, and at least one failure
    pub fn should_run(&self, session: &ExecutionSession) -> bool {
        self.enabled && session.mode == ExecutionMode::Commit && session.failed > 0
    }

    /// Replay the whole ledger once, in recorded order, if the trigger holds
    pub fn run(
        &self,
        session: &ExecutionSession,
        host: &mut dyn Host,
        journal: &mut Journal,
    ) -> Option<ReplayReport> {
        if !self.should_run(session) {
            return None;
        }
        journal.warn(format!(
            "Auto-rollback: {} mutation(s) failed, undoing {} applied change(s)",
            session.failed,
            session.rollback.len()
        ));
        Some(replay(session.rollback.entries(), host, journal))
    }
}
