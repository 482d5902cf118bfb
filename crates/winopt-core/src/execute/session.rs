//! Execution session: counters, ledger and change records of one run

use crate::Result;
use crate::plan::{Mutation, Outcome};
use crate::rollback::{ReplayReport, RollbackLedger};
use crate::rules::Level;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Whether a run may touch the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Compute and log what would change; never mutate
    DryRun,
    /// Apply changes and record their inverses
    Commit,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::DryRun => f.write_str("dry-run"),
            ExecutionMode::Commit => f.write_str("commit"),
        }
    }
}

/// State of one run, threaded through the executor
///
/// Created at invocation start, mutated only by the executor, and written out
/// once by [`ExecutionSession::finalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSession {
    /// Sortable identifier, `<date>_<time>_<short uuid>`
    pub id: String,
    pub started: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Local>>,
    pub mode: ExecutionMode,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub applied: usize,
    pub failed: usize,
    pub skipped_not_found: usize,
    pub skipped_declined: usize,
    pub previewed: usize,
    /// Targets left alone because they are protected
    pub protected: usize,
    pub rollback: RollbackLedger,
    /// Every mutation that reached a terminal state, in order
    pub changes: Vec<Mutation>,
}

impl ExecutionSession {
    pub fn new(mode: ExecutionMode, level: Level, profile: Option<String>) -> Self {
        let started = Local::now();
        let short = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}_{}", started.format("%Y-%m-%d_%H-%M-%S"), &short[..8]),
            started,
            finished: None,
            mode,
            level,
            profile,
            applied: 0,
            failed: 0,
            skipped_not_found: 0,
            skipped_declined: 0,
            previewed: 0,
            protected: 0,
            rollback: RollbackLedger::new(),
            changes: Vec::new(),
        }
    }

    /// Count a terminal mutation and keep it
    pub(crate) fn record(&mut self, mutation: Mutation) {
        match mutation.outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::SkippedNotFound => self.skipped_not_found += 1,
            Outcome::SkippedUserDeclined => self.skipped_declined += 1,
            Outcome::Previewed => self.previewed += 1,
            Outcome::Pending => {
                tracing::warn!(resource = %mutation.target(), "Recording a mutation that never ran");
            }
        }
        self.changes.push(mutation);
    }

    /// Dry-run previews, in order
    pub fn previews(&self) -> impl Iterator<Item = &Mutation> {
        self.changes
            .iter()
            .filter(|m| m.outcome == Outcome::Previewed)
    }

    /// Mutations with the given outcome, in order
    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &Mutation> {
        self.changes.iter().filter(move |m| m.outcome == outcome)
    }

    pub fn summary(&self) -> SessionSummary {
        let mut by_kind = BTreeMap::new();
        for mutation in self.with_outcome(Outcome::Applied) {
            *by_kind
                .entry(mutation.target().kind.to_string())
                .or_insert(0) += 1;
        }
        SessionSummary {
            session_id: self.id.clone(),
            mode: self.mode,
            level: self.level,
            profile: self.profile.clone(),
            total: self.changes.len(),
            applied: self.applied,
            failed: self.failed,
            skipped_not_found: self.skipped_not_found,
            skipped_declined: self.skipped_declined,
            previewed: self.previewed,
            protected: self.protected,
            rollback_entries: self.rollback.len(),
            applied_by_kind: by_kind,
            artifact: None,
            auto_rollback: None,
        }
    }

    /// Write `<id>_session.toml` and `<id>_changes.yaml` into `dir`
    ///
    /// `summary` is the caller's final summary, artifact path and
    /// auto-rollback result included; it is exported as given.
    pub fn finalize(&mut self, dir: &Path, summary: &SessionSummary) -> Result<SessionFiles> {
        self.finished = Some(Local::now());
        fs::create_dir_all(dir)?;

        let session_path = dir.join(format!("{}_session.toml", self.id));
        fs::write(&session_path, toml::to_string_pretty(self)?)?;

        let changes_path = dir.join(format!("{}_changes.yaml", self.id));
        let export = ChangesExport {
            session_id: self.id.clone(),
            mode: self.mode,
            summary: summary.clone(),
            changes: self.changes.iter().map(ChangeRecord::from).collect(),
        };
        fs::write(&changes_path, serde_yaml::to_string(&export)?)?;

        tracing::debug!(?session_path, ?changes_path, "Session finalized");
        Ok(SessionFiles {
            session: session_path,
            changes: changes_path,
        })
    }
}

/// Files written by [`ExecutionSession::finalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub session: PathBuf,
    pub changes: PathBuf,
}

/// Final counts of a run, for display and `--json` output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub mode: ExecutionMode,
    pub level: Level,
    pub profile: Option<String>,
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub skipped_not_found: usize,
    pub skipped_declined: usize,
    pub previewed: usize,
    pub protected: usize,
    pub rollback_entries: usize,
    pub applied_by_kind: BTreeMap<String, usize>,
    /// Standalone rollback artifact, when one was written
    pub artifact: Option<PathBuf>,
    /// Result of the auto-rollback, when it ran
    pub auto_rollback: Option<ReplayReport>,
}

impl SessionSummary {
    /// Whether a manual rollback is possible from this run
    pub fn rollback_available(&self) -> bool {
        self.rollback_entries > 0 && self.artifact.is_some()
    }
}

/// One line of the structured changes export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: String,
    pub target: String,
    pub origin: String,
    pub justification: String,
    pub before: String,
    pub after: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl From<&Mutation> for ChangeRecord {
    fn from(mutation: &Mutation) -> Self {
        Self {
            kind: mutation.target().kind.to_string(),
            target: mutation.target().identity.clone(),
            origin: mutation.desired.origin.to_string(),
            justification: mutation.desired.justification.clone(),
            before: mutation.before_display(),
            after: mutation.after_display(),
            outcome: mutation.outcome,
            error: mutation.error.clone(),
            elapsed_ms: mutation.elapsed_ms,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChangesExport {
    session_id: String,
    mode: ExecutionMode,
    summary: SessionSummary,
    changes: Vec<ChangeRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DesiredValue, ResourceTarget, Snapshot, StartMode};
    use crate::rules::{DesiredState, Origin};
    use tempfile::TempDir;

    fn mutation(name: &str, outcome: Outcome) -> Mutation {
        let mut m = Mutation::new(DesiredState::new(
            ResourceTarget::service(name),
            DesiredValue::StartMode(StartMode::Disabled),
            "test",
            Origin::Tier(Level::Light),
        ));
        m.before = Some(Snapshot::Service {
            mode: StartMode::Automatic,
        });
        m.outcome = outcome;
        m
    }

    #[test]
    fn session_ids_are_unique_and_sortable() {
        let a = ExecutionSession::new(ExecutionMode::DryRun, Level::Light, None);
        let b = ExecutionSession::new(ExecutionMode::DryRun, Level::Light, None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), "2026-01-01_00-00-00_".len() + 8);
    }

    #[test]
    fn record_updates_counters() {
        let mut session = ExecutionSession::new(ExecutionMode::Commit, Level::Light, None);
        session.record(mutation("A", Outcome::Applied));
        session.record(mutation("B", Outcome::Failed));
        session.record(mutation("C", Outcome::SkippedNotFound));
        session.record(mutation("D", Outcome::SkippedUserDeclined));

        let summary = session.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped_not_found, 1);
        assert_eq!(summary.skipped_declined, 1);
        assert_eq!(summary.applied_by_kind.get("service"), Some(&1));
    }

    #[test]
    fn finalize_writes_session_and_changes() {
        let dir = TempDir::new().unwrap();
        let mut session = ExecutionSession::new(ExecutionMode::DryRun, Level::Moderate, None);
        session.record(mutation("DiagTrack", Outcome::Previewed));

        let summary = session.summary();
        let files = session.finalize(dir.path(), &summary).unwrap();
        assert!(session.finished.is_some());

        let saved: ExecutionSession =
            toml::from_str(&fs::read_to_string(&files.session).unwrap()).unwrap();
        assert_eq!(saved.id, session.id);
        assert_eq!(saved.previewed, 1);

        let changes = fs::read_to_string(&files.changes).unwrap();
        assert!(changes.contains("target: DiagTrack"));
        assert!(changes.contains("outcome: previewed"));
        assert!(changes.contains("after: disabled"));
    }

    #[test]
    fn changes_export_carries_the_callers_summary() {
        let dir = TempDir::new().unwrap();
        let mut session = ExecutionSession::new(ExecutionMode::Commit, Level::Light, None);
        session.record(mutation("DiagTrack", Outcome::Applied));
        let mut summary = session.summary();
        summary.artifact = Some(dir.path().join("rollback_artifact.toml"));

        let files = session.finalize(dir.path(), &summary).unwrap();

        let changes = fs::read_to_string(&files.changes).unwrap();
        assert!(changes.contains("rollback_artifact.toml"));
        assert!(!changes.contains("artifact: null"));
    }
}
