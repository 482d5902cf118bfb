//! Drift detection and repair
//!
//! The reconciler re-reads every target of an assembled [`RuleSet`] and
//! compares it to the desired value with the kind-specific equality of
//! [`Snapshot::satisfies`]. It shares no state with any past execution
//! session; repair runs in a fresh commit session of its own.

use crate::execute::{ExecutionMode, ExecutionSession, Executor, Journal};
use crate::host::Host;
use crate::plan::{Mutation, Planner};
use crate::resource::Snapshot;
use crate::rollback::RollbackRecorder;
use crate::rules::{DesiredState, RuleSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall result of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// Every target has its desired value
    Healthy,
    /// Some targets are absent from the host
    Missing,
    /// Some targets have drifted from their desired value
    Drifted,
    /// The host could not be read for some targets
    Broken,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckStatus::Healthy => "healthy",
            CheckStatus::Missing => "missing",
            CheckStatus::Drifted => "drifted",
            CheckStatus::Broken => "broken",
        };
        f.write_str(s)
    }
}

/// A target that is absent or could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftItem {
    pub kind: String,
    pub identity: String,
    pub description: String,
}

/// A target whose current value differs from its desired value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    pub desired: DesiredState,
    pub actual: Snapshot,
}

impl Drift {
    /// One-off mutation that drives the target back to its desired value
    pub fn to_mutation(&self) -> Mutation {
        let mut mutation = Mutation::new(self.desired.clone());
        mutation.before = Some(self.actual.clone());
        mutation
    }
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.desired.target, self.desired.value, self.actual
        )
    }
}

/// Report of a drift check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    pub status: CheckStatus,
    pub drifted: Vec<Drift>,
    pub missing: Vec<DriftItem>,
    /// Targets already at their desired value
    pub compliant: usize,
    pub messages: Vec<String>,
}

impl DriftReport {
    /// A healthy report with no issues
    pub fn healthy() -> Self {
        Self {
            status: CheckStatus::Healthy,
            drifted: Vec::new(),
            missing: Vec::new(),
            compliant: 0,
            messages: Vec::new(),
        }
    }

    /// A report indicating the input could not be checked at all
    pub fn broken(message: String) -> Self {
        Self {
            status: CheckStatus::Broken,
            messages: vec![message],
            ..Self::healthy()
        }
    }

    /// Merge two reports; the status is the worse of the two
    ///
    /// Broken > Drifted > Missing > Healthy
    pub fn merge(mut self, other: DriftReport) -> Self {
        self.drifted.extend(other.drifted);
        self.missing.extend(other.missing);
        self.messages.extend(other.messages);
        self.compliant += other.compliant;

        self.status = match (self.status, other.status) {
            (CheckStatus::Broken, _) | (_, CheckStatus::Broken) => CheckStatus::Broken,
            (CheckStatus::Drifted, _) | (_, CheckStatus::Drifted) => CheckStatus::Drifted,
            (CheckStatus::Missing, _) | (_, CheckStatus::Missing) => CheckStatus::Missing,
            (CheckStatus::Healthy, CheckStatus::Healthy) => CheckStatus::Healthy,
        };
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == CheckStatus::Healthy
    }
}

/// What to do with detected drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Report only
    LogOnly,
    /// Report, then repair every drift through the commit path
    Repair,
}

/// Compares a rule set with the host and optionally repairs drift
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    planner: Planner,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    /// Snapshot every target and compare it with its desired value
    pub fn check(&self, host: &dyn Host, ruleset: &RuleSet) -> DriftReport {
        let mut report = DriftReport::healthy();

        for desired in ruleset {
            if self.planner.is_protected(&desired.target) {
                report
                    .messages
                    .push(format!("{}: protected, not checked", desired.target));
                continue;
            }

            let adapter = desired.target.kind.adapter();
            let item = match adapter.snapshot(host, &desired.target) {
                Ok(Some(actual)) if actual.satisfies(&desired.value) => {
                    report.compliant += 1;
                    continue;
                }
                Ok(Some(actual)) => DriftReport {
                    status: CheckStatus::Drifted,
                    drifted: vec![Drift {
                        desired: desired.clone(),
                        actual,
                    }],
                    ..DriftReport::healthy()
                },
                Ok(None) if desired.value.satisfied_by_absence() => {
                    report.compliant += 1;
                    continue;
                }
                Ok(None) => DriftReport {
                    status: CheckStatus::Missing,
                    missing: vec![DriftItem {
                        kind: desired.target.kind.to_string(),
                        identity: desired.target.identity.clone(),
                        description: format!("not present; expected {}", desired.value),
                    }],
                    ..DriftReport::healthy()
                },
                Err(e) => DriftReport {
                    status: CheckStatus::Broken,
                    missing: vec![DriftItem {
                        kind: desired.target.kind.to_string(),
                        identity: desired.target.identity.clone(),
                        description: format!("could not be read: {}", e),
                    }],
                    ..DriftReport::healthy()
                },
            };
            report = report.merge(item);
        }

        tracing::debug!(
            status = %report.status,
            drifted = report.drifted.len(),
            missing = report.missing.len(),
            compliant = report.compliant,
            "Drift check complete"
        );
        report
    }

    /// Repair every drift of `report` in a fresh commit session
    ///
    /// Each drift becomes one mutation that goes through the executor's
    /// commit path without confirmation.
    pub fn repair(
        &self,
        host: &mut dyn Host,
        journal: &mut Journal,
        report: &DriftReport,
        ruleset: &RuleSet,
        recorder: Option<&mut RollbackRecorder>,
    ) -> ExecutionSession {
        let mut session = ExecutionSession::new(
            ExecutionMode::Commit,
            ruleset.level,
            ruleset.profile.clone(),
        );
        self.repair_into(host, journal, report, &mut session, recorder);
        session
    }

    /// Repair into a session the caller created
    ///
    /// Lets the caller name the journal and artifact after the session before
    /// anything runs. The session must be a fresh commit session.
    pub fn repair_into(
        &self,
        host: &mut dyn Host,
        journal: &mut Journal,
        report: &DriftReport,
        session: &mut ExecutionSession,
        recorder: Option<&mut RollbackRecorder>,
    ) {
        let mutations: Vec<Mutation> = report.drifted.iter().map(Drift::to_mutation).collect();
        journal.info(format!("Repairing {} drifted target(s)", mutations.len()));

        let mut executor = Executor::new(host, journal).with_planner(self.planner.clone());
        if let Some(recorder) = recorder {
            executor = executor.with_recorder(recorder);
        }
        executor.run_mutations(mutations, session);
    }

    /// Check, then repair when asked to
    pub fn reconcile(
        &self,
        host: &mut dyn Host,
        journal: &mut Journal,
        ruleset: &RuleSet,
        mode: ReconcileMode,
        recorder: Option<&mut RollbackRecorder>,
    ) -> (DriftReport, Option<ExecutionSession>) {
        let report = self.check(&*host, ruleset);
        for drift in &report.drifted {
            journal.warn(format!("Drift: {}", drift));
        }
        for item in &report.missing {
            journal.info(format!("{} {}: {}", item.kind, item.identity, item.description));
        }

        match mode {
            ReconcileMode::Repair if !report.drifted.is_empty() => {
                let session = self.repair(host, journal, &report, ruleset, recorder);
                (report, Some(session))
            }
            _ => (report, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::LogLevel;
    use crate::host::MemoryHost;
    use crate::resource::{DesiredValue, ResourceTarget, StartMode};
    use crate::rules::{Level, Origin, TierTable, assemble_with};

    fn ruleset() -> RuleSet {
        let table = TierTable::new()
            .with(
                Level::Light,
                DesiredState::new(
                    ResourceTarget::service("Telemetry-X"),
                    DesiredValue::StartMode(StartMode::Disabled),
                    "telemetry",
                    Origin::Tier(Level::Light),
                ),
            )
            .with(
                Level::Light,
                DesiredState::new(
                    ResourceTarget::startup("OneDrive"),
                    DesiredValue::Present(false),
                    "startup",
                    Origin::Tier(Level::Light),
                ),
            )
            .with(
                Level::Light,
                DesiredState::new(
                    ResourceTarget::service("Ghost"),
                    DesiredValue::StartMode(StartMode::Disabled),
                    "absent",
                    Origin::Tier(Level::Light),
                ),
            );
        assemble_with(&table, Level::Light, None)
    }

    #[test]
    fn compliant_host_is_healthy_apart_from_missing() {
        let mut host = MemoryHost::new();
        host.add_service("Telemetry-X", StartMode::Disabled);

        let report = Reconciler::new().check(&host, &ruleset());

        assert_eq!(report.status, CheckStatus::Missing);
        assert!(report.drifted.is_empty());
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].identity, "Ghost");
        // the absent startup entry counts as compliant
        assert_eq!(report.compliant, 2);
    }

    #[test]
    fn changed_value_is_drift() {
        let mut host = MemoryHost::new();
        host.add_service("Telemetry-X", StartMode::Automatic)
            .add_service("Ghost", StartMode::Disabled)
            .add_startup_entry("OneDrive", "onedrive.exe");

        let report = Reconciler::new().check(&host, &ruleset());

        assert_eq!(report.status, CheckStatus::Drifted);
        assert_eq!(report.drifted.len(), 2);
        assert_eq!(
            report.drifted[0].to_string(),
            "service Telemetry-X: expected disabled, found automatic"
        );
    }

    #[test]
    fn log_only_never_mutates() {
        let mut host = MemoryHost::new();
        host.add_service("Telemetry-X", StartMode::Automatic);
        let mut journal = Journal::in_memory();

        let (report, session) = Reconciler::new().reconcile(
            &mut host,
            &mut journal,
            &ruleset(),
            ReconcileMode::LogOnly,
            None,
        );

        assert_eq!(report.drifted.len(), 1);
        assert!(session.is_none());
        assert_eq!(host.mutation_count(), 0);
        assert_eq!(journal.count(LogLevel::Warn), 1);
    }

    #[test]
    fn repair_runs_one_mutation_per_drift_in_a_fresh_session() {
        let mut host = MemoryHost::new();
        host.add_service("Telemetry-X", StartMode::Automatic)
            .add_service("Ghost", StartMode::Disabled);
        let mut journal = Journal::in_memory();

        let (_, session) = Reconciler::new().reconcile(
            &mut host,
            &mut journal,
            &ruleset(),
            ReconcileMode::Repair,
            None,
        );
        let session = session.unwrap();

        assert_eq!(session.mode, ExecutionMode::Commit);
        assert_eq!(session.applied, 1);
        assert_eq!(session.rollback.len(), 1);
        assert_eq!(journal.count(LogLevel::Success), 1);
        assert_eq!(
            host.service_start_mode("Telemetry-X").unwrap(),
            Some(StartMode::Disabled)
        );
    }

    #[test]
    fn merge_takes_worst_status() {
        let broken = DriftReport::broken("unreadable".into());
        let merged = DriftReport::healthy().merge(broken);
        assert_eq!(merged.status, CheckStatus::Broken);
        assert_eq!(merged.messages, vec!["unreadable"]);
    }
}
