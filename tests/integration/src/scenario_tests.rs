//! Scenario tests across the whole engine
//!
//! Each scenario runs through the same layers a real invocation does:
//! configuration resolved from a [`TestWorkspace`], profiles loaded from disk,
//! journals and rollback artifacts written to the data directory. Only the
//! host is simulated.

use std::fs;
use winopt_core::rules::{TierTable, assemble_for};
use winopt_core::{
    AutoRollback, ExecutionMode, ExecutionSession, Executor, Host, Journal, Level, LogLevel,
    MemoryHost, Outcome, ProfileLoader, ReconcileMode, Reconciler, ResolvedConfig,
    RollbackArtifact, RollbackRecorder, RuleSet, SessionSummary, StartMode, replay,
};
use winopt_test_utils::host::TELEMETRY_KEY;
use winopt_test_utils::{TELEMETRY_SERVICE, TestWorkspace, telemetry_host, telemetry_tiers};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Workspace with the fixture host written to disk
struct Scenario {
    ws: TestWorkspace,
    config: ResolvedConfig,
}

impl Scenario {
    fn new() -> Self {
        let ws = TestWorkspace::new();
        ws.write_host(&telemetry_host());
        let config = ws.resolver().resolve().unwrap();
        Self { ws, config }
    }

    fn with_local_config(content: &str) -> Self {
        let ws = TestWorkspace::new();
        ws.write_host(&telemetry_host());
        ws.write_local_config(content);
        let config = ws.resolver().resolve().unwrap();
        Self { ws, config }
    }

    fn ruleset(&self, tiers: &TierTable) -> RuleSet {
        let loader = ProfileLoader::new(&self.config.profiles_dir);
        assemble_for(
            tiers,
            self.config.level,
            self.config.profile.as_deref(),
            &loader,
        )
    }

    /// Run a session end to end and write its files, like `winopt apply`
    fn run(
        &self,
        host: &mut MemoryHost,
        ruleset: &RuleSet,
        mode: ExecutionMode,
        auto_rollback: bool,
    ) -> (ExecutionSession, SessionSummary) {
        let data_dir = &self.config.data_dir;
        let mut session = ExecutionSession::new(mode, ruleset.level, ruleset.profile.clone());
        let mut journal = Journal::create(data_dir, &session.id).unwrap();
        let mut recorder = RollbackRecorder::new(data_dir.clone());
        journal.open_session(&session);

        {
            let mut executor = Executor::new(&mut *host, &mut journal);
            if mode == ExecutionMode::Commit {
                executor = executor.with_recorder(&mut recorder);
            }
            executor.run(ruleset, &mut session);
        }
        let replayed = AutoRollback::new(auto_rollback).run(&session, &mut *host, &mut journal);

        let mut summary = session.summary();
        summary.artifact = recorder.path().map(|p| p.to_path_buf());
        summary.auto_rollback = replayed;
        journal.close_session(&summary);
        session.finalize(data_dir, &summary).unwrap();
        (session, summary)
    }

    fn log_of(&self, session_id: &str) -> String {
        fs::read_to_string(
            self.config
                .data_dir
                .join(format!("{}_execution.log", session_id)),
        )
        .unwrap()
    }
}

// =============================================================================
// Light level with an empty profile
// =============================================================================

mod light_level {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn disables_telemetry_and_records_the_inverse() {
        let scenario = Scenario::with_local_config("level = \"light\"\nprofile = \"empty\"\n");
        scenario.ws.write_profile("empty", "");
        let mut host = scenario.ws.read_host();
        let ruleset = scenario.ruleset(&telemetry_tiers());
        assert!(ruleset.warnings.is_empty());
        assert_eq!(ruleset.profile.as_deref(), Some("empty"));

        let (session, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);

        assert_eq!(
            host.service_start_mode(TELEMETRY_SERVICE).unwrap(),
            Some(StartMode::Disabled)
        );
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.failed, 0);

        let artifact = RollbackArtifact::load(summary.artifact.as_deref().unwrap()).unwrap();
        assert_eq!(artifact.session_id, session.id);
        assert_eq!(
            artifact.entries[0].op.to_string(),
            format!("set service {} start mode to automatic", TELEMETRY_SERVICE)
        );

        let log = scenario.log_of(&session.id);
        assert!(log.contains("[SUCCESS]"));
        assert!(log.contains(TELEMETRY_SERVICE));
    }
}

// =============================================================================
// Profile keep-set
// =============================================================================

mod keep_set {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kept_service_is_never_touched() {
        let scenario = Scenario::with_local_config("profile = \"keep\"\n");
        scenario
            .ws
            .write_profile("keep", &format!("keep = [\"{}\"]\n", TELEMETRY_SERVICE));
        let mut host = scenario.ws.read_host();
        let ruleset = scenario.ruleset(&telemetry_tiers());

        let (session, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);

        assert!(!ruleset.contains_identity(TELEMETRY_SERVICE));
        assert!(
            session
                .changes
                .iter()
                .all(|m| m.target().identity != TELEMETRY_SERVICE)
        );
        assert_eq!(summary.applied, 1);
        assert_eq!(
            host.service_start_mode(TELEMETRY_SERVICE).unwrap(),
            Some(StartMode::Automatic)
        );
    }

    #[test]
    fn missing_profile_degrades_to_no_overrides() {
        let scenario = Scenario::with_local_config("profile = \"ghost\"\n");
        let mut host = scenario.ws.read_host();
        let ruleset = scenario.ruleset(&telemetry_tiers());

        assert_eq!(ruleset.warnings.len(), 1);
        assert!(ruleset.warnings[0].contains("ghost"));

        let (session, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);

        assert_eq!(summary.applied, 2);
        assert!(scenario.log_of(&session.id).contains("[WARN]"));
    }
}

// =============================================================================
// Absent targets
// =============================================================================

mod absent_target {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn absent_service_is_skipped_and_not_counted() {
        let scenario = Scenario::new();
        let mut host = MemoryHost::new();
        host.add_setting(TELEMETRY_KEY, "AllowTelemetry", winopt_core::SettingValue::Dword(3));
        let ruleset = scenario.ruleset(&telemetry_tiers());

        let (session, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);

        assert_eq!(summary.skipped_not_found, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(session.rollback.len(), 1);
        assert_eq!(host.service_start_mode(TELEMETRY_SERVICE).unwrap(), None);
    }
}

// =============================================================================
// Auto-rollback
// =============================================================================

mod auto_rollback {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn two_failures_restore_every_applied_change() {
        let scenario = Scenario::with_local_config("level = \"aggressive\"\n");
        let original = scenario.ws.read_host();
        let mut host = original.clone();
        host.fail_on("Legacy-Y").fail_on("Updater");
        let ruleset = scenario.ruleset(&telemetry_tiers());

        let (session, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, true);

        assert_eq!(summary.failed, 2);
        assert_eq!(session.rollback.len(), 2);
        let report = summary.auto_rollback.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.restored, 2);

        assert_eq!(
            host.service_start_mode(TELEMETRY_SERVICE).unwrap(),
            original.service_start_mode(TELEMETRY_SERVICE).unwrap()
        );
        assert_eq!(
            host.read_setting(TELEMETRY_KEY, "AllowTelemetry").unwrap(),
            original.read_setting(TELEMETRY_KEY, "AllowTelemetry").unwrap()
        );
        let log = scenario.log_of(&session.id);
        assert!(log.contains("Auto-rollback: 2 mutation(s) failed"));
        assert!(log.contains("Rollback finished: 2 restored, 0 failed"));
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

mod reconciliation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drift_after_commit_is_repaired_in_a_fresh_session() {
        let scenario = Scenario::new();
        let mut host = scenario.ws.read_host();
        let ruleset = scenario.ruleset(&telemetry_tiers());
        let (first, _) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);
        assert_eq!(first.failed, 0);

        // something re-enables the service behind our back
        host.set_service_start_mode(TELEMETRY_SERVICE, StartMode::Automatic)
            .unwrap();

        let reconciler = Reconciler::new();
        let mut journal = Journal::in_memory();
        let mut recorder = RollbackRecorder::new(scenario.config.data_dir.clone());
        let (report, repair) = reconciler.reconcile(
            &mut host,
            &mut journal,
            &ruleset,
            ReconcileMode::Repair,
            Some(&mut recorder),
        );

        assert_eq!(report.drifted.len(), 1);
        let repair = repair.unwrap();
        assert_ne!(repair.id, first.id);
        assert_eq!(repair.applied, 1);
        assert_eq!(repair.rollback.len(), 1);
        assert_eq!(journal.count(LogLevel::Success), 1);
        assert_eq!(
            host.service_start_mode(TELEMETRY_SERVICE).unwrap(),
            Some(StartMode::Disabled)
        );
        assert!(reconciler.check(&host, &ruleset).is_healthy());
    }

    #[test]
    fn log_only_mode_reports_without_writing() {
        let scenario = Scenario::new();
        let mut host = scenario.ws.read_host();
        let ruleset = scenario.ruleset(&telemetry_tiers());
        let writes_before = host.mutation_count();

        let mut journal = Journal::in_memory();
        let (report, repair) = Reconciler::new().reconcile(
            &mut host,
            &mut journal,
            &ruleset,
            ReconcileMode::LogOnly,
            None,
        );

        assert_eq!(report.drifted.len(), 2);
        assert!(repair.is_none());
        assert_eq!(host.mutation_count(), writes_before);
        assert_eq!(journal.count(LogLevel::Warn), 2);
    }
}

// =============================================================================
// Engine laws
// =============================================================================

mod laws {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn assembly_is_deterministic_across_loads() {
        let scenario = Scenario::with_local_config("level = \"aggressive\"\nprofile = \"p\"\n");
        scenario.ws.write_profile(
            "p",
            r#"
keep = ["Legacy-Y"]

[[add]]
kind = "service"
identity = "RemoteRegistry"
value = "disabled"
"#,
        );

        let first = scenario.ruleset(&telemetry_tiers());
        let second = scenario.ruleset(&telemetry_tiers());

        assert_eq!(first, second);
        assert!(first.contains_identity("RemoteRegistry"));
        assert!(!first.contains_identity("Legacy-Y"));
    }

    #[test]
    fn artifact_replay_restores_the_original_host() {
        let scenario = Scenario::with_local_config("level = \"aggressive\"\n");
        let original = scenario.ws.read_host();
        let mut host = original.clone();
        let ruleset = scenario.ruleset(&telemetry_tiers());

        let (_, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);
        assert_eq!(summary.applied, 4);

        let artifact = RollbackArtifact::load(summary.artifact.as_deref().unwrap()).unwrap();
        let report = replay(&artifact.entries, &mut host, &mut Journal::in_memory());

        assert!(report.is_clean());
        assert_eq!(report.restored, 4);
        assert_eq!(
            host.service_start_mode("Legacy-Y").unwrap(),
            original.service_start_mode("Legacy-Y").unwrap()
        );
        assert_eq!(
            host.startup_command("Updater").unwrap(),
            original.startup_command("Updater").unwrap()
        );
    }

    #[test]
    fn second_commit_is_a_no_op() {
        let scenario = Scenario::new();
        let mut host = scenario.ws.read_host();
        let ruleset = scenario.ruleset(&telemetry_tiers());

        scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);
        let writes = host.mutation_count();
        let (second, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::Commit, false);

        assert_eq!(summary.failed, 0);
        assert_eq!(host.mutation_count(), writes);
        assert!(
            second
                .changes
                .iter()
                .filter(|m| m.outcome == Outcome::Applied)
                .all(|m| m.is_noop())
        );
    }

    #[test]
    fn dry_run_writes_a_log_but_no_artifact() {
        let scenario = Scenario::new();
        let mut host = scenario.ws.read_host();
        let ruleset = scenario.ruleset(&telemetry_tiers());

        let (session, summary) = scenario.run(&mut host, &ruleset, ExecutionMode::DryRun, true);

        assert_eq!(host.mutation_count(), 0);
        assert_eq!(summary.previewed, ruleset.len());
        assert!(summary.artifact.is_none());
        assert!(summary.auto_rollback.is_none());
        scenario.ws.assert_data_file_count("_rollback.toml", 0);
        assert!(scenario.log_of(&session.id).contains("[DRYRUN]"));
    }

    #[test]
    fn session_level_follows_resolved_config() {
        let scenario = Scenario::with_local_config("level = \"moderate\"\n");
        assert_eq!(scenario.config.level, Level::Moderate);
        assert_eq!(scenario.ruleset(&telemetry_tiers()).len(), 3);
    }
}
