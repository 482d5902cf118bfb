//! Mutation engine for the winopt toolkit
//!
//! This crate applies a declared set of host state changes while keeping every
//! change observable, reversible and safe to preview:
//!
//! - **Resource adapters**: one capability set per resource kind (service start
//!   mode, setting value, scheduled trigger, startup entry, installed package)
//! - **Rule assembly**: severity tiers merged with an optional override profile
//! - **Planning and execution**: dry-run or commit, with optional confirmation
//! - **Rollback**: inverse operations recorded in apply order and serialized to
//!   a standalone artifact
//! - **Reconciliation**: drift detection and repair against an assembled rule set
//!
//! # Architecture
//!
//! ```text
//!   rules::assemble --> plan::Planner --> execute::Executor --> rollback::RollbackRecorder
//!         |                                     |
//!         +------> reconcile::Reconciler -------+  (repair reuses the commit path)
//!                          |
//!                 resource adapters --> host::Host
//! ```
//!
//! # Example
//!
//! ```
//! use winopt_core::{
//!     AlwaysApprove, ExecutionMode, ExecutionSession, Executor, Journal, Level, MemoryHost,
//!     assemble,
//! };
//!
//! let mut host = MemoryHost::new();
//! host.add_service("DiagTrack", winopt_core::StartMode::Automatic);
//!
//! let ruleset = assemble(Level::Light, None);
//! let mut journal = Journal::in_memory();
//! let mut session = ExecutionSession::new(ExecutionMode::DryRun, Level::Light, None);
//! let mut confirm = AlwaysApprove;
//!
//! Executor::new(&mut host, &mut journal)
//!     .with_confirmation(&mut confirm)
//!     .run(&ruleset, &mut session);
//!
//! assert!(session.rollback.is_empty());
//! ```

pub mod config;
pub mod error;
pub mod execute;
pub mod host;
pub mod plan;
pub mod reconcile;
pub mod resource;
pub mod rollback;
pub mod rules;

pub use config::{ConfigResolver, ResolvedConfig};
pub use error::{Error, Result};
pub use execute::{
    AlwaysApprove, AlwaysDeny, Confirmation, ExecutionMode, ExecutionSession, Executor, Journal,
    JournalLine, LogLevel, SessionSummary,
};
pub use host::{Host, MemoryHost};
pub use plan::{Mutation, Outcome, Planner};
pub use reconcile::{CheckStatus, Drift, DriftItem, DriftReport, ReconcileMode, Reconciler};
pub use resource::{
    DesiredValue, InverseOp, ResourceAdapter, ResourceKind, ResourceTarget, SettingPath,
    SettingValue, Snapshot, StartMode, TargetKey,
};
pub use rollback::{
    AutoRollback, ReplayReport, RollbackArtifact, RollbackEntry, RollbackLedger,
    RollbackRecorder, replay,
};
pub use rules::{
    DesiredState, Level, Origin, Profile, ProfileEntry, ProfileLoader, RuleSet, assemble,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn error_config_not_found_displays_correctly() {
        let path = PathBuf::from("/path/to/winopt.toml");
        let error = Error::ConfigNotFound { path: path.clone() };

        let display = format!("{}", error);
        assert!(
            display.contains("/path/to/winopt.toml"),
            "Error display should contain the path, got: {}",
            display
        );
    }

    #[test]
    fn precondition_error_mentions_reason() {
        let error = Error::Precondition {
            message: "elevation required".to_string(),
        };
        assert_eq!(error.to_string(), "Precondition failed: elevation required");
    }
}
