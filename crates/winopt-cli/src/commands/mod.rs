//! Command implementations

pub mod apply;
pub mod check;
pub mod rollback;
pub mod rules;

pub use apply::run_apply;
pub use check::run_check;
pub use rollback::run_rollback;
pub use rules::{run_profiles, run_rules};

use std::path::Path;

use winopt_core::{ExecutionSession, Journal, SessionSummary};

use crate::context::HostHandle;

/// Save the host and write the session files once a run is over
///
/// The host has already been mutated, so neither step fails the command.
/// Problems are journaled as warnings and the footer is written last.
pub(crate) fn finish_session(
    handle: &HostHandle,
    session: &mut ExecutionSession,
    journal: &mut Journal,
    summary: &SessionSummary,
    data_dir: &Path,
) {
    if let Err(e) = handle.persist() {
        journal.warn(format!("Could not save host state: {}", e));
    }
    match session.finalize(data_dir, summary) {
        Ok(files) => {
            tracing::debug!(session = ?files.session, changes = ?files.changes, "Session files written")
        }
        Err(e) => journal.warn(format!("Could not write session files: {}", e)),
    }
    journal.close_session(summary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use winopt_core::{ExecutionMode, Level, LogLevel, MemoryHost};

    #[test]
    fn finish_survives_unwritable_session_and_host_files() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let handle = HostHandle::Simulated {
            host: MemoryHost::new(),
            path: blocker.join("host.toml"),
        };
        let mut session = ExecutionSession::new(ExecutionMode::Commit, Level::Light, None);
        let mut journal = Journal::in_memory();
        let summary = session.summary();

        finish_session(&handle, &mut session, &mut journal, &summary, &blocker);

        assert_eq!(journal.count(LogLevel::Warn), 2);
        assert!(journal.lines()[0].message.starts_with("Could not save host state"));
        assert!(journal.lines()[1].message.starts_with("Could not write session files"));
        assert_eq!(journal.lines().last().unwrap().level, LogLevel::Header);
    }

    #[test]
    fn finish_writes_session_files_with_the_final_summary() {
        let temp = TempDir::new().unwrap();
        let host_path = temp.path().join("host.toml");
        let handle = HostHandle::Simulated {
            host: MemoryHost::new(),
            path: host_path.clone(),
        };
        let mut session = ExecutionSession::new(ExecutionMode::Commit, Level::Light, None);
        let mut journal = Journal::in_memory();
        let mut summary = session.summary();
        summary.artifact = Some(temp.path().join("artifact.toml"));

        finish_session(&handle, &mut session, &mut journal, &summary, temp.path());

        assert_eq!(journal.count(LogLevel::Warn), 0);
        assert!(host_path.is_file());
        let changes = fs::read_to_string(
            temp.path().join(format!("{}_changes.yaml", session.id)),
        )
        .unwrap();
        assert!(changes.contains("artifact.toml"));
    }
}
