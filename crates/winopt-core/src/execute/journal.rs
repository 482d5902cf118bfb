//! Append-only execution log
//!
//! One line per event, `[timestamp] [LEVEL] message`. Lines are kept in memory
//! for the summary and, when the journal is file-backed, appended to
//! `<session id>_execution.log` as they happen. Every line is mirrored to
//! `tracing`.

use super::session::{ExecutionSession, SessionSummary};
use crate::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const RULE: &str = "======================================================================";

/// Severity tag of a journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warn,
    #[serde(rename = "DRYRUN")]
    DryRun,
    Header,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::DryRun => "DRYRUN",
            LogLevel::Header => "HEADER",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single journal line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for JournalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f"),
            self.level,
            self.message
        )
    }
}

/// Execution log for one run
#[derive(Debug)]
pub struct Journal {
    path: Option<PathBuf>,
    file: Option<File>,
    lines: Vec<JournalLine>,
}

impl Journal {
    /// Journal that only keeps lines in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: None,
            lines: Vec::new(),
        }
    }

    /// Open `<dir>/<session_id>_execution.log` for appending
    pub fn create(dir: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_execution.log", session_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(?path, "Opened execution journal");
        Ok(Self {
            path: Some(path),
            file: Some(file),
            lines: Vec::new(),
        })
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every line written so far
    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    /// Number of lines with the given level
    pub fn count(&self, level: LogLevel) -> usize {
        self.lines.iter().filter(|l| l.level == level).count()
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let line = JournalLine {
            timestamp: Local::now(),
            level,
            message: message.into(),
        };

        match level {
            LogLevel::Error => tracing::error!("{}", line.message),
            LogLevel::Warn => tracing::warn!("{}", line.message),
            LogLevel::Header => tracing::debug!("{}", line.message),
            _ => tracing::info!("{}", line.message),
        }

        if let Some(file) = self.file.as_mut()
            && let Err(e) = writeln!(file, "{}", line)
        {
            // Further lines stay in memory only
            tracing::warn!(path = ?self.path, "Failed to append to execution journal: {}", e);
            self.file = None;
        }
        self.lines.push(line);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn dry_run(&mut self, message: impl Into<String>) {
        self.log(LogLevel::DryRun, message);
    }

    pub fn header(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Header, message);
    }

    /// Header block describing the session
    pub fn open_session(&mut self, session: &ExecutionSession) {
        self.header(RULE);
        self.header("winopt execution log");
        self.header(format!("Session: {}", session.id));
        self.header(format!(
            "Mode: {} | Level: {} | Profile: {}",
            session.mode,
            session.level,
            session.profile.as_deref().unwrap_or("<none>")
        ));
        self.header(RULE);
    }

    /// Footer block with the final counts
    pub fn close_session(&mut self, summary: &SessionSummary) {
        self.header(RULE);
        self.header(format!(
            "Finished: {} applied, {} failed, {} skipped (not found), {} skipped (declined), {} previewed",
            summary.applied,
            summary.failed,
            summary.skipped_not_found,
            summary.skipped_declined,
            summary.previewed
        ));
        self.header(format!("Rollback entries: {}", summary.rollback_entries));
        self.header(RULE);
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }
}
