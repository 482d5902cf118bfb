//! Standalone rollback artifact
//!
//! The artifact is a TOML document holding every entry of a session's ledger.
//! It carries everything needed to replay the entries, so it can be used long
//! after the session that wrote it is gone. It can also be rendered as a
//! PowerShell script.

use super::{RollbackEntry, RollbackLedger};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Current artifact format version
pub const ARTIFACT_VERSION: &str = "1.0";

/// Serialized rollback ledger of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackArtifact {
    pub version: String,
    pub session_id: String,
    pub created: DateTime<Local>,
    #[serde(default)]
    pub entries: Vec<RollbackEntry>,
}

impl RollbackArtifact {
    pub fn new(session_id: impl Into<String>, ledger: &RollbackLedger) -> Self {
        Self {
            version: ARTIFACT_VERSION.to_string(),
            session_id: session_id.into(),
            created: Local::now(),
            entries: ledger.entries().to_vec(),
        }
    }

    /// Load an artifact with a shared lock
    ///
    /// # Errors
    ///
    /// Returns a precondition error when the file is missing, and a parse
    /// error when it is not a rollback artifact.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::precondition(format!(
                "rollback artifact {} does not exist",
                path.display()
            )));
        }
        let file = File::open(path)?;
        file.lock_shared()?;
        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        let artifact: RollbackArtifact = toml::from_str(&content)?;
        if artifact.version != ARTIFACT_VERSION {
            tracing::warn!(
                version = %artifact.version,
                "Rollback artifact has an unexpected version"
            );
        }
        Ok(artifact)
    }

    /// Save atomically with an exclusive lock (temp file, then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        lock_file.lock_exclusive()?;

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn ledger(&self) -> RollbackLedger {
        RollbackLedger::from(self.entries.clone())
    }

    /// PowerShell rendering
    ///
    /// Entries run in recorded order, each inside its own `try`/`catch`, so a
    /// failing entry is reported and the script moves on.
    pub fn render_script(&self) -> String {
        let mut script = String::new();
        let _ = writeln!(script, "# winopt rollback script");
        let _ = writeln!(script, "# Session: {}", self.session_id);
        let _ = writeln!(script, "# Created: {}", self.created.to_rfc3339());
        let _ = writeln!(script, "# Entries: {} (replayed in apply order)", self.entries.len());
        let _ = writeln!(script, "# Run from an elevated PowerShell prompt.");
        script.push('\n');
        let _ = writeln!(
            script,
            "$answer = Read-Host \"Roll back all changes from session {}? (y/N)\"",
            self.session_id
        );
        script.push_str("if ($answer -ne 'y' -and $answer -ne 'Y') {\n");
        script.push_str("    Write-Host 'Rollback cancelled.'\n");
        script.push_str("    exit 1\n");
        script.push_str("}\n\n");
        script.push_str("$failed = 0\n\n");

        for entry in &self.entries {
            let label = entry.description.replace('\'', "''");
            let _ = writeln!(script, "# [{}] {}", entry.seq, entry.description);
            script.push_str("try {\n");
            let _ = writeln!(script, "    {}", entry.op.script());
            let _ = writeln!(script, "    Write-Host 'OK   {}'", label);
            script.push_str("} catch {\n");
            let _ = writeln!(script, "    Write-Warning \"FAIL {}: $_\"", label.replace('"', "'"));
            script.push_str("    $failed++\n");
            script.push_str("}\n\n");
        }

        script.push_str("if ($failed -gt 0) {\n");
        script.push_str("    Write-Warning \"Rollback finished with $failed failure(s).\"\n");
        script.push_str("} else {\n");
        script.push_str("    Write-Host 'Rollback complete.'\n");
        script.push_str("}\n");
        script
    }
}

/// Keeps the session's rollback artifact in step with its ledger
///
/// The artifact is `<dir>/<session id>_rollback.toml` and is rewritten after
/// every appended entry.
#[derive(Debug, Clone)]
pub struct RollbackRecorder {
    dir: PathBuf,
    created: Option<DateTime<Local>>,
    path: Option<PathBuf>,
}

impl RollbackRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: None,
            path: None,
        }
    }

    /// Where the artifact for a session lives
    pub fn artifact_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}_rollback.toml", session_id))
    }

    /// The artifact written last, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rewrite the artifact from the ledger
    pub fn persist(&mut self, session_id: &str, ledger: &RollbackLedger) -> Result<PathBuf> {
        let path = self.artifact_path(session_id);
        let mut artifact = RollbackArtifact::new(session_id, ledger);
        artifact.created = *self.created.get_or_insert(artifact.created);
        artifact.save(&path)?;
        tracing::debug!(?path, entries = ledger.len(), "Rollback artifact written");
        self.path = Some(path.clone());
        Ok(path)
    }
}
