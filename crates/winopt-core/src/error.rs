//! Error types for winopt-core

use std::path::PathBuf;

/// Result type for winopt-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in winopt-core operations
///
/// Only [`Error::Precondition`] is allowed to abort a run. Everything raised
/// while applying or replaying a single mutation is caught by the executor and
/// turned into a logged outcome.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// A required condition for the run is not met (elevation, unreadable input)
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    /// The target does not exist on the host
    #[error("Target not found: {target}")]
    TargetNotFound { target: String },

    /// The mutating call against an existing target failed
    #[error("Apply failed for {target}: {reason}")]
    ApplyFailed { target: String, reason: String },

    /// An inverse operation failed during replay
    #[error("Rollback failed for {target}: {reason}")]
    RollbackFailed { target: String, reason: String },

    /// The host backend could not complete a primitive read or write
    #[error("Host error: {message}")]
    Host { message: String },

    /// A desired value does not fit the resource kind it targets
    #[error("Invalid value for {kind}: {message}")]
    InvalidValue { kind: String, message: String },

    /// A profile document could not be used
    #[error("Profile {name}: {message}")]
    Profile { name: String, message: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Shorthand for a host primitive failure
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Shorthand for a precondition failure
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}
