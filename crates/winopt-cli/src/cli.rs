//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use winopt_core::{ExecutionMode, Level};

/// winopt - Apply, verify and roll back Windows optimization changes
#[derive(Parser, Debug)]
#[command(name = "winopt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Global configuration directory (holds config.toml and profiles/)
    #[arg(long, global = true, env = "WINOPT_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Apply the rule set for a level, optionally narrowed by a profile
    ///
    /// Examples:
    ///   winopt apply --dry-run                      # Preview the light tier
    ///   winopt apply --commit --level moderate       # Apply two tiers
    ///   winopt apply --commit --profile gaming --confirm
    Apply(ApplyArgs),

    /// Compare the host with the rule set and report drift
    ///
    /// Examples:
    ///   winopt check                                 # Check the light tier
    ///   winopt check --ruleset saved.toml --repair   # Repair against a saved set
    Check(CheckArgs),

    /// Replay a rollback artifact in recorded order
    Rollback(RollbackArgs),

    /// Print the assembled rule set
    Rules(RulesArgs),

    /// List available profiles
    Profiles,
}

/// Severity tier
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelArg {
    Light,
    Moderate,
    Aggressive,
}

impl From<LevelArg> for Level {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Light => Level::Light,
            LevelArg::Moderate => Level::Moderate,
            LevelArg::Aggressive => Level::Aggressive,
        }
    }
}

/// Level and profile selection shared by several commands
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SelectionArgs {
    /// Severity level (defaults to the configured level, then light)
    #[arg(short, long, value_enum)]
    pub level: Option<LevelArg>,

    /// Override profile name (looked up in the profiles directory)
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[command(group(ArgGroup::new("mode").required(true).args(["dry_run", "commit"])))]
pub struct ApplyArgs {
    /// Preview every change without touching the host
    #[arg(long)]
    pub dry_run: bool,

    /// Apply the changes (needs elevation on a real host)
    #[arg(long)]
    pub commit: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Ask before each change
    #[arg(long)]
    pub confirm: bool,

    /// Undo every applied change when any change fails
    #[arg(long)]
    pub auto_rollback: bool,

    /// Additional identities that must never be touched
    #[arg(long = "protect", value_name = "IDENTITY")]
    pub protect: Vec<String>,

    /// Run against a simulated host state document instead of this machine
    #[arg(long, value_name = "PATH")]
    pub host_state: Option<PathBuf>,

    /// Output the session summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl ApplyArgs {
    pub fn mode(&self) -> ExecutionMode {
        if self.commit {
            ExecutionMode::Commit
        } else {
            ExecutionMode::DryRun
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CheckArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Check against a previously saved rule set instead of assembling one
    #[arg(long, value_name = "PATH", conflicts_with_all = ["level", "profile"])]
    pub ruleset: Option<PathBuf>,

    /// Repair every drifted target
    #[arg(long)]
    pub repair: bool,

    /// Run against a simulated host state document instead of this machine
    #[arg(long, value_name = "PATH")]
    pub host_state: Option<PathBuf>,

    /// Output the drift report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RollbackArgs {
    /// Rollback artifact written by a commit run (`<session>_rollback.toml`)
    pub artifact: PathBuf,

    /// Print the artifact as a PowerShell script instead of replaying it
    #[arg(long)]
    pub script: bool,

    /// Run against a simulated host state document instead of this machine
    #[arg(long, value_name = "PATH")]
    pub host_state: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RulesArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Also save the assembled rule set for later checks
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
