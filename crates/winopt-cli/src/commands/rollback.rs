//! Rollback command implementation

use colored::Colorize;
use winopt_core::{ExecutionMode, Journal, ReplayReport, RollbackArtifact, replay};

use crate::cli::RollbackArgs;
use crate::context::{Context, HostHandle};
use crate::error::Result;

/// Run the rollback command
///
/// Replays the artifact's entries in recorded order, or prints the
/// PowerShell rendering with `--script`. A failing entry is reported and
/// the remaining entries still run.
pub fn run_rollback(ctx: &Context, args: &RollbackArgs) -> Result<Option<ReplayReport>> {
    let artifact = RollbackArtifact::load(&ctx.path(&args.artifact))?;

    if args.script {
        print!("{}", artifact.render_script());
        return Ok(None);
    }

    let config = ctx.config()?;
    let mut handle = HostHandle::open(ctx, args.host_state.as_deref())?;
    handle.ensure_can_commit(ExecutionMode::Commit)?;

    println!(
        "{} Rolling back session {} ({} entries)",
        "=>".blue().bold(),
        artifact.session_id.cyan(),
        artifact.entries.len()
    );

    let mut journal = Journal::create(
        &config.data_dir,
        &format!("{}_rollback", artifact.session_id),
    )?;
    let report = replay(&artifact.entries, handle.host_mut(), &mut journal);
    handle.persist()?;

    for failure in &report.failures {
        println!(
            "   {} [{}] {}: {}",
            "!".red(),
            failure.seq,
            failure.target,
            failure.error
        );
    }
    if report.is_clean() {
        println!(
            "{} Restored {} of {} entries",
            "OK".green().bold(),
            report.restored,
            report.attempted
        );
    } else {
        println!(
            "{} Restored {} of {} entries, {} failed",
            "DONE WITH ERRORS".yellow().bold(),
            report.restored,
            report.attempted,
            report.failures.len()
        );
    }
    Ok(Some(report))
}
