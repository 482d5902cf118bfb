//! Check command implementation
//!
//! Compares the host with an assembled (or saved) rule set and optionally
//! repairs drift in a fresh commit session.

use colored::Colorize;
use serde::Serialize;
use winopt_core::{
    CheckStatus, DriftReport, ExecutionMode, ExecutionSession, Journal, Reconciler,
    RollbackRecorder, RuleSet, SessionSummary,
};

use crate::cli::CheckArgs;
use crate::commands::finish_session;
use crate::commands::rules::{assemble_selected, print_warnings};
use crate::context::{Context, HostHandle};
use crate::error::{CliError, Result};

/// Result of a check run, for `--json` output
#[derive(Debug, Serialize)]
pub struct CheckOutcome {
    pub report: DriftReport,
    /// Summary of the repair session, when one ran
    pub repair: Option<SessionSummary>,
}

/// Run the check command
pub fn run_check(ctx: &Context, args: &CheckArgs) -> Result<CheckOutcome> {
    let config = ctx.config()?;

    let ruleset = match &args.ruleset {
        Some(path) => {
            let path = ctx.path(path);
            RuleSet::load(&path).map_err(|e| {
                CliError::user(format!("Cannot read rule set {}: {}", path.display(), e))
            })?
        }
        None => assemble_selected(&config, &args.selection),
    };
    print_warnings(&ruleset);

    let mut handle = HostHandle::open(ctx, args.host_state.as_deref())?;
    if args.repair {
        handle.ensure_can_commit(ExecutionMode::Commit)?;
    }

    let reconciler = Reconciler::new();
    let report = reconciler.check(handle.host(), &ruleset);

    let repair = if args.repair && !report.drifted.is_empty() {
        let mut session =
            ExecutionSession::new(ExecutionMode::Commit, ruleset.level, ruleset.profile.clone());
        let mut journal = Journal::create(&config.data_dir, &session.id)?;
        let mut recorder = RollbackRecorder::new(config.data_dir.clone());
        journal.open_session(&session);

        reconciler.repair_into(
            handle.host_mut(),
            &mut journal,
            &report,
            &mut session,
            Some(&mut recorder),
        );

        let mut summary = session.summary();
        summary.artifact = recorder.path().map(|p| p.to_path_buf());
        finish_session(&handle, &mut session, &mut journal, &summary, &config.data_dir);
        Some(summary)
    } else {
        None
    };

    let outcome = CheckOutcome { report, repair };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_report(&outcome.report, args.repair);
        if let Some(summary) = &outcome.repair {
            print_repair(summary);
        }
    }
    Ok(outcome)
}

fn print_report(report: &DriftReport, repairing: bool) {
    println!(
        "{} Checked {} target(s): {} compliant",
        "=>".blue().bold(),
        report.compliant + report.drifted.len() + report.missing.len(),
        report.compliant
    );

    match report.status {
        CheckStatus::Healthy => {
            println!("{} Host matches the rule set. No drift detected.", "OK".green().bold());
        }
        CheckStatus::Missing => {
            println!("{} Some targets are not present:", "MISSING".yellow().bold());
            print_missing(report);
        }
        CheckStatus::Drifted => {
            println!("{} Host has drifted:", "DRIFTED".red().bold());
            for drift in &report.drifted {
                println!("   {} {}", "!".red(), drift);
            }
            if !report.missing.is_empty() {
                println!();
                println!("{} Also not present:", "MISSING".yellow().bold());
                print_missing(report);
            }
            if !repairing {
                println!();
                println!("Run {} to repair.", "winopt check --repair".cyan());
            }
        }
        CheckStatus::Broken => {
            println!("{} Some targets could not be read:", "BROKEN".red().bold());
            print_missing(report);
        }
    }

    for message in &report.messages {
        println!("   {} {}", "-".dimmed(), message.dimmed());
    }
}

fn print_missing(report: &DriftReport) {
    for item in &report.missing {
        println!(
            "   {} {} ({}): {}",
            "-".yellow(),
            item.identity.cyan(),
            item.kind.dimmed(),
            item.description
        );
    }
}

fn print_repair(summary: &SessionSummary) {
    println!();
    let status = if summary.failed > 0 {
        "REPAIRED WITH ERRORS".yellow().bold()
    } else {
        "REPAIRED".green().bold()
    };
    println!(
        "{} {} applied, {} failed (session {})",
        status, summary.applied, summary.failed, summary.session_id
    );
    if let Some(artifact) = &summary.artifact {
        println!(
            "Undo with {}",
            format!("winopt rollback {}", artifact.display()).cyan()
        );
    }
}
