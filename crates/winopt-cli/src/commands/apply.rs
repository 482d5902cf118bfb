//! Apply command implementation
//!
//! Assembles the rule set, runs it through the executor in dry-run or commit
//! mode, and writes the session files next to the execution journal.

use colored::Colorize;
use winopt_core::{
    AutoRollback, ExecutionMode, ExecutionSession, Executor, Journal, Planner, RollbackRecorder,
    SessionSummary,
};

use crate::cli::ApplyArgs;
use crate::commands::finish_session;
use crate::commands::rules::{assemble_selected, print_warnings};
use crate::context::{Context, HostHandle};
use crate::error::Result;
use crate::interactive::TerminalConfirm;

/// Run the apply command
///
/// Every precondition is checked before the first mutation. Once the run has
/// started it always completes; failed mutations show up in the summary and
/// failures to write the session files only warn.
pub fn run_apply(ctx: &Context, args: &ApplyArgs) -> Result<SessionSummary> {
    let config = ctx.config()?;
    let mode = args.mode();
    let confirm = (args.confirm || config.confirm) && mode == ExecutionMode::Commit;
    let auto_rollback = AutoRollback::new(args.auto_rollback || config.auto_rollback);

    let mut handle = HostHandle::open(ctx, args.host_state.as_deref())?;
    handle.ensure_can_commit(mode)?;

    let ruleset = assemble_selected(&config, &args.selection);
    print_warnings(&ruleset);

    let mut session = ExecutionSession::new(mode, ruleset.level, ruleset.profile.clone());
    let mut journal = Journal::create(&config.data_dir, &session.id)?;
    journal.open_session(&session);

    if !args.json {
        println!(
            "{} {} {} rule(s) at level {} on {} host",
            "=>".blue().bold(),
            match mode {
                ExecutionMode::DryRun => "Previewing",
                ExecutionMode::Commit => "Applying",
            },
            ruleset.len(),
            ruleset.level.to_string().cyan(),
            handle.host().name()
        );
    }

    let planner = Planner::new().with_protected(args.protect.iter().cloned());
    let mut recorder = RollbackRecorder::new(config.data_dir.clone());
    let mut terminal = TerminalConfirm::new();
    {
        let mut executor = Executor::new(handle.host_mut(), &mut journal).with_planner(planner);
        if mode == ExecutionMode::Commit {
            executor = executor.with_recorder(&mut recorder);
        }
        if confirm {
            executor = executor.with_confirmation(&mut terminal);
        }
        executor.run(&ruleset, &mut session);
    }

    let replayed = auto_rollback.run(&session, handle.host_mut(), &mut journal);

    let mut summary = session.summary();
    summary.artifact = recorder.path().map(|p| p.to_path_buf());
    summary.auto_rollback = replayed;
    finish_session(&handle, &mut session, &mut journal, &summary, &config.data_dir);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_session(&session, &summary, journal.path());
    }
    Ok(summary)
}

fn print_session(
    session: &ExecutionSession,
    summary: &SessionSummary,
    journal: Option<&std::path::Path>,
) {
    for mutation in session.previews() {
        println!(
            "   {} {}: {} -> {}",
            "~".yellow(),
            mutation.target(),
            mutation.before_display(),
            mutation.desired.value.to_string().green()
        );
    }
    for mutation in session.with_outcome(winopt_core::Outcome::Failed) {
        println!(
            "   {} {}: {}",
            "!".red(),
            mutation.target(),
            mutation.error.as_deref().unwrap_or("unknown error")
        );
    }

    println!();
    let status = if summary.failed > 0 {
        "DONE WITH ERRORS".yellow().bold()
    } else {
        "OK".green().bold()
    };
    println!(
        "{} {} applied, {} failed, {} not found, {} declined, {} previewed, {} protected",
        status,
        summary.applied,
        summary.failed,
        summary.skipped_not_found,
        summary.skipped_declined,
        summary.previewed,
        summary.protected
    );
    if !summary.applied_by_kind.is_empty() {
        let by_kind: Vec<String> = summary
            .applied_by_kind
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        println!("   {}", by_kind.join(", ").dimmed());
    }

    if let Some(report) = &summary.auto_rollback {
        println!(
            "{} Auto-rollback restored {} of {} change(s)",
            "ROLLBACK".yellow().bold(),
            report.restored,
            report.attempted
        );
    } else if summary.rollback_available()
        && let Some(artifact) = &summary.artifact
    {
        println!(
            "Undo with {}",
            format!("winopt rollback {}", artifact.display()).cyan()
        );
    }
    if let Some(path) = journal {
        println!("Log: {}", path.display().to_string().dimmed());
    }
}
