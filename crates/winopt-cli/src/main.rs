//! winopt CLI
//!
//! Command-line front end for the winopt mutation engine.

mod cli;
mod commands;
mod context;
mod error;
mod interactive;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!("Verbose mode enabled");
        }
    }

    let ctx = Context::new(std::env::current_dir()?, cli.config_dir.clone());

    match cli.command {
        Some(cmd) => execute_command(&ctx, cmd),
        None => {
            println!("{} Windows optimization toolkit", "winopt".green().bold());
            println!();
            println!("Run {} for available commands.", "winopt --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Apply(args) => commands::run_apply(ctx, &args).map(|_| ()),
        Commands::Check(args) => commands::run_check(ctx, &args).map(|_| ()),
        Commands::Rollback(args) => commands::run_rollback(ctx, &args).map(|_| ()),
        Commands::Rules(args) => commands::run_rules(ctx, &args),
        Commands::Profiles => commands::run_profiles(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_error_user() {
        let error = crate::error::CliError::user("test error");
        assert_eq!(format!("{}", error), "test error");
    }
}
