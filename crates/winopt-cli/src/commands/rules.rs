//! Rule set and profile commands

use colored::Colorize;
use winopt_core::rules::{TierTable, assemble_for};
use winopt_core::{Level, ProfileLoader, ResolvedConfig, RuleSet};

use crate::cli::{RulesArgs, SelectionArgs};
use crate::context::Context;
use crate::error::Result;

/// Assemble the built-in tiers for the selected level and profile
///
/// Command-line selection wins over the configured defaults. A missing or
/// malformed profile degrades to no overrides; see [`RuleSet::warnings`].
pub fn assemble_selected(config: &ResolvedConfig, selection: &SelectionArgs) -> RuleSet {
    let level = selection.level.map(Level::from).unwrap_or(config.level);
    let profile = selection.profile.clone().or_else(|| config.profile.clone());
    let loader = ProfileLoader::new(config.profiles_dir.clone());
    assemble_for(&TierTable::builtin(), level, profile.as_deref(), &loader)
}

pub fn print_warnings(ruleset: &RuleSet) {
    for warning in &ruleset.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

/// Run the rules command
pub fn run_rules(ctx: &Context, args: &RulesArgs) -> Result<()> {
    let config = ctx.config()?;
    let ruleset = assemble_selected(&config, &args.selection);
    print_warnings(&ruleset);

    if let Some(path) = &args.save {
        let path = ctx.path(path);
        ruleset.save(&path)?;
        eprintln!("{} Saved rule set to {}", "OK".green().bold(), path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ruleset)?);
        return Ok(());
    }

    println!(
        "{} Rule set for level {} ({} entries, profile: {})",
        "=>".blue().bold(),
        ruleset.level.to_string().cyan(),
        ruleset.len(),
        ruleset.profile.as_deref().unwrap_or("none")
    );
    for entry in &ruleset {
        println!(
            "   {} {} -> {} {}",
            "-".blue(),
            entry.target,
            entry.value.to_string().green(),
            format!("[{}]", entry.origin).dimmed()
        );
        println!("       {}", entry.justification.dimmed());
    }
    Ok(())
}

/// Run the profiles command
pub fn run_profiles(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let loader = ProfileLoader::new(config.profiles_dir.clone());
    let names = loader.available()?;

    if names.is_empty() {
        println!(
            "No profiles found in {}",
            loader.dir().display().to_string().cyan()
        );
        return Ok(());
    }

    println!("{} Profiles in {}:", "=>".blue().bold(), loader.dir().display());
    for name in names {
        match loader.load(&name) {
            Ok(profile) => println!(
                "   {} {} ({} kept, {} added, {} settings)",
                "-".blue(),
                name.cyan(),
                profile.keep.len(),
                profile.add.len(),
                profile.settings.len()
            ),
            Err(e) => println!("   {} {} ({})", "!".red(), name.cyan(), e),
        }
    }
    Ok(())
}
