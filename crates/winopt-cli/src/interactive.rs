//! Interactive prompts for CLI commands
//!
//! Uses dialoguer for terminal-based confirmation of each change.

use colored::Colorize;
use dialoguer::Select;
use winopt_core::{Confirmation, Mutation};

use crate::error::Result;

const CHOICES: &[&str] = &["Yes", "No", "Yes to all remaining", "No to all remaining"];

/// Per-mutation confirmation on the terminal
///
/// A prompt that cannot be shown (no terminal, interrupted) counts as a
/// decline.
#[derive(Debug, Default)]
pub struct TerminalConfirm {
    remaining: Option<bool>,
}

impl TerminalConfirm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show one mutation and read the answer
    fn ask(&mut self, mutation: &Mutation) -> Result<bool> {
        println!();
        println!(
            "{} {}: {} -> {}",
            "?".yellow().bold(),
            mutation.target().to_string().cyan(),
            mutation.before_display(),
            mutation.desired.value.to_string().green()
        );
        println!("  {}", mutation.desired.justification.dimmed());

        let choice = Select::new()
            .with_prompt("Apply this change?")
            .items(CHOICES)
            .default(1)
            .interact()?;

        Ok(match choice {
            0 => true,
            2 => {
                self.remaining = Some(true);
                true
            }
            3 => {
                self.remaining = Some(false);
                false
            }
            _ => false,
        })
    }
}

impl Confirmation for TerminalConfirm {
    fn confirm(&mut self, mutation: &Mutation) -> bool {
        if let Some(answer) = self.remaining {
            return answer;
        }
        match self.ask(mutation) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "Confirmation prompt failed, declining");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winopt_core::{DesiredState, DesiredValue, Level, Origin, ResourceTarget, StartMode};

    #[test]
    fn remembered_answer_skips_the_prompt() {
        let mutation = Mutation::new(DesiredState::new(
            ResourceTarget::service("Telemetry-X"),
            DesiredValue::StartMode(StartMode::Disabled),
            "test",
            Origin::Tier(Level::Light),
        ));

        let mut all = TerminalConfirm {
            remaining: Some(true),
        };
        let mut none = TerminalConfirm {
            remaining: Some(false),
        };

        assert!(all.confirm(&mutation));
        assert!(!none.confirm(&mutation));
    }
}
