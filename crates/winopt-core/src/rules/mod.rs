//! Declared state: severity tiers, override profiles and the assembled rule set
//!
//! A [`RuleSet`] is produced by [`assemble`] from the built-in tier tables and
//! an optional [`Profile`]. It is the only input the planner, executor and
//! reconciler need.

mod assembler;
mod profile;
mod tiers;

pub use assembler::{RuleSet, assemble, assemble_for, assemble_with};
pub use profile::{Profile, ProfileEntry, ProfileLoader};
pub use tiers::TierTable;

use crate::resource::{DesiredValue, ResourceTarget};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity tier; each level includes every level below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Light,
    Moderate,
    Aggressive,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Light, Level::Moderate, Level::Aggressive];

    /// This level and every level below it, lowest first
    pub fn tiers(self) -> impl Iterator<Item = Level> {
        Self::ALL.into_iter().filter(move |l| *l <= self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Light => "light",
            Level::Moderate => "moderate",
            Level::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Level::Light),
            "moderate" => Ok(Level::Moderate),
            "aggressive" => Ok(Level::Aggressive),
            other => Err(Error::InvalidValue {
                kind: "level".to_string(),
                message: format!(
                    "unknown level '{}' (expected light, moderate or aggressive)",
                    other
                ),
            }),
        }
    }
}

/// Where a desired state came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum Origin {
    /// A built-in tier
    Tier(Level),
    /// A profile `add` or `settings` entry (profile name)
    Profile(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Tier(level) => write!(f, "{}", level),
            Origin::Profile(name) => write!(f, "profile override ({})", name),
        }
    }
}

/// One declared change: the value a target should have, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    pub target: ResourceTarget,
    pub value: DesiredValue,
    pub justification: String,
    pub origin: Origin,
}

impl DesiredState {
    pub fn new(
        target: ResourceTarget,
        value: DesiredValue,
        justification: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            target,
            value,
            justification: justification.into(),
            origin,
        }
    }

    /// Check that the value can be applied to the target's kind
    pub fn validate(&self) -> Result<()> {
        if self.value.fits(self.target.kind) {
            Ok(())
        } else {
            Err(Error::InvalidValue {
                kind: self.target.kind.to_string(),
                message: format!(
                    "value '{}' cannot be applied to {}",
                    self.value, self.target
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_cumulative() {
        assert_eq!(Level::Light.tiers().collect::<Vec<_>>(), vec![Level::Light]);
        assert_eq!(
            Level::Aggressive.tiers().collect::<Vec<_>>(),
            vec![Level::Light, Level::Moderate, Level::Aggressive]
        );
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("Moderate".parse::<Level>().unwrap(), Level::Moderate);
        assert!("extreme".parse::<Level>().is_err());
    }

    #[test]
    fn origin_display_names_profile() {
        assert_eq!(Origin::Tier(Level::Light).to_string(), "light");
        assert_eq!(
            Origin::Profile("gamer".into()).to_string(),
            "profile override (gamer)"
        );
    }
}
