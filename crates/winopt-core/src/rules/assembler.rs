//! RuleSet assembly
//!
//! Tier lists for every level up to the requested one are concatenated, the
//! profile keep-set is subtracted, and profile entries are merged: a new
//! target is appended, an existing one has its value replaced where it stands.

use super::{DesiredState, Level, Profile, ProfileLoader, TierTable};
use crate::resource::{ResourceTarget, TargetKey};
use crate::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::Path;

/// Ordered, de-duplicated list of desired states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Format version for forward compatibility
    version: String,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default)]
    pub entries: Vec<DesiredState>,
    /// Problems found while assembling (skipped profile entries, unusable profile)
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl RuleSet {
    pub fn new(level: Level, profile: Option<String>) -> Self {
        Self {
            version: "1.0".to_string(),
            level,
            profile,
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DesiredState> {
        self.entries.iter()
    }

    /// Entry for the given target, if any
    pub fn get(&self, target: &ResourceTarget) -> Option<&DesiredState> {
        let key = target.key();
        self.entries.iter().find(|e| e.target.key() == key)
    }

    /// Whether any entry has this identity, regardless of kind
    pub fn contains_identity(&self, identity: &str) -> bool {
        let normalized = crate::resource::normalize_identity(identity);
        self.entries.iter().any(|e| e.target.normalized() == normalized)
    }

    /// Load a previously saved rule set
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        file.lock_shared()?;
        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        let ruleset: RuleSet = toml::from_str(&content)?;
        for entry in &ruleset.entries {
            entry.validate()?;
        }
        Ok(ruleset)
    }

    /// Save atomically under an exclusive lock
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

    /// Insert or replace in place, keyed by kind + normalized identity
    fn upsert(&mut self, positions: &mut HashMap<TargetKey, usize>, state: DesiredState) {
        match positions.get(&state.target.key()) {
            Some(&index) => {
                let existing = &mut self.entries[index];
                tracing::debug!(
                    resource = %existing.target,
                    from = %existing.value,
                    to = %state.value,
                    "Overriding desired value in place"
                );
                existing.value = state.value;
                existing.justification = state.justification;
                existing.origin = state.origin;
            }
            None => {
                positions.insert(state.target.key(), self.entries.len());
                self.entries.push(state);
            }
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a DesiredState;
    type IntoIter = std::slice::Iter<'a, DesiredState>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Assemble the built-in tiers with an optional profile
pub fn assemble(level: Level, profile: Option<&Profile>) -> RuleSet {
    assemble_with(&TierTable::builtin(), level, profile)
}

/// Assemble from an explicit tier table
pub fn assemble_with(tiers: &TierTable, level: Level, profile: Option<&Profile>) -> RuleSet {
    let mut ruleset = RuleSet::new(level, profile.map(|p| p.name.clone()));
    let mut positions = HashMap::new();
    let keep: HashSet<String> = profile.map(Profile::keep_set).unwrap_or_default();

    for tier in level.tiers() {
        for state in tiers.tier(tier) {
            if keep.contains(&state.target.normalized()) {
                tracing::debug!(resource = %state.target, "Kept by profile, dropping tier entry");
                continue;
            }
            ruleset.upsert(&mut positions, state.clone());
        }
    }

    if let Some(profile) = profile {
        for (entry, default_kind) in profile.entries() {
            let state = match entry.to_desired(&profile.name, default_kind) {
                Ok(state) => state,
                Err(e) => {
                    let message = format!(
                        "Skipping profile entry '{}': {}",
                        entry.identity, e
                    );
                    tracing::warn!("{}", message);
                    ruleset.warnings.push(message);
                    continue;
                }
            };
            if keep.contains(&state.target.normalized()) {
                let message = format!(
                    "Profile '{}' both keeps and overrides '{}'; keeping it untouched",
                    profile.name, state.target.identity
                );
                tracing::warn!("{}", message);
                ruleset.warnings.push(message);
                continue;
            }
            ruleset.upsert(&mut positions, state);
        }
    }

    tracing::debug!(
        level = %level,
        profile = ?ruleset.profile,
        entries = ruleset.len(),
        "Assembled rule set"
    );
    ruleset
}

/// Assemble with a profile resolved by name
///
/// A missing or malformed profile degrades to "no overrides"; the problem is
/// recorded in [`RuleSet::warnings`].
pub fn assemble_for(
    tiers: &TierTable,
    level: Level,
    profile: Option<&str>,
    loader: &ProfileLoader,
) -> RuleSet {
    let Some(name) = profile else {
        return assemble_with(tiers, level, None);
    };

    match loader.load(name) {
        Ok(profile) => assemble_with(tiers, level, Some(&profile)),
        Err(e) => {
            let message = match e {
                Error::ConfigNotFound { path } => format!(
                    "Profile '{}' not found at {}; continuing without overrides",
                    name,
                    path.display()
                ),
                other => format!(
                    "Profile '{}' is unusable ({}); continuing without overrides",
                    name, other
                ),
            };
            tracing::warn!("{}", message);
            let mut ruleset = assemble_with(tiers, level, None);
            ruleset.warnings.push(message);
            ruleset
        }
    }
}
