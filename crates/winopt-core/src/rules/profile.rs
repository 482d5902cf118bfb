//! Override profiles
//!
//! A profile narrows a tier (`keep`) or extends it (`add`, `settings`). It is
//! a TOML document:
//!
//! ```toml
//! keep = ["XblGameSave", "MapsBroker"]
//!
//! [[add]]
//! kind = "service"
//! identity = "RemoteRegistry"
//! value = "disabled"
//! justification = "Not needed on a gaming rig"
//!
//! [[settings]]
//! identity = 'HKCU\Software\Microsoft\GameBar::AutoGameModeEnabled'
//! value = 1
//! ```

use super::{DesiredState, Origin};
use crate::resource::{DesiredValue, ResourceKind, ResourceTarget, normalize_identity};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A single `[[add]]` or `[[settings]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Resource kind; `settings` entries default to `setting_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub identity: String,
    pub value: toml::Value,
    /// Setting data type hint (`dword`, `qword`, `string`)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl ProfileEntry {
    /// Convert to a desired state, using `default_kind` when no kind is given
    pub fn to_desired(
        &self,
        profile: &str,
        default_kind: Option<ResourceKind>,
    ) -> Result<DesiredState> {
        let kind = match (&self.kind, default_kind) {
            (Some(kind), _) => kind.parse::<ResourceKind>()?,
            (None, Some(kind)) => kind,
            (None, None) => {
                return Err(Error::Profile {
                    name: profile.to_string(),
                    message: format!("entry '{}' has no kind", self.identity),
                });
            }
        };

        let identity = self.identity.trim();
        if identity.is_empty() {
            return Err(Error::Profile {
                name: profile.to_string(),
                message: "entry has an empty identity".to_string(),
            });
        }

        let value = DesiredValue::from_toml(kind, &self.value, self.value_type.as_deref())?;
        let state = DesiredState::new(
            ResourceTarget::new(kind, identity),
            value,
            self.justification
                .clone()
                .unwrap_or_else(|| format!("Requested by profile '{}'", profile)),
            Origin::Profile(profile.to_string()),
        );
        state.validate()?;
        Ok(state)
    }
}

/// A named override document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name; taken from the file stem, not the document
    #[serde(skip)]
    pub name: String,
    /// Identities that must never be touched
    #[serde(default)]
    pub keep: Vec<String>,
    /// Additional desired states of any kind
    #[serde(default)]
    pub add: Vec<ProfileEntry>,
    /// Setting overrides; `kind` defaults to `setting_key`
    #[serde(default)]
    pub settings: Vec<ProfileEntry>,
}

impl Profile {
    /// An empty profile with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a profile document
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let mut profile: Profile = toml::from_str(content).map_err(|e| Error::Profile {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        profile.name = name.to_string();
        Ok(profile)
    }

    /// Keep-set, normalized
    pub fn keep_set(&self) -> HashSet<String> {
        self.keep.iter().map(|k| normalize_identity(k)).collect()
    }

    /// All override entries with their default kind, `add` first
    pub fn entries(&self) -> impl Iterator<Item = (&ProfileEntry, Option<ResourceKind>)> {
        self.add
            .iter()
            .map(|e| (e, None))
            .chain(self.settings.iter().map(|e| (e, Some(ResourceKind::SettingKey))))
    }

    pub fn with_keep(mut self, identity: impl Into<String>) -> Self {
        self.keep.push(identity.into());
        self
    }

    pub fn with_add(mut self, entry: ProfileEntry) -> Self {
        self.add.push(entry);
        self
    }

    pub fn with_setting(mut self, entry: ProfileEntry) -> Self {
        self.settings.push(entry);
        self
    }
}

/// Resolves profile names to documents under a directory
#[derive(Debug, Clone)]
pub struct ProfileLoader {
    dir: PathBuf,
}

impl ProfileLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", name))
    }

    /// Load a profile by name
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` when no document exists, or `Profile` when it
    /// cannot be parsed.
    pub fn load(&self, name: &str) -> Result<Profile> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(Error::ConfigNotFound { path });
        }
        tracing::debug!(?path, profile = name, "Loading profile");
        let content = fs::read_to_string(&path)?;
        Profile::parse(name, &content)
    }

    /// Names of all profiles in the directory, sorted
    pub fn available(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}
