//! Configuration resolution
//!
//! Settings come from up to three layers, later layers overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Global config (`<config_dir>/winopt/config.toml`)
//! 3. Local config (`<root>/winopt.toml`)
//!
//! Relative paths inside a layer are resolved against that layer's directory.

use crate::Result;
use crate::rules::Level;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory config file
pub const LOCAL_CONFIG_FILE: &str = "winopt.toml";

/// One configuration document; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_rollback: Option<bool>,
}

impl ConfigLayer {
    /// Parse a layer, resolving relative paths against `base`
    pub fn parse(content: &str, base: &Path) -> Result<Self> {
        let mut layer: ConfigLayer = toml::from_str(content)?;
        for dir in [&mut layer.profiles_dir, &mut layer.data_dir]
            .into_iter()
            .flatten()
        {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(layer)
    }

    fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            tracing::debug!(?path, "No config layer found, skipping");
            return Ok(None);
        }
        tracing::debug!(?path, "Loading config layer");
        let content = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Some(Self::parse(&content, base)?))
    }
}

/// The effective configuration after merging every layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Directory holding `<name>.toml` profile documents
    pub profiles_dir: PathBuf,
    /// Directory receiving journals, rollback artifacts and session records
    pub data_dir: PathBuf,
    /// Level used when none is given on the command line
    pub level: Level,
    /// Profile used when none is given on the command line
    pub profile: Option<String>,
    /// Ask before every committed mutation
    pub confirm: bool,
    /// Replay the rollback ledger when a commit run ends with failures
    pub auto_rollback: bool,
}

impl ResolvedConfig {
    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(dir) = layer.profiles_dir {
            self.profiles_dir = dir;
        }
        if let Some(dir) = layer.data_dir {
            self.data_dir = dir;
        }
        if let Some(level) = layer.level {
            self.level = level;
        }
        if layer.profile.is_some() {
            self.profile = layer.profile;
        }
        if let Some(confirm) = layer.confirm {
            self.confirm = confirm;
        }
        if let Some(auto_rollback) = layer.auto_rollback {
            self.auto_rollback = auto_rollback;
        }
    }
}

/// Resolves configuration for a working directory
pub struct ConfigResolver {
    root: PathBuf,
    /// Override for the global config directory (used for testing)
    global_config_dir_override: Option<PathBuf>,
}

impl ConfigResolver {
    /// Resolver using the platform config directory for the global layer
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            global_config_dir_override: None,
        }
    }

    /// Resolver with a custom global config directory
    pub fn with_global_config_dir(root: impl Into<PathBuf>, global_config_dir: PathBuf) -> Self {
        Self {
            root: root.into(),
            global_config_dir_override: Some(global_config_dir),
        }
    }

    /// The global config directory, if one can be determined
    pub fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("winopt"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_local_config(&self) -> bool {
        self.root.join(LOCAL_CONFIG_FILE).is_file()
    }

    fn defaults(&self) -> ResolvedConfig {
        let profiles_dir = match self.global_config_dir() {
            Some(dir) => dir.join("profiles"),
            None => self.root.join("profiles"),
        };
        let data_dir = match &self.global_config_dir_override {
            Some(dir) => dir.join("data"),
            None => dirs::data_local_dir()
                .map(|d| d.join("winopt"))
                .unwrap_or_else(|| self.root.join(".winopt")),
        };
        ResolvedConfig {
            profiles_dir,
            data_dir,
            level: Level::Light,
            profile: None,
            confirm: false,
            auto_rollback: false,
        }
    }

    /// Merge defaults, the global layer and the local layer
    ///
    /// Missing layers are skipped. A layer that exists but cannot be parsed
    /// is an error.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let mut config = self.defaults();

        if let Some(global_dir) = self.global_config_dir()
            && let Some(layer) = ConfigLayer::load(&global_dir.join("config.toml"))?
        {
            config.merge(layer);
        }

        if let Some(layer) = ConfigLayer::load(&self.root.join(LOCAL_CONFIG_FILE))? {
            config.merge(layer);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(temp: &TempDir) -> ConfigResolver {
        let root = temp.path().join("work");
        fs::create_dir_all(&root).unwrap();
        ConfigResolver::with_global_config_dir(root, temp.path().join("global"))
    }

    #[test]
    fn resolve_returns_defaults_when_no_config_exists() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp);
        assert!(!resolver.has_local_config());

        let config = resolver.resolve().unwrap();
        assert_eq!(config.profiles_dir, temp.path().join("global").join("profiles"));
        assert_eq!(config.data_dir, temp.path().join("global").join("data"));
        assert_eq!(config.level, Level::Light);
        assert!(!config.confirm);
        assert!(!config.auto_rollback);
    }

    #[test]
    fn local_layer_overrides_global_layer() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp);
        fs::create_dir_all(temp.path().join("global")).unwrap();
        fs::write(
            temp.path().join("global").join("config.toml"),
            "confirm = true\nauto_rollback = true\nlevel = \"moderate\"\n",
        )
        .unwrap();
        fs::write(
            resolver.root().join(LOCAL_CONFIG_FILE),
            "confirm = false\nprofiles_dir = \"my-profiles\"\n",
        )
        .unwrap();

        let config = resolver.resolve().unwrap();
        assert!(!config.confirm);
        assert!(config.auto_rollback);
        assert_eq!(config.level, Level::Moderate);
        assert_eq!(config.profiles_dir, resolver.root().join("my-profiles"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp);
        fs::write(resolver.root().join(LOCAL_CONFIG_FILE), "confrim = true\n").unwrap();
        assert!(resolver.resolve().is_err());
    }

    #[test]
    fn relative_paths_resolve_against_layer_directory() {
        let base = Path::new("base");
        let layer = ConfigLayer::parse("data_dir = \"logs\"\n", base).unwrap();
        assert_eq!(layer.data_dir, Some(base.join("logs")));
        assert_eq!(layer.profiles_dir, None);
    }
}
