//! In-process simulated host
//!
//! `MemoryHost` keeps every resource in ordered maps keyed by normalized
//! identity. It can be loaded from and saved to a TOML "host state" document,
//! which lets the CLI run complete sessions against a simulated machine.

use super::Host;
use crate::resource::{SETTING_SEPARATOR, SettingValue, StartMode, normalize_identity};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// A simulated host backed by ordered maps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryHost {
    /// Identities whose mutating calls fail
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    fail_on: BTreeSet<String>,
    /// Service name -> start mode
    #[serde(default)]
    services: BTreeMap<String, StartMode>,
    /// Key path -> (value name -> data)
    #[serde(default)]
    settings: BTreeMap<String, BTreeMap<String, SettingValue>>,
    /// Task path -> enabled
    #[serde(default)]
    tasks: BTreeMap<String, bool>,
    /// Startup entry name -> command line
    #[serde(default)]
    startup: BTreeMap<String, String>,
    /// Package name -> full name
    #[serde(default)]
    packages: BTreeMap<String, String>,
    /// Number of mutating calls made against this host
    #[serde(skip)]
    mutations: usize,
}

/// Package name portion of a full package name (`Name_Version_Arch__Publisher`)
fn package_name(full_name: &str) -> &str {
    full_name.split('_').next().unwrap_or(full_name)
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a host state document
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let host: MemoryHost = toml::from_str(&content)?;
        Ok(host.normalized())
    }

    /// Save the host state document
    ///
    /// Writes to a temporary file first and renames it over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Re-key every map by normalized identity
    fn normalized(self) -> Self {
        Self {
            services: self
                .services
                .into_iter()
                .map(|(k, v)| (normalize_identity(&k), v))
                .collect(),
            settings: self
                .settings
                .into_iter()
                .map(|(k, values)| {
                    (
                        normalize_identity(&k),
                        values
                            .into_iter()
                            .map(|(name, v)| (name.to_lowercase(), v))
                            .collect(),
                    )
                })
                .collect(),
            tasks: self
                .tasks
                .into_iter()
                .map(|(k, v)| (normalize_identity(&k), v))
                .collect(),
            startup: self
                .startup
                .into_iter()
                .map(|(k, v)| (normalize_identity(&k), v))
                .collect(),
            packages: self
                .packages
                .into_iter()
                .map(|(k, v)| (normalize_identity(&k), v))
                .collect(),
            fail_on: self
                .fail_on
                .into_iter()
                .map(|k| normalize_identity(&k))
                .collect(),
            mutations: self.mutations,
        }
    }

    /// Register a service
    pub fn add_service(&mut self, name: &str, mode: StartMode) -> &mut Self {
        self.services.insert(normalize_identity(name), mode);
        self
    }

    /// Create an empty setting key
    pub fn add_setting_key(&mut self, key: &str) -> &mut Self {
        self.settings.entry(normalize_identity(key)).or_default();
        self
    }

    /// Store a setting value, creating its key
    pub fn add_setting(&mut self, key: &str, value_name: &str, value: SettingValue) -> &mut Self {
        self.settings
            .entry(normalize_identity(key))
            .or_default()
            .insert(value_name.to_lowercase(), value);
        self
    }

    /// Register a scheduled task
    pub fn add_task(&mut self, task: &str, enabled: bool) -> &mut Self {
        self.tasks.insert(normalize_identity(task), enabled);
        self
    }

    /// Register a startup entry
    pub fn add_startup_entry(&mut self, name: &str, command: &str) -> &mut Self {
        self.startup
            .insert(normalize_identity(name), command.to_string());
        self
    }

    /// Register an installed package by full name
    pub fn add_package(&mut self, full_name: &str) -> &mut Self {
        self.packages.insert(
            normalize_identity(package_name(full_name)),
            full_name.to_string(),
        );
        self
    }

    /// Make every mutating call against `identity` fail
    ///
    /// For settings the identity is `key::value`.
    pub fn fail_on(&mut self, identity: &str) -> &mut Self {
        self.fail_on.insert(normalize_identity(identity));
        self
    }

    /// Stop injecting failures for `identity`
    pub fn clear_failure(&mut self, identity: &str) -> &mut Self {
        self.fail_on.remove(&normalize_identity(identity));
        self
    }

    /// Number of mutating calls made so far
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    fn begin_mutation(&mut self, identity: &str) -> Result<()> {
        if self.fail_on.contains(&normalize_identity(identity)) {
            return Err(Error::host(format!("injected failure for {}", identity)));
        }
        self.mutations += 1;
        Ok(())
    }
}

impl Host for MemoryHost {
    fn name(&self) -> &str {
        "memory"
    }

    fn service_start_mode(&self, service: &str) -> Result<Option<StartMode>> {
        Ok(self.services.get(&normalize_identity(service)).copied())
    }

    fn set_service_start_mode(&mut self, service: &str, mode: StartMode) -> Result<()> {
        self.begin_mutation(service)?;
        match self.services.get_mut(&normalize_identity(service)) {
            Some(current) => {
                *current = mode;
                Ok(())
            }
            None => Err(Error::host(format!("service {} does not exist", service))),
        }
    }

    fn setting_key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.settings.contains_key(&normalize_identity(key)))
    }

    fn read_setting(&self, key: &str, value_name: &str) -> Result<Option<SettingValue>> {
        Ok(self
            .settings
            .get(&normalize_identity(key))
            .and_then(|values| values.get(&value_name.to_lowercase()))
            .cloned())
    }

    fn write_setting(&mut self, key: &str, value_name: &str, value: &SettingValue) -> Result<()> {
        self.begin_mutation(&format!("{}{}{}", key, SETTING_SEPARATOR, value_name))?;
        self.settings
            .entry(normalize_identity(key))
            .or_default()
            .insert(value_name.to_lowercase(), value.clone());
        Ok(())
    }

    fn delete_setting(&mut self, key: &str, value_name: &str) -> Result<()> {
        self.begin_mutation(&format!("{}{}{}", key, SETTING_SEPARATOR, value_name))?;
        if let Some(values) = self.settings.get_mut(&normalize_identity(key)) {
            values.remove(&value_name.to_lowercase());
        }
        Ok(())
    }

    fn trigger_enabled(&self, task: &str) -> Result<Option<bool>> {
        Ok(self.tasks.get(&normalize_identity(task)).copied())
    }

    fn set_trigger_enabled(&mut self, task: &str, enabled: bool) -> Result<()> {
        self.begin_mutation(task)?;
        match self.tasks.get_mut(&normalize_identity(task)) {
            Some(current) => {
                *current = enabled;
                Ok(())
            }
            None => Err(Error::host(format!("task {} does not exist", task))),
        }
    }

    fn startup_command(&self, entry: &str) -> Result<Option<String>> {
        Ok(self.startup.get(&normalize_identity(entry)).cloned())
    }

    fn create_startup_entry(&mut self, entry: &str, command: &str) -> Result<()> {
        self.begin_mutation(entry)?;
        self.startup
            .insert(normalize_identity(entry), command.to_string());
        Ok(())
    }

    fn remove_startup_entry(&mut self, entry: &str) -> Result<()> {
        self.begin_mutation(entry)?;
        self.startup.remove(&normalize_identity(entry));
        Ok(())
    }

    fn package_full_name(&self, package: &str) -> Result<Option<String>> {
        Ok(self.packages.get(&normalize_identity(package)).cloned())
    }

    fn install_package(&mut self, full_name: &str) -> Result<()> {
        self.begin_mutation(package_name(full_name))?;
        self.packages.insert(
            normalize_identity(package_name(full_name)),
            full_name.to_string(),
        );
        Ok(())
    }

    fn remove_package(&mut self, package: &str) -> Result<()> {
        self.begin_mutation(package)?;
        self.packages.remove(&normalize_identity(package));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lookups_are_case_insensitive() {
        let mut host = MemoryHost::new();
        host.add_service("DiagTrack", StartMode::Automatic);

        assert_eq!(
            host.service_start_mode("diagtrack").unwrap(),
            Some(StartMode::Automatic)
        );
        assert_eq!(host.service_start_mode("missing").unwrap(), None);
    }

    #[test]
    fn injected_failure_blocks_mutation_and_is_not_counted() {
        let mut host = MemoryHost::new();
        host.add_service("DiagTrack", StartMode::Automatic)
            .fail_on("DIAGTRACK");

        assert!(
            host.set_service_start_mode("DiagTrack", StartMode::Disabled)
                .is_err()
        );
        assert_eq!(host.mutation_count(), 0);
        assert_eq!(
            host.service_start_mode("DiagTrack").unwrap(),
            Some(StartMode::Automatic)
        );
    }

    #[test]
    fn package_full_name_is_tracked_by_short_name() {
        let mut host = MemoryHost::new();
        host.add_package("Microsoft.BingNews_4.55.62231.0_x64__8wekyb3d8bbwe");

        assert_eq!(
            host.package_full_name("microsoft.bingnews").unwrap().as_deref(),
            Some("Microsoft.BingNews_4.55.62231.0_x64__8wekyb3d8bbwe")
        );

        host.remove_package("Microsoft.BingNews").unwrap();
        assert_eq!(host.package_full_name("Microsoft.BingNews").unwrap(), None);
        assert_eq!(host.mutation_count(), 1);
    }

    #[test]
    fn host_state_round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("host.toml");

        let mut host = MemoryHost::new();
        host.add_service("DiagTrack", StartMode::Automatic)
            .add_setting(
                r"HKLM\SOFTWARE\Policies\Microsoft\Windows\DataCollection",
                "AllowTelemetry",
                SettingValue::Dword(3),
            )
            .add_task(r"\Microsoft\Windows\Feedback\Siuf\DmClient", true)
            .add_startup_entry("OneDrive", r#""C:\OneDrive.exe" /background"#)
            .fail_on("OneDrive");
        host.save(&path).unwrap();

        assert!(!path.with_extension("toml.tmp").exists());

        let loaded = MemoryHost::load(&path).unwrap();
        assert_eq!(
            loaded
                .read_setting(
                    r"hklm\software\policies\microsoft\windows\datacollection",
                    "allowtelemetry"
                )
                .unwrap(),
            Some(SettingValue::Dword(3))
        );
        assert_eq!(
            loaded
                .trigger_enabled(r"\Microsoft\Windows\Feedback\Siuf\DmClient")
                .unwrap(),
            Some(true)
        );
        assert!(loaded.fail_on.contains("onedrive"));
    }

    #[test]
    fn handwritten_state_document_is_normalized_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(
            &path,
            r#"
[services]
DiagTrack = "automatic"

[startup]
OneDrive = "onedrive.exe"
"#,
        )
        .unwrap();

        let host = MemoryHost::load(&path).unwrap();
        assert_eq!(
            host.service_start_mode("DIAGTRACK").unwrap(),
            Some(StartMode::Automatic)
        );
        assert_eq!(
            host.startup_command("onedrive").unwrap().as_deref(),
            Some("onedrive.exe")
        );
    }
}
