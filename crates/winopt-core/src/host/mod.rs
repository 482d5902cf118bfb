//! Host backends
//!
//! A [`Host`] exposes the primitive reads and writes the resource adapters are
//! built on. Adapters decide *what* to do; hosts only know *how* to touch the
//! underlying store.

mod memory;
mod reg;
#[cfg(windows)]
mod windows;

pub use memory::MemoryHost;
#[cfg(windows)]
pub use windows::WindowsHost;

use crate::Result;
use crate::resource::{SettingValue, StartMode};

/// Primitive operations against the mutable system
///
/// Reads return `Ok(None)` when the resource does not exist; errors are
/// reserved for failures of the backend itself.
pub trait Host {
    /// Short name for logs and artifacts
    fn name(&self) -> &str;

    /// Whether committing changes on this host needs elevated privileges
    fn requires_elevation(&self) -> bool {
        false
    }

    /// Whether the current process holds elevated privileges
    fn is_elevated(&self) -> bool {
        true
    }

    /// Current start mode of a service
    fn service_start_mode(&self, service: &str) -> Result<Option<StartMode>>;

    /// Change the start mode of a service
    fn set_service_start_mode(&mut self, service: &str, mode: StartMode) -> Result<()>;

    /// Whether the key that holds a setting exists
    ///
    /// Only keys present right now count, even where a write would create them.
    fn setting_key_exists(&self, key: &str) -> Result<bool>;

    /// Data currently stored under a value name
    fn read_setting(&self, key: &str, value_name: &str) -> Result<Option<SettingValue>>;

    /// Store data under a value name
    fn write_setting(&mut self, key: &str, value_name: &str, value: &SettingValue) -> Result<()>;

    /// Remove a value name
    fn delete_setting(&mut self, key: &str, value_name: &str) -> Result<()>;

    /// Whether a scheduled task is enabled
    fn trigger_enabled(&self, task: &str) -> Result<Option<bool>>;

    /// Enable or disable a scheduled task
    fn set_trigger_enabled(&mut self, task: &str, enabled: bool) -> Result<()>;

    /// Command line of a startup entry
    fn startup_command(&self, entry: &str) -> Result<Option<String>>;

    /// Register a startup entry
    fn create_startup_entry(&mut self, entry: &str, command: &str) -> Result<()>;

    /// Unregister a startup entry
    fn remove_startup_entry(&mut self, entry: &str) -> Result<()>;

    /// Full name of an installed package
    fn package_full_name(&self, package: &str) -> Result<Option<String>>;

    /// Install (or re-register) a package by full name
    fn install_package(&mut self, full_name: &str) -> Result<()>;

    /// Remove an installed package
    fn remove_package(&mut self, package: &str) -> Result<()>;
}
