//! Resource targets and the per-kind adapters that read and mutate them
//!
//! Every change the engine makes goes through a [`ResourceAdapter`]. The set of
//! resource kinds is closed: [`ResourceKind::adapter`] maps each variant to the
//! single adapter that knows how to probe, snapshot, apply and invert it.

mod adapter;
mod inverse;
mod value;

pub use adapter::{
    PackageAdapter, ResourceAdapter, ServiceAdapter, SettingAdapter, StartupAdapter,
    TriggerAdapter,
};
pub use inverse::InverseOp;
pub use value::{DesiredValue, SettingValue, Snapshot, StartMode};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the key path and the value name of a setting identity
pub const SETTING_SEPARATOR: &str = "::";

/// The kinds of host resource the engine can mutate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A service and its start mode
    Service,
    /// A key/value setting, addressed by key path and value name
    SettingKey,
    /// A scheduled task trigger that can be enabled or disabled
    ScheduledTrigger,
    /// An entry that launches a program at logon
    StartupEntry,
    /// An installed application package
    Package,
}

impl ResourceKind {
    /// All kinds, in a stable order
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Service,
        ResourceKind::SettingKey,
        ResourceKind::ScheduledTrigger,
        ResourceKind::StartupEntry,
        ResourceKind::Package,
    ];

    /// Stable lowercase name used in documents and logs
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Service => "service",
            ResourceKind::SettingKey => "setting_key",
            ResourceKind::ScheduledTrigger => "scheduled_trigger",
            ResourceKind::StartupEntry => "startup_entry",
            ResourceKind::Package => "package",
        }
    }

    /// The adapter implementing this kind's capability set
    pub fn adapter(self) -> &'static dyn ResourceAdapter {
        match self {
            ResourceKind::Service => &ServiceAdapter,
            ResourceKind::SettingKey => &SettingAdapter,
            ResourceKind::ScheduledTrigger => &TriggerAdapter,
            ResourceKind::StartupEntry => &StartupAdapter,
            ResourceKind::Package => &PackageAdapter,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "service" => Ok(ResourceKind::Service),
            "setting" | "setting_key" | "registry" => Ok(ResourceKind::SettingKey),
            "task" | "scheduled_task" | "scheduled_trigger" => Ok(ResourceKind::ScheduledTrigger),
            "startup" | "startup_entry" => Ok(ResourceKind::StartupEntry),
            "package" | "app" | "appx" => Ok(ResourceKind::Package),
            other => Err(Error::InvalidValue {
                kind: "resource kind".to_string(),
                message: format!("unknown kind '{}'", other),
            }),
        }
    }
}

/// Normalize an identity for comparison
///
/// Identities compare case-insensitively, ignore surrounding whitespace and
/// treat `/` and `\` as the same separator.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().replace('/', "\\").to_lowercase()
}

/// A single resource on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTarget {
    /// What kind of resource this is
    pub kind: ResourceKind,
    /// Opaque identity as declared (service name, `key::value`, task path, ...)
    pub identity: String,
}

/// Comparison key for a target: kind plus normalized identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey(pub ResourceKind, pub String);

impl ResourceTarget {
    /// Create a new target
    pub fn new(kind: ResourceKind, identity: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.into(),
        }
    }

    /// Service target
    pub fn service(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Service, name)
    }

    /// Setting target from key path and value name
    pub fn setting(key: &str, value_name: &str) -> Self {
        Self::new(
            ResourceKind::SettingKey,
            format!("{}{}{}", key, SETTING_SEPARATOR, value_name),
        )
    }

    /// Scheduled trigger target
    pub fn trigger(task: impl Into<String>) -> Self {
        Self::new(ResourceKind::ScheduledTrigger, task)
    }

    /// Startup entry target
    pub fn startup(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::StartupEntry, name)
    }

    /// Package target
    pub fn package(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Package, name)
    }

    /// Normalized identity
    pub fn normalized(&self) -> String {
        normalize_identity(&self.identity)
    }

    /// Comparison key (kind + normalized identity)
    pub fn key(&self) -> TargetKey {
        TargetKey(self.kind, self.normalized())
    }

    /// Whether two targets address the same resource
    pub fn same_as(&self, other: &ResourceTarget) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Display for ResourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.identity)
    }
}

/// A setting identity split into key path and value name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingPath {
    /// Key path, e.g. `HKLM\SOFTWARE\Policies\Microsoft\Windows\DataCollection`
    pub key: String,
    /// Value name under the key, e.g. `AllowTelemetry`
    pub value_name: String,
}

impl SettingPath {
    /// Split a `key::value` identity
    pub fn parse(identity: &str) -> Result<Self> {
        let (key, value_name) =
            identity
                .rsplit_once(SETTING_SEPARATOR)
                .ok_or_else(|| Error::InvalidValue {
                    kind: ResourceKind::SettingKey.to_string(),
                    message: format!(
                        "identity '{}' must have the form <key path>{}<value name>",
                        identity, SETTING_SEPARATOR
                    ),
                })?;
        let key = key.trim().replace('/', "\\");
        let value_name = value_name.trim().to_string();
        if key.is_empty() || value_name.is_empty() {
            return Err(Error::InvalidValue {
                kind: ResourceKind::SettingKey.to_string(),
                message: format!("identity '{}' has an empty key or value name", identity),
            });
        }
        Ok(Self { key, value_name })
    }
}
