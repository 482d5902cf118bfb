//! Per-kind capability sets
//!
//! Each adapter is a stateless unit struct. The executor, planner and
//! reconciler only ever see `&dyn ResourceAdapter`, obtained through
//! [`ResourceKind::adapter`](super::ResourceKind::adapter).

use super::{
    DesiredValue, InverseOp, ResourceKind, ResourceTarget, SettingPath, Snapshot,
};
use crate::host::Host;
use crate::{Error, Result};

/// Capability set for one resource kind
pub trait ResourceAdapter: Sync {
    /// The kind this adapter handles
    fn kind(&self) -> ResourceKind;

    /// Whether the target exists on the host
    fn probe(&self, host: &dyn Host, target: &ResourceTarget) -> Result<bool> {
        Ok(self.snapshot(host, target)?.is_some())
    }

    /// Read the current state of the target in a single pass
    ///
    /// Returns `None` when the target does not exist.
    fn snapshot(&self, host: &dyn Host, target: &ResourceTarget) -> Result<Option<Snapshot>>;

    /// Drive the target to the desired value
    fn apply(
        &self,
        host: &mut dyn Host,
        target: &ResourceTarget,
        desired: &DesiredValue,
    ) -> Result<()>;

    /// Build the operation that restores `before`
    fn synthesize_inverse(
        &self,
        target: &ResourceTarget,
        before: &Snapshot,
        desired: &DesiredValue,
    ) -> Result<InverseOp>;
}

fn wrong_value(kind: ResourceKind, desired: &DesiredValue) -> Error {
    Error::InvalidValue {
        kind: kind.to_string(),
        message: format!("desired value '{}' does not apply to this kind", desired),
    }
}

fn wrong_snapshot(kind: ResourceKind, before: &Snapshot) -> Error {
    Error::InvalidValue {
        kind: kind.to_string(),
        message: format!("snapshot '{}' was not captured for this kind", before),
    }
}

/// Service start modes
pub struct ServiceAdapter;

impl ResourceAdapter for ServiceAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Service
    }

    fn snapshot(&self, host: &dyn Host, target: &ResourceTarget) -> Result<Option<Snapshot>> {
        Ok(host
            .service_start_mode(&target.identity)?
            .map(|mode| Snapshot::Service { mode }))
    }

    fn apply(
        &self,
        host: &mut dyn Host,
        target: &ResourceTarget,
        desired: &DesiredValue,
    ) -> Result<()> {
        match desired {
            DesiredValue::StartMode(mode) => host.set_service_start_mode(&target.identity, *mode),
            other => Err(wrong_value(self.kind(), other)),
        }
    }

    fn synthesize_inverse(
        &self,
        target: &ResourceTarget,
        before: &Snapshot,
        _desired: &DesiredValue,
    ) -> Result<InverseOp> {
        match before {
            Snapshot::Service { mode } => Ok(InverseOp::SetStartMode {
                service: target.identity.clone(),
                mode: *mode,
            }),
            other => Err(wrong_snapshot(self.kind(), other)),
        }
    }
}

/// Key/value settings
///
/// A setting exists when its key exists; the value name itself may be unset.
pub struct SettingAdapter;

impl ResourceAdapter for SettingAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SettingKey
    }

    fn probe(&self, host: &dyn Host, target: &ResourceTarget) -> Result<bool> {
        let path = SettingPath::parse(&target.identity)?;
        host.setting_key_exists(&path.key)
    }

    fn snapshot(&self, host: &dyn Host, target: &ResourceTarget) -> Result<Option<Snapshot>> {
        let path = SettingPath::parse(&target.identity)?;
        if !host.setting_key_exists(&path.key)? {
            return Ok(None);
        }
        let value = host.read_setting(&path.key, &path.value_name)?;
        Ok(Some(Snapshot::Setting { value }))
    }

    fn apply(
        &self,
        host: &mut dyn Host,
        target: &ResourceTarget,
        desired: &DesiredValue,
    ) -> Result<()> {
        match desired {
            DesiredValue::Setting(value) => {
                let path = SettingPath::parse(&target.identity)?;
                host.write_setting(&path.key, &path.value_name, value)
            }
            other => Err(wrong_value(self.kind(), other)),
        }
    }

    fn synthesize_inverse(
        &self,
        target: &ResourceTarget,
        before: &Snapshot,
        _desired: &DesiredValue,
    ) -> Result<InverseOp> {
        let path = SettingPath::parse(&target.identity)?;
        match before {
            Snapshot::Setting { value: Some(value) } => Ok(InverseOp::WriteSetting {
                key: path.key,
                value_name: path.value_name,
                value: value.clone(),
            }),
            Snapshot::Setting { value: None } => Ok(InverseOp::DeleteSetting {
                key: path.key,
                value_name: path.value_name,
            }),
            other => Err(wrong_snapshot(self.kind(), other)),
        }
    }
}

/// Scheduled task enablement
pub struct TriggerAdapter;

impl ResourceAdapter for TriggerAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ScheduledTrigger
    }

    fn snapshot(&self, host: &dyn Host, target: &ResourceTarget) -> Result<Option<Snapshot>> {
        Ok(host
            .trigger_enabled(&target.identity)?
            .map(|enabled| Snapshot::Trigger { enabled }))
    }

    fn apply(
        &self,
        host: &mut dyn Host,
        target: &ResourceTarget,
        desired: &DesiredValue,
    ) -> Result<()> {
        match desired {
            DesiredValue::Enabled(enabled) => host.set_trigger_enabled(&target.identity, *enabled),
            other => Err(wrong_value(self.kind(), other)),
        }
    }

    fn synthesize_inverse(
        &self,
        target: &ResourceTarget,
        before: &Snapshot,
        _desired: &DesiredValue,
    ) -> Result<InverseOp> {
        match before {
            Snapshot::Trigger { enabled } => Ok(InverseOp::SetTriggerEnabled {
                task: target.identity.clone(),
                enabled: *enabled,
            }),
            other => Err(wrong_snapshot(self.kind(), other)),
        }
    }
}

/// Startup entry presence
pub struct StartupAdapter;

impl ResourceAdapter for StartupAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StartupEntry
    }

    fn snapshot(&self, host: &dyn Host, target: &ResourceTarget) -> Result<Option<Snapshot>> {
        Ok(host
            .startup_command(&target.identity)?
            .map(|command| Snapshot::Startup { command }))
    }

    fn apply(
        &self,
        host: &mut dyn Host,
        target: &ResourceTarget,
        desired: &DesiredValue,
    ) -> Result<()> {
        match desired {
            DesiredValue::Present(false) => host.remove_startup_entry(&target.identity),
            DesiredValue::Present(true) => {
                if host.startup_command(&target.identity)?.is_some() {
                    Ok(())
                } else {
                    Err(Error::ApplyFailed {
                        target: target.to_string(),
                        reason: "a startup entry cannot be created without a command".into(),
                    })
                }
            }
            other => Err(wrong_value(self.kind(), other)),
        }
    }

    fn synthesize_inverse(
        &self,
        target: &ResourceTarget,
        before: &Snapshot,
        _desired: &DesiredValue,
    ) -> Result<InverseOp> {
        match before {
            Snapshot::Startup { command } => Ok(InverseOp::CreateStartupEntry {
                name: target.identity.clone(),
                command: command.clone(),
            }),
            other => Err(wrong_snapshot(self.kind(), other)),
        }
    }
}

/// Installed package presence
pub struct PackageAdapter;

impl ResourceAdapter for PackageAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Package
    }

    fn snapshot(&self, host: &dyn Host, target: &ResourceTarget) -> Result<Option<Snapshot>> {
        Ok(host
            .package_full_name(&target.identity)?
            .map(|full_name| Snapshot::Package { full_name }))
    }

    fn apply(
        &self,
        host: &mut dyn Host,
        target: &ResourceTarget,
        desired: &DesiredValue,
    ) -> Result<()> {
        match desired {
            DesiredValue::Present(false) => host.remove_package(&target.identity),
            DesiredValue::Present(true) => match host.package_full_name(&target.identity)? {
                Some(_) => Ok(()),
                None => Err(Error::ApplyFailed {
                    target: target.to_string(),
                    reason: "package is not installed and has no known full name".into(),
                }),
            },
            other => Err(wrong_value(self.kind(), other)),
        }
    }

    fn synthesize_inverse(
        &self,
        _target: &ResourceTarget,
        before: &Snapshot,
        _desired: &DesiredValue,
    ) -> Result<InverseOp> {
        match before {
            Snapshot::Package { full_name } => Ok(InverseOp::InstallPackage {
                full_name: full_name.clone(),
            }),
            other => Err(wrong_snapshot(self.kind(), other)),
        }
    }
}
