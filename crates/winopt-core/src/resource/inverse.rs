//! Inverse operations recorded for rollback

use super::{ResourceTarget, SettingValue, StartMode};
use crate::Result;
use crate::host::Host;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A self-contained operation that restores a captured state
///
/// Inverse operations carry everything needed to run them, so a rollback
/// artifact can be replayed without the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InverseOp {
    SetStartMode {
        service: String,
        mode: StartMode,
    },
    WriteSetting {
        key: String,
        value_name: String,
        value: SettingValue,
    },
    DeleteSetting {
        key: String,
        value_name: String,
    },
    SetTriggerEnabled {
        task: String,
        enabled: bool,
    },
    CreateStartupEntry {
        name: String,
        command: String,
    },
    InstallPackage {
        full_name: String,
    },
}

impl InverseOp {
    /// Run the operation against a host
    pub fn execute(&self, host: &mut dyn Host) -> Result<()> {
        match self {
            InverseOp::SetStartMode { service, mode } => host.set_service_start_mode(service, *mode),
            InverseOp::WriteSetting {
                key,
                value_name,
                value,
            } => host.write_setting(key, value_name, value),
            InverseOp::DeleteSetting { key, value_name } => host.delete_setting(key, value_name),
            InverseOp::SetTriggerEnabled { task, enabled } => {
                host.set_trigger_enabled(task, *enabled)
            }
            InverseOp::CreateStartupEntry { name, command } => {
                host.create_startup_entry(name, command)
            }
            InverseOp::InstallPackage { full_name } => host.install_package(full_name),
        }
    }

    /// The resource this operation touches
    pub fn target(&self) -> ResourceTarget {
        match self {
            InverseOp::SetStartMode { service, .. } => ResourceTarget::service(service.clone()),
            InverseOp::WriteSetting {
                key, value_name, ..
            }
            | InverseOp::DeleteSetting { key, value_name } => {
                ResourceTarget::setting(key, value_name)
            }
            InverseOp::SetTriggerEnabled { task, .. } => ResourceTarget::trigger(task.clone()),
            InverseOp::CreateStartupEntry { name, .. } => ResourceTarget::startup(name.clone()),
            InverseOp::InstallPackage { full_name } => ResourceTarget::package(
                full_name.split('_').next().unwrap_or(full_name).to_string(),
            ),
        }
    }

    /// PowerShell statement equivalent to this operation
    pub fn script(&self) -> String {
        fn quote(s: &str) -> String {
            format!("'{}'", s.replace('\'', "''"))
        }
        fn ps_key(key: &str) -> String {
            let (hive, rest) = key.split_once('\\').unwrap_or((key, ""));
            let drive = match hive.to_ascii_uppercase().as_str() {
                "HKLM" | "HKEY_LOCAL_MACHINE" => "HKLM:",
                "HKCU" | "HKEY_CURRENT_USER" => "HKCU:",
                _ => return format!("Registry::{}", key),
            };
            format!("{}\\{}", drive, rest)
        }

        match self {
            InverseOp::SetStartMode { service, mode } => {
                let start = match mode {
                    StartMode::Automatic => "auto",
                    StartMode::AutomaticDelayed => "delayed-auto",
                    StartMode::Manual => "demand",
                    StartMode::Disabled => "disabled",
                };
                format!("sc.exe config {} start= {} | Out-Null", quote(service), start)
            }
            InverseOp::WriteSetting {
                key,
                value_name,
                value,
            } => {
                let (kind, data) = match value {
                    SettingValue::Dword(v) => ("DWord", v.to_string()),
                    // the registry provider takes QWord data as Int64; same 64 bits
                    SettingValue::Qword(v) => ("QWord", (*v as i64).to_string()),
                    SettingValue::String(v) => ("String", quote(v)),
                    SettingValue::ExpandString(v) => ("ExpandString", quote(v)),
                };
                format!(
                    "New-Item -Path {path} -Force | Out-Null; New-ItemProperty -Path {path} -Name {name} -PropertyType {kind} -Value {data} -Force | Out-Null",
                    path = quote(&ps_key(key)),
                    name = quote(value_name),
                    kind = kind,
                    data = data
                )
            }
            InverseOp::DeleteSetting { key, value_name } => format!(
                "Remove-ItemProperty -Path {} -Name {} -ErrorAction Stop",
                quote(&ps_key(key)),
                quote(value_name)
            ),
            InverseOp::SetTriggerEnabled { task, enabled } => {
                let flag = if *enabled { "/ENABLE" } else { "/DISABLE" };
                format!("schtasks.exe /Change /TN {} {} | Out-Null", quote(task), flag)
            }
            InverseOp::CreateStartupEntry { name, command } => format!(
                "New-ItemProperty -Path 'HKCU:\\Software\\Microsoft\\Windows\\CurrentVersion\\Run' -Name {} -PropertyType String -Value {} -Force | Out-Null",
                quote(name),
                quote(command)
            ),
            InverseOp::InstallPackage { full_name } => format!(
                "Add-AppxPackage -DisableDevelopmentMode -Register \"$env:ProgramFiles\\WindowsApps\\{}\\AppxManifest.xml\"",
                full_name.replace('"', "")
            ),
        }
    }
}

impl fmt::Display for InverseOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InverseOp::SetStartMode { service, mode } => {
                write!(f, "set service {} start mode to {}", service, mode)
            }
            InverseOp::WriteSetting {
                key,
                value_name,
                value,
            } => write!(f, "write {}\\{} = {}", key, value_name, value),
            InverseOp::DeleteSetting { key, value_name } => {
                write!(f, "delete {}\\{}", key, value_name)
            }
            InverseOp::SetTriggerEnabled { task, enabled } => write!(
                f,
                "{} task {}",
                if *enabled { "enable" } else { "disable" },
                task
            ),
            InverseOp::CreateStartupEntry { name, .. } => {
                write!(f, "recreate startup entry {}", name)
            }
            InverseOp::InstallPackage { full_name } => write!(f, "reinstall package {}", full_name),
        }
    }
}
