//! Live Windows host
//!
//! Drives the built-in command line tools (`sc.exe`, `reg.exe`,
//! `schtasks.exe`, `powershell`) so the engine never links against platform
//! APIs directly. Startup entries are the values under the per-user Run key.

use super::Host;
use super::reg::parse_query_value;
use crate::resource::{SettingValue, StartMode};
use crate::{Error, Result};
use std::process::{Command, Output};

const RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";
/// `sc.exe` exit code for an unknown service
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;

/// Host backed by the running Windows installation
#[derive(Debug, Default)]
pub struct WindowsHost;

impl WindowsHost {
    pub fn new() -> Self {
        Self
    }

    fn run(program: &str, args: &[&str]) -> Result<Output> {
        tracing::debug!(program, ?args, "Running host command");
        Ok(Command::new(program).args(args).output()?)
    }

    fn run_checked(program: &str, args: &[&str]) -> Result<Output> {
        let output = Self::run(program, args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(Error::host(format!(
                "{} {} failed: {}",
                program,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn powershell(script: &str) -> Result<String> {
        let output = Self::run_checked(
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", script],
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn ps_quote(value: &str) -> String {
        value.replace('\'', "''")
    }
}

impl Host for WindowsHost {
    fn name(&self) -> &str {
        "windows"
    }

    fn requires_elevation(&self) -> bool {
        true
    }

    fn is_elevated(&self) -> bool {
        Self::run("net", &["session"])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn service_start_mode(&self, service: &str) -> Result<Option<StartMode>> {
        let output = Self::run("sc.exe", &["qc", service])?;
        if output.status.code() == Some(ERROR_SERVICE_DOES_NOT_EXIST) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(Error::host(format!("sc.exe qc {} failed", service)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| l.trim_start().starts_with("START_TYPE"))
            .ok_or_else(|| Error::host(format!("no START_TYPE for {}", service)))?;
        let mode = if line.contains("DELAYED") {
            StartMode::AutomaticDelayed
        } else if line.contains("AUTO_START") {
            StartMode::Automatic
        } else if line.contains("DEMAND_START") {
            StartMode::Manual
        } else if line.contains("DISABLED") {
            StartMode::Disabled
        } else {
            return Err(Error::host(format!("unrecognized start type: {}", line.trim())));
        };
        Ok(Some(mode))
    }

    fn set_service_start_mode(&mut self, service: &str, mode: StartMode) -> Result<()> {
        let start = match mode {
            StartMode::Automatic => "auto",
            StartMode::AutomaticDelayed => "delayed-auto",
            StartMode::Manual => "demand",
            StartMode::Disabled => "disabled",
        };
        Self::run_checked("sc.exe", &["config", service, "start=", start])?;
        Ok(())
    }

    fn setting_key_exists(&self, key: &str) -> Result<bool> {
        Ok(Self::run("reg", &["query", key])?.status.success())
    }

    fn read_setting(&self, key: &str, value_name: &str) -> Result<Option<SettingValue>> {
        let output = Self::run("reg", &["query", key, "/v", value_name])?;
        if !output.status.success() {
            return Ok(None);
        }
        parse_query_value(&String::from_utf8_lossy(&output.stdout), value_name)
    }

    fn write_setting(&mut self, key: &str, value_name: &str, value: &SettingValue) -> Result<()> {
        let (kind, data) = match value {
            SettingValue::Dword(v) => ("REG_DWORD", v.to_string()),
            SettingValue::Qword(v) => ("REG_QWORD", format!("0x{:x}", v)),
            SettingValue::String(v) => ("REG_SZ", v.clone()),
            SettingValue::ExpandString(v) => ("REG_EXPAND_SZ", v.clone()),
        };
        Self::run_checked(
            "reg",
            &["add", key, "/v", value_name, "/t", kind, "/d", &data, "/f"],
        )?;
        Ok(())
    }

    fn delete_setting(&mut self, key: &str, value_name: &str) -> Result<()> {
        Self::run_checked("reg", &["delete", key, "/v", value_name, "/f"])?;
        Ok(())
    }

    fn trigger_enabled(&self, task: &str) -> Result<Option<bool>> {
        let output = Self::run("schtasks", &["/Query", "/TN", task, "/FO", "CSV", "/NH"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let status = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .and_then(|l| l.rsplit(',').next())
            .map(|s| s.trim().trim_matches('"').to_string())
            .unwrap_or_default();
        Ok(Some(!status.eq_ignore_ascii_case("Disabled")))
    }

    fn set_trigger_enabled(&mut self, task: &str, enabled: bool) -> Result<()> {
        let flag = if enabled { "/ENABLE" } else { "/DISABLE" };
        Self::run_checked("schtasks", &["/Change", "/TN", task, flag])?;
        Ok(())
    }

    fn startup_command(&self, entry: &str) -> Result<Option<String>> {
        Ok(match self.read_setting(RUN_KEY, entry)? {
            Some(SettingValue::String(command) | SettingValue::ExpandString(command)) => {
                Some(command)
            }
            _ => None,
        })
    }

    fn create_startup_entry(&mut self, entry: &str, command: &str) -> Result<()> {
        self.write_setting(RUN_KEY, entry, &SettingValue::String(command.to_string()))
    }

    fn remove_startup_entry(&mut self, entry: &str) -> Result<()> {
        self.delete_setting(RUN_KEY, entry)
    }

    fn package_full_name(&self, package: &str) -> Result<Option<String>> {
        let full_name = Self::powershell(&format!(
            "(Get-AppxPackage -Name '{}' | Select-Object -First 1).PackageFullName",
            Self::ps_quote(package)
        ))?;
        Ok((!full_name.is_empty()).then_some(full_name))
    }

    fn install_package(&mut self, full_name: &str) -> Result<()> {
        Self::powershell(&format!(
            "Add-AppxPackage -DisableDevelopmentMode -Register \"$env:ProgramFiles\\WindowsApps\\{}\\AppxManifest.xml\"",
            full_name.replace('"', "")
        ))?;
        Ok(())
    }

    fn remove_package(&mut self, package: &str) -> Result<()> {
        Self::powershell(&format!(
            "Get-AppxPackage -Name '{}' | Remove-AppxPackage",
            Self::ps_quote(package)
        ))?;
        Ok(())
    }
}
