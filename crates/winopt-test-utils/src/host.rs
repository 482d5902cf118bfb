//! Simulated host fixtures.
//!
//! [`telemetry_tiers`] and [`telemetry_host`] describe a small machine whose
//! targets all start out of their desired state, so a commit run touches every
//! one of them.

use winopt_core::rules::TierTable;
use winopt_core::{
    DesiredState, DesiredValue, Level, MemoryHost, Origin, ResourceTarget, SettingValue, StartMode,
};

/// Service used by the end-to-end scenarios
pub const TELEMETRY_SERVICE: &str = "Telemetry-X";

/// Setting key written by the light tier of [`telemetry_tiers`]
pub const TELEMETRY_KEY: &str = r"HKLM\SOFTWARE\Policies\Test\DataCollection";

/// A three-tier table over the fixture machine:
///
/// - light: `Telemetry-X` disabled, `AllowTelemetry` = 0
/// - moderate: `Legacy-Y` manual
/// - aggressive: startup entry `Updater` removed
pub fn telemetry_tiers() -> TierTable {
    TierTable::new()
        .with(
            Level::Light,
            DesiredState::new(
                ResourceTarget::service(TELEMETRY_SERVICE),
                DesiredValue::StartMode(StartMode::Disabled),
                "Telemetry uploader",
                Origin::Tier(Level::Light),
            ),
        )
        .with(
            Level::Light,
            DesiredState::new(
                ResourceTarget::setting(TELEMETRY_KEY, "AllowTelemetry"),
                DesiredValue::Setting(SettingValue::Dword(0)),
                "Limit diagnostic data",
                Origin::Tier(Level::Light),
            ),
        )
        .with(
            Level::Moderate,
            DesiredState::new(
                ResourceTarget::service("Legacy-Y"),
                DesiredValue::StartMode(StartMode::Manual),
                "Start on demand",
                Origin::Tier(Level::Moderate),
            ),
        )
        .with(
            Level::Aggressive,
            DesiredState::new(
                ResourceTarget::startup("Updater"),
                DesiredValue::Present(false),
                "Runs at every logon",
                Origin::Tier(Level::Aggressive),
            ),
        )
}

/// Every target of [`telemetry_tiers`], present and not yet in its desired state
pub fn telemetry_host() -> MemoryHost {
    let mut host = MemoryHost::new();
    host.add_service(TELEMETRY_SERVICE, StartMode::Automatic)
        .add_setting(TELEMETRY_KEY, "AllowTelemetry", SettingValue::Dword(3))
        .add_service("Legacy-Y", StartMode::Automatic)
        .add_startup_entry("Updater", r"C:\Program Files\Updater\updater.exe --background");
    host
}

/// Every target of the built-in light tier, present and not yet in its desired state
pub fn builtin_light_host() -> MemoryHost {
    let mut host = MemoryHost::new();
    host.add_service("DiagTrack", StartMode::Automatic)
        .add_service("dmwappushservice", StartMode::Manual)
        .add_setting(
            r"HKLM\SOFTWARE\Policies\Microsoft\Windows\DataCollection",
            "AllowTelemetry",
            SettingValue::Dword(3),
        )
        .add_setting(
            r"HKCU\Software\Microsoft\Windows\CurrentVersion\AdvertisingInfo",
            "Enabled",
            SettingValue::Dword(1),
        )
        .add_task(
            r"\Microsoft\Windows\Application Experience\Microsoft Compatibility Appraiser",
            true,
        )
        .add_task(
            r"\Microsoft\Windows\Customer Experience Improvement Program\Consolidator",
            true,
        );
    host
}
