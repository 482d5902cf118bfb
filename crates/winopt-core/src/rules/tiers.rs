//! Built-in tier tables - static rule data
//!
//! Each tier lists only what it adds on top of the tiers below it.

use super::{DesiredState, Level, Origin};
use crate::resource::{DesiredValue, ResourceKind, ResourceTarget, SettingValue, StartMode};

enum TierValue {
    Mode(StartMode),
    Dword(u32),
    Enabled(bool),
    Present(bool),
}

struct TierRule {
    kind: ResourceKind,
    identity: &'static str,
    value: TierValue,
    justification: &'static str,
}

const fn rule(
    kind: ResourceKind,
    identity: &'static str,
    value: TierValue,
    justification: &'static str,
) -> TierRule {
    TierRule {
        kind,
        identity,
        value,
        justification,
    }
}

use ResourceKind::{Package, ScheduledTrigger, Service, SettingKey, StartupEntry};
use TierValue::{Dword, Enabled, Mode, Present};

#[rustfmt::skip]
const LIGHT: &[TierRule] = &[
    rule(Service, "DiagTrack", Mode(StartMode::Disabled),
        "Connected User Experiences and Telemetry uploads diagnostic data"),
    rule(Service, "dmwappushservice", Mode(StartMode::Disabled),
        "WAP push routing used only by the telemetry pipeline"),
    rule(SettingKey, r"HKLM\SOFTWARE\Policies\Microsoft\Windows\DataCollection::AllowTelemetry", Dword(0),
        "Limit diagnostic data to the security level"),
    rule(SettingKey, r"HKCU\Software\Microsoft\Windows\CurrentVersion\AdvertisingInfo::Enabled", Dword(0),
        "Disable the per-user advertising identifier"),
    rule(ScheduledTrigger, r"\Microsoft\Windows\Application Experience\Microsoft Compatibility Appraiser", Enabled(false),
        "Collects program telemetry for the compatibility program"),
    rule(ScheduledTrigger, r"\Microsoft\Windows\Customer Experience Improvement Program\Consolidator", Enabled(false),
        "Sends Customer Experience Improvement Program data"),
];

#[rustfmt::skip]
const MODERATE: &[TierRule] = &[
    rule(Service, "WerSvc", Mode(StartMode::Manual),
        "Error reporting only needs to start on demand"),
    rule(Service, "MapsBroker", Mode(StartMode::Disabled),
        "Downloaded maps manager is unused on most desktops"),
    rule(Service, "XblGameSave", Mode(StartMode::Manual),
        "Xbox Live save sync only needs to start on demand"),
    rule(SettingKey, r"HKLM\SOFTWARE\Policies\Microsoft\Windows\Windows Search::AllowCortana", Dword(0),
        "Disable Cortana in search"),
    rule(SettingKey, r"HKCU\Software\Microsoft\Windows\CurrentVersion\ContentDeliveryManager::SilentInstalledAppsEnabled", Dword(0),
        "Stop silent installation of suggested apps"),
    rule(ScheduledTrigger, r"\Microsoft\Windows\Feedback\Siuf\DmClient", Enabled(false),
        "Feedback hub data upload"),
    rule(StartupEntry, "MicrosoftEdgeAutoLaunch", Present(false),
        "Edge preloads itself at logon"),
];

#[rustfmt::skip]
const AGGRESSIVE: &[TierRule] = &[
    rule(Service, "SysMain", Mode(StartMode::Disabled),
        "Superfetch preloading is unnecessary on solid state storage"),
    rule(Service, "WSearch", Mode(StartMode::Manual),
        "Search indexer runs only when search is used"),
    rule(Service, "Fax", Mode(StartMode::Disabled),
        "Fax service is unused"),
    rule(ScheduledTrigger, r"\Microsoft\Windows\Maps\MapsUpdateTask", Enabled(false),
        "Offline maps update check"),
    rule(StartupEntry, "OneDrive", Present(false),
        "OneDrive client starts at every logon"),
    rule(Package, "Microsoft.BingNews", Present(false), "Preinstalled news app"),
    rule(Package, "Microsoft.BingWeather", Present(false), "Preinstalled weather app"),
    rule(Package, "Microsoft.GetHelp", Present(false), "Preinstalled support app"),
    rule(Package, "Microsoft.MicrosoftSolitaireCollection", Present(false), "Preinstalled game"),
    rule(Package, "Microsoft.ZuneMusic", Present(false), "Preinstalled media player"),
];

fn expand(level: Level, rules: &[TierRule]) -> Vec<DesiredState> {
    rules
        .iter()
        .map(|r| {
            let value = match r.value {
                Mode(mode) => DesiredValue::StartMode(mode),
                Dword(v) => DesiredValue::Setting(SettingValue::Dword(v)),
                Enabled(enabled) => DesiredValue::Enabled(enabled),
                Present(present) => DesiredValue::Present(present),
            };
            DesiredState::new(
                ResourceTarget::new(r.kind, r.identity),
                value,
                r.justification,
                Origin::Tier(level),
            )
        })
        .collect()
}

/// Desired states for each tier, lowest tier first
#[derive(Debug, Clone, Default)]
pub struct TierTable {
    light: Vec<DesiredState>,
    moderate: Vec<DesiredState>,
    aggressive: Vec<DesiredState>,
}

impl TierTable {
    /// An empty table, for callers that supply their own rule data
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rule data
    pub fn builtin() -> Self {
        Self {
            light: expand(Level::Light, LIGHT),
            moderate: expand(Level::Moderate, MODERATE),
            aggressive: expand(Level::Aggressive, AGGRESSIVE),
        }
    }

    /// Add a rule to a tier
    ///
    /// The rule's origin is rewritten to the tier it is added to.
    pub fn with(mut self, level: Level, mut state: DesiredState) -> Self {
        state.origin = Origin::Tier(level);
        self.tier_mut(level).push(state);
        self
    }

    /// Rules contributed by exactly this tier
    pub fn tier(&self, level: Level) -> &[DesiredState] {
        match level {
            Level::Light => &self.light,
            Level::Moderate => &self.moderate,
            Level::Aggressive => &self.aggressive,
        }
    }

    fn tier_mut(&mut self, level: Level) -> &mut Vec<DesiredState> {
        match level {
            Level::Light => &mut self.light,
            Level::Moderate => &mut self.moderate,
            Level::Aggressive => &mut self.aggressive,
        }
    }
}
