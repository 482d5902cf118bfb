//! Typed values: what a target should be, and what it was observed to be

use super::ResourceKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Start mode of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    Automatic,
    AutomaticDelayed,
    Manual,
    Disabled,
}

impl StartMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StartMode::Automatic => "automatic",
            StartMode::AutomaticDelayed => "automatic_delayed",
            StartMode::Manual => "manual",
            StartMode::Disabled => "disabled",
        }
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "automatic" | "auto" => Ok(StartMode::Automatic),
            "automatic_delayed" | "delayed_auto" | "delayed" => Ok(StartMode::AutomaticDelayed),
            "manual" | "demand" => Ok(StartMode::Manual),
            "disabled" => Ok(StartMode::Disabled),
            other => Err(Error::InvalidValue {
                kind: ResourceKind::Service.to_string(),
                message: format!("unknown start mode '{}'", other),
            }),
        }
    }
}

/// Data stored under a setting value name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SettingValue {
    Dword(u32),
    /// Stored as a decimal string; TOML integers stop at `i64::MAX`
    Qword(#[serde(with = "qword")] u64),
    String(String),
    /// String with unexpanded `%VAR%` references
    ExpandString(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Dword(v) => write!(f, "dword:{}", v),
            SettingValue::Qword(v) => write!(f, "qword:{}", v),
            SettingValue::String(v) => write!(f, "string:\"{}\"", v),
            SettingValue::ExpandString(v) => write!(f, "expand_string:\"{}\"", v),
        }
    }
}

/// Serde helper for the full `u64` range
///
/// Writes a decimal string. Reads a string or a non-negative integer.
mod qword {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(QwordVisitor)
    }

    struct QwordVisitor;

    impl Visitor<'_> for QwordVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned 64-bit integer or its decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}

/// The value a target should end up with
///
/// Each variant belongs to exactly one family of resource kinds; see
/// [`DesiredValue::fits`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DesiredValue {
    /// Service start mode
    StartMode(StartMode),
    /// Setting data
    Setting(SettingValue),
    /// Scheduled trigger enablement
    Enabled(bool),
    /// Presence of a startup entry or package
    Present(bool),
}

impl DesiredValue {
    /// Whether this value can be applied to the given kind
    pub fn fits(&self, kind: ResourceKind) -> bool {
        matches!(
            (self, kind),
            (DesiredValue::StartMode(_), ResourceKind::Service)
                | (DesiredValue::Setting(_), ResourceKind::SettingKey)
                | (DesiredValue::Enabled(_), ResourceKind::ScheduledTrigger)
                | (DesiredValue::Present(_), ResourceKind::StartupEntry)
                | (DesiredValue::Present(_), ResourceKind::Package)
        )
    }

    /// Whether an absent target already satisfies this value
    pub fn satisfied_by_absence(&self) -> bool {
        matches!(self, DesiredValue::Present(false))
    }

    /// Convert a document value into a desired value for `kind`
    ///
    /// `type_hint` selects the setting data type (`dword`, `qword`, `string`);
    /// integers default to `dword` and strings to `string`.
    pub fn from_toml(
        kind: ResourceKind,
        value: &toml::Value,
        type_hint: Option<&str>,
    ) -> Result<Self> {
        let invalid = |message: String| Error::InvalidValue {
            kind: kind.to_string(),
            message,
        };

        match kind {
            ResourceKind::Service => match value {
                toml::Value::String(s) => Ok(DesiredValue::StartMode(s.parse()?)),
                other => Err(invalid(format!("expected a start mode string, got {}", other))),
            },
            ResourceKind::SettingKey => {
                let hint = type_hint.map(|h| h.trim().to_ascii_lowercase());
                match (value, hint.as_deref()) {
                    (toml::Value::Integer(i), None | Some("dword") | Some("reg_dword")) => {
                        u32::try_from(*i)
                            .map(|v| DesiredValue::Setting(SettingValue::Dword(v)))
                            .map_err(|_| invalid(format!("{} does not fit a dword", i)))
                    }
                    (toml::Value::Integer(i), Some("qword") | Some("reg_qword")) => {
                        u64::try_from(*i)
                            .map(|v| DesiredValue::Setting(SettingValue::Qword(v)))
                            .map_err(|_| invalid(format!("{} does not fit a qword", i)))
                    }
                    (toml::Value::String(s), Some("qword") | Some("reg_qword")) => s
                        .trim()
                        .parse::<u64>()
                        .map(|v| DesiredValue::Setting(SettingValue::Qword(v)))
                        .map_err(|_| invalid(format!("'{}' is not a qword", s))),
                    (toml::Value::String(s), None | Some("string") | Some("sz") | Some("reg_sz")) => {
                        Ok(DesiredValue::Setting(SettingValue::String(s.clone())))
                    }
                    (
                        toml::Value::String(s),
                        Some("expand_string") | Some("expand_sz") | Some("reg_expand_sz"),
                    ) => Ok(DesiredValue::Setting(SettingValue::ExpandString(s.clone()))),
                    (other, hint) => Err(invalid(format!(
                        "value {} does not match type {}",
                        other,
                        hint.unwrap_or("<inferred>")
                    ))),
                }
            }
            ResourceKind::ScheduledTrigger => match value {
                toml::Value::Boolean(b) => Ok(DesiredValue::Enabled(*b)),
                toml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "enabled" | "enable" => Ok(DesiredValue::Enabled(true)),
                    "disabled" | "disable" => Ok(DesiredValue::Enabled(false)),
                    other => Err(invalid(format!("unknown trigger state '{}'", other))),
                },
                other => Err(invalid(format!("expected a boolean, got {}", other))),
            },
            ResourceKind::StartupEntry | ResourceKind::Package => match value {
                toml::Value::Boolean(b) => Ok(DesiredValue::Present(*b)),
                toml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "present" | "installed" | "keep" => Ok(DesiredValue::Present(true)),
                    "absent" | "removed" | "remove" | "disable" | "disabled" => {
                        Ok(DesiredValue::Present(false))
                    }
                    other => Err(invalid(format!("unknown presence state '{}'", other))),
                },
                other => Err(invalid(format!("expected a boolean, got {}", other))),
            },
        }
    }
}

impl fmt::Display for DesiredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredValue::StartMode(mode) => write!(f, "{}", mode),
            DesiredValue::Setting(value) => write!(f, "{}", value),
            DesiredValue::Enabled(true) => f.write_str("enabled"),
            DesiredValue::Enabled(false) => f.write_str("disabled"),
            DesiredValue::Present(true) => f.write_str("present"),
            DesiredValue::Present(false) => f.write_str("absent"),
        }
    }
}

/// Observed state of an existing target
///
/// Captured once before a mutation; it is the only input to inverse synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    Service { mode: StartMode },
    /// `value` is `None` when the key exists but the value name is unset
    Setting { value: Option<SettingValue> },
    Trigger { enabled: bool },
    Startup { command: String },
    Package { full_name: String },
}

impl Snapshot {
    /// Kind-specific equality against a desired value
    ///
    /// Exact match for start modes, setting data and trigger state; presence
    /// test for startup entries and packages.
    pub fn satisfies(&self, desired: &DesiredValue) -> bool {
        match (self, desired) {
            (Snapshot::Service { mode }, DesiredValue::StartMode(want)) => mode == want,
            (Snapshot::Setting { value }, DesiredValue::Setting(want)) => {
                value.as_ref() == Some(want)
            }
            (Snapshot::Trigger { enabled }, DesiredValue::Enabled(want)) => enabled == want,
            (Snapshot::Startup { .. }, DesiredValue::Present(want))
            | (Snapshot::Package { .. }, DesiredValue::Present(want)) => *want,
            _ => false,
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Service { mode } => write!(f, "{}", mode),
            Snapshot::Setting { value: Some(v) } => write!(f, "{}", v),
            Snapshot::Setting { value: None } => f.write_str("<unset>"),
            Snapshot::Trigger { enabled: true } => f.write_str("enabled"),
            Snapshot::Trigger { enabled: false } => f.write_str("disabled"),
            Snapshot::Startup { command } => write!(f, "present ({})", command),
            Snapshot::Package { full_name } => write!(f, "installed ({})", full_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("automatic", StartMode::Automatic)]
    #[case("Auto", StartMode::Automatic)]
    #[case("delayed-auto", StartMode::AutomaticDelayed)]
    #[case("demand", StartMode::Manual)]
    #[case("DISABLED", StartMode::Disabled)]
    fn start_mode_parses(#[case] input: &str, #[case] expected: StartMode) {
        assert_eq!(input.parse::<StartMode>().unwrap(), expected);
    }

    #[test]
    fn value_fits_only_its_kind() {
        let mode = DesiredValue::StartMode(StartMode::Disabled);
        assert!(mode.fits(ResourceKind::Service));
        assert!(!mode.fits(ResourceKind::Package));

        let present = DesiredValue::Present(false);
        assert!(present.fits(ResourceKind::StartupEntry));
        assert!(present.fits(ResourceKind::Package));
        assert!(!present.fits(ResourceKind::ScheduledTrigger));
    }

    #[test]
    fn setting_value_from_integer_defaults_to_dword() {
        let value =
            DesiredValue::from_toml(ResourceKind::SettingKey, &toml::Value::Integer(0), None)
                .unwrap();
        assert_eq!(value, DesiredValue::Setting(SettingValue::Dword(0)));
    }

    #[test]
    fn setting_value_honours_type_hint() {
        let value = DesiredValue::from_toml(
            ResourceKind::SettingKey,
            &toml::Value::Integer(5),
            Some("qword"),
        )
        .unwrap();
        assert_eq!(value, DesiredValue::Setting(SettingValue::Qword(5)));

        let mismatch = DesiredValue::from_toml(
            ResourceKind::SettingKey,
            &toml::Value::String("x".into()),
            Some("dword"),
        );
        assert!(mismatch.is_err());
    }

    #[test]
    fn qword_above_toml_integer_range_round_trips() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Wrapper {
            value: SettingValue,
        }

        let original = Wrapper {
            value: SettingValue::Qword(u64::MAX),
        };
        let text = toml::to_string(&original).unwrap();
        assert!(text.contains("18446744073709551615"));
        assert_eq!(toml::from_str::<Wrapper>(&text).unwrap(), original);

        let integer: Wrapper =
            toml::from_str("[value]\ntype = \"qword\"\ndata = 42\n").unwrap();
        assert_eq!(integer.value, SettingValue::Qword(42));
    }

    #[test]
    fn qword_string_value_accepts_full_range() {
        let value = DesiredValue::from_toml(
            ResourceKind::SettingKey,
            &toml::Value::String(u64::MAX.to_string()),
            Some("qword"),
        )
        .unwrap();
        assert_eq!(value, DesiredValue::Setting(SettingValue::Qword(u64::MAX)));
    }

    #[test]
    fn expand_string_keeps_its_type() {
        let value = DesiredValue::from_toml(
            ResourceKind::SettingKey,
            &toml::Value::String("%SystemRoot%\\app.exe".into()),
            Some("reg_expand_sz"),
        )
        .unwrap();
        assert_eq!(
            value,
            DesiredValue::Setting(SettingValue::ExpandString("%SystemRoot%\\app.exe".into()))
        );
        assert!(!Snapshot::Setting {
            value: Some(SettingValue::String("%SystemRoot%\\app.exe".into()))
        }
        .satisfies(&value));
    }

    #[test]
    fn negative_integer_is_not_a_dword() {
        let result =
            DesiredValue::from_toml(ResourceKind::SettingKey, &toml::Value::Integer(-1), None);
        assert!(result.is_err());
    }

    #[test]
    fn snapshot_equality_is_kind_specific() {
        let setting = Snapshot::Setting {
            value: Some(SettingValue::Dword(1)),
        };
        assert!(setting.satisfies(&DesiredValue::Setting(SettingValue::Dword(1))));
        assert!(!setting.satisfies(&DesiredValue::Setting(SettingValue::Qword(1))));

        let unset = Snapshot::Setting { value: None };
        assert!(!unset.satisfies(&DesiredValue::Setting(SettingValue::Dword(0))));

        let package = Snapshot::Package {
            full_name: "Microsoft.BingNews_4.1".into(),
        };
        assert!(package.satisfies(&DesiredValue::Present(true)));
        assert!(!package.satisfies(&DesiredValue::Present(false)));
    }

    #[test]
    fn desired_value_round_trips_through_toml() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            value: DesiredValue,
        }

        let original = Wrapper {
            value: DesiredValue::Setting(SettingValue::Dword(3)),
        };
        let text = toml::to_string(&original).unwrap();
        let parsed: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(parsed.value, original.value);
    }
}
