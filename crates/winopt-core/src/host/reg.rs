//! Parsing of `reg.exe query` output
//!
//! A value line is indented by four spaces and has three columns separated by
//! four spaces: name, `REG_*` type, data. Names and data may contain single or
//! repeated spaces themselves, so the line is split on the type token rather
//! than on whitespace.

use crate::resource::SettingValue;
use crate::{Error, Result};

/// Column separator used by `reg query`
const COLUMN: &str = "    ";

/// Decode `value_name` from the output of `reg query <key> /v <value_name>`
///
/// Returns `Ok(None)` when no line names the value. Types the engine cannot
/// restore faithfully (binary, multi-string, ...) are an error, never `None`,
/// so a snapshot never mistakes them for an unset value.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn parse_query_value(stdout: &str, value_name: &str) -> Result<Option<SettingValue>> {
    for line in stdout.lines() {
        let Some((name, kind, data)) = split_value_line(line) else {
            continue;
        };
        if name.eq_ignore_ascii_case(value_name) {
            return decode(value_name, kind, data).map(Some);
        }
    }
    Ok(None)
}

/// Split an indented value line into name, type and raw data
fn split_value_line(line: &str) -> Option<(&str, &str, &str)> {
    let rest = line.strip_prefix(COLUMN)?;
    let type_at = rest.find("    REG_")?;
    let name = &rest[..type_at];
    let after = &rest[type_at + COLUMN.len()..];
    let kind_end = after.find(' ').unwrap_or(after.len());
    let kind = &after[..kind_end];
    let data = after[kind_end..].strip_prefix(COLUMN).unwrap_or("");
    Some((name, kind, data))
}

fn decode(value_name: &str, kind: &str, data: &str) -> Result<SettingValue> {
    let hex = |data: &str| data.trim().trim_start_matches("0x").to_string();
    let malformed = || Error::host(format!("cannot parse {} data '{}' of {}", kind, data, value_name));

    match kind {
        "REG_DWORD" => u32::from_str_radix(&hex(data), 16)
            .map(SettingValue::Dword)
            .map_err(|_| malformed()),
        "REG_QWORD" => u64::from_str_radix(&hex(data), 16)
            .map(SettingValue::Qword)
            .map_err(|_| malformed()),
        "REG_SZ" => Ok(SettingValue::String(data.to_string())),
        "REG_EXPAND_SZ" => Ok(SettingValue::ExpandString(data.to_string())),
        other => Err(Error::host(format!(
            "{} has unsupported type {}",
            value_name, other
        ))),
    }
}
