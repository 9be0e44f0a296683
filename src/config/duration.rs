// src/config/duration.rs

use std::time::Duration;

/// Milliseconds per accepted unit suffix.
const UNITS: [(&str, u64); 4] = [("ms", 1), ("s", 1_000), ("m", 60_000), ("h", 3_600_000)];

/// Parses the timeout values of `[config]`: an integer followed by `ms`, `s`,
/// `m` or `h`, e.g. `"750ms"` or `"2s"`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty duration".to_string());
    }

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("'{raw}' has no unit; expected ms, s, m or h"))?;
    let (digits, suffix) = raw.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|e| format!("'{digits}' is not a valid amount: {e}"))?;

    let suffix = suffix.trim().to_ascii_lowercase();
    let per_unit = UNITS
        .iter()
        .find(|(unit, _)| *unit == suffix)
        .map(|(_, millis)| *millis)
        .ok_or_else(|| format!("unknown unit '{suffix}'; expected ms, s, m or h"))?;

    amount
        .checked_mul(per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| "duration too large".to_string())
}
