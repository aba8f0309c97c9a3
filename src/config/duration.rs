//! Duration parsing for `--idle-timeout`.

use std::time::Duration;

use anyhow::Context;

/// Parse a duration string like "1h", "30m", "300s" or "300".
///
/// A bare number is seconds. Zero is rejected since it would end a session
/// before the first event could arrive.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (digits, unit_secs, unit) = if let Some(num) = s.strip_suffix('h') {
        (num, 3600, "hours")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, 60, "minutes")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, 1, "seconds")
    } else {
        (s, 1, "duration")
    };

    let value: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("Invalid {unit} value: {digits}"))?;
    let secs = value
        .checked_mul(unit_secs)
        .with_context(|| format!("Duration too large: {s}"))?;
    if secs == 0 {
        anyhow::bail!("Duration must be greater than zero: {s}");
    }
    Ok(Duration::from_secs(secs))
}
