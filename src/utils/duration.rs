//! Duration parsing utilities.
//!
//! This module parses the duration strings accepted on the command line
//! (e.g. `--stagger 2s`, `--settle 500ms`) into [`Duration`] values.

use std::time::Duration;

/// Parse a duration string (e.g. "2", "2s", "500ms", "1m") into a [`Duration`]
///
/// Supported formats:
/// - Raw seconds: "20"
/// - Milliseconds: "500ms", "500msec", "500millis"
/// - Seconds: "2s", "2sec", "2secs", "2second", "2seconds"
/// - Minutes: "1m", "1min", "1mins", "1minute", "1minutes"
/// - Hours: "1h", "1hr", "1hrs", "1hour", "1hours"
///
/// # Examples
/// ```
/// use rip_harness::utils::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("20"), Ok(Duration::from_secs(20)));
/// assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
/// assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
/// assert!(parse_duration("soon").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: u64 = number
        .parse()
        .map_err(|_| format!("Invalid duration format: {}", input))?;

    // Longer suffixes are matched by listing every accepted spelling
    let seconds_per_unit = match unit.trim() {
        "ms" | "msec" | "millis" => return Ok(Duration::from_millis(value)),
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        _ => return Err(format!("Invalid duration format: {}", input)),
    };
    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration out of range: {}", input))
}
