use anyhow::{anyhow, Result};
use chrono::Duration;

const SECOND_MS: f64 = 1_000.0;
const MINUTE_MS: f64 = SECOND_MS * 60.0;
const HOUR_MS: f64 = MINUTE_MS * 60.0;
const DAY_MS: f64 = HOUR_MS * 24.0;
const WEEK_MS: f64 = DAY_MS * 7.0;
const YEAR_MS: f64 = DAY_MS * 365.25;

/// Parse a human duration such as `"1d"`, `"2 hours"`, `"30m"` or `"1.5h"`.
///
/// A bare number is read as milliseconds. Units are case-insensitive and the
/// space between number and unit is optional.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {:?}", input))?;

    let unit_ms = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => SECOND_MS,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE_MS,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR_MS,
        "d" | "day" | "days" => DAY_MS,
        "w" | "week" | "weeks" => WEEK_MS,
        "y" | "yr" | "yrs" | "year" | "years" => YEAR_MS,
        other => return Err(anyhow!("Unknown duration unit {:?} in {:?}", other, input)),
    };

    let millis = (value * unit_ms).round();
    if !millis.is_finite() || millis > i64::MAX as f64 {
        return Err(anyhow!("Duration out of range: {:?}", input));
    }

    Ok(Duration::milliseconds(millis as i64))
}
