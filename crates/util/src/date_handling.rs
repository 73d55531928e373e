//! # Date Handling Utilities
//!
//! Parsing of the durations and instants that appear in lease expiry fields:
//! Go-style duration strings (`1h30m`, `0.4s`, `250ms`), bare numbers scaled
//! by a unit, and timestamps in RFC 3339, RFC 1123, RFC 2822 or a `chrono`
//! strftime layout.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use tether_types::ConfigError;

const NANOS_PER_UNIT: [(&str, f64); 8] = [
    ("ns", 1.0),
    ("us", 1e3),
    ("µs", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 60e9),
    ("h", 3600e9),
    ("d", 86_400e9),
];

/// Parse a Go-style duration such as `1h30m`, `0.4s` or `300ms`.
///
/// A bare `0` is accepted; any other value needs a unit on every number.
/// Negative durations are rejected.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use tether_util::date_handling::parse_duration;
///
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("0.4s").unwrap(), Duration::from_millis(400));
/// assert!(parse_duration("10").is_err());
/// ```
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration { value: raw.to_string() };
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned == "0" {
        return Ok(Duration::ZERO);
    }
    if unsigned.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;
    let mut rest = unsigned;
    while !rest.is_empty() {
        let number_len = rest
            .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|ch: char| ch.is_ascii_digit() || ch == '.')
            .unwrap_or(rest.len());
        let scale = unit_scale(&rest[..unit_len]).ok_or_else(invalid)?;
        rest = &rest[unit_len..];
        total_nanos += number * scale;
    }
    nanos_to_duration(total_nanos).ok_or_else(invalid)
}

/// Parse an expiry duration: a bare number scaled by `unit` (default
/// seconds), or a Go-style duration string.
pub fn parse_scaled_duration(raw: &str, unit: Option<&str>) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();
    let Ok(number) = trimmed.parse::<f64>() else {
        return parse_duration(trimmed);
    };
    let unit = unit.unwrap_or("s");
    let scale = unit_scale(unit).ok_or_else(|| ConfigError::InvalidDuration { value: unit.to_string() })?;
    nanos_to_duration(number * scale).ok_or_else(|| ConfigError::InvalidDuration { value: raw.to_string() })
}

/// Parse an absolute instant.
///
/// `layout` may be `RFC3339` (also the default), `RFC1123`, `RFC2822`, or a
/// `chrono` strftime layout. Layouts without an offset are read as UTC.
pub fn parse_instant(raw: &str, layout: Option<&str>) -> Result<DateTime<Utc>, ConfigError> {
    let invalid = || ConfigError::InvalidDuration { value: raw.to_string() };
    let trimmed = raw.trim();
    let parsed = match layout.map(str::trim) {
        None | Some("RFC3339") | Some("rfc3339") => DateTime::parse_from_rfc3339(trimmed).map_err(|_| invalid())?,
        Some("RFC1123") | Some("rfc1123") | Some("RFC2822") | Some("rfc2822") => {
            DateTime::parse_from_rfc2822(trimmed).map_err(|_| invalid())?
        }
        Some(format) => match DateTime::parse_from_str(trimmed, format) {
            Ok(instant) => instant,
            Err(_) => {
                let naive = NaiveDateTime::parse_from_str(trimmed, format).map_err(|_| invalid())?;
                return Ok(naive.and_utc());
            }
        },
    };
    Ok(parsed.with_timezone(&Utc))
}

fn unit_scale(unit: &str) -> Option<f64> {
    NANOS_PER_UNIT
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, scale)| *scale)
}

fn nanos_to_duration(nanos: f64) -> Option<Duration> {
    if !nanos.is_finite() || nanos < 0.0 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}
