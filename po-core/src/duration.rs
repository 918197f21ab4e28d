use std::time::Duration;

use lazy_static::lazy_static;

use crate::errors::*;

lazy_static! {
    static ref DURATION_RE: Regex =
        Regex::new(r"^(([0-9]+)y)?(([0-9]+)w)?(([0-9]+)d)?(([0-9]+)h)?(([0-9]+)m)?(([0-9]+)s)?(([0-9]+)ms)?$").unwrap();
}

err_impl! {DurationError,
    #[error("not a valid duration string: {0:?}")]
    InvalidDuration(String),

    #[error("duration out of range: {0:?}")]
    OutOfRange(String),
}

// Unit multipliers in milliseconds, matched positionally against the capture groups above
const UNITS_MS: [u64; 7] = [
    1000 * 60 * 60 * 24 * 365,
    1000 * 60 * 60 * 24 * 7,
    1000 * 60 * 60 * 24,
    1000 * 60 * 60,
    1000 * 60,
    1000,
    1,
];

/// Parses a Prometheus duration string (e.g. `1h30m`, `15s`, `500ms`).
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        bail!(DurationError::invalid_duration(s));
    }

    let caps = DURATION_RE.captures(s).ok_or(DurationError::invalid_duration(s))?;
    let mut total: u64 = 0;
    for (i, mult) in UNITS_MS.iter().enumerate() {
        if let Some(m) = caps.get(2 * i + 2) {
            let v: u64 = m.as_str().parse().map_err(|_| DurationError::out_of_range(s))?;
            total = v
                .checked_mul(*mult)
                .and_then(|v| total.checked_add(v))
                .ok_or(DurationError::out_of_range(s))?;
        }
    }
    Ok(Duration::from_millis(total))
}

pub fn is_valid_duration(s: &str) -> bool {
    parse_duration(s).is_ok()
}
