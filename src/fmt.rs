//! Provides parsers and formatters for the size and duration expressions used in the config.
use std::time::Duration;

use regex::Regex;

lazy_static::lazy_static! {
    static ref SIZE_EXPRESSION: Regex = Regex::new(r"^ *(\d+) *([bBkKmMgGtT]?) *$").unwrap();
    static ref DURATION_EXPRESSION: Regex =
        Regex::new(r"^ *(\d+) *(ms|s|m|h|d|MS|S|M|H|D)? *$").unwrap();
}

/// Parses a byte size like **64m** into the number of bytes.
///
/// The following suffixes are supported (all binary multiples):
/// * **b** or none: plain bytes
/// * **k**: KiB
/// * **m**: MiB
/// * **g**: GiB
/// * **t**: TiB
///
/// # Examples
///
/// ```
/// assert_eq!(ringcache::fmt::parse_size("0").unwrap(), 0);
/// assert_eq!(ringcache::fmt::parse_size("512b").unwrap(), 512);
/// assert_eq!(ringcache::fmt::parse_size("2k").unwrap(), 2048);
/// assert_eq!(ringcache::fmt::parse_size("64 M").unwrap(), 64 * 1024 * 1024);
/// assert_eq!(ringcache::fmt::parse_size("1g").unwrap(), 1024 * 1024 * 1024);
///
/// assert_eq!(ringcache::fmt::parse_size("1.5g").is_err(), true);
/// assert_eq!(ringcache::fmt::parse_size("-1").is_err(), true);
/// assert_eq!(ringcache::fmt::parse_size("12 X").is_err(), true);
/// ```
pub fn parse_size(expression: impl AsRef<str>) -> anyhow::Result<usize> {
    let expression = expression.as_ref();
    let captures = SIZE_EXPRESSION.captures(expression).ok_or_else(|| {
        anyhow::anyhow!(
            "Cannot parse '{}' into a size expression. \
             Expected a positive number and optionally 'b', 'k', 'm', 'g' or 't' as suffix.",
            expression
        )
    })?;

    let number = captures[1].parse::<usize>()?;
    let multiplier: usize = match captures[2].to_ascii_lowercase().as_str() {
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        "t" => 1 << 40,
        _ => 1,
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("The size expression '{}' is too large.", expression))
}

/// Parses a duration like **5s** or **250ms**.
///
/// A number without suffix is treated as milliseconds.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// assert_eq!(ringcache::fmt::parse_duration("250").unwrap(), Duration::from_millis(250));
/// assert_eq!(ringcache::fmt::parse_duration("250 ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(ringcache::fmt::parse_duration("5s").unwrap(), Duration::from_secs(5));
/// assert_eq!(ringcache::fmt::parse_duration("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(ringcache::fmt::parse_duration("1 h").unwrap(), Duration::from_secs(3600));
///
/// assert_eq!(ringcache::fmt::parse_duration("1.5s").is_err(), true);
/// assert_eq!(ringcache::fmt::parse_duration("3 weeks").is_err(), true);
/// assert_eq!(ringcache::fmt::parse_duration("18446744073709551615d").is_err(), true);
/// ```
pub fn parse_duration(expression: impl AsRef<str>) -> anyhow::Result<Duration> {
    let expression = expression.as_ref();
    let captures = DURATION_EXPRESSION.captures(expression).ok_or_else(|| {
        anyhow::anyhow!(
            "Cannot parse '{}' into a duration expression. \
             Expected a positive number and optionally 'ms', 's', 'm', 'h' or 'd' as suffix.",
            expression
        )
    })?;

    let number = captures[1].parse::<u64>()?;
    let unit = captures
        .get(2)
        .map(|unit| unit.as_str().to_ascii_lowercase())
        .unwrap_or_default();

    let seconds_per_unit = match unit.as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        _ => return Ok(Duration::from_millis(number)),
    };

    number
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("The duration expression '{}' is too large.", expression))
}

/// Formats a number of bytes using the largest fitting binary unit.
///
/// # Examples
///
/// ```
/// assert_eq!(ringcache::fmt::format_size(0), "unlimited");
/// assert_eq!(ringcache::fmt::format_size(1), "1 byte");
/// assert_eq!(ringcache::fmt::format_size(100), "100 bytes");
/// assert_eq!(ringcache::fmt::format_size(2048), "2 KiB");
/// assert_eq!(ringcache::fmt::format_size(3 * 1024 * 1024 + 512 * 1024), "3.50 MiB");
/// assert_eq!(ringcache::fmt::format_size(64 * 1024 * 1024), "64 MiB");
/// ```
pub fn format_size(size_in_bytes: usize) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    match size_in_bytes {
        0 => return "unlimited".to_owned(),
        1 => return "1 byte".to_owned(),
        n if n < 1024 => return format!("{} bytes", n),
        _ => (),
    }

    let mut size = size_in_bytes as f64 / 1024.;
    let mut unit = 0;
    while size >= 1024. && unit < UNITS.len() - 1 {
        size /= 1024.;
        unit += 1;
    }

    if size.fract() == 0. {
        format!("{:.0} {}", size, UNITS[unit])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}
