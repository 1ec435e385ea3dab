//! Duration grammar: `[-] (digits unit)+` with units from nanoseconds to
//! weeks. Durations are carried as signed nanosecond counts so that unary
//! minus on a duration literal stays exact.

use std::fmt;

pub const NANOS_PER_MICROSECOND: i64 = 1_000;
pub const NANOS_PER_MILLISECOND: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
pub const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
pub const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
pub const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;

/// Error from [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// The literal is malformed: missing digits, an unknown unit, or too
    /// short to be a duration at all.
    Invalid,
    /// The accumulated duration does not fit in 64 bits of nanoseconds.
    Overflow { measure: i64, unit: String },
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationError::Invalid => write!(f, "invalid duration"),
            DurationError::Overflow { measure, unit } => write!(
                f,
                "overflowed duration {}{}: choose a smaller duration or INF",
                measure, unit
            ),
        }
    }
}

impl std::error::Error for DurationError {}

/// Parses a duration literal such as `10h`, `1h30m`, or `-3d` into
/// nanoseconds. Supports the full TSQL unit set including days and weeks,
/// which is why the host library's duration parsing is not enough.
pub fn parse_duration(s: &str) -> Result<i64, DurationError> {
    // A duration is at least one digit and one unit letter.
    if s.len() < 2 {
        return Err(DurationError::Invalid);
    }

    let a: Vec<char> = s.chars().collect();
    let mut d: i64 = 0;
    let mut i = 0;

    let is_negative = a[0] == '-';
    if is_negative {
        i = 1;
    }

    while i < a.len() {
        // Find the number portion.
        let start = i;
        while i < a.len() && a[i].is_ascii_digit() {
            i += 1;
        }
        if i >= a.len() || i == start {
            return Err(DurationError::Invalid);
        }

        let n: i64 = a[start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| DurationError::Invalid)?;

        // Extract the unit of measure. "ns" and "ms" must be matched before
        // the single-letter "n" and "m" units.
        let (scale, unit, width) = match a[i] {
            'n' => {
                if i + 1 < a.len() && a[i + 1] == 's' {
                    (1, "ns", 2)
                } else {
                    return Err(DurationError::Invalid);
                }
            }
            'u' | 'µ' => (NANOS_PER_MICROSECOND, "u", 1),
            'm' => {
                if i + 1 < a.len() && a[i + 1] == 's' {
                    (NANOS_PER_MILLISECOND, "ms", 2)
                } else {
                    (NANOS_PER_MINUTE, "m", 1)
                }
            }
            's' => (NANOS_PER_SECOND, "s", 1),
            'h' => (NANOS_PER_HOUR, "h", 1),
            'd' => (NANOS_PER_DAY, "d", 1),
            'w' => (NANOS_PER_WEEK, "w", 1),
            _ => return Err(DurationError::Invalid),
        };
        i += width;

        let overflow = DurationError::Overflow {
            measure: n,
            unit: unit.to_string(),
        };
        d = n
            .checked_mul(scale)
            .and_then(|part| d.checked_add(part))
            .ok_or(overflow)?;
    }

    if is_negative {
        d = -d;
    }
    Ok(d)
}

/// Formats a duration in nanoseconds using the largest unit that divides the
/// value evenly. Microseconds are written as `u`, never `µ`.
pub fn format_duration(d: i64) -> String {
    if d == 0 {
        return "0s".to_string();
    } else if d % NANOS_PER_WEEK == 0 {
        return format!("{}w", d / NANOS_PER_WEEK);
    } else if d % NANOS_PER_DAY == 0 {
        return format!("{}d", d / NANOS_PER_DAY);
    } else if d % NANOS_PER_HOUR == 0 {
        return format!("{}h", d / NANOS_PER_HOUR);
    } else if d % NANOS_PER_MINUTE == 0 {
        return format!("{}m", d / NANOS_PER_MINUTE);
    } else if d % NANOS_PER_SECOND == 0 {
        return format!("{}s", d / NANOS_PER_SECOND);
    } else if d % NANOS_PER_MILLISECOND == 0 {
        return format!("{}ms", d / NANOS_PER_MILLISECOND);
    } else if d % NANOS_PER_MICROSECOND == 0 {
        return format!("{}u", d / NANOS_PER_MICROSECOND);
    }
    format!("{}ns", d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10ns"), Ok(10));
        assert_eq!(parse_duration("10u"), Ok(10 * NANOS_PER_MICROSECOND));
        assert_eq!(parse_duration("10µ"), Ok(10 * NANOS_PER_MICROSECOND));
        assert_eq!(parse_duration("15ms"), Ok(15 * NANOS_PER_MILLISECOND));
        assert_eq!(parse_duration("100s"), Ok(100 * NANOS_PER_SECOND));
        assert_eq!(parse_duration("10m"), Ok(10 * NANOS_PER_MINUTE));
        assert_eq!(parse_duration("10h"), Ok(10 * NANOS_PER_HOUR));
        assert_eq!(parse_duration("3d"), Ok(3 * NANOS_PER_DAY));
        assert_eq!(parse_duration("2w"), Ok(2 * NANOS_PER_WEEK));
        assert_eq!(
            parse_duration("1h30m"),
            Ok(NANOS_PER_HOUR + 30 * NANOS_PER_MINUTE)
        );
        assert_eq!(parse_duration("-5m"), Ok(-5 * NANOS_PER_MINUTE));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_eq!(parse_duration(""), Err(DurationError::Invalid));
        assert_eq!(parse_duration("w"), Err(DurationError::Invalid));
        assert_eq!(parse_duration("5"), Err(DurationError::Invalid));
        assert_eq!(parse_duration("10x"), Err(DurationError::Invalid));
        assert_eq!(parse_duration("10n"), Err(DurationError::Invalid));
        assert_eq!(parse_duration("ms"), Err(DurationError::Invalid));
        assert_eq!(parse_duration("1h30"), Err(DurationError::Invalid));
        assert!(matches!(
            parse_duration("9223372036854775807w"),
            Err(DurationError::Overflow { .. })
        ));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(2 * NANOS_PER_WEEK), "2w");
        assert_eq!(format_duration(3 * NANOS_PER_DAY), "3d");
        assert_eq!(format_duration(10 * NANOS_PER_HOUR), "10h");
        assert_eq!(format_duration(10 * NANOS_PER_MINUTE), "10m");
        assert_eq!(format_duration(100 * NANOS_PER_SECOND), "100s");
        assert_eq!(format_duration(15 * NANOS_PER_MILLISECOND), "15ms");
        assert_eq!(format_duration(10 * NANOS_PER_MICROSECOND), "10u");
        assert_eq!(format_duration(10), "10ns");
        assert_eq!(format_duration(-NANOS_PER_HOUR), "-1h");
    }

    #[test]
    fn test_duration_round_trip() {
        for d in [
            1,
            10 * NANOS_PER_MICROSECOND,
            15 * NANOS_PER_MILLISECOND,
            1 * NANOS_PER_SECOND,
            90 * NANOS_PER_SECOND,
            10 * NANOS_PER_HOUR,
            3 * NANOS_PER_DAY,
            2 * NANOS_PER_WEEK,
        ] {
            assert_eq!(parse_duration(&format_duration(d)), Ok(d), "d={}", d);
        }
    }
}
