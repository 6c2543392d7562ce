// Duration formatting
//
// Renders durations the way Go's time.Duration prints them: "1h0m0s",
// "1m2.5s", "150ms", "1.5µs", "0s".

use std::fmt::Write;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;

pub fn format_duration(duration: chrono::Duration) -> String {
    let nanos = duration
        .num_nanoseconds()
        .map(i128::from)
        .unwrap_or_else(|| i128::from(duration.num_milliseconds()) * 1_000_000);
    if nanos == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    if nanos < 0 {
        out.push('-');
    }
    let nanos = nanos.unsigned_abs();

    if nanos < NANOS_PER_SEC {
        let (unit, suffix) = if nanos < NANOS_PER_MICRO {
            (1, "ns")
        } else if nanos < NANOS_PER_MILLI {
            (NANOS_PER_MICRO, "µs")
        } else {
            (NANOS_PER_MILLI, "ms")
        };
        out.push_str(&fixed_point(nanos, unit));
        out.push_str(suffix);
        return out;
    }

    let hours = nanos / NANOS_PER_HOUR;
    let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MIN;
    let seconds = nanos % NANOS_PER_MIN;

    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    out.push_str(&fixed_point(seconds, NANOS_PER_SEC));
    out.push('s');
    out
}

/// `value / unit` with trailing fractional zeros dropped
fn fixed_point(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }

    let width = (unit - 1).to_string().len();
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
