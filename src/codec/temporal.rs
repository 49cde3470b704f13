//! Temporal literal handling shared by both codec directions.
//!
//! chrono covers dates and times but has no ISO-8601 duration parser, so the
//! `P…`/`PT…` forms are handled here. Bolt carries durations as
//! (months, days, seconds, nanoseconds); the split into `Period` and
//! `Duration` literals happens at the JSON boundary.

/// Components of an ISO-8601 duration mapped onto the Bolt duration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurationParts {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanoseconds: i64,
}

/// Parses an ISO-8601 duration or period literal (`P1Y2M3D`, `PT1H30M`,
/// `P1M2DT3.5S`, optionally negated as `-P…`).
pub fn parse_iso_duration(input: &str) -> Option<DurationParts> {
    let (negated, rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let rest = rest.strip_prefix(['P', 'p'])?;

    let mut parts = DurationParts::default();
    let (date_part, time_part) = match rest.split_once(['T', 't']) {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };
    if date_part.is_empty() && time_part.is_none() {
        return None;
    }

    let mut seen_any = false;
    let mut number_start = 0usize;
    for (idx, ch) in date_part.char_indices() {
        if ch.is_ascii_alphabetic() {
            let number: i64 = date_part[number_start..idx].parse().ok()?;
            match ch.to_ascii_uppercase() {
                'Y' => parts.months += number.checked_mul(12)?,
                'M' => parts.months += number,
                'W' => parts.days += number.checked_mul(7)?,
                'D' => parts.days += number,
                _ => return None,
            }
            seen_any = true;
            number_start = idx + 1;
        }
    }
    if number_start != date_part.len() {
        return None;
    }

    if let Some(time_part) = time_part {
        if time_part.is_empty() {
            return None;
        }
        let mut number_start = 0usize;
        for (idx, ch) in time_part.char_indices() {
            if ch.is_ascii_alphabetic() {
                let raw = &time_part[number_start..idx];
                match ch.to_ascii_uppercase() {
                    'H' => {
                        let n: i64 = raw.parse().ok()?;
                        parts.seconds += n.checked_mul(3600)?;
                    }
                    'M' => {
                        let n: i64 = raw.parse().ok()?;
                        parts.seconds += n.checked_mul(60)?;
                    }
                    'S' => {
                        let (secs, nanos) = parse_fractional_seconds(raw)?;
                        parts.seconds += secs;
                        parts.nanoseconds += nanos;
                    }
                    _ => return None,
                }
                seen_any = true;
                number_start = idx + 1;
            }
        }
        if number_start != time_part.len() {
            return None;
        }
    }

    if !seen_any {
        return None;
    }
    if negated {
        parts.months = -parts.months;
        parts.days = -parts.days;
        parts.seconds = -parts.seconds;
        parts.nanoseconds = -parts.nanoseconds;
    }
    // Carry whole seconds out of the nanosecond field.
    parts.seconds += parts.nanoseconds / 1_000_000_000;
    parts.nanoseconds %= 1_000_000_000;
    Some(parts)
}

fn parse_fractional_seconds(raw: &str) -> Option<(i64, i64)> {
    let (negative, raw) = match raw.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, raw),
    };
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let secs: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos: i64 = 0;
    if !frac.is_empty() {
        nanos = format!("{:0<9}", frac).parse().ok()?;
    }
    if negative {
        Some((-secs, -nanos))
    } else {
        Some((secs, nanos))
    }
}

/// Formats a pure month count as a period literal, e.g. 14 → `P1Y2M`.
pub fn format_period(months: i64) -> String {
    if months == 0 {
        return "P0M".to_string();
    }
    let years = months / 12;
    let rem = months % 12;
    let mut out = String::from("P");
    if years != 0 {
        out.push_str(&format!("{}Y", years));
    }
    if rem != 0 || years == 0 {
        out.push_str(&format!("{}M", rem));
    }
    out
}

/// Formats a pure second/nanosecond count as a duration literal,
/// e.g. 3723 s → `PT1H2M3S`.
pub fn format_time_duration(seconds: i64, nanoseconds: i64) -> String {
    if seconds == 0 && nanoseconds == 0 {
        return "PT0S".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    let mut out = String::from("PT");
    if hours != 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes != 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if secs != 0 || nanoseconds != 0 {
        out.push_str(&format_seconds(secs, nanoseconds));
        out.push('S');
    }
    out
}

/// Formats a mixed duration in the raw ISO form, all fields spelled out.
pub fn format_raw_duration(months: i64, days: i64, seconds: i64, nanoseconds: i64) -> String {
    format!(
        "P{}M{}DT{}S",
        months,
        days,
        format_seconds(seconds, nanoseconds)
    )
}

fn format_seconds(seconds: i64, nanoseconds: i64) -> String {
    if nanoseconds == 0 {
        return seconds.to_string();
    }
    let frac = format!("{:09}", nanoseconds.unsigned_abs());
    let frac = frac.trim_end_matches('0');
    if seconds == 0 && nanoseconds < 0 {
        format!("-0.{}", frac)
    } else {
        format!("{}.{}", seconds, frac)
    }
}

/// Parses a `±HH:MM`, `±HHMM`, `±HH` or `Z` UTC offset into seconds.
pub fn parse_utc_offset(input: &str) -> Option<i32> {
    if input == "Z" || input == "z" {
        return Some(0);
    }
    let (sign, rest) = match input.chars().next()? {
        '+' => (1, &input[1..]),
        '-' => (-1, &input[1..]),
        _ => return None,
    };
    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h, m)
    } else if rest.len() == 4 {
        rest.split_at(2)
    } else {
        (rest, "0")
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 18 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Formats a UTC offset in seconds as `±HH:MM`.
pub fn format_utc_offset(offset_seconds: i64) -> String {
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let abs = offset_seconds.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

/// Appends a fractional-second suffix (`.123`) when nanoseconds are present.
pub fn fraction_suffix(nanoseconds: u32) -> String {
    if nanoseconds == 0 {
        return String::new();
    }
    let frac = format!("{:09}", nanoseconds);
    format!(".{}", frac.trim_end_matches('0'))
}
