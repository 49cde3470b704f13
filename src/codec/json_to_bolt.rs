//! Request-direction codec: JSON parameter documents → Bolt values.
//!
//! Plain JSON maps onto the Cypher primitives, lists, and maps. Values that
//! have no JSON representation travel as a tagged wrapper object:
//! `{"$type": "<tag>", "_value": "<literal>"}` where `_value` is always a
//! string parsed according to the tag's literal form.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use serde_json::Value;

use boltr::types::{
    BoltDate, BoltDateTime, BoltDateTimeZoneId, BoltDuration, BoltLocalDateTime, BoltLocalTime,
    BoltPoint2D, BoltPoint3D, BoltTime, BoltValue,
};

use super::temporal;
use crate::errors::GatewayError;

/// The tag key that distinguishes a wrapper object from a plain Cypher map.
pub const TYPE_KEY: &str = "$type";
/// The literal payload key inside a wrapper object.
pub const VALUE_KEY: &str = "_value";

/// Closed registry of recognised wrapper tags.
pub const SUPPORTED_TAGS: &[&str] = &[
    "Date",
    "Time",
    "LocalTime",
    "DateTime",
    "LocalDateTime",
    "Duration",
    "Period",
    "Point",
    "Byte[]",
];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date")
}

/// Decodes the `parameters` object of a statement.
pub fn decode_parameters(
    parameters: &serde_json::Map<String, Value>,
) -> Result<HashMap<String, BoltValue>, GatewayError> {
    parameters
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decodes a single JSON value into a Bolt value, recursing through
/// containers and dispatching wrapper objects through the tag registry.
pub fn decode_value(value: &Value) -> Result<BoltValue, GatewayError> {
    match value {
        Value::Null => Ok(BoltValue::Null),
        Value::Bool(b) => Ok(BoltValue::Boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(BoltValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                if n.is_u64() {
                    return Err(GatewayError::InvalidParameter(format!(
                        "Integer value {} is out of the 64-bit signed range",
                        n
                    )));
                }
                Ok(BoltValue::Float(f))
            } else {
                Err(GatewayError::InvalidParameter(format!(
                    "Unrepresentable number {}",
                    n
                )))
            }
        }
        Value::String(s) => Ok(BoltValue::String(s.clone())),
        Value::Array(items) => Ok(BoltValue::List(
            items.iter().map(decode_value).collect::<Result<_, _>>()?,
        )),
        Value::Object(map) => match map.get(TYPE_KEY) {
            None => Ok(BoltValue::Dict(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
                    .collect::<Result<_, GatewayError>>()?,
            )),
            Some(tag) => {
                let Some(tag) = tag.as_str() else {
                    return Err(GatewayError::InvalidParameter(format!(
                        "The {} tag has to be a string, not {}",
                        TYPE_KEY, tag
                    )));
                };
                let literal = require_string_literal(tag, map.get(VALUE_KEY))?;
                decode_tagged(tag, literal)
            }
        },
    }
}

fn require_string_literal<'a>(
    tag: &str,
    value: Option<&'a Value>,
) -> Result<&'a str, GatewayError> {
    match value {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(GatewayError::InvalidParameter(format!(
            "Value {} for type {} has to be String-based",
            other, tag
        ))),
        None => Err(GatewayError::InvalidParameter(format!(
            "Missing {} for type {}",
            VALUE_KEY, tag
        ))),
    }
}

fn decode_tagged(tag: &str, literal: &str) -> Result<BoltValue, GatewayError> {
    let parse_failure = || {
        GatewayError::InvalidParameter(format!(
            "Value '{}' cannot be parsed as a {}",
            literal, tag
        ))
    };
    match tag {
        "Date" => {
            let date = NaiveDate::parse_from_str(literal, "%Y-%m-%d").map_err(|_| parse_failure())?;
            Ok(BoltValue::Date(BoltDate {
                days: (date - epoch()).num_days(),
            }))
        }
        "Time" => {
            let (time, offset) = split_time_and_offset(literal).ok_or_else(parse_failure)?;
            let time =
                NaiveTime::parse_from_str(time, "%H:%M:%S%.f").map_err(|_| parse_failure())?;
            Ok(BoltValue::Time(BoltTime {
                nanoseconds: nanos_of_day(&time),
                tz_offset_seconds: offset as i64,
            }))
        }
        "LocalTime" => {
            let time =
                NaiveTime::parse_from_str(literal, "%H:%M:%S%.f").map_err(|_| parse_failure())?;
            Ok(BoltValue::LocalTime(BoltLocalTime {
                nanoseconds: nanos_of_day(&time),
            }))
        }
        "DateTime" => decode_datetime(literal).ok_or_else(parse_failure),
        "LocalDateTime" => {
            let dt = NaiveDateTime::parse_from_str(literal, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|_| parse_failure())?;
            Ok(BoltValue::LocalDateTime(BoltLocalDateTime {
                seconds: dt.and_utc().timestamp(),
                nanoseconds: dt.and_utc().timestamp_subsec_nanos() as i64,
            }))
        }
        "Duration" => {
            let parts = temporal::parse_iso_duration(literal)
                .filter(|p| p.months == 0)
                .ok_or_else(parse_failure)?;
            // Calendar days in a PnDT… literal are exact 24-hour spans.
            Ok(BoltValue::Duration(BoltDuration {
                months: 0,
                days: 0,
                seconds: parts.seconds + parts.days * 86_400,
                nanoseconds: parts.nanoseconds,
            }))
        }
        "Period" => {
            let parts = temporal::parse_iso_duration(literal)
                .filter(|p| p.seconds == 0 && p.nanoseconds == 0)
                .ok_or_else(parse_failure)?;
            Ok(BoltValue::Duration(BoltDuration {
                months: parts.months,
                days: parts.days,
                seconds: 0,
                nanoseconds: 0,
            }))
        }
        "Point" => decode_point(literal).ok_or_else(parse_failure),
        "Byte[]" => {
            let compact: String = literal.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = hex::decode(&compact).map_err(|_| parse_failure())?;
            Ok(BoltValue::Bytes(bytes))
        }
        unknown => Err(GatewayError::InvalidParameter(format!(
            "Unknown type tag '{}'; supported tags are {}",
            unknown,
            SUPPORTED_TAGS.join(", ")
        ))),
    }
}

fn split_time_and_offset(literal: &str) -> Option<(&str, i32)> {
    if let Some(stripped) = literal.strip_suffix(['Z', 'z']) {
        return Some((stripped, 0));
    }
    // The offset sign can only appear after the HH:MM:SS prefix.
    let idx = literal[1..].rfind(['+', '-']).map(|i| i + 1)?;
    if idx < 8 {
        return None;
    }
    let offset = temporal::parse_utc_offset(&literal[idx..])?;
    Some((&literal[..idx], offset))
}

fn decode_datetime(literal: &str) -> Option<BoltValue> {
    if let Some(open) = literal.find('[') {
        let zone = literal.strip_suffix(']')?.get(open + 1..)?;
        let tz: Tz = zone.parse().ok()?;
        let head = &literal[..open];
        let instant = match DateTime::parse_from_rfc3339(head) {
            Ok(dt) => dt.with_timezone(&tz),
            Err(_) => {
                // Zone-only form without an explicit offset.
                let naive = NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
                tz.from_local_datetime(&naive).earliest()?
            }
        };
        return Some(BoltValue::DateTimeZoneId(BoltDateTimeZoneId {
            seconds: instant.timestamp(),
            nanoseconds: instant.timestamp_subsec_nanos() as i64,
            tz_id: zone.to_string(),
        }));
    }
    let dt = DateTime::parse_from_rfc3339(literal).ok()?;
    Some(BoltValue::DateTime(BoltDateTime {
        seconds: dt.timestamp(),
        nanoseconds: dt.timestamp_subsec_nanos() as i64,
        tz_offset_seconds: dt.offset().local_minus_utc() as i64,
    }))
}

fn decode_point(literal: &str) -> Option<BoltValue> {
    let (srid_part, wkt_part) = literal.split_once(';')?;
    let srid_part = srid_part.trim();
    if srid_part.len() < 5 || !srid_part[..5].eq_ignore_ascii_case("srid=") {
        return None;
    }
    let srid: i64 = srid_part[5..].trim().parse().ok()?;

    let wkt = wkt_part.trim();
    if wkt.len() < 5 || !wkt[..5].eq_ignore_ascii_case("point") {
        return None;
    }
    let rest = wkt[5..].trim_start();
    let rest = rest
        .strip_prefix(['Z', 'z'])
        .map(str::trim_start)
        .unwrap_or(rest);
    let coords = rest.strip_prefix('(')?.strip_suffix(')')?;
    let coords: Vec<f64> = coords
        .split_whitespace()
        .map(|c| c.parse().ok())
        .collect::<Option<_>>()?;
    match coords.as_slice() {
        [x, y] => Some(BoltValue::Point2D(BoltPoint2D { srid, x: *x, y: *y })),
        [x, y, z] => Some(BoltValue::Point3D(BoltPoint3D {
            srid,
            x: *x,
            y: *y,
            z: *z,
        })),
        _ => None,
    }
}

fn nanos_of_day(time: &NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64 * 1_000_000_000 + time.nanosecond() as i64
}

/// Days-since-epoch back to a `NaiveDate`; used by the response direction.
pub(crate) fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(days))
}
