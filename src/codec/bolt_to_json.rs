//! Response-direction codec: Bolt values → JSON under the "new" format.
//!
//! Primitives render as the matching JSON scalar; everything else travels as
//! the same tagged wrapper shape the request direction accepts, so a value
//! written through the gateway reads back identically.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike};
use chrono_tz::Tz;
use serde_json::{json, Map, Value};

use boltr::types::{
    BoltDateTime, BoltDateTimeZoneId, BoltDict, BoltDuration, BoltLocalDateTime, BoltLocalTime,
    BoltNode, BoltTime, BoltValue,
};

use super::temporal::{
    format_period, format_raw_duration, format_time_duration, format_utc_offset, fraction_suffix,
};
use super::{crs_for_srid, json_to_bolt::date_from_epoch_days, walk_path, PathStep};

/// Renders a Bolt value in the new (tagged) format.
pub fn encode_value(value: &BoltValue) -> Value {
    match value {
        BoltValue::Null => Value::Null,
        BoltValue::Boolean(b) => Value::Bool(*b),
        BoltValue::Integer(i) => Value::from(*i),
        BoltValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        BoltValue::String(s) => Value::String(s.clone()),
        BoltValue::Bytes(b) => tagged("Byte[]", Value::String(hex::encode(b))),
        BoltValue::List(items) => Value::Array(items.iter().map(encode_value).collect()),
        BoltValue::Dict(map) => Value::Object(encode_map(map)),
        BoltValue::Node(node) => tagged("Node", node_value(node)),
        BoltValue::Relationship(rel) => tagged(
            "Relationship",
            relationship_value(&rel.rel_type, &rel.properties),
        ),
        BoltValue::UnboundRelationship(rel) => tagged(
            "Relationship",
            relationship_value(&rel.rel_type, &rel.properties),
        ),
        BoltValue::Path(path) => tagged(
            "Path",
            Value::Array(
                walk_path(path)
                    .iter()
                    .map(|step| match step {
                        PathStep::Node(n) => tagged("Node", node_value(n)),
                        PathStep::Relationship { rel, .. } => tagged(
                            "Relationship",
                            relationship_value(&rel.rel_type, &rel.properties),
                        ),
                    })
                    .collect(),
            ),
        ),
        BoltValue::Date(d) => tagged(
            "Date",
            date_from_epoch_days(d.days)
                .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        ),
        BoltValue::Time(t) => tagged("Time", Value::String(format_offset_time(t))),
        BoltValue::LocalTime(t) => tagged("LocalTime", Value::String(format_local_time(t))),
        BoltValue::DateTime(dt) => tagged("DateTime", Value::String(format_offset_datetime(dt))),
        BoltValue::DateTimeZoneId(dt) => {
            tagged("DateTime", Value::String(format_zoned_datetime(dt)))
        }
        BoltValue::LocalDateTime(dt) => {
            tagged("LocalDateTime", Value::String(format_local_datetime(dt)))
        }
        BoltValue::Duration(d) => {
            let (tag, literal) = duration_literal(d);
            tagged(tag, Value::String(literal))
        }
        BoltValue::Point2D(p) => tagged("Point", point_value(p.srid, &[p.x, p.y])),
        BoltValue::Point3D(p) => tagged("Point", point_value(p.srid, &[p.x, p.y, p.z])),
    }
}

fn tagged(tag: &str, value: Value) -> Value {
    json!({ "$type": tag, "_value": value })
}

pub(crate) fn encode_map(map: &BoltDict) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

fn node_value(node: &BoltNode) -> Value {
    json!({
        "_labels": node.labels,
        "_props": Value::Object(encode_map(&node.properties)),
    })
}

fn relationship_value(rel_type: &str, properties: &BoltDict) -> Value {
    json!({
        "_type": rel_type,
        "_props": Value::Object(encode_map(properties)),
    })
}

/// Renders a point with its coordinates and CRS descriptor. The name and
/// registry link are filled from the fixed SRID table when known.
pub(crate) fn point_value(srid: i64, coordinates: &[f64]) -> Value {
    let mut crs = Map::new();
    crs.insert("srid".to_string(), Value::from(srid));
    if let Some((name, href)) = crs_for_srid(srid) {
        crs.insert("name".to_string(), Value::String(name.to_string()));
        crs.insert("type".to_string(), Value::String("link".to_string()));
        crs.insert(
            "properties".to_string(),
            json!({ "href": href, "type": "ogcwkt" }),
        );
    }
    json!({ "coordinates": coordinates, "crs": Value::Object(crs) })
}

fn duration_literal(d: &BoltDuration) -> (&'static str, String) {
    if d.days == 0 && d.seconds == 0 && d.nanoseconds == 0 && d.months != 0 {
        ("Period", format_period(d.months))
    } else if d.months == 0 && d.days == 0 {
        ("Duration", format_time_duration(d.seconds, d.nanoseconds))
    } else {
        (
            "Duration",
            format_raw_duration(d.months, d.days, d.seconds, d.nanoseconds),
        )
    }
}

fn time_of_day(nanoseconds: i64) -> Option<NaiveTime> {
    let secs = (nanoseconds / 1_000_000_000) as u32;
    let nanos = (nanoseconds % 1_000_000_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

pub(crate) fn format_local_time(t: &BoltLocalTime) -> String {
    match time_of_day(t.nanoseconds) {
        Some(time) => format!(
            "{}{}",
            time.format("%H:%M:%S"),
            fraction_suffix(time.nanosecond())
        ),
        None => String::new(),
    }
}

pub(crate) fn format_offset_time(t: &BoltTime) -> String {
    match time_of_day(t.nanoseconds) {
        Some(time) => format!(
            "{}{}{}",
            time.format("%H:%M:%S"),
            fraction_suffix(time.nanosecond()),
            format_utc_offset(t.tz_offset_seconds)
        ),
        None => String::new(),
    }
}

pub(crate) fn format_offset_datetime(dt: &BoltDateTime) -> String {
    let Some(instant) = DateTime::from_timestamp(dt.seconds, dt.nanoseconds as u32) else {
        return String::new();
    };
    let Some(offset) = FixedOffset::east_opt(dt.tz_offset_seconds as i32) else {
        return String::new();
    };
    let local = instant.with_timezone(&offset);
    format!(
        "{}{}{}",
        local.format("%Y-%m-%dT%H:%M:%S"),
        fraction_suffix(local.nanosecond()),
        format_utc_offset(dt.tz_offset_seconds)
    )
}

pub(crate) fn format_zoned_datetime(dt: &BoltDateTimeZoneId) -> String {
    let Some(instant) = DateTime::from_timestamp(dt.seconds, dt.nanoseconds as u32) else {
        return String::new();
    };
    match dt.tz_id.parse::<Tz>() {
        Ok(tz) => {
            let local = instant.with_timezone(&tz);
            format!(
                "{}{}{}[{}]",
                local.format("%Y-%m-%dT%H:%M:%S"),
                fraction_suffix(local.nanosecond()),
                format_utc_offset(local.offset().fix().local_minus_utc() as i64),
                dt.tz_id
            )
        }
        Err(_) => format!(
            "{}{}+00:00[{}]",
            instant.format("%Y-%m-%dT%H:%M:%S"),
            fraction_suffix(instant.nanosecond()),
            dt.tz_id
        ),
    }
}

pub(crate) fn format_local_datetime(dt: &BoltLocalDateTime) -> String {
    match DateTime::from_timestamp(dt.seconds, dt.nanoseconds as u32) {
        Some(instant) => format!(
            "{}{}",
            instant.naive_utc().format("%Y-%m-%dT%H:%M:%S"),
            fraction_suffix(instant.nanosecond())
        ),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_value;
    use boltr::types::{BoltDate, BoltPoint2D};
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(encode_value(&BoltValue::Null), json!(null));
        assert_eq!(encode_value(&BoltValue::Integer(7)), json!(7));
        assert_eq!(encode_value(&BoltValue::Float(1.25)), json!(1.25));
        assert_eq!(encode_value(&BoltValue::String("x".into())), json!("x"));
    }

    #[test]
    fn test_date_round_trip() {
        let wrapper = json!({"$type": "Date", "_value": "2022-10-31"});
        let decoded = decode_value(&wrapper).unwrap();
        assert_eq!(encode_value(&decoded), wrapper);
    }

    #[test]
    fn test_time_round_trips() {
        for wrapper in [
            json!({"$type": "Time", "_value": "10:15:30+01:00"}),
            json!({"$type": "LocalTime", "_value": "23:59:59"}),
            json!({"$type": "LocalDateTime", "_value": "2022-01-01T08:30:00"}),
            json!({"$type": "DateTime", "_value": "2022-06-01T12:00:00+02:00"}),
        ] {
            let decoded = decode_value(&wrapper).unwrap();
            assert_eq!(encode_value(&decoded), wrapper, "{wrapper}");
        }
    }

    #[test]
    fn test_zoned_datetime_round_trip() {
        let wrapper =
            json!({"$type": "DateTime", "_value": "2022-06-01T12:00:00+02:00[Europe/Berlin]"});
        let decoded = decode_value(&wrapper).unwrap();
        assert_eq!(encode_value(&decoded), wrapper);
    }

    #[test]
    fn test_duration_round_trips() {
        for wrapper in [
            json!({"$type": "Duration", "_value": "PT10S"}),
            json!({"$type": "Duration", "_value": "PT1H2M3S"}),
            json!({"$type": "Period", "_value": "P1Y2M"}),
            json!({"$type": "Byte[]", "_value": "deadbeef"}),
        ] {
            let decoded = decode_value(&wrapper).unwrap();
            assert_eq!(encode_value(&decoded), wrapper, "{wrapper}");
        }
    }

    #[test]
    fn test_mixed_duration_renders_raw_form() {
        let d = BoltValue::Duration(BoltDuration {
            months: 1,
            days: 2,
            seconds: 3,
            nanoseconds: 0,
        });
        assert_eq!(
            encode_value(&d),
            json!({"$type": "Duration", "_value": "P1M2DT3S"})
        );
    }

    #[test]
    fn test_point_renders_crs() {
        let p = BoltValue::Point2D(BoltPoint2D {
            srid: 4326,
            x: 1.0,
            y: 2.0,
        });
        let rendered = encode_value(&p);
        assert_eq!(rendered["$type"], "Point");
        assert_eq!(rendered["_value"]["coordinates"], json!([1.0, 2.0]));
        assert_eq!(rendered["_value"]["crs"]["srid"], json!(4326));
        assert_eq!(rendered["_value"]["crs"]["name"], json!("wgs-84"));
        assert!(rendered["_value"]["crs"]["properties"]["href"]
            .as_str()
            .unwrap()
            .contains("spatialreference.org"));
    }

    #[test]
    fn test_unknown_srid_has_no_name() {
        let p = BoltValue::Point2D(BoltPoint2D {
            srid: 1234,
            x: 0.0,
            y: 0.0,
        });
        let rendered = encode_value(&p);
        assert_eq!(rendered["_value"]["crs"]["srid"], json!(1234));
        assert!(rendered["_value"]["crs"].get("name").is_none());
    }

    #[test]
    fn test_node_wrapper_shape() {
        let mut props = BoltDict::new();
        props.insert("name".to_string(), BoltValue::String("World".into()));
        let node = BoltValue::Node(BoltNode {
            id: 1,
            labels: vec!["Hello".into()],
            properties: props,
            element_id: "1".into(),
        });
        let rendered = encode_value(&node);
        assert_eq!(rendered["$type"], "Node");
        assert_eq!(rendered["_value"]["_labels"], json!(["Hello"]));
        assert_eq!(rendered["_value"]["_props"]["name"], json!("World"));
    }

    #[test]
    fn test_date_of_epoch() {
        let d = BoltValue::Date(BoltDate { days: 0 });
        assert_eq!(
            encode_value(&d),
            json!({"$type": "Date", "_value": "1970-01-01"})
        );
    }
}
