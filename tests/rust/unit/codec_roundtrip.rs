//! Round-trip properties of the JSON ↔ Cypher codec.
//!
//! Decoding a parameter and re-encoding the result must reproduce the
//! original JSON for primitives and for every string-literal wrapper tag;
//! decoding an encoded Bolt value must reproduce the value.

use serde_json::{json, Value};
use test_case::test_case;

use boltgate::codec::{decode_value, encode_value};
use boltgate::errors::GatewayError;
use boltr::types::{BoltDict, BoltDuration, BoltNode, BoltValue};

#[test_case(json!(null); "null")]
#[test_case(json!(true); "boolean")]
#[test_case(json!(42); "integer")]
#[test_case(json!(-9007199254740993i64); "large integer")]
#[test_case(json!(1.5); "float")]
#[test_case(json!("hello"); "string")]
fn primitive_round_trip(value: Value) {
    let decoded = decode_value(&value).unwrap();
    assert_eq!(encode_value(&decoded), value);
}

#[test_case(json!({"$type": "Date", "_value": "2022-10-31"}); "date")]
#[test_case(json!({"$type": "Time", "_value": "10:15:30+01:00"}); "time")]
#[test_case(json!({"$type": "LocalTime", "_value": "10:15:30"}); "local time")]
#[test_case(json!({"$type": "LocalTime", "_value": "10:15:30.5"}); "local time with fraction")]
#[test_case(json!({"$type": "DateTime", "_value": "2022-10-31T10:15:30+01:00"}); "datetime")]
#[test_case(json!({"$type": "DateTime", "_value": "2022-10-31T10:15:30+01:00[Europe/Berlin]"}); "zoned datetime")]
#[test_case(json!({"$type": "LocalDateTime", "_value": "2022-10-31T10:15:30"}); "local datetime")]
#[test_case(json!({"$type": "Duration", "_value": "PT10S"}); "duration")]
#[test_case(json!({"$type": "Duration", "_value": "PT1H2M3S"}); "composite duration")]
#[test_case(json!({"$type": "Period", "_value": "P1Y2M"}); "period")]
#[test_case(json!({"$type": "Byte[]", "_value": "deadbeef"}); "bytes")]
fn wrapper_round_trip(value: Value) {
    let decoded = decode_value(&value).unwrap();
    assert_eq!(encode_value(&decoded), value);
}

#[test]
fn containers_round_trip() {
    let value = json!({
        "list": [1, 2.5, "three", null],
        "nested": {"inner": [{"$type": "Date", "_value": "2000-02-29"}]},
    });
    let decoded = decode_value(&value).unwrap();
    assert_eq!(encode_value(&decoded), value);
}

#[test]
fn bolt_values_survive_encode_decode() {
    let mut dict = BoltDict::new();
    dict.insert("n".to_string(), BoltValue::Integer(5));
    let values = [
        BoltValue::Null,
        BoltValue::Boolean(false),
        BoltValue::Integer(i64::MIN),
        BoltValue::Float(-0.25),
        BoltValue::String("text".into()),
        BoltValue::Bytes(vec![0, 255, 16]),
        BoltValue::List(vec![BoltValue::Integer(1), BoltValue::String("x".into())]),
        BoltValue::Dict(dict),
        BoltValue::Duration(BoltDuration {
            months: 0,
            days: 0,
            seconds: 90,
            nanoseconds: 0,
        }),
    ];
    for value in values {
        let encoded = encode_value(&value);
        let decoded = decode_value(&encoded).unwrap();
        assert_eq!(decoded, value, "{encoded}");
    }
}

#[test]
fn tagged_date_parameter_equals_response_value() {
    // The S4 scenario: a Date parameter sent in, echoed back unchanged.
    let parameter = json!({"$type": "Date", "_value": "2022-10-31"});
    let bolt = decode_value(&parameter).unwrap();
    assert!(matches!(bolt, BoltValue::Date(_)));
    assert_eq!(encode_value(&bolt), parameter);
}

#[test]
fn non_string_wrapper_value_is_rejected_with_explanation() {
    // The S5 scenario: a boolean where the literal string belongs.
    let err = decode_value(&json!({"$type": "Date", "_value": true})).unwrap_err();
    match err {
        GatewayError::InvalidParameter(message) => {
            assert!(message.contains("Value true"), "{message}");
            assert!(message.contains("has to be String-based"), "{message}");
        }
        other => panic!("expected invalid parameter, got {other:?}"),
    }
}

#[test]
fn malformed_literals_are_rejected() {
    for wrapper in [
        json!({"$type": "Date", "_value": "31-10-2022"}),
        json!({"$type": "Time", "_value": "10:15:30"}), // offset missing
        json!({"$type": "Duration", "_value": "ten seconds"}),
        json!({"$type": "Point", "_value": "POINT(1 2)"}), // SRID missing
        json!({"$type": "Byte[]", "_value": "xyz"}),
        json!({"$type": "Byte[]", "_value": "abc"}), // odd length
    ] {
        assert!(
            matches!(
                decode_value(&wrapper),
                Err(GatewayError::InvalidParameter(_))
            ),
            "{wrapper}"
        );
    }
}

#[test]
fn point_decodes_wkt_and_encodes_crs() {
    let wrapper = json!({"$type": "Point", "_value": "SRID=4326;POINT(2.3 48.8)"});
    let decoded = decode_value(&wrapper).unwrap();
    let rendered = encode_value(&decoded);
    assert_eq!(rendered["$type"], "Point");
    assert_eq!(rendered["_value"]["coordinates"], json!([2.3, 48.8]));
    assert_eq!(rendered["_value"]["crs"]["name"], json!("wgs-84"));

    let wrapper = json!({"$type": "Point", "_value": "SRID=9157;POINT(1 2 3)"});
    let decoded = decode_value(&wrapper).unwrap();
    let rendered = encode_value(&decoded);
    assert_eq!(rendered["_value"]["coordinates"], json!([1.0, 2.0, 3.0]));
    assert_eq!(rendered["_value"]["crs"]["name"], json!("cartesian-3d"));
}

#[test]
fn node_renders_labels_and_props() {
    let mut props = BoltDict::new();
    props.insert("name".to_string(), BoltValue::String("World".into()));
    let node = BoltValue::Node(BoltNode {
        id: 0,
        labels: vec!["Hello".into()],
        properties: props,
        element_id: "0".into(),
    });
    let rendered = encode_value(&node);
    assert_eq!(
        rendered,
        json!({"$type": "Node", "_value": {"_labels": ["Hello"], "_props": {"name": "World"}}})
    );
}
