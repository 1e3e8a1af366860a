//! Property-based tests for the bulk record codec.
//!
//! Checks the two round-trip laws over generated JSON records:
//! decoding an encoded batch gives back the same records in the same order,
//! and re-encoding decoded canonical text reproduces it byte for byte.

use prism_client::codec::{decode, encode};
use proptest::prelude::*;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        ".{0,12}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-z_]{1,8}", inner), 0..4).prop_map(|pairs| {
                Value::Object(pairs.into_iter().collect::<Map<String, Value>>())
            }),
        ]
    })
}

fn record() -> impl Strategy<Value = Value> {
    prop::collection::vec(("[a-z_]{1,8}", json_value()), 0..5)
        .prop_map(|pairs| Value::Object(pairs.into_iter().collect::<Map<String, Value>>()))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn decode_encode_preserves_records(records in prop::collection::vec(record(), 0..20)) {
        let text = encode(&records).unwrap();
        let decoded: Vec<Value> = decode(&text).unwrap();
        prop_assert_eq!(decoded, records);
    }

    #[test]
    fn encode_decode_preserves_text(records in prop::collection::vec(record(), 1..20)) {
        let text = encode(&records).unwrap();
        let decoded: Vec<Value> = decode(&text).unwrap();
        prop_assert_eq!(encode(&decoded).unwrap(), text);
    }

    #[test]
    fn one_line_per_record(records in prop::collection::vec(record(), 1..20)) {
        let text = encode(&records).unwrap();
        prop_assert_eq!(text.split('\n').count(), records.len());
    }
}
