//! Property-based test generators using proptest.

use kvbind_codec::Value;
use proptest::prelude::*;

/// Strategy for store keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,15}").expect("Invalid regex")
}

/// Strategy for leaf values: null, bool, integer, finite float, text.
pub fn leaf_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12f64..1.0e12).prop_map(Value::Float),
        ".{0,24}".prop_map(Value::Text),
    ]
}

/// Strategy for arbitrary values up to a few levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_value_strategy().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6).prop_map(Value::Map),
        ]
    })
}

/// Strategy for a batch of distinct keys with values.
pub fn entries_strategy(max: usize) -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..max)
        .prop_map(|m| m.into_iter().collect())
}
