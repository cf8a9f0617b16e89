//! Benchmark utilities.

#![warn(missing_docs)]

use kvbind_codec::Value;
use rand::Rng;

/// A random flat record with `fields` entries.
pub fn random_record(fields: usize) -> Value {
    let mut rng = rand::thread_rng();
    Value::map((0..fields).map(|i| {
        let value = match i % 3 {
            0 => Value::Integer(rng.gen()),
            1 => Value::Bool(rng.gen()),
            _ => Value::Text(format!("text-{}", rng.gen::<u32>())),
        };
        (format!("field_{i}"), value)
    }))
}

/// A nested value `depth` levels deep with `width` children per level.
pub fn nested_value(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::Text("leaf".into())
    } else {
        Value::map((0..width).map(|i| (format!("key_{i}"), nested_value(depth - 1, width))))
    }
}

/// A list of `len` random records.
pub fn random_list(len: usize, fields: usize) -> Vec<Value> {
    (0..len).map(|_| random_record(fields)).collect()
}
