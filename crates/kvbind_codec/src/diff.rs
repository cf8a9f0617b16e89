//! Deep structural equality engine.
//!
//! A single implementation shared by the gateway, the binding engine and
//! the notification bus. It decides whether a write or an observable
//! update would actually change anything.

use crate::value::Value;

/// Returns true if `a` and `b` are structurally different.
///
/// - the same reference is never different
/// - null vs null is never different, null vs anything else always is
/// - sequences differ on length or on any element, recursively
/// - mappings differ on key sets or on any value, recursively
/// - numbers compare numerically, so `Integer(5)` equals `Float(5.0)`
/// - everything else uses primitive equality
pub fn is_different(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return false;
    }

    match (a, b) {
        (Value::Null, Value::Null) => false,
        (Value::Null, _) | (_, Value::Null) => true,
        (Value::Array(x), Value::Array(y)) => {
            x.len() != y.len() || x.iter().zip(y).any(|(l, r)| is_different(l, r))
        }
        (Value::Map(x), Value::Map(y)) => {
            if x.len() != y.len() {
                return true;
            }
            x.iter().any(|(k, l)| match y.get(k) {
                Some(r) => is_different(l, r),
                None => true,
            })
        }
        (Value::Integer(x), Value::Integer(y)) => x != y,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            a.as_float() != b.as_float()
        }
        (Value::Bool(x), Value::Bool(y)) => x != y,
        (Value::Text(x), Value::Text(y)) => x != y,
        _ => true,
    }
}

/// Like [`is_different`] but for optional values, where `None` behaves as null.
pub fn is_different_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => false,
        (Some(x), Some(y)) => is_different(x, y),
        (Some(v), None) | (None, Some(v)) => !v.is_null(),
    }
}
