//! Per-key codecs.
//!
//! A [`Codec<T>`] is the explicit `{encode, decode}` pair a caller attaches
//! to a binding. Nothing here inspects types at runtime: the caller either
//! supplies the two functions directly, or picks one of the ready-made
//! constructors ([`Codec::storable`], [`Codec::serde`]).

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

type EncodeFn<T> = dyn Fn(&T) -> CodecResult<Value> + Send + Sync;
type DecodeFn<T> = dyn Fn(&Value) -> CodecResult<T> + Send + Sync;

/// A pair of functions converting between `T` and [`Value`].
///
/// Codecs are cheap to clone; both halves are reference counted.
///
/// # Example
///
/// ```
/// use kvbind_codec::{Codec, CodecError, Value};
///
/// #[derive(Debug, PartialEq)]
/// struct Celsius(f64);
///
/// let codec = Codec::new(
///     |c: &Celsius| Ok(Value::Float(c.0)),
///     |v: &Value| {
///         v.as_float()
///             .map(Celsius)
///             .ok_or_else(|| CodecError::type_mismatch("float", v.kind()))
///     },
/// );
///
/// let stored = codec.encode(&Celsius(21.5)).unwrap();
/// assert_eq!(codec.decode(&stored).unwrap(), Celsius(21.5));
/// ```
pub struct Codec<T> {
    encode: Arc<EncodeFn<T>>,
    decode: Arc<DecodeFn<T>>,
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            encode: Arc::clone(&self.encode),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Codec<T> {
    /// Creates a codec from an encode and a decode function.
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> CodecResult<Value> + Send + Sync + 'static,
        D: Fn(&Value) -> CodecResult<T> + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// Converts a domain value into its storable form.
    pub fn encode(&self, value: &T) -> CodecResult<Value> {
        (self.encode)(value)
    }

    /// Converts a stored value back into the domain type.
    pub fn decode(&self, value: &Value) -> CodecResult<T> {
        (self.decode)(value)
    }
}

impl<T: Storable + 'static> Codec<T> {
    /// Codec backed by the type's [`Storable`] implementation.
    pub fn storable() -> Self {
        Self::new(T::to_value, T::from_value)
    }
}

impl<T: Serialize + DeserializeOwned + 'static> Codec<T> {
    /// Codec that goes through serde's JSON data model.
    pub fn serde() -> Self {
        Self::new(
            |v: &T| {
                let json = serde_json::to_value(v)
                    .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
                serde_json::from_value(json).map_err(|e| CodecError::encoding_failed(e.to_string()))
            },
            |v: &Value| {
                let json = serde_json::to_value(v)
                    .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
                serde_json::from_value(json).map_err(|e| CodecError::decoding_failed(e.to_string()))
            },
        )
    }
}

/// Types with a built-in conversion to and from [`Value`].
pub trait Storable: Sized {
    /// Converts `self` into its storable form.
    fn to_value(&self) -> CodecResult<Value>;

    /// Rebuilds `Self` from a stored value.
    fn from_value(value: &Value) -> CodecResult<Self>;
}

impl Storable for Value {
    fn to_value(&self) -> CodecResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        Ok(value.clone())
    }
}

impl Storable for bool {
    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_bool()
            .ok_or_else(|| CodecError::type_mismatch("bool", value.kind()))
    }
}

impl Storable for i64 {
    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::Integer(*self))
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_integer()
            .ok_or_else(|| CodecError::type_mismatch("integer", value.kind()))
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),*) => {$(
        impl Storable for $ty {
            fn to_value(&self) -> CodecResult<Value> {
                i64::try_from(*self)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::out_of_range(self, stringify!($ty)))
            }

            fn from_value(value: &Value) -> CodecResult<Self> {
                let n = i64::from_value(value)?;
                <$ty>::try_from(n).map_err(|_| CodecError::out_of_range(n, stringify!($ty)))
            }
        }
    )*};
}

narrow_integer!(i32, u32, u64, usize);

impl Storable for f64 {
    fn to_value(&self) -> CodecResult<Value> {
        if self.is_finite() {
            Ok(Value::Float(*self))
        } else {
            Err(CodecError::encoding_failed("non-finite float"))
        }
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_float()
            .ok_or_else(|| CodecError::type_mismatch("float", value.kind()))
    }
}

impl Storable for String {
    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| CodecError::type_mismatch("text", value.kind()))
    }
}

impl<T: Storable> Storable for Option<T> {
    fn to_value(&self) -> CodecResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T: Storable> Storable for Vec<T> {
    fn to_value(&self) -> CodecResult<Value> {
        self.iter()
            .map(Storable::to_value)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array)
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_array()
            .ok_or_else(|| CodecError::type_mismatch("array", value.kind()))?
            .iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: Storable + Ord> Storable for BTreeSet<T> {
    fn to_value(&self) -> CodecResult<Value> {
        self.iter()
            .map(Storable::to_value)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array)
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_array()
            .ok_or_else(|| CodecError::type_mismatch("array", value.kind()))?
            .iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: Storable> Storable for BTreeMap<String, T> {
    fn to_value(&self) -> CodecResult<Value> {
        self.iter()
            .map(|(k, v)| Ok((k.clone(), v.to_value()?)))
            .collect::<CodecResult<BTreeMap<_, _>>>()
            .map(Value::Map)
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_map()
            .ok_or_else(|| CodecError::type_mismatch("map", value.kind()))?
            .iter()
            .map(|(k, v)| Ok((k.clone(), T::from_value(v)?)))
            .collect()
    }
}

impl<T: Storable> Storable for HashMap<String, T> {
    fn to_value(&self) -> CodecResult<Value> {
        self.iter()
            .map(|(k, v)| Ok((k.clone(), v.to_value()?)))
            .collect::<CodecResult<BTreeMap<_, _>>>()
            .map(Value::Map)
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_map()
            .ok_or_else(|| CodecError::type_mismatch("map", value.kind()))?
            .iter()
            .map(|(k, v)| Ok((k.clone(), T::from_value(v)?)))
            .collect()
    }
}
