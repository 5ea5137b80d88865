//! The Value type - a dynamically shaped tree of leaves and branches.
//!
//! `Value` is what a tree looks like when you don't have a Rust type for it.
//! It serializes and deserializes through serde like any other type, so it
//! can be encoded into a tree or decoded from one directly.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::scalar::{RawValue, Scalar};

/// A structured value.
///
/// # Design Notes
///
/// - `Keyed` keeps insertion order so a value encodes in the order it was
///   built; names are unique within one level.
/// - `Null` is absence: it encodes to no filesystem entry at all.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A leaf.
    Scalar(Scalar),
    /// Named fields, in order.
    Keyed(Vec<(String, Value)>),
    /// Ordered elements.
    Sequence(Vec<Value>),
}

impl Value {
    /// Create an empty keyed value.
    pub fn keyed() -> Self {
        Value::Keyed(Vec::new())
    }

    /// Create an empty sequence.
    pub fn sequence() -> Self {
        Value::Sequence(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, Value::Keyed(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Get a child by field name or decimal index.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Keyed(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Value::Sequence(items) => items.get(key.parse::<usize>().ok()?),
            _ => None,
        }
    }

    /// Follow a chain of field names and indices.
    ///
    /// Returns `None` if any step doesn't exist or can't be navigated
    /// (e.g., indexing into a leaf).
    pub fn pointer<'a, I>(&self, keys: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self;
        for key in keys {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// Set field `key`, replacing an existing field of that name in place.
    ///
    /// A `Null` value becomes an empty keyed value first. Returns the
    /// replaced value, if any.
    ///
    /// # Panics
    ///
    /// Panics if the value is neither `Null` nor `Keyed`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        if self.is_null() {
            *self = Value::keyed();
        }
        let Value::Keyed(fields) = self else {
            panic!("insert on a non-keyed value");
        };
        let key = key.into();
        match fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                fields.push((key, value));
                None
            }
        }
    }

    /// Append an element. A `Null` value becomes an empty sequence first.
    ///
    /// # Panics
    ///
    /// Panics if the value is neither `Null` nor `Sequence`.
    pub fn push(&mut self, value: Value) {
        if self.is_null() {
            *self = Value::sequence();
        }
        let Value::Sequence(items) = self else {
            panic!("push on a non-sequence value");
        };
        items.push(value);
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Scalar(scalar) => scalar.serialize(serializer),
            Value::Keyed(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Text(s) => serializer.serialize_str(s),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Float32(f) => serializer.serialize_f32(*f),
            Scalar::Constant(RawValue::Integer(i)) => serializer.serialize_i64(*i),
            Scalar::Timestamp(_)
            | Scalar::Locator(_)
            | Scalar::Identifier(_)
            | Scalar::Constant(RawValue::Text(_)) => serializer.serialize_str(&self.render()),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a leaf, a keyed value or a sequence")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        // Beyond i64, keep the digits rather than lose precision.
        Ok(match i64::try_from(v) {
            Ok(i) => Value::from(i),
            Err(_) => Value::from(v.to_string()),
        })
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Float32(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut value = Value::keyed();
        while let Some((k, v)) = map.next_entry::<String, Value>()? {
            value.insert(k, v);
        }
        Ok(value)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

// Conversion from common types

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Scalar(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Integer(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Scalar(Scalar::Integer(v as i64))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(Scalar::Text(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Text(v.to_string()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
