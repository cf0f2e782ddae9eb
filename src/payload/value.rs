//! Canonical payload tree.
//!
//! # Responsibilities
//! - Represent any JSON or YAML document as one tagged value type
//! - Keep integers and floats apart so `2` never turns into `2.0`
//! - Preserve mapping insertion order for display, ignore it for equality
//!
//! # Design Decisions
//! - Non-finite floats are refused in both directions (the wire is JSON)
//! - Integers must fit in `i64`; anything larger is a format error
//! - Scalar YAML keys are stringified, composite or null keys are rejected

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// A format-agnostic document value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Payload>),
    Mapping(Mapping),
}

impl Payload {
    /// Short type name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Null => "null",
            Payload::Bool(_) => "boolean",
            Payload::Integer(_) => "integer",
            Payload::Float(_) => "float",
            Payload::String(_) => "string",
            Payload::Sequence(_) => "sequence",
            Payload::Mapping(_) => "mapping",
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Payload::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_mapping(self) -> Result<Mapping, Payload> {
        match self {
            Payload::Mapping(m) => Ok(m),
            other => Err(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        self.as_mapping().and_then(|m| m.get(key))
    }
}

impl From<Mapping> for Payload {
    fn from(m: Mapping) -> Self {
        Payload::Mapping(m)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::String(s)
    }
}

impl From<i64> for Payload {
    fn from(n: i64) -> Self {
        Payload::Integer(n)
    }
}

impl From<f64> for Payload {
    fn from(n: f64) -> Self {
        Payload::Float(n)
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Payload::Bool(b)
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(items: Vec<Payload>) -> Self {
        Payload::Sequence(items)
    }
}

/// Ordered string-keyed map.
///
/// Lookups are linear; request payloads are small and the order matters more
/// than asymptotics here.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<(String, Payload)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a value. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Payload>) -> Option<Payload> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Payload> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Payload> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Payload)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Payload);
    type IntoIter = std::vec::IntoIter<(String, Payload)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Payload>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Mapping::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

// --- serde: Serialize ---

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Null => serializer.serialize_unit(),
            Payload::Bool(b) => serializer.serialize_bool(*b),
            Payload::Integer(n) => serializer.serialize_i64(*n),
            Payload::Float(f) if !f.is_finite() => {
                Err(ser::Error::custom("non-finite numbers cannot be represented"))
            }
            Payload::Float(f) => serializer.serialize_f64(*f),
            Payload::String(s) => serializer.serialize_str(s),
            Payload::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Payload::Mapping(m) => m.serialize(serializer),
        }
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// --- serde: Deserialize ---

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = Payload;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON or YAML value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Payload, E> {
        Ok(Payload::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Payload, E> {
        Ok(Payload::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Payload, E> {
        i64::try_from(v)
            .map(Payload::Integer)
            .map_err(|_| E::custom(format!("integer {} is out of range", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Payload, E> {
        if v.is_finite() {
            Ok(Payload::Float(v))
        } else {
            Err(E::custom("non-finite numbers are not supported"))
        }
    }

    fn visit_str<E>(self, v: &str) -> Result<Payload, E> {
        Ok(Payload::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Payload, E> {
        Ok(Payload::String(v))
    }

    fn visit_unit<E>(self) -> Result<Payload, E> {
        Ok(Payload::Null)
    }

    fn visit_none<E>(self) -> Result<Payload, E> {
        Ok(Payload::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Payload, D::Error> {
        Deserialize::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Payload, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Payload::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Payload, A::Error> {
        let mut mapping = Mapping::new();
        while let Some(MapKey(key)) = map.next_key()? {
            let value: Payload = map.next_value()?;
            mapping.insert(key, value);
        }
        Ok(Payload::Mapping(mapping))
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PayloadVisitor)
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Payload::deserialize(deserializer)? {
            Payload::Mapping(m) => Ok(m),
            other => Err(de::Error::custom(format!(
                "expected a mapping, found {}",
                other.type_name()
            ))),
        }
    }
}

/// Mapping key accepting strings and stringifiable scalars.
struct MapKey(String);

struct MapKeyVisitor;

impl Visitor<'_> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string or scalar mapping key")
    }

    fn visit_str<E>(self, v: &str) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<MapKey, E> {
        Ok(MapKey(v))
    }

    fn visit_bool<E>(self, v: bool) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_i64<E>(self, v: i64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
        if v.is_finite() {
            Ok(MapKey(v.to_string()))
        } else {
            Err(E::custom("non-finite mapping keys are not supported"))
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<MapKey, E> {
        Err(E::custom("null mapping keys are not supported"))
    }
}

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

// --- explicit bridges to serde_json::Value ---

impl From<Payload> for serde_json::Value {
    fn from(p: Payload) -> Self {
        match p {
            Payload::Null => serde_json::Value::Null,
            Payload::Bool(b) => serde_json::Value::Bool(b),
            Payload::Integer(n) => serde_json::Value::from(n),
            Payload::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Payload::String(s) => serde_json::Value::String(s),
            Payload::Sequence(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Payload::Mapping(m) => serde_json::Value::Object(
                m.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

/// Error converting a `serde_json::Value` that has no payload equivalent.
#[derive(Debug, thiserror::Error)]
#[error("value has no payload representation: {0}")]
pub struct ConversionError(String);

impl TryFrom<serde_json::Value> for Payload {
    type Error = ConversionError;

    fn try_from(v: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match v {
            serde_json::Value::Null => Payload::Null,
            serde_json::Value::Bool(b) => Payload::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Payload::Integer(i)
                } else if n.is_u64() {
                    return Err(ConversionError(format!("integer {} is out of range", n)));
                } else {
                    let f = n
                        .as_f64()
                        .ok_or_else(|| ConversionError(format!("number {}", n)))?;
                    Payload::Float(f)
                }
            }
            serde_json::Value::String(s) => Payload::String(s),
            serde_json::Value::Array(items) => Payload::Sequence(
                items
                    .into_iter()
                    .map(Payload::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(obj) => {
                let mut m = Mapping::new();
                for (k, v) in obj {
                    m.insert(k, Payload::try_from(v)?);
                }
                Payload::Mapping(m)
            }
        })
    }
}

impl Payload {
    /// Convert any serializable record into a payload.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Payload, ConversionError> {
        let json = serde_json::to_value(value).map_err(|e| ConversionError(e.to_string()))?;
        Payload::try_from(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_equality_ignores_order() {
        let a: Mapping = [("x", Payload::Integer(1)), ("y", Payload::Bool(true))]
            .into_iter()
            .collect();
        let b: Mapping = [("y", Payload::Bool(true)), ("x", Payload::Integer(1))]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(b.keys().collect::<Vec<_>>(), vec!["y", "x"]);
    }

    #[test]
    fn test_integer_and_float_are_distinct() {
        assert_ne!(Payload::Integer(2), Payload::Float(2.0));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut m = Mapping::new();
        m.insert("a", 1i64);
        m.insert("b", 2i64);
        let prev = m.insert("a", 3i64);
        assert_eq!(prev, Some(Payload::Integer(1)));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(m.get("a"), Some(&Payload::Integer(3)));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut m: Mapping = [("a", 1i64), ("b", 2i64), ("c", 3i64)].into_iter().collect();
        assert_eq!(m.remove("b"), Some(Payload::Integer(2)));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(m.remove("missing"), None);
    }

    #[test]
    fn test_json_value_bridge() {
        let json = serde_json::json!({"a": 1, "b": [1.5, null, "s"], "c": {"d": false}});
        let payload = Payload::try_from(json.clone()).unwrap();
        assert_eq!(payload.get("a"), Some(&Payload::Integer(1)));
        let back: serde_json::Value = payload.into();
        assert_eq!(back, json);
    }

    #[test]
    fn test_json_value_bridge_rejects_huge_unsigned() {
        let json = serde_json::json!(u64::MAX);
        assert!(Payload::try_from(json).is_err());
    }

    #[test]
    fn test_serialize_rejects_non_finite() {
        assert!(serde_json::to_vec(&Payload::Float(f64::INFINITY)).is_err());
    }
}
