//! Dictionary values and their JSON encoding.
//!
//! JSON has no bytes or datetime type, so those two are written as
//! single-key wrapper objects:
//!
//! ```text
//! Bytes(…)      {"$bytes": "<lowercase hex>"}
//! Timestamp(…)  {"$timestamp": "<RFC 3339, UTC>"}
//! ```
//!
//! A mapping whose only key is one of those tags would read back as the
//! wrapped scalar, so [`Value::validate`] rejects it.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::util::{Error, Result};

/// Wrapper key for byte strings.
pub const BYTES_TAG: &str = "$bytes";

/// Wrapper key for timestamps.
pub const TIMESTAMP_TAG: &str = "$timestamp";

/// String-keyed mapping of values; the type of every dictionary entry.
pub type Mapping = BTreeMap<String, Value>;

/// A value that can be stored inside a dictionary entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Convert any serializable value.
    ///
    /// Goes through `serde_json`, so the result never holds bytes or
    /// timestamps; `Serialize` impls that produce non-finite floats are
    /// caught later by [`Value::validate`]. Unsigned integers above
    /// `i64::MAX` fail with `InvalidValueType`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)?;
        check_integer_range(&json, "")?;
        Ok(Self::from(json))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value; integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_mapping(self) -> Option<Mapping> {
        match self {
            Self::Mapping(v) => Some(v),
            _ => None,
        }
    }

    /// Look up `key` when this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Check that this value can be written and read back unchanged.
    ///
    /// `path` names this value in the error; nested values extend it.
    pub fn validate(&self, path: &str) -> Result<()> {
        match self {
            Self::Float(v) if !v.is_finite() => {
                Err(Error::invalid_value(path, format!("non-finite float {}", v)))
            }
            Self::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.validate(&format!("{}[{}]", path, i))?;
                }
                Ok(())
            }
            Self::Mapping(map) => validate_mapping(map, path),
            _ => Ok(()),
        }
    }

    /// Encode as JSON. Call [`Value::validate`] first.
    pub fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Self::Null => Json::Null,
            Self::Bool(v) => Json::Bool(*v),
            Self::Int(v) => Json::Number(Number::from(*v)),
            Self::Float(v) => Json::Number(
                Number::from_f64(*v).ok_or_else(|| Error::invalid_value("", format!("non-finite float {}", v)))?,
            ),
            Self::Text(v) => Json::String(v.clone()),
            Self::Bytes(v) => tagged(BYTES_TAG, hex::encode(v)),
            Self::Timestamp(v) => tagged(TIMESTAMP_TAG, format_timestamp(v)),
            Self::Sequence(items) => Json::Array(items.iter().map(Value::to_json).collect::<Result<_>>()?),
            Self::Mapping(map) => Json::Object(mapping_to_json(map)?),
        })
    }

    /// Decode JSON written by [`Value::to_json`], unwrapping tagged scalars.
    pub fn from_tagged_json(json: Json) -> Result<Self> {
        Ok(match json {
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some(Json::String(s)) = map.get(BYTES_TAG) {
                        let bytes = hex::decode(s).map_err(|e| Error::corrupt(format!("{}: {}", BYTES_TAG, e)))?;
                        return Ok(Self::Bytes(bytes));
                    }
                    if let Some(Json::String(s)) = map.get(TIMESTAMP_TAG) {
                        return Ok(Self::Timestamp(parse_timestamp(s)?));
                    }
                }
                let mut out = Mapping::new();
                for (k, v) in map {
                    out.insert(k, Self::from_tagged_json(v)?);
                }
                Self::Mapping(out)
            }
            Json::Array(items) => Self::Sequence(
                items.into_iter().map(Self::from_tagged_json).collect::<Result<_>>()?,
            ),
            other => Self::from(other),
        })
    }
}

fn check_integer_range(json: &Json, path: &str) -> Result<()> {
    match json {
        Json::Number(n) if n.is_u64() && n.as_i64().is_none() => {
            Err(Error::invalid_value(path, format!("integer {} exceeds i64", n)))
        }
        Json::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_integer_range(item, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        Json::Object(map) => {
            for (key, value) in map {
                let child = if path.is_empty() { key.clone() } else { format!("{}.{}", path, key) };
                check_integer_range(value, &child)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_mapping(map: &Mapping, path: &str) -> Result<()> {
    if map.len() == 1 && (map.contains_key(BYTES_TAG) || map.contains_key(TIMESTAMP_TAG)) {
        let key = map.keys().next().map(String::as_str).unwrap_or_default();
        return Err(Error::invalid_value(
            path,
            format!("single-key mapping uses reserved key {:?}", key),
        ));
    }
    for (key, value) in map {
        let child = if path.is_empty() { key.clone() } else { format!("{}.{}", path, key) };
        value.validate(&child)?;
    }
    Ok(())
}

/// Check every value of a top-level mapping.
pub fn validate_mapping_root(map: &Mapping) -> Result<()> {
    validate_mapping(map, "")
}

pub(crate) fn mapping_to_json(map: &Mapping) -> Result<JsonMap<String, Json>> {
    let mut out = JsonMap::new();
    for (k, v) in map {
        out.insert(k.clone(), v.to_json()?);
    }
    Ok(out)
}

fn tagged(tag: &str, body: String) -> Json {
    let mut map = JsonMap::new();
    map.insert(tag.to_string(), Json::String(body));
    Json::Object(map)
}

/// RFC 3339 in UTC with as many fractional digits as the instant needs.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::corrupt(format!("timestamp {:?}: {}", s, e)))
}

/// Plain JSON conversion: objects stay mappings even if they look tagged.
impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(v) => Self::Bool(v),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::Text(s),
            Json::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Sequence(v)
    }
}

impl From<Mapping> for Value {
    fn from(v: Mapping) -> Self {
        Self::Mapping(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Build a [`Mapping`] from `key => value` pairs.
#[macro_export]
macro_rules! mapping {
    () => { $crate::container::Mapping::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::container::Mapping::new();
        $( map.insert(($key).to_string(), $crate::container::Value::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn roundtrip(value: &Value) -> Value {
        let text = serde_json::to_string(&value.to_json().unwrap()).unwrap();
        Value::from_tagged_json(serde_json::from_str(&text).unwrap()).unwrap()
    }

    #[test]
    fn test_every_variant_roundtrips() {
        let ts = Utc.with_ymd_and_hms(2019, 7, 6, 3, 19, 53).unwrap()
            + chrono::Duration::microseconds(40_000);
        let value = Value::Mapping(crate::mapping! {
            "null" => Value::Null,
            "bool" => true,
            "int" => -42i64,
            "float" => 1.0f64,
            "text" => "Ridgecrest",
            "bytes" => vec![0u8, 1, 254, 255],
            "time" => ts,
            "seq" => vec![Value::Int(1), Value::Float(2.5), Value::Null],
            "nested" => crate::mapping! { "depth" => 8.0f64 },
        });
        let back = roundtrip(&value);
        assert_eq!(back, value);
        assert_eq!(back.get("float"), Some(&Value::Float(1.0)));
        assert_eq!(back.get("int"), Some(&Value::Int(-42)));
    }

    #[test]
    fn test_nanosecond_timestamp_survives() {
        let ts = Utc.timestamp_opt(1_562_383_193, 123_456_789).unwrap();
        assert_eq!(roundtrip(&Value::Timestamp(ts)), Value::Timestamp(ts));
    }

    #[test]
    fn test_validate_rejects_nan_with_path() {
        let value = Value::Mapping(crate::mapping! {
            "event" => crate::mapping! { "mags" => vec![Value::Float(5.0), Value::Float(f64::NAN)] },
        });
        match value.validate("") {
            Err(Error::InvalidValueType { path, .. }) => assert_eq!(path, "event.mags[1]"),
            other => panic!("expected InvalidValueType, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_reserved_single_key() {
        let value = Value::Mapping(crate::mapping! { BYTES_TAG => "00" });
        assert!(matches!(value.validate(""), Err(Error::InvalidValueType { .. })));

        let ok = Value::Mapping(crate::mapping! { BYTES_TAG => "00", "other" => 1i64 });
        assert!(ok.validate("").is_ok());
        assert_eq!(roundtrip(&ok), ok);
    }

    #[test]
    fn test_plain_json_conversion() {
        let json: Json = serde_json::json!({"a": [1, 2.5, "x", null], "b": {"$bytes": "zz"}});
        let value = Value::from(json);
        assert_eq!(value.get("a").and_then(Value::as_sequence).map(<[Value]>::len), Some(4));
        assert!(value.get("b").and_then(Value::as_mapping).is_some());
    }

    #[test]
    fn test_bad_tagged_payload_is_corrupt() {
        let json: Json = serde_json::json!({"$timestamp": "yesterday"});
        assert!(matches!(Value::from_tagged_json(json), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Station {
            code: &'static str,
            lat: f64,
            channels: u32,
        }
        let value = Value::from_serialize(&Station { code: "PAS", lat: 34.148, channels: 3 }).unwrap();
        assert_eq!(value.get("code").and_then(Value::as_str), Some("PAS"));
        assert_eq!(value.get("channels"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_from_serialize_rejects_unsigned_overflow() {
        #[derive(Serialize)]
        struct Counter {
            name: &'static str,
            samples: Vec<u64>,
        }
        let big = Counter { name: "npts", samples: vec![i64::MAX as u64, u64::MAX] };
        match Value::from_serialize(&big) {
            Err(Error::InvalidValueType { path, .. }) => assert_eq!(path, "samples[1]"),
            other => panic!("expected InvalidValueType, got {:?}", other),
        }

        let fits = Counter { name: "npts", samples: vec![i64::MAX as u64] };
        let value = Value::from_serialize(&fits).unwrap();
        assert_eq!(value.get("samples"), Some(&Value::Sequence(vec![Value::Int(i64::MAX)])));
    }
}
