//! Flat scalar attribute maps attached to store nodes.

use std::collections::BTreeMap;
use std::fmt;

/// A scalar attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Attribute map of a group or dataset.
pub type Attributes = BTreeMap<String, AttrValue>;

impl AttrValue {
    /// Text content, if this is a text attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
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
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// Build an [`Attributes`] map from `key => value` pairs.
///
/// ```
/// let meta = smcontainer::attrs! { "units" => "g", "digits" => 4 };
/// assert_eq!(meta.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => { $crate::store::Attributes::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::store::Attributes::new();
        $( map.insert(($key).to_string(), $crate::store::AttrValue::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let attrs = crate::attrs! { "a" => 1i64, "b" => 1.5f64, "c" => "x" };
        assert_eq!(attrs["a"].as_i64(), Some(1));
        assert_eq!(attrs["a"].as_f64(), Some(1.0));
        assert_eq!(attrs["b"].as_i64(), None);
        assert_eq!(attrs["c"].as_str(), Some("x"));
    }

    #[test]
    fn test_display() {
        assert_eq!(AttrValue::from("g").to_string(), "\"g\"");
        assert_eq!(AttrValue::Bytes(vec![1, 2]).to_string(), "<2 bytes>");
    }
}
