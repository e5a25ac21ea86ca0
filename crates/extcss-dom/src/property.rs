//! Script-visible own properties of elements.
//!
//! Page scripts may hang arbitrary values off element objects
//! (`el.adData = { slot: 3 }`). The graph is modelled with the value
//! categories a script can observe, including `undefined`, which JSON lacks.

use std::collections::BTreeMap;
use std::fmt;

/// Own properties of one object, keyed by property name.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A script value stored as an own property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Any number, including `NaN`.
    Number(f64),
    /// A string.
    String(String),
    /// A plain object with its own properties.
    Object(PropertyMap),
}

impl PropertyValue {
    /// Own properties when this value is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Strict equality (`===`) on primitives; objects never compare equal
    /// here since identity is not modelled.
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            // NaN === NaN is false in scripts; the matcher handles NaN separately.
            #[allow(clippy::float_cmp)]
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            _ => false,
        }
    }
}

/// `String(value)` as a script would produce it.
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Object(_) => f.write_str("[object Object]"),
        }
    }
}

/// Number-to-string in the shape scripts print it: integral values without a
/// fractional part, `NaN`, and `Infinity`.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), Self::from(item)))
                    .collect(),
            ),
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Self::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_scripts() {
        assert_eq!(PropertyValue::Number(3.0).to_string(), "3");
        assert_eq!(PropertyValue::Number(0.5).to_string(), "0.5");
        assert_eq!(PropertyValue::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(PropertyValue::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    }

    #[test]
    fn converts_nested_json() {
        let value = PropertyValue::from(serde_json::json!({ "inner": null, "n": 1 }));
        let map = value.as_object().unwrap();
        assert_eq!(map.get("inner"), Some(&PropertyValue::Null));
        assert_eq!(map.get("n"), Some(&PropertyValue::Number(1.0)));
    }
}
