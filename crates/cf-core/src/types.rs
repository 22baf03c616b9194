//! Common data types for CalibFit

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric cell (integers are stored as `f64`)
    Number(f64),
    /// Text cell
    Text(String),
    /// Missing cell
    #[default]
    Null,
}

impl Value {
    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric payload, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    /// Text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Hashable, totally ordered key for grouping and joins.
    pub fn key(&self) -> ValueKey {
        match self {
            // -0.0 and 0.0 must land in the same group.
            Value::Number(x) if *x == 0.0 => ValueKey::Number(0u64),
            Value::Number(x) => ValueKey::Number(x.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Null => ValueKey::Null,
        }
    }

    /// Parse a raw text cell: empty → `Null`, numeric → `Number`, else `Text`.
    pub fn parse_cell(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(x) if x.is_nan() => Value::Null,
            Ok(x) => Value::Number(x),
            Err(_) => Value::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{}", *x as i64),
            Value::Number(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Null => f.write_str("null"),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        if x.is_nan() { Value::Null } else { Value::Number(x) }
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Number(x as f64)
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Self {
        Value::Number(x as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Grouping key derived from a [`Value`].
///
/// Numbers compare by bit pattern, which is exact for the integral years and
/// identifiers used as stratifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    /// Missing cell
    Null,
    /// `f64::to_bits` of a numeric cell
    Number(u64),
    /// Text cell
    Text(String),
}

impl ValueKey {
    /// Recover the cell this key was built from.
    pub fn to_value(&self) -> Value {
        match self {
            ValueKey::Null => Value::Null,
            ValueKey::Number(bits) => Value::Number(f64::from_bits(*bits)),
            ValueKey::Text(s) => Value::Text(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        assert_eq!(Value::parse_cell(""), Value::Null);
        assert_eq!(Value::parse_cell("2010"), Value::Number(2010.0));
        assert_eq!(Value::parse_cell("0.25"), Value::Number(0.25));
        assert_eq!(Value::parse_cell("[0:5)"), Value::Text("[0:5)".into()));
    }

    #[test]
    fn test_display_integral_numbers() {
        assert_eq!(Value::Number(2010.0).to_string(), "2010");
        assert_eq!(Value::Number(0.025).to_string(), "0.025");
        assert_eq!(Value::from("All").to_string(), "All");
    }

    #[test]
    fn test_signed_zero_shares_key() {
        assert_eq!(Value::Number(0.0).key(), Value::Number(-0.0).key());
        assert_ne!(Value::Number(1.0).key(), Value::from("1").key());
    }

    #[test]
    fn test_key_roundtrip() {
        let v = Value::Number(2005.5);
        assert_eq!(v.key().to_value(), v);
    }
}
