//! Dynamically typed option values.
//!
//! Plugin descriptors hand out strings, numbers and booleans interchangeably, so
//! every option value is a [`Value`] and the comparison rules are loose: a numeric
//! string equals the number it spells.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Marks a file input that reads the previous step's standard output.
pub const PIPE_MARKER: &str = "_pipe_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Text(String::new())
    }
}

impl Value {
    pub fn empty() -> Self {
        Value::default()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Text(text) if text.is_empty())
    }

    /// Truthiness as plugin authors expect it: empty text, zero and `false` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(flag) => *flag,
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Text(text) => !text.is_empty(),
        }
    }

    /// Reads a checkbox-like value, where the words `false`, `off` and `no` also uncheck.
    pub fn as_flag(&self) -> bool {
        match self {
            Value::Text(text) => {
                let text = text.trim();
                !(text.is_empty() || matches!(text, "false" | "off" | "no" | "0"))
            }
            other => other.is_truthy(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            Value::Number(number) => Some(*number),
            Value::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Equality after coercion: numbers against numeric text, everything else as text.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Number(number), Value::Text(text)) | (Value::Text(text), Value::Number(number)) => {
                text.trim().parse::<f64>().is_ok_and(|parsed| parsed == *number)
            }
            _ => self.as_text() == other.as_text(),
        }
    }

    /// Ordering used by `is less than` and `is more than`.
    ///
    /// Numeric when both sides read as numbers, otherwise lexical.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(self.as_text().cmp(&other.as_text())),
        }
    }

    pub fn contains(&self, needle: &Value) -> bool {
        self.as_text().contains(needle.as_text().as_str())
    }

    /// Parses a bare word with JSON literal semantics, falling back to text.
    pub fn from_literal(word: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(word) {
            Ok(serde_json::Value::Bool(flag)) => Value::Bool(flag),
            Ok(serde_json::Value::Number(number)) => {
                number.as_f64().map_or_else(|| Value::Text(word.to_string()), Value::Number)
            }
            Ok(serde_json::Value::Null) => Value::empty(),
            _ => Value::Text(word.to_string()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(flag) => write!(formatter, "{flag}"),
            Value::Number(number) => {
                if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
                    write!(formatter, "{}", *number as i64)
                } else {
                    write!(formatter, "{number}")
                }
            }
            Value::Text(text) => formatter.write_str(text),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::empty(),
            serde_json::Value::Bool(flag) => Value::Bool(*flag),
            serde_json::Value::Number(number) => number
                .as_f64()
                .map_or_else(|| Value::Text(number.to_string()), Value::Number),
            serde_json::Value::String(text) => Value::Text(text.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::from(&value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}
