use crate::value::Value;

/// Coercion applied to values written into numeric inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Int,
    Float,
    Number,
}

impl NumberFormat {
    pub fn from_type(type_name: &str) -> Option<Self> {
        match type_name {
            "int" => Some(NumberFormat::Int),
            "float" => Some(NumberFormat::Float),
            "number" => Some(NumberFormat::Number),
            _ => None,
        }
    }

    /// Formats a written value. Empty text stays empty, anything non-numeric becomes 0.
    ///
    /// Text stays text so the value reads back the way it was typed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pline_core::options::NumberFormat;
    /// use pline_core::value::Value;
    ///
    /// assert_eq!(NumberFormat::Int.apply(&Value::from("3.7")), Value::from("3"));
    /// assert_eq!(NumberFormat::Float.apply(&Value::from("abc")), Value::from("0"));
    /// assert_eq!(NumberFormat::Int.apply(&Value::from("")), Value::from(""));
    /// ```
    pub fn apply(self, value: &Value) -> Value {
        let number = match value {
            Value::Text(text) if text.is_empty() => return Value::empty(),
            Value::Text(text) => text.trim().parse::<f64>().unwrap_or(0.0),
            Value::Number(number) => *number,
            Value::Bool(_) => 0.0,
        };
        let number = if number.is_finite() { number } else { 0.0 };
        let number = match self {
            NumberFormat::Int => number.trunc(),
            NumberFormat::Float | NumberFormat::Number => number,
        };

        match value {
            Value::Text(_) => Value::Text(Value::Number(number).to_string()),
            _ => Value::Number(number),
        }
    }
}
