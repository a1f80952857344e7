use std::fmt::{self, Display, Formatter};

use crate::error::SyntaxError;

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
}

impl Value {
    pub fn number(&self) -> Result<f64, SyntaxError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Str(_) => Err(SyntaxError::TypeMismatch),
        }
    }

    pub fn string(&self) -> Result<&str, SyntaxError> {
        match self {
            Value::Str(s) => Ok(s),
            Value::Number(_) => Err(SyntaxError::TypeMismatch),
        }
    }

    pub fn int(&self) -> Result<i32, SyntaxError> {
        self.number().map(to_int)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0.0)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Truncates towards zero and wraps into 32 bits, so `&FFFFFFFF` becomes -1.
pub fn to_int(value: f64) -> i32 {
    value as i64 as i32
}

/// Formats a number the way `STR$` and `PRINT` show it.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
