use crate::error::EvaluationError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime value types produced by evaluating parameter expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Null,
}

impl Value {
    /// Human readable name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Null => "null",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness as used by `and`, `or` and `not`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Null => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Null => write!(f, "None"),
        }
    }
}

/// The declared type of a parameter. Evaluated values are coerced into this
/// kind at the end of every namespace resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Any value, kept as evaluated.
    #[default]
    Raw,
    Int,
    Float,
    Bool,
    /// Raw text, never evaluated.
    String,
    /// Block identifier, never evaluated.
    Id,
    List,
}

impl ValueKind {
    /// Kinds whose raw text is taken verbatim instead of being evaluated.
    pub fn is_literal(&self) -> bool {
        matches!(self, ValueKind::String | ValueKind::Id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Raw => "raw",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
            ValueKind::Id => "id",
            ValueKind::List => "list",
        }
    }

    /// Converts an evaluated value into this kind, rejecting lossy conversions.
    pub fn coerce(&self, value: Value) -> Result<Value, EvaluationError> {
        let coerced = match (*self, value) {
            (ValueKind::Raw, v) => v,
            (ValueKind::Int, Value::Int(i)) => Value::Int(i),
            (ValueKind::Int, Value::Bool(b)) => Value::Int(b as i64),
            (ValueKind::Int, Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
                Value::Int(f as i64)
            }
            (ValueKind::Float, Value::Float(f)) => Value::Float(f),
            (ValueKind::Float, Value::Int(i)) => Value::Float(i as f64),
            (ValueKind::Bool, Value::Bool(b)) => Value::Bool(b),
            (ValueKind::String | ValueKind::Id, Value::Str(s)) => Value::Str(s),
            (ValueKind::List, Value::List(items)) => Value::List(items),
            (_, other) => {
                return Err(EvaluationError::KindMismatch {
                    expected: self.name().to_string(),
                    found: other,
                });
            }
        };
        Ok(coerced)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
