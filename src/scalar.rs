//! Leaf validators: primitive type checks, choices and their cast hooks.

use serde_json::{Number, Value};
use tracing::trace;

use crate::context::Context;
use crate::error::{Failure, IssueKind};
use crate::node::{Kind, Validator};
use crate::types::type_name;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scalar {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Choices(Vec<Value>),
}

/// Accepts any present value.
pub fn any() -> Validator {
    Validator::from_kind(Kind::Scalar(Scalar::Any))
}

pub fn string() -> Validator {
    Validator::from_kind(Kind::Scalar(Scalar::String))
}

pub fn number() -> Validator {
    Validator::from_kind(Kind::Scalar(Scalar::Number))
}

/// Number without a fractional part.
pub fn integer() -> Validator {
    Validator::from_kind(Kind::Scalar(Scalar::Integer))
}

pub fn boolean() -> Validator {
    Validator::from_kind(Kind::Scalar(Scalar::Boolean))
}

pub fn null() -> Validator {
    Validator::from_kind(Kind::Scalar(Scalar::Null))
}

/// Exactly `value`.
pub fn literal(value: Value) -> Validator {
    choices([value])
}

/// One of `values`.
pub fn choices<I>(values: I) -> Validator
where
    I: IntoIterator<Item = Value>,
{
    Validator::from_kind(Kind::Scalar(Scalar::Choices(values.into_iter().collect())))
}

/// JSON number for `n`, as an integer when it has no fractional part.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn is_integer(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Any => "any",
            Scalar::String => "string",
            Scalar::Number => "number",
            Scalar::Integer => "integer",
            Scalar::Boolean => "boolean",
            Scalar::Null => "null",
            Scalar::Choices(_) => "choices",
        }
    }

    pub fn check(&self, ctx: &mut Context<'_>) -> Result<(), Failure> {
        let value = &ctx.output;
        let ok = match (self, value) {
            (_, None) => false,
            (Scalar::Any, Some(_)) => true,
            (Scalar::String, Some(Value::String(_))) => true,
            (Scalar::Number, Some(Value::Number(_))) => true,
            (Scalar::Integer, Some(Value::Number(n))) => is_integer(n),
            (Scalar::Boolean, Some(Value::Bool(_))) => true,
            (Scalar::Null, Some(Value::Null)) => true,
            (Scalar::Choices(values), Some(v)) => {
                if values.contains(v) {
                    return Ok(());
                }
                return Err(Failure::report(
                    IssueKind::Choice,
                    format!("expected one of {}", Value::Array(values.clone())),
                ));
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Failure::report(
                IssueKind::TypeMismatch,
                format!("expected {}, got {}", self.type_name(), type_name(value)),
            ))
        }
    }

    /// Coerce `value` towards this type; values that cannot be coerced
    /// are returned unchanged for the check to reject.
    pub fn cast(&self, value: Option<Value>) -> Option<Value> {
        let value = value?;
        let cast = match (self, &value) {
            (Scalar::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Scalar::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (Scalar::Number | Scalar::Integer, Value::String(s)) => {
                s.trim().parse::<f64>().ok().map(number_value)
            }
            (Scalar::Number | Scalar::Integer, Value::Bool(b)) => Some(Value::from(u8::from(*b))),
            (Scalar::Boolean, Value::String(s)) => match s.trim() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (Scalar::Boolean, Value::Number(n)) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            (Scalar::Null, Value::String(s)) if s.is_empty() || s == "null" => Some(Value::Null),
            (Scalar::Choices(values), Value::String(s)) => values
                .iter()
                .find(|choice| !choice.is_string() && choice.to_string() == *s)
                .cloned(),
            _ => None,
        };
        match cast {
            Some(cast) => {
                trace!(from = %value, to = %cast, "cast scalar");
                Some(cast)
            }
            None => Some(value),
        }
    }

    /// Representative value for sample synthesis.
    pub fn sample(&self) -> Value {
        match self {
            Scalar::Any | Scalar::Null => Value::Null,
            Scalar::String => Value::from("string"),
            Scalar::Number | Scalar::Integer => Value::from(0),
            Scalar::Boolean => Value::Bool(true),
            Scalar::Choices(values) => values.first().cloned().unwrap_or(Value::Null),
        }
    }
}
