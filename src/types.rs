//! Core value helpers shared by every validator kind.

use std::fmt;

use serde_json::Value;

/// Label used for the root value when the caller does not name it.
pub const ROOT_LABEL: &str = "input";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Type name of a possibly-absent value.
pub fn type_name(value: &Option<Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(v) => json_type_name(v),
    }
}

/// Whether a value is falsy in the loose sense used by the `Falsy` policy.
pub fn is_falsy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Position of a child inside its structural parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Property(String),
    Index(usize),
}

impl Key {
    /// Extend a dotted location with this key.
    pub fn child_location(&self, location: &str) -> String {
        if location.is_empty() {
            self.to_string()
        } else {
            format!("{}.{}", location, self)
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Property(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}
