//! JSON Schema export and conformance checks.
//!
//! A validator's description is converted into a draft 2020-12 JSON
//! Schema that accepts every output the validator can produce. Checking
//! an output against it with `jsonschema` confirms that validated data
//! satisfies the validator's own description.

use serde_json::{Map, Value};

use crate::error::{ConformanceError, SchemaError};
use crate::node::Validator;

const DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Keywords copied unchanged from a description.
const PASSTHROUGH: [&str; 8] = [
    "description",
    "default",
    "minLength",
    "maxLength",
    "pattern",
    "minimum",
    "maximum",
    "minItems",
];

/// Export `validator` as a standalone JSON Schema document.
///
/// Recursive references are exported as unconstrained schemas.
pub fn to_json_schema(validator: &Validator) -> Value {
    let mut schema = match convert(&validator.describe()) {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("allOf".to_string(), Value::Array(vec![other]));
            map
        }
    };
    schema.insert("$schema".to_string(), Value::from(DRAFT));
    Value::Object(schema)
}

/// Check a (validated) value against the validator's exported schema.
///
/// # Errors
///
/// Returns `ConformanceError::InvalidSchema` if the exported schema does
/// not compile, or `ConformanceError::Invalid` listing every mismatch.
pub fn conforms(validator: &Validator, value: &Value) -> Result<(), ConformanceError> {
    let schema = to_json_schema(validator);
    let compiled = jsonschema::validator_for(&schema).map_err(|e| ConformanceError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<SchemaError> = compiled
        .iter_errors(value)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConformanceError::Invalid { errors })
    }
}

fn convert(description: &Value) -> Value {
    let Value::Object(d) = description else {
        return Value::Bool(true);
    };
    if d.contains_key("$recursive") {
        return Value::Object(Map::new());
    }

    let mut out = Map::new();
    match d.get("type").and_then(Value::as_str) {
        Some(kind @ ("string" | "number" | "integer" | "boolean" | "null")) => {
            out.insert("type".into(), kind.into());
        }
        Some("literal") => {
            out.insert("const".into(), d.get("const").cloned().unwrap_or(Value::Null));
        }
        Some("choices") => {
            out.insert("enum".into(), d.get("choices").cloned().unwrap_or_default());
        }
        Some("object") => object(d, &mut out),
        Some("array") => {
            out.insert("type".into(), "array".into());
            if let Some(items) = d.get("items") {
                out.insert("items".into(), convert(items));
            }
        }
        Some("tuple") => {
            out.insert("type".into(), "array".into());
            let prefix = list(d.get("tuple"));
            out.insert("prefixItems".into(), Value::Array(prefix));
            let rest = d.get("items").map(convert).unwrap_or(Value::Bool(false));
            out.insert("items".into(), rest);
            if let Some(max) = d.get("maxItems") {
                out.insert("maxItems".into(), max.clone());
            }
        }
        Some("map") => {
            out.insert("type".into(), "object".into());
            if let Some(values) = d.get("values") {
                out.insert("additionalProperties".into(), convert(values));
            }
            if let Some(keys) = d.get("keys") {
                out.insert("propertyNames".into(), convert(keys));
            }
        }
        Some("and") => {
            out.insert("allOf".into(), Value::Array(list(d.get("allOf"))));
        }
        Some("or") => {
            out.insert("anyOf".into(), Value::Array(list(d.get("anyOf"))));
        }
        Some("if") if d.get("if") == Some(&Value::Bool(false)) => {
            out.insert("not".into(), Value::Object(Map::new()));
        }
        _ => {}
    }

    for key in PASSTHROUGH {
        if let Some(value) = d.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }
    if d.get("type").and_then(Value::as_str) == Some("array") {
        if let Some(max) = d.get("maxItems") {
            out.insert("maxItems".into(), max.clone());
        }
    }

    widen_for_absence(d, Value::Object(out))
}

/// Outputs of optional nodes may also be `null` (absent value kept under
/// an existing key) or an unvalidated default.
fn widen_for_absence(d: &Map<String, Value>, schema: Value) -> Value {
    let mut alternatives = Vec::new();
    if d.get("optional") == Some(&Value::Bool(true)) && d.contains_key("absent") {
        let mut null = Map::new();
        null.insert("type".into(), "null".into());
        alternatives.push(Value::Object(null));
    }
    if let Some(default) = d.get("default") {
        let mut fixed = Map::new();
        fixed.insert("const".into(), default.clone());
        alternatives.push(Value::Object(fixed));
    }
    if alternatives.is_empty() {
        return schema;
    }
    alternatives.insert(0, schema);
    let mut out = Map::new();
    out.insert("anyOf".into(), Value::Array(alternatives));
    Value::Object(out)
}

fn object(d: &Map<String, Value>, out: &mut Map<String, Value>) {
    out.insert("type".into(), "object".into());
    let mut properties = Map::new();
    if let Some(Value::Object(declared)) = d.get("properties") {
        for (name, property) in declared {
            properties.insert(name.clone(), convert(property));
        }
    }
    let additional = match d.get("additionalProperties") {
        Some(Value::Array(names)) => {
            for name in names.iter().filter_map(Value::as_str) {
                properties
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Bool(true));
            }
            Value::Bool(false)
        }
        Some(Value::Bool(allow)) => Value::Bool(*allow),
        Some(rest) => convert(rest),
        None => Value::Bool(false),
    };
    out.insert("properties".into(), Value::Object(properties));
    if let Some(required) = d.get("requiredProperties") {
        out.insert("required".into(), required.clone());
    }
    out.insert("additionalProperties".into(), additional);
}

fn list(items: Option<&Value>) -> Vec<Value> {
    items
        .and_then(Value::as_array)
        .map(|items| items.iter().map(convert).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{array, integer, map, number, object, or, string, tuple};
    use serde_json::json;

    #[test]
    fn object_schema_shape() {
        let v = object()
            .property("name", string().min_length(1))
            .property("age", integer().optional())
            .build();
        let schema = to_json_schema(&v);
        assert_eq!(schema["$schema"], DRAFT);
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["name"], json!({"type": "string", "minLength": 1}));
    }

    #[test]
    fn validated_outputs_conform() {
        let v = object()
            .property("id", integer().cast())
            .property("tags", array(string()).build().max_length(3))
            .property("pair", tuple([string(), number()]).build())
            .property("scores", map(number()).build())
            .property("either", or([number(), string()]))
            .property("note", string().nullish())
            .build();
        let output = v
            .validate(json!({
                "id": "7",
                "tags": ["a"],
                "pair": ["x", 1],
                "scores": {"a": 1.5},
                "either": "s",
                "note": null
            }))
            .unwrap();
        conforms(&v, &output).unwrap();
    }

    #[test]
    fn mismatches_are_listed() {
        let v = object().property("n", number()).build();
        match conforms(&v, &json!({"n": "x", "extra": 1})) {
            Err(ConformanceError::Invalid { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected conformance errors, got {:?}", other),
        }
    }

    #[test]
    fn unvalidated_defaults_are_allowed() {
        let v = object().property("n", number().default(json!("none"))).build();
        let output = v.validate(json!({})).unwrap();
        assert_eq!(output, json!({"n": "none"}));
        conforms(&v, &output).unwrap();
    }
}
