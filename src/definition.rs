//! Validators built from JSON definition documents.
//!
//! A definition uses the same vocabulary as [`Validator::describe`], so a
//! description can be fed back in. Named sub-schemas live under `$defs`
//! at the document root and are referenced with `{"$ref": "name"}` (or
//! `"#/$defs/name"`); references are resolved lazily, which makes
//! recursive definitions possible.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{BuildError, DefinitionError};
use crate::node::{lazy_named, Validator};
use crate::options::{Absent, Fallback};
use crate::structural::{array, map, object, tuple, Extra};
use crate::types::json_type_name;
use crate::{and, any, boolean, choices, gate, integer, literal, null, number, or, string};

const DEFS_KEY: &str = "$defs";
const REF_PREFIX: &str = "#/$defs/";

/// Build a validator from a definition document.
///
/// ```
/// use shape_schema::from_definition;
/// use serde_json::json;
///
/// let v = from_definition(&json!({
///     "type": "object",
///     "properties": {
///         "sku": {"type": "string", "pattern": "^[A-Z]+-\\d+$"},
///         "qty": {"type": "integer", "minimum": 1, "cast": true}
///     }
/// }))
/// .unwrap();
/// assert_eq!(v.validate(json!({"sku": "AB-1", "qty": "2"})).unwrap()["qty"], 2);
/// ```
///
/// # Errors
///
/// Returns `DefinitionError` with the JSON Pointer of the offending
/// keyword when the document is malformed. Every `$defs` entry is checked
/// up front, including ones never referenced.
pub fn from_definition(definition: &Value) -> Result<Validator, DefinitionError> {
    let defs = match definition.get(DEFS_KEY) {
        None => Map::new(),
        Some(Value::Object(defs)) => defs.clone(),
        Some(other) => return Err(invalid(&format!("/{}", DEFS_KEY), "object", other)),
    };
    let registry = Registry {
        defs: Arc::new(defs),
    };
    for (name, def) in registry.defs.iter() {
        registry.build(def, &format!("/{}/{}", DEFS_KEY, name))?;
    }
    registry.build(definition, "")
}

#[derive(Clone)]
struct Registry {
    defs: Arc<Map<String, Value>>,
}

fn invalid(path: &str, expected: &'static str, actual: &Value) -> DefinitionError {
    DefinitionError::InvalidType {
        path: path.to_string(),
        expected,
        actual: json_type_name(actual).to_string(),
    }
}

fn built(path: &str) -> impl Fn(BuildError) -> DefinitionError + '_ {
    move |source| DefinitionError::Build {
        path: path.to_string(),
        source,
    }
}

fn get_bool(map: &Map<String, Value>, key: &str, path: &str) -> Result<Option<bool>, DefinitionError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(invalid(&format!("{}/{}", path, key), "boolean", other)),
    }
}

fn get_str<'m>(
    map: &'m Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'m str>, DefinitionError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(invalid(&format!("{}/{}", path, key), "string", other)),
    }
}

fn get_f64(map: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>, DefinitionError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(&format!("{}/{}", path, key), "number", value)),
    }
}

fn get_usize(map: &Map<String, Value>, key: &str, path: &str) -> Result<Option<usize>, DefinitionError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(&format!("{}/{}", path, key), "non-negative integer", value)),
    }
}

fn get_array<'m>(
    map: &'m Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'m Vec<Value>>, DefinitionError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(invalid(&format!("{}/{}", path, key), "array", other)),
    }
}

impl Registry {
    fn build(&self, definition: &Value, path: &str) -> Result<Validator, DefinitionError> {
        let Value::Object(def) = definition else {
            return Err(invalid(path, "object", definition));
        };

        if let Some(reference) = get_str(def, "$ref", path)? {
            return self.reference(reference, def, path);
        }

        let kind = match get_str(def, "type", path)? {
            Some(kind) => kind,
            None if def.contains_key("const") => "literal",
            None if def.contains_key("choices") => "choices",
            None if def.contains_key("anyOf") => "or",
            None if def.contains_key("allOf") => "and",
            None if def.contains_key("properties") => "object",
            None if def.contains_key("$recursive") => {
                return Err(DefinitionError::UnknownType {
                    path: path.to_string(),
                    value: "$recursive".to_string(),
                })
            }
            None => "any",
        };

        let validator = match kind {
            "any" => any(),
            "string" => string(),
            "number" => number(),
            "integer" => integer(),
            "boolean" => boolean(),
            "null" => null(),
            "literal" => match def.get("const") {
                Some(value) => literal(value.clone()),
                None => return Err(invalid(&format!("{}/const", path), "value", &Value::Null)),
            },
            "choices" => match get_array(def, "choices", path)? {
                Some(values) => choices(values.iter().cloned()),
                None => return Err(invalid(&format!("{}/choices", path), "array", &Value::Null)),
            },
            "object" => self.object(def, path)?,
            "array" => {
                let items = match def.get("items") {
                    Some(items) => self.build(items, &format!("{}/items", path))?,
                    None => any(),
                };
                let mut schema = array(items);
                if let Some(splitter) = get_str(def, "splitter", path)? {
                    schema = schema.splitter(splitter);
                }
                schema.build()
            }
            "tuple" => {
                let items = get_array(def, "tuple", path)?
                    .map(|items| {
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| self.build(item, &format!("{}/tuple/{}", path, i)))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .transpose()?
                    .unwrap_or_default();
                let mut schema = tuple(items);
                if let Some(rest) = def.get("items") {
                    schema = schema.rest(self.build(rest, &format!("{}/items", path))?);
                }
                if let Some(min) = get_usize(def, "minItems", path)? {
                    schema = schema.min_items(min);
                }
                if let Some(max) = get_usize(def, "maxItems", path)? {
                    schema = schema.max_items(max);
                }
                schema.build()
            }
            "map" => {
                let values = match def.get("values") {
                    Some(values) => self.build(values, &format!("{}/values", path))?,
                    None => any(),
                };
                let mut schema = map(values);
                if let Some(keys) = def.get("keys") {
                    schema = schema.keys(self.build(keys, &format!("{}/keys", path))?);
                }
                schema.build()
            }
            "and" => and(self.list(def, "allOf", path)?),
            "or" => or(self.list(def, "anyOf", path)?),
            "if" => gate(get_bool(def, "if", path)?.unwrap_or(true)),
            other => {
                return Err(DefinitionError::UnknownType {
                    path: format!("{}/type", path),
                    value: other.to_string(),
                })
            }
        };

        self.refine(validator, kind, def, path)
    }

    fn reference(
        &self,
        reference: &str,
        def: &Map<String, Value>,
        path: &str,
    ) -> Result<Validator, DefinitionError> {
        let name = reference.strip_prefix(REF_PREFIX).unwrap_or(reference);
        if !self.defs.contains_key(name) {
            return Err(DefinitionError::UnknownRef {
                path: format!("{}/$ref", path),
                name: name.to_string(),
            });
        }
        let registry = self.clone();
        let target = name.to_string();
        let validator = lazy_named(format!("{}{}", REF_PREFIX, name), move || {
            registry.resolve_ref(&target)
        });
        self.presence(validator, def, path)
    }

    /// Body of a `$ref` lazy. Definitions were all checked when the
    /// document was loaded, so building cannot fail here.
    fn resolve_ref(&self, name: &str) -> Validator {
        let path = format!("/{}/{}", DEFS_KEY, name);
        self.defs
            .get(name)
            .and_then(|def| self.build(def, &path).ok())
            .unwrap_or_else(|| gate(false))
    }

    fn list(
        &self,
        def: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<Vec<Validator>, DefinitionError> {
        get_array(def, key, path)?
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.build(item, &format!("{}/{}/{}", path, key, i)))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn object(&self, def: &Map<String, Value>, path: &str) -> Result<Validator, DefinitionError> {
        let properties = match def.get("properties") {
            None => Map::new(),
            Some(Value::Object(properties)) => properties.clone(),
            Some(other) => return Err(invalid(&format!("{}/properties", path), "object", other)),
        };
        let required: Option<Vec<&str>> = get_array(def, "requiredProperties", path)?
            .map(|names| names.iter().filter_map(Value::as_str).collect());

        let mut schema = object();
        for (name, property) in &properties {
            let mut child = self.build(property, &format!("{}/properties/{}", path, name))?;
            if let Some(required) = &required {
                if !required.contains(&name.as_str()) {
                    child = child.optional();
                }
            }
            schema = schema.property(name.clone(), child);
        }

        let extra = match def.get("additionalProperties") {
            None | Some(Value::Bool(false)) => Extra::Reject,
            Some(Value::Bool(true)) => Extra::AllowAll,
            Some(Value::Array(names)) => {
                Extra::Allow(names.iter().filter_map(Value::as_str).map(str::to_string).collect())
            }
            Some(rest) => Extra::Rest(self.build(rest, &format!("{}/additionalProperties", path))?),
        };
        schema = schema.extra(extra);
        if let Some(splitter) = get_str(def, "splitter", path)? {
            schema = schema.splitter(splitter);
        }
        Ok(schema.build())
    }

    /// Apply rules and options shared by every kind.
    fn refine(
        &self,
        mut validator: Validator,
        kind: &str,
        def: &Map<String, Value>,
        path: &str,
    ) -> Result<Validator, DefinitionError> {
        if let Some(min) = get_usize(def, "minLength", path)? {
            validator = validator.min_length(min);
        }
        if let Some(max) = get_usize(def, "maxLength", path)? {
            validator = validator.max_length(max);
        }
        if kind == "array" {
            if let Some(min) = get_usize(def, "minItems", path)? {
                validator = validator.min_length(min);
            }
            if let Some(max) = get_usize(def, "maxItems", path)? {
                validator = validator.max_length(max);
            }
        }
        if let Some(pattern) = get_str(def, "pattern", path)? {
            let pattern_path = format!("{}/pattern", path);
            validator = validator
                .pattern(pattern)
                .map_err(built(&pattern_path))?;
        }
        if let Some(min) = get_f64(def, "minimum", path)? {
            validator = validator.min(min);
        }
        if let Some(max) = get_f64(def, "maximum", path)? {
            validator = validator.max(max);
        }
        if let Some(description) = get_str(def, "description", path)? {
            validator = validator.description(description);
        }
        if let Some(sample) = def.get("example") {
            validator = validator.example(sample.clone());
        }
        if get_bool(def, "cast", path)? == Some(true) {
            validator = validator.cast();
        }
        if get_bool(def, "fatal", path)? == Some(true) {
            validator = validator.fatal();
        }
        self.presence(validator, def, path)
    }

    /// `optional`, `absent` and `default`, which wrap the validator.
    fn presence(
        &self,
        mut validator: Validator,
        def: &Map<String, Value>,
        path: &str,
    ) -> Result<Validator, DefinitionError> {
        if get_bool(def, "optional", path)? == Some(true) {
            validator = validator.optional();
        }
        if let Some(absent) = get_str(def, "absent", path)? {
            validator = match Absent::parse(absent) {
                Some(Absent::Nullish) => validator.nullish(),
                Some(Absent::Falsy) => validator.falsy(),
                Some(Absent::Undefined) => validator,
                None => {
                    return Err(DefinitionError::UnknownType {
                        path: format!("{}/absent", path),
                        value: absent.to_string(),
                    })
                }
            };
        }
        if let Some(default) = def.get("default") {
            let validated = get_bool(def, "validateDefault", path)?.unwrap_or(false);
            validator = validator.default_from(Fallback::value(default.clone()).validated(validated));
        }
        Ok(validator)
    }
}
