//! Structural validators: object, array, tuple and map.
//!
//! All four share one recursion protocol. Each child is validated in a
//! fresh invocation whose location is extended by the child's key and
//! whose parent scope points back at the container. Child failures are
//! merged into a local aggregator scoped to this container; a non-fatal
//! failure moves on to the next sibling, a fatal one re-throws at once
//! and the remaining siblings are skipped. A non-empty local aggregator
//! is raised as the container's single issue.

use serde_json::{Map, Value};
use tracing::trace;

use crate::context::{Context, Frame, Scope};
use crate::error::{Failure, Issue, IssueKind, Violations};
use crate::node::{Kind, Validator};
use crate::options::Options;
use crate::types::{type_name, Key};

/// Policy for object properties that are not declared.
#[derive(Debug, Clone, Default)]
pub enum Extra {
    /// Every undeclared property is an issue.
    #[default]
    Reject,
    /// Only the named undeclared properties pass through.
    Allow(Vec<String>),
    /// Every undeclared property passes through.
    AllowAll,
    /// Undeclared properties are validated by this validator.
    Rest(Validator),
}

/// What array casting does with non-numeric keys of an object input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    #[default]
    Ignore,
    /// Append their values after the indexed entries.
    Push,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ObjectShape {
    pub properties: Vec<(String, Validator)>,
    pub extra: Extra,
    pub splitter: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ArrayShape {
    pub items: Validator,
    pub splitter: Option<String>,
    pub keys: KeyPolicy,
    pub single: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TupleShape {
    pub items: Vec<Validator>,
    pub rest: Option<Validator>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl TupleShape {
    /// Longest accepted tuple: configured, else the fixed arity when
    /// there is no rest validator.
    pub fn max_len(&self) -> Option<usize> {
        match (self.max_items, &self.rest) {
            (Some(max), _) => Some(max),
            (None, None) => Some(self.items.len()),
            (None, Some(_)) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MapShape {
    pub keys: Option<Validator>,
    pub values: Validator,
}

/// Builder for object validators.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    shape: ObjectShape,
}

/// Start an object validator with no declared properties.
pub fn object() -> ObjectSchema {
    ObjectSchema::default()
}

impl ObjectSchema {
    /// Declare a property; declaration order is validation order.
    pub fn property(mut self, name: impl Into<String>, validator: impl Into<Validator>) -> Self {
        let name = name.into();
        let validator = validator.into();
        match self.shape.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = validator,
            None => self.shape.properties.push((name, validator)),
        }
        self
    }

    pub fn allow_unknown(mut self) -> Self {
        self.shape.extra = Extra::AllowAll;
        self
    }

    pub fn allow_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shape.extra = Extra::Allow(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Validate undeclared properties with `validator`.
    pub fn rest(mut self, validator: impl Into<Validator>) -> Self {
        self.shape.extra = Extra::Rest(validator.into());
        self
    }

    pub fn extra(mut self, extra: Extra) -> Self {
        self.shape.extra = extra;
        self
    }

    /// When casting, unflatten keys like `a.b` into nested objects.
    pub fn splitter(mut self, splitter: impl Into<String>) -> Self {
        self.shape.splitter = Some(splitter.into());
        self
    }

    pub fn build(self) -> Validator {
        Validator::from_kind(Kind::Object(self.shape))
    }
}

impl From<ObjectSchema> for Validator {
    fn from(schema: ObjectSchema) -> Self {
        schema.build()
    }
}

/// Builder for array validators.
#[derive(Debug, Clone)]
pub struct ArraySchema {
    shape: ArrayShape,
}

/// Array whose every entry matches `items`.
pub fn array(items: impl Into<Validator>) -> ArraySchema {
    ArraySchema {
        shape: ArrayShape {
            items: items.into(),
            splitter: None,
            keys: KeyPolicy::Ignore,
            single: false,
        },
    }
}

impl ArraySchema {
    /// When casting a string that is not JSON, split it on `splitter`.
    pub fn splitter(mut self, splitter: impl Into<String>) -> Self {
        self.shape.splitter = Some(splitter.into());
        self
    }

    pub fn non_numeric_keys(mut self, policy: KeyPolicy) -> Self {
        self.shape.keys = policy;
        self
    }

    /// When casting, wrap a single non-array value into a one-entry array.
    pub fn single(mut self) -> Self {
        self.shape.single = true;
        self
    }

    pub fn build(self) -> Validator {
        Validator::from_kind(Kind::Array(self.shape))
    }
}

impl From<ArraySchema> for Validator {
    fn from(schema: ArraySchema) -> Self {
        schema.build()
    }
}

/// Builder for tuple validators.
#[derive(Debug, Clone, Default)]
pub struct TupleSchema {
    shape: TupleShape,
}

/// Fixed positional sequence.
pub fn tuple<I, V>(items: I) -> TupleSchema
where
    I: IntoIterator<Item = V>,
    V: Into<Validator>,
{
    TupleSchema {
        shape: TupleShape {
            items: items.into_iter().map(Into::into).collect(),
            ..TupleShape::default()
        },
    }
}

impl TupleSchema {
    /// Validate entries beyond the fixed positions with `validator`.
    pub fn rest(mut self, validator: impl Into<Validator>) -> Self {
        self.shape.rest = Some(validator.into());
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.shape.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.shape.max_items = Some(max);
        self
    }

    pub fn build(self) -> Validator {
        Validator::from_kind(Kind::Tuple(self.shape))
    }
}

impl From<TupleSchema> for Validator {
    fn from(schema: TupleSchema) -> Self {
        schema.build()
    }
}

/// Builder for map validators.
#[derive(Debug, Clone)]
pub struct MapSchema {
    shape: MapShape,
}

/// Object used as a dictionary: every value matches `values`.
pub fn map(values: impl Into<Validator>) -> MapSchema {
    MapSchema {
        shape: MapShape {
            keys: None,
            values: values.into(),
        },
    }
}

impl MapSchema {
    /// Validate (and possibly rewrite) every key with `validator`.
    pub fn keys(mut self, validator: impl Into<Validator>) -> Self {
        self.shape.keys = Some(validator.into());
        self
    }

    pub fn build(self) -> Validator {
        Validator::from_kind(Kind::Map(self.shape))
    }
}

impl From<MapSchema> for Validator {
    fn from(schema: MapSchema) -> Self {
        schema.build()
    }
}

/// Validate `child` at `key` below the current container invocation.
pub(crate) fn descend(
    child: &Validator,
    input: Option<Value>,
    key: Key,
    ctx: &mut Context<'_>,
) -> Result<Option<Value>, Violations> {
    let scope = Scope {
        input: &ctx.input,
        output: &ctx.output,
        location: &ctx.location,
        key: ctx.key.as_ref(),
        parent: ctx.parent,
    };
    let (deep, scoped) = ctx.deep.descend();
    let frame = Frame {
        name: key.to_string(),
        location: key.child_location(&ctx.location),
        key: Some(key),
        parent: Some(&scope),
        bag: &mut *ctx.bag,
        call: Options::default(),
        deep,
        scoped,
    };
    child.run(input, frame)
}

fn type_mismatch(expected: &str, value: &Option<Value>) -> Failure {
    Failure::report(
        IssueKind::TypeMismatch,
        format!("expected {}, got {}", expected, type_name(value)),
    )
}

/// Structural issue attached to a child position.
fn child_issue(
    ctx: &Context<'_>,
    key: &Key,
    kind: IssueKind,
    message: impl Into<String>,
    input: Option<Value>,
) -> Issue {
    Issue::new(kind, message)
        .at(key.to_string(), key.child_location(&ctx.location))
        .with_input(input)
}

/// Structural issue attached to the container itself.
fn own_issue(ctx: &Context<'_>, kind: IssueKind, message: impl Into<String>) -> Issue {
    Issue::new(kind, message)
        .at(&ctx.name, &ctx.location)
        .with_input(ctx.input.clone())
}

/// Finish a container check: raise the local aggregator, or keep the output.
fn settle(ctx: &mut Context<'_>, failures: Violations, output: Value) -> Result<(), Failure> {
    if failures.is_empty() {
        ctx.output = Some(output);
        Ok(())
    } else {
        Err(Failure::nested(failures))
    }
}

/// Write a child's result, or drop the key when the result is absent.
///
/// Without an explicit policy the key is deleted unless it was present
/// in the input, in which case it is kept as `null`.
fn assign(
    output: &mut Map<String, Value>,
    name: &str,
    value: Option<Value>,
    existed: bool,
    delete_undefined: Option<bool>,
) {
    match value {
        Some(value) => {
            output.insert(name.to_string(), value);
        }
        None => {
            if !delete_undefined.unwrap_or(!existed) {
                output.insert(name.to_string(), Value::Null);
            }
        }
    }
}

fn parse_json(s: &str) -> Option<Value> {
    serde_json::from_str(s.trim()).ok()
}

/// Rebuild nested objects from keys joined by `splitter`.
fn unflatten(map: Map<String, Value>, splitter: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        let mut parts = key.split(splitter).peekable();
        let mut target = &mut out;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                target.insert(part.to_string(), value);
                break;
            }
            let slot = target
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else {
                break;
            };
            target = next;
        }
    }
    out
}

impl ObjectShape {
    pub fn cast(&self, value: Option<Value>) -> Option<Value> {
        let value = match value? {
            Value::String(s) => parse_json(&s).unwrap_or(Value::String(s)),
            other => other,
        };
        match (value, &self.splitter) {
            (Value::Object(map), Some(splitter)) if map.keys().any(|k| k.contains(splitter.as_str())) => {
                trace!(%splitter, "unflatten object keys");
                Some(Value::Object(unflatten(map, splitter)))
            }
            (value, _) => Some(value),
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.properties.iter().any(|(n, _)| n == name)
    }

    pub fn check(&self, ctx: &mut Context<'_>) -> Result<(), Failure> {
        let source = match &ctx.output {
            Some(Value::Object(map)) => map.clone(),
            other => return Err(type_mismatch("object", other)),
        };
        let delete_undefined = ctx.options.delete_undefined;
        let mut output = Map::new();
        let mut failures = Violations::new();

        for (name, child) in &self.properties {
            let input = source.get(name).cloned();
            let existed = input.is_some();
            match descend(child, input, Key::Property(name.clone()), ctx) {
                Ok(value) => assign(&mut output, name, value, existed, delete_undefined),
                Err(nested) => failures.merge(nested).map_err(Failure::nested)?,
            }
        }

        for (name, value) in &source {
            if self.is_declared(name) {
                continue;
            }
            let key = Key::Property(name.clone());
            match &self.extra {
                Extra::AllowAll => {
                    output.insert(name.clone(), value.clone());
                }
                Extra::Allow(names) if names.contains(name) => {
                    output.insert(name.clone(), value.clone());
                }
                Extra::Reject | Extra::Allow(_) => {
                    let issue = child_issue(
                        ctx,
                        &key,
                        IssueKind::UnexpectedProperty,
                        "unexpected property",
                        Some(value.clone()),
                    );
                    failures.push(issue, false).map_err(Failure::nested)?;
                }
                Extra::Rest(rest) => match descend(rest, Some(value.clone()), key, ctx) {
                    Ok(result) => assign(&mut output, name, result, true, delete_undefined),
                    Err(nested) => failures.merge(nested).map_err(Failure::nested)?,
                },
            }
        }

        settle(ctx, failures, Value::Object(output))
    }
}

impl ArrayShape {
    pub fn cast(&self, value: Option<Value>) -> Option<Value> {
        let value = match value? {
            Value::String(s) => match parse_json(&s) {
                Some(Value::Array(items)) => Value::Array(items),
                _ => match &self.splitter {
                    Some(splitter) => {
                        trace!(%splitter, "split string into array");
                        Value::Array(
                            s.split(splitter.as_str())
                                .map(|part| Value::String(part.trim().to_string()))
                                .collect(),
                        )
                    }
                    None => Value::String(s),
                },
            },
            Value::Object(map) => self.index_keys(map),
            other => other,
        };
        match value {
            Value::Array(_) | Value::Null => Some(value),
            other if self.single => Some(Value::Array(vec![other])),
            other => Some(other),
        }
    }

    /// Array from an object keyed by indices, e.g. `{"0": a, "1": b}`.
    fn index_keys(&self, map: Map<String, Value>) -> Value {
        let mut indexed: Vec<(usize, Value)> = Vec::new();
        let mut others = Vec::new();
        for (key, value) in map {
            match key.parse::<usize>() {
                Ok(index) => indexed.push((index, value)),
                Err(_) => others.push(value),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        let mut items: Vec<Value> = indexed.into_iter().map(|(_, v)| v).collect();
        if self.keys == KeyPolicy::Push {
            items.extend(others);
        }
        Value::Array(items)
    }

    pub fn check(&self, ctx: &mut Context<'_>) -> Result<(), Failure> {
        let source = match &ctx.output {
            Some(Value::Array(items)) => items.clone(),
            other => return Err(type_mismatch("array", other)),
        };
        let mut output = Vec::with_capacity(source.len());
        let mut failures = Violations::new();

        for (index, item) in source.into_iter().enumerate() {
            match descend(&self.items, Some(item), Key::Index(index), ctx) {
                Ok(value) => output.push(value.unwrap_or(Value::Null)),
                Err(nested) => failures.merge(nested).map_err(Failure::nested)?,
            }
        }

        settle(ctx, failures, Value::Array(output))
    }
}

impl TupleShape {
    pub fn cast(&self, value: Option<Value>) -> Option<Value> {
        match value? {
            Value::String(s) => match parse_json(&s) {
                Some(Value::Array(items)) => Some(Value::Array(items)),
                _ => Some(Value::String(s)),
            },
            other => Some(other),
        }
    }

    pub fn check(&self, ctx: &mut Context<'_>) -> Result<(), Failure> {
        let source = match &ctx.output {
            Some(Value::Array(items)) => items.clone(),
            other => return Err(type_mismatch("tuple", other)),
        };
        let mut failures = Violations::new();

        let len = source.len();
        let max = self.max_len();
        if let Some(min) = self.min_items.filter(|min| len < *min) {
            let issue = own_issue(
                ctx,
                IssueKind::Arity,
                format!("expected at least {} items, got {}", min, len),
            );
            failures.push(issue, false).map_err(Failure::nested)?;
        }
        if let Some(max) = max.filter(|max| len > *max) {
            let issue = own_issue(
                ctx,
                IssueKind::Arity,
                format!("expected at most {} items, got {}", max, len),
            );
            failures.push(issue, false).map_err(Failure::nested)?;
        }

        let mut output = Vec::with_capacity(len.max(self.items.len()));
        for (index, child) in self.items.iter().enumerate() {
            let input = source.get(index).cloned();
            match descend(child, input, Key::Index(index), ctx) {
                Ok(Some(value)) => output.push(value),
                Ok(None) if index < len => output.push(Value::Null),
                Ok(None) => {}
                Err(nested) => failures.merge(nested).map_err(Failure::nested)?,
            }
        }

        let limit = max.unwrap_or(len).min(len);
        for (index, item) in source.into_iter().enumerate().take(limit).skip(self.items.len()) {
            match &self.rest {
                Some(rest) => match descend(rest, Some(item), Key::Index(index), ctx) {
                    Ok(value) => output.push(value.unwrap_or(Value::Null)),
                    Err(nested) => failures.merge(nested).map_err(Failure::nested)?,
                },
                None => output.push(item),
            }
        }

        settle(ctx, failures, Value::Array(output))
    }
}

impl MapShape {
    pub fn cast(&self, value: Option<Value>) -> Option<Value> {
        let value = match value? {
            Value::String(s) => parse_json(&s).unwrap_or(Value::String(s)),
            other => other,
        };
        match value {
            Value::Array(entries) => Some(from_pairs(entries)),
            other => Some(other),
        }
    }

    pub fn check(&self, ctx: &mut Context<'_>) -> Result<(), Failure> {
        let source = match &ctx.output {
            Some(Value::Object(map)) => map.clone(),
            other => return Err(type_mismatch("map", other)),
        };
        let delete_undefined = ctx.options.delete_undefined;
        let mut output = Map::new();
        let mut failures = Violations::new();

        for (name, value) in source {
            let key = match &self.keys {
                None => Some(name.clone()),
                Some(keys) => {
                    let input = Some(Value::String(name.clone()));
                    match descend(keys, input, Key::Property(name.clone()), ctx) {
                        Ok(Some(Value::String(s))) => Some(s),
                        Ok(Some(other)) => Some(other.to_string()),
                        Ok(None) => None,
                        Err(nested) => {
                            failures.merge(nested).map_err(Failure::nested)?;
                            None
                        }
                    }
                }
            };
            match descend(&self.values, Some(value), Key::Property(name.clone()), ctx) {
                Ok(result) => {
                    if let Some(key) = key {
                        assign(&mut output, &key, result, true, delete_undefined);
                    }
                }
                Err(nested) => failures.merge(nested).map_err(Failure::nested)?,
            }
        }

        settle(ctx, failures, Value::Object(output))
    }
}

/// Object from `[[key, value], ...]`; other arrays are left as they are.
fn from_pairs(entries: Vec<Value>) -> Value {
    let pairs: Option<Map<String, Value>> = entries
        .iter()
        .map(|entry| match entry.as_array().map(Vec::as_slice) {
            Some([Value::String(k), v]) => Some((k.clone(), v.clone())),
            _ => None,
        })
        .collect();
    match pairs {
        Some(map) => Value::Object(map),
        None => Value::Array(entries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{number, string};
    use serde_json::json;

    #[test]
    fn unflatten_nests_keys() {
        let map = json!({"a.b": 1, "a.c": 2, "d": 3});
        let Value::Object(map) = map else { unreachable!() };
        assert_eq!(
            Value::Object(unflatten(map, ".")),
            json!({"a": {"b": 1, "c": 2}, "d": 3})
        );
    }

    #[test]
    fn array_cast_from_keyed_object() {
        let shape = array(number()).non_numeric_keys(KeyPolicy::Push).shape;
        assert_eq!(
            shape.cast(Some(json!({"1": "b", "0": "a", "x": "c"}))),
            Some(json!(["a", "b", "c"]))
        );
        let ignoring = array(number()).shape;
        assert_eq!(
            ignoring.cast(Some(json!({"1": "b", "x": "c"}))),
            Some(json!(["b"]))
        );
    }

    #[test]
    fn array_cast_promotes_single_values() {
        let shape = array(string()).single().shape;
        assert_eq!(shape.cast(Some(json!("a"))), Some(json!(["a"])));
        assert_eq!(shape.cast(Some(json!("[\"a\"]"))), Some(json!(["a"])));
    }

    #[test]
    fn map_cast_from_pairs() {
        let shape = map(number()).shape;
        assert_eq!(
            shape.cast(Some(json!([["a", 1], ["b", 2]]))),
            Some(json!({"a": 1, "b": 2}))
        );
        assert_eq!(shape.cast(Some(json!([1, 2]))), Some(json!([1, 2])));
    }

    #[test]
    fn assign_policy() {
        let mut out = Map::new();
        assign(&mut out, "gone", None, false, None);
        assign(&mut out, "kept", None, true, None);
        assign(&mut out, "forced", None, true, Some(true));
        assert_eq!(Value::Object(out), json!({"kept": null}));
    }

    #[test]
    fn tuple_default_max_is_arity() {
        assert_eq!(tuple([string(), number()]).shape.max_len(), Some(2));
        assert_eq!(tuple([string()]).rest(number()).shape.max_len(), None);
        assert_eq!(tuple([string()]).max_items(4).shape.max_len(), Some(4));
    }
}
