//! JSON description of a validator graph.
//!
//! The walk applies the same overlay rules as execution, so modifiers
//! never appear in the output: `partial(object)` describes an object
//! whose properties are optional.

use serde_json::{Map, Value};

use crate::composition::Gate;
use crate::modifier;
use crate::node::{Kind, LazyTrail, Step, Validator};
use crate::options::{resolve, Absent, DeepOptions, Options};
use crate::scalar::Scalar;
use crate::structural::Extra;

impl Validator {
    /// Describe this validator as JSON.
    ///
    /// ```
    /// use shape_schema::{number, object, string};
    /// use serde_json::json;
    ///
    /// let v = object()
    ///     .property("name", string().min_length(1))
    ///     .property("age", number().optional())
    ///     .build();
    /// let d = v.describe();
    /// assert_eq!(d["type"], "object");
    /// assert_eq!(d["requiredProperties"], json!(["name"]));
    /// assert_eq!(d["properties"]["name"]["minLength"], 1);
    /// ```
    pub fn describe(&self) -> Value {
        self.describe_with(&DeepOptions::default())
    }

    /// Describe under inherited deep options.
    pub fn describe_with(&self, deep: &DeepOptions) -> Value {
        let mut trail = LazyTrail::rooted(self);
        describe(self, deep.clone(), Options::default(), &mut trail)
    }
}

/// Stand-in for a schema already being described further up.
fn recursive_marker(optional: bool) -> Value {
    let mut out = Map::new();
    out.insert("$recursive".to_string(), Value::Bool(true));
    if optional {
        out.insert("optional".to_string(), Value::Bool(true));
    }
    Value::Object(out)
}

pub(crate) fn describe(
    validator: &Validator,
    deep: DeepOptions,
    scoped: Options,
    trail: &mut LazyTrail,
) -> Value {
    let node = validator.node();
    let own = &node.options;
    let forwarded = scoped.overlay(own);

    if let Some((inner, deep, scoped)) = modifier::overlay(&node.kind, &deep, &forwarded) {
        return with_rules(describe(inner, deep, scoped, trail), &node.steps);
    }
    if let Kind::Lazy(lazy) = &node.kind {
        let Some(target) = trail.enter(lazy) else {
            let resolved = resolve(&Options::default(), &deep, &scoped, own);
            return recursive_marker(resolved.optional);
        };
        let described = describe(&target, deep, forwarded, trail);
        trail.leave();
        return with_rules(described, &node.steps);
    }

    let mut out = Map::new();
    match &node.kind {
        Kind::Scalar(Scalar::Choices(values)) if values.len() == 1 => {
            out.insert("type".into(), "literal".into());
            out.insert("const".into(), values[0].clone());
        }
        Kind::Scalar(Scalar::Choices(values)) => {
            out.insert("type".into(), "choices".into());
            out.insert("choices".into(), Value::Array(values.clone()));
        }
        Kind::Scalar(scalar) => {
            out.insert("type".into(), scalar.type_name().into());
        }
        Kind::Object(shape) => {
            out.insert("type".into(), "object".into());
            let (child_deep, child_scoped) = deep.descend();
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (name, child) in &shape.properties {
                let described = describe(child, child_deep.clone(), child_scoped.clone(), trail);
                if described.get("optional") != Some(&Value::Bool(true)) {
                    required.push(Value::from(name.as_str()));
                }
                properties.insert(name.clone(), described);
            }
            out.insert("properties".into(), Value::Object(properties));
            out.insert("requiredProperties".into(), Value::Array(required));
            let additional = match &shape.extra {
                Extra::Reject => Value::Bool(false),
                Extra::AllowAll => Value::Bool(true),
                Extra::Allow(names) => names.iter().map(|n| Value::from(n.as_str())).collect(),
                Extra::Rest(rest) => describe(rest, child_deep, child_scoped, trail),
            };
            out.insert("additionalProperties".into(), additional);
        }
        Kind::Array(shape) => {
            out.insert("type".into(), "array".into());
            let (child_deep, child_scoped) = deep.descend();
            out.insert(
                "items".into(),
                describe(&shape.items, child_deep, child_scoped, trail),
            );
        }
        Kind::Tuple(shape) => {
            out.insert("type".into(), "tuple".into());
            let (child_deep, child_scoped) = deep.descend();
            let items: Vec<Value> = shape
                .items
                .iter()
                .map(|item| describe(item, child_deep.clone(), child_scoped.clone(), trail))
                .collect();
            out.insert("tuple".into(), Value::Array(items));
            if let Some(rest) = &shape.rest {
                out.insert(
                    "items".into(),
                    describe(rest, child_deep, child_scoped, trail),
                );
            }
            if let Some(min) = shape.min_items {
                out.insert("minItems".into(), min.into());
            }
            if let Some(max) = shape.max_len() {
                out.insert("maxItems".into(), max.into());
            }
        }
        Kind::Map(shape) => {
            out.insert("type".into(), "map".into());
            let (child_deep, child_scoped) = deep.descend();
            if let Some(keys) = &shape.keys {
                out.insert(
                    "keys".into(),
                    describe(keys, child_deep.clone(), child_scoped.clone(), trail),
                );
            }
            out.insert(
                "values".into(),
                describe(&shape.values, child_deep, child_scoped, trail),
            );
        }
        Kind::And(alternatives) => {
            out.insert("type".into(), "and".into());
            let all = alternatives
                .iter()
                .map(|a| describe(a, deep.clone(), scoped.clone(), trail))
                .collect();
            out.insert("allOf".into(), Value::Array(all));
        }
        Kind::Or(choice) => {
            out.insert("type".into(), "or".into());
            let any = choice
                .alternatives
                .iter()
                .map(|a| describe(a, deep.clone(), scoped.clone(), trail))
                .collect();
            out.insert("anyOf".into(), Value::Array(any));
        }
        Kind::If(gate) => {
            out.insert("type".into(), "if".into());
            let condition = match gate {
                Gate::Constant(pass) => Value::Bool(*pass),
                Gate::Predicate(_) => Value::from("predicate"),
            };
            out.insert("if".into(), condition);
        }
        other => {
            out.insert("type".into(), other.name().into());
        }
    }

    let resolved = resolve(&Options::default(), &deep, &scoped, own);
    if let Some(description) = &resolved.description {
        out.insert("description".into(), description.as_str().into());
    }
    if resolved.optional {
        out.insert("optional".into(), Value::Bool(true));
        if resolved.absent != Absent::Undefined {
            out.insert("absent".into(), resolved.absent.as_str().into());
        }
    }
    if resolved.cast {
        out.insert("cast".into(), Value::Bool(true));
    }
    if let Some(default) = resolved.default.as_ref().and_then(|d| d.fixed()) {
        out.insert("default".into(), default.clone());
    }
    with_rules(Value::Object(out), &node.steps)
}

/// Add the keywords of a node's rule steps to a description.
fn with_rules(described: Value, steps: &[Step]) -> Value {
    let Value::Object(mut out) = described else {
        return described;
    };
    if out.contains_key("$recursive") {
        return Value::Object(out);
    }
    let items = matches!(
        out.get("type").and_then(Value::as_str),
        Some("array" | "tuple")
    );
    for step in steps {
        if let Step::Rule(rule) = step {
            rule.describe(&mut out, items);
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use crate::{
        array, choices, deep_partial, lazy_named, literal, map, number, object, or, partial,
        string, tuple, Validator,
    };
    use serde_json::json;

    #[test]
    fn scalars_and_rules() {
        let d = string().min_length(2).pattern("^a").unwrap().cast().describe();
        assert_eq!(
            d,
            json!({"type": "string", "cast": true, "minLength": 2, "pattern": "^a"})
        );
        assert_eq!(literal(json!(3)).describe(), json!({"type": "literal", "const": 3}));
        assert_eq!(
            choices([json!("a"), json!("b")]).describe()["choices"],
            json!(["a", "b"])
        );
    }

    #[test]
    fn optional_and_default_are_folded_into_the_inner_type() {
        let d = number().default(json!(5)).describe();
        assert_eq!(d, json!({"type": "number", "optional": true, "default": 5}));
        let n = string().nullish().describe();
        assert_eq!(n["absent"], "nullish");
    }

    #[test]
    fn rules_on_a_wrapper_are_kept() {
        let d = string().optional().min_length(1).describe();
        assert_eq!(d["minLength"], 1);
        assert_eq!(d["optional"], true);
    }

    #[test]
    fn modifiers_are_resolved_not_rendered() {
        let person = object()
            .property("name", string())
            .property("address", object().property("city", string()))
            .build();
        let shallow = partial(person.clone()).describe();
        assert_eq!(shallow["requiredProperties"], json!([]));
        assert_eq!(
            shallow["properties"]["address"]["requiredProperties"],
            json!(["city"])
        );

        let deep = deep_partial(person).describe();
        assert_eq!(deep["properties"]["address"]["requiredProperties"], json!([]));
    }

    #[test]
    fn containers() {
        let d = map(array(number()).build().max_length(3))
            .keys(string())
            .build()
            .describe();
        assert_eq!(d["values"]["maxItems"], 3);
        assert_eq!(d["keys"]["type"], "string");

        let t = tuple([string(), number()]).build().describe();
        assert_eq!(t["tuple"], json!([{"type": "string"}, {"type": "number"}]));
        assert_eq!(t["maxItems"], 2);

        let o = or([string(), number()]).describe();
        assert_eq!(o["anyOf"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn recursion_is_marked() {
        let tree = Validator::recursive(|tree| {
            object()
                .property("children", array(tree).build().optional())
                .build()
        });
        let d = tree.describe();
        assert_eq!(
            d["properties"]["children"]["items"],
            json!({"$recursive": true})
        );

        fn node() -> Validator {
            object()
                .property("next", lazy_named("node", node).optional())
                .build()
        }
        let d = lazy_named("node", node).describe();
        assert_eq!(
            d["properties"]["next"],
            json!({"$recursive": true, "optional": true})
        );
        assert_eq!(d["requiredProperties"], json!([]));
    }
}
