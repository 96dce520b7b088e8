//! Sample synthesis.
//!
//! Every node yields an example value: its configured sample, else its
//! default, else one derived from its kind and rules. Recursive branches
//! are cut where they re-enter a schema already being sampled; an
//! optional cut property is left out, a required one becomes `null`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::modifier;
use crate::node::{Kind, LazyTrail, Step, Validator};
use crate::options::{resolve, DeepOptions, Options};
use crate::rule::Rule;
use crate::scalar::number_value;
use crate::structural::Extra;

/// A synthesized value paired with the description it satisfies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub value: Value,
    pub description: Value,
}

impl Validator {
    /// Synthesize a value this validator accepts.
    ///
    /// ```
    /// use shape_schema::{array, number, object, string};
    /// use serde_json::json;
    ///
    /// let v = object()
    ///     .property("name", string().example(json!("Ada")))
    ///     .property("scores", array(number().min(1.0)))
    ///     .build();
    /// assert_eq!(v.sample(), json!({"name": "Ada", "scores": [1]}));
    /// ```
    pub fn sample(&self) -> Value {
        let mut trail = LazyTrail::rooted(self);
        sample(self, DeepOptions::default(), Options::default(), &mut trail)
            .unwrap_or(Value::Null)
    }

    pub fn sample_with_description(&self) -> Sample {
        Sample {
            value: self.sample(),
            description: self.describe(),
        }
    }
}

/// `None` when the branch was cut.
fn sample(
    validator: &Validator,
    deep: DeepOptions,
    scoped: Options,
    trail: &mut LazyTrail,
) -> Option<Value> {
    let node = validator.node();
    let own = &node.options;
    let forwarded = scoped.overlay(own);
    if let Some((inner, deep, scoped)) = modifier::overlay(&node.kind, &deep, &forwarded) {
        return sample(inner, deep, scoped, trail).map(|v| refine(v, &node.steps));
    }

    let resolved = resolve(&Options::default(), &deep, &scoped, own);
    if let Some(value) = &resolved.sample {
        return Some(value.clone());
    }
    if let Some(default) = &resolved.default {
        return Some(default.produce());
    }

    let value = match &node.kind {
        Kind::Scalar(scalar) => scalar.sample(),
        Kind::Object(shape) => {
            let (child_deep, child_scoped) = deep.descend();
            let mut out = Map::new();
            for (name, child) in &shape.properties {
                match sample(child, child_deep.clone(), child_scoped.clone(), trail) {
                    Some(value) => {
                        out.insert(name.clone(), value);
                    }
                    None if is_optional(child, &child_deep, &child_scoped) => {}
                    None => {
                        out.insert(name.clone(), Value::Null);
                    }
                }
            }
            if let Extra::Allow(names) = &shape.extra {
                for name in names {
                    out.entry(name.clone()).or_insert(Value::Null);
                }
            }
            Value::Object(out)
        }
        Kind::Array(shape) => {
            let (child_deep, child_scoped) = deep.descend();
            sample(&shape.items, child_deep, child_scoped, trail)
                .map(|item| vec![item])
                .unwrap_or_default()
                .into()
        }
        Kind::Tuple(shape) => {
            let (child_deep, child_scoped) = deep.descend();
            shape
                .items
                .iter()
                .map(|item| {
                    sample(item, child_deep.clone(), child_scoped.clone(), trail)
                        .unwrap_or(Value::Null)
                })
                .collect()
        }
        Kind::Map(shape) => {
            let (child_deep, child_scoped) = deep.descend();
            let key = shape
                .keys
                .as_ref()
                .and_then(|keys| sample(keys, child_deep.clone(), child_scoped.clone(), trail))
                .and_then(|key| match key {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .unwrap_or_else(|| "key".to_string());
            let mut out = Map::new();
            if let Some(value) = sample(&shape.values, child_deep, child_scoped, trail) {
                out.insert(key, value);
            }
            Value::Object(out)
        }
        Kind::And(alternatives) => alternatives
            .first()
            .and_then(|a| sample(a, deep.clone(), scoped.clone(), trail))
            .unwrap_or(Value::Null),
        Kind::Or(choice) => choice
            .alternatives
            .iter()
            .find_map(|a| sample(a, deep.clone(), scoped.clone(), trail))
            .unwrap_or(Value::Null),
        Kind::If(_) => Value::Null,
        Kind::Lazy(lazy) => {
            let target = trail.enter(lazy)?;
            let value = sample(&target, deep, forwarded, trail);
            trail.leave();
            value?
        }
        Kind::Optional(_) | Kind::Cast { .. } | Kind::Presence { .. } | Kind::DeepOptions { .. } => {
            Value::Null
        }
    };
    Some(refine(value, &node.steps))
}

fn is_optional(child: &Validator, deep: &DeepOptions, scoped: &Options) -> bool {
    let own = &child.node().options;
    resolve(&Options::default(), deep, scoped, own).optional
}

/// Nudge a synthesized value into the bounds of the node's rules.
fn refine(value: Value, steps: &[Step]) -> Value {
    steps.iter().fold(value, |value, step| match (step, value) {
        (Step::Rule(Rule::Minimum(min)), Value::Number(n)) if n.as_f64() < Some(*min) => {
            number_value(*min)
        }
        (Step::Rule(Rule::Maximum(max)), Value::Number(n)) if n.as_f64() > Some(*max) => {
            number_value(*max)
        }
        (Step::Rule(Rule::MinLength(min)), Value::String(s)) if s.chars().count() < *min => {
            let pad = *min - s.chars().count();
            Value::String(format!("{}{}", s, "x".repeat(pad)))
        }
        (Step::Rule(Rule::MaxLength(max)), Value::String(s)) if s.chars().count() > *max => {
            Value::String(s.chars().take(*max).collect())
        }
        (_, value) => value,
    })
}
