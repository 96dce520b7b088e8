//! Static compilation of a validator graph.
//!
//! `to_static` bakes every overlay into the nodes it reaches: each
//! compiled node carries its fully resolved options as local options,
//! and modifiers that only adjust overlays disappear. Custom steps and
//! rules attached to a dissolved modifier move onto the node it wrapped,
//! after that node's own steps. Lazy references compile their target on
//! first use, so recursive graphs stay finite.

use std::sync::Arc;

use tracing::debug;

use crate::error::BuildError;
use crate::modifier;
use crate::node::{lazy_named, Kind, Node, Step, Validator};
use crate::options::{resolve, DeepOptions, Options};
use crate::structural::Extra;

impl Validator {
    /// Compile into a graph that needs no overlay resolution.
    ///
    /// Validating with the compiled graph gives the same results as the
    /// original when both are called without call-site overrides.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::DanglingReference` if a recursive back-edge
    /// no longer points at a live node.
    pub fn to_static(&self) -> Result<Validator, BuildError> {
        debug!(kind = self.kind_name(), "compiling static validator");
        bake(self, &DeepOptions::default(), &Options::default())
    }
}

fn bake(validator: &Validator, deep: &DeepOptions, scoped: &Options) -> Result<Validator, BuildError> {
    let node = validator.node();
    let own = &node.options;
    let forwarded = scoped.overlay(own);

    if !matches!(node.kind, Kind::Optional(_)) {
        if let Some((inner, deep, scoped)) = modifier::overlay(&node.kind, deep, &forwarded) {
            let baked = bake(inner, &deep, &scoped)?;
            return Ok(with_trailing_steps(baked, &node.steps));
        }
    }

    let pinned = resolve(&Options::default(), deep, scoped, own).to_options();
    let (child_deep, child_scoped) = deep.descend();
    let child = |v: &Validator| bake(v, &child_deep, &child_scoped);

    let kind = match &node.kind {
        Kind::Scalar(scalar) => Kind::Scalar(scalar.clone()),
        Kind::Object(shape) => {
            let mut shape = shape.clone();
            for (_, validator) in shape.properties.iter_mut() {
                *validator = child(validator)?;
            }
            if let Extra::Rest(rest) = &shape.extra {
                shape.extra = Extra::Rest(child(rest)?);
            }
            Kind::Object(shape)
        }
        Kind::Array(shape) => {
            let mut shape = shape.clone();
            shape.items = child(&shape.items)?;
            Kind::Array(shape)
        }
        Kind::Tuple(shape) => {
            let mut shape = shape.clone();
            for item in shape.items.iter_mut() {
                *item = child(item)?;
            }
            shape.rest = shape.rest.as_ref().map(child).transpose()?;
            Kind::Tuple(shape)
        }
        Kind::Map(shape) => {
            let mut shape = shape.clone();
            shape.keys = shape.keys.as_ref().map(child).transpose()?;
            shape.values = child(&shape.values)?;
            Kind::Map(shape)
        }
        Kind::Optional(inner) => Kind::Optional(bake(inner, deep, &forwarded)?),
        Kind::And(alternatives) => Kind::And(
            alternatives
                .iter()
                .map(|a| bake(a, deep, scoped))
                .collect::<Result<_, _>>()?,
        ),
        Kind::Or(choice) => {
            let mut choice = choice.clone();
            for alternative in choice.alternatives.iter_mut() {
                *alternative = bake(alternative, deep, scoped)?;
            }
            Kind::Or(choice)
        }
        Kind::If(gate) => Kind::If(gate.clone()),
        Kind::Lazy(lazy) => {
            let target = lazy.resolve()?;
            let label = lazy
                .label()
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{:x}", target.ptr()));
            let (deep, scoped) = (deep.clone(), forwarded.clone());
            let compiled = lazy_named(label, move || {
                bake(&target, &deep, &scoped).unwrap_or_else(|_| target.clone())
            });
            compiled.node().kind.clone()
        }
        Kind::Cast { .. } | Kind::Presence { .. } | Kind::DeepOptions { .. } => {
            node.kind.clone()
        }
    };

    Ok(Validator(Arc::new(Node {
        kind,
        options: pinned,
        steps: node.steps.clone(),
    })))
}

/// Append a dissolved modifier's steps (all but its core) to `baked`.
fn with_trailing_steps(baked: Validator, steps: &[Step]) -> Validator {
    let trailing: Vec<Step> = steps
        .iter()
        .filter(|step| !matches!(step, Step::Core))
        .cloned()
        .collect();
    if trailing.is_empty() {
        return baked;
    }
    let mut node = baked.node().clone();
    node.steps.extend(trailing);
    Validator(Arc::new(node))
}
