//! Composition validators: `and`, `or` and the `when` gate.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::context::{Context, Frame};
use crate::error::{Failure, Issue, IssueKind};
use crate::node::{delegate, Flow, Kind, Validator};
use crate::scalar::Scalar;

#[derive(Debug, Clone)]
pub(crate) struct Choice {
    pub alternatives: Vec<Validator>,
    /// Try alternatives in declaration order instead of by priority.
    pub ordered: bool,
}

pub(crate) type Predicate = Arc<dyn Fn(Option<&Value>, &Context<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Gate {
    Constant(bool),
    Predicate(Predicate),
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Gate::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Every alternative in turn, each receiving the previous one's output.
pub fn and<I, V>(alternatives: I) -> Validator
where
    I: IntoIterator<Item = V>,
    V: Into<Validator>,
{
    Validator::from_kind(Kind::And(
        alternatives.into_iter().map(Into::into).collect(),
    ))
}

/// The first alternative that accepts the value.
///
/// Structured and more specific alternatives are tried before generic
/// ones, so `or([string(), number().cast()])` still casts `"1"` to `1`.
/// Use [`or_in_order`] or [`Validator::ordered`] to keep declaration order.
pub fn or<I, V>(alternatives: I) -> Validator
where
    I: IntoIterator<Item = V>,
    V: Into<Validator>,
{
    choice(alternatives, false)
}

/// Like [`or`], trying alternatives in declaration order.
pub fn or_in_order<I, V>(alternatives: I) -> Validator
where
    I: IntoIterator<Item = V>,
    V: Into<Validator>,
{
    choice(alternatives, true)
}

fn choice<I, V>(alternatives: I, ordered: bool) -> Validator
where
    I: IntoIterator<Item = V>,
    V: Into<Validator>,
{
    Validator::from_kind(Kind::Or(Choice {
        alternatives: alternatives.into_iter().map(Into::into).collect(),
        ordered,
    }))
}

/// Pass when `predicate` holds for the input; the value is not changed.
pub fn when<F>(predicate: F) -> Validator
where
    F: Fn(Option<&Value>, &Context<'_>) -> bool + Send + Sync + 'static,
{
    Validator::from_kind(Kind::If(Gate::Predicate(Arc::new(predicate))))
}

/// Always pass (`true`) or always fail (`false`).
pub fn gate(pass: bool) -> Validator {
    Validator::from_kind(Kind::If(Gate::Constant(pass)))
}

impl Validator {
    /// Disable priority ordering of an `or` validator.
    pub fn ordered(&self) -> Self {
        match &self.node().kind {
            Kind::Or(choice) => self.with_kind(Kind::Or(Choice {
                alternatives: choice.alternatives.clone(),
                ordered: true,
            })),
            _ => self.clone(),
        }
    }
}

/// Lower runs first. Modifiers take the priority of what they wrap.
fn priority(validator: &Validator) -> u8 {
    match &validator.node().kind {
        Kind::Object(_) | Kind::Array(_) | Kind::Tuple(_) | Kind::Map(_) => 0,
        Kind::And(_) | Kind::Or(_) | Kind::Lazy(_) => 0,
        Kind::Scalar(Scalar::String | Scalar::Any) => 2,
        Kind::Scalar(_) => 1,
        Kind::If(_) => 1,
        Kind::Optional(inner)
        | Kind::Cast { inner, .. }
        | Kind::Presence { inner, .. }
        | Kind::DeepOptions { inner, .. } => priority(inner),
    }
}

pub(crate) fn run_and(alternatives: &[Validator], ctx: &mut Context<'_>) -> Result<Flow, Failure> {
    for alternative in alternatives {
        let deep = ctx.deep.clone();
        let scoped = ctx.scoped.clone();
        delegate(alternative, ctx, deep, scoped)?;
    }
    Ok(Flow::Continue)
}

pub(crate) fn run_or(choice: &Choice, ctx: &mut Context<'_>) -> Result<Flow, Failure> {
    let mut order: Vec<&Validator> = choice.alternatives.iter().collect();
    if !choice.ordered {
        // stable: equal priorities keep declaration order
        order.sort_by_key(|alternative| priority(alternative));
    }

    let mut related = Vec::new();
    for alternative in order {
        let frame = Frame {
            name: ctx.name.clone(),
            location: ctx.location.clone(),
            key: ctx.key.clone(),
            parent: ctx.parent,
            bag: &mut *ctx.bag,
            call: ctx.call.clone(),
            deep: ctx.deep.clone(),
            scoped: ctx.scoped.clone(),
        };
        match alternative.run(ctx.output.clone(), frame) {
            Ok(output) => {
                trace!(kind = alternative.kind_name(), location = %ctx.location, "or matched");
                ctx.output = output;
                return Ok(Flow::Continue);
            }
            Err(violations) if violations.is_fatal() => return Err(Failure::nested(violations)),
            Err(violations) => related.extend(violations.into_issues()),
        }
    }

    let issue = Issue::new(IssueKind::NoMatch, "no alternative matched")
        .at(&ctx.name, &ctx.location)
        .with_input(ctx.input.clone())
        .with_related(related);
    Err(Failure::from(issue))
}

pub(crate) fn run_gate(gate: &Gate, ctx: &mut Context<'_>) -> Result<Flow, Failure> {
    let pass = match gate {
        Gate::Constant(pass) => *pass,
        Gate::Predicate(predicate) => {
            let ctx: &Context<'_> = ctx;
            predicate(ctx.input(), ctx)
        }
    };
    if pass {
        Ok(Flow::Continue)
    } else {
        Err(Failure::report(IssueKind::Condition, "condition not met"))
    }
}
