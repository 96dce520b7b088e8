//! Validator nodes and the pipeline engine.
//!
//! A [`Validator`] is a cheap handle to an immutable node: a kind, the
//! options configured on it, and an ordered pipeline of steps. Builder
//! methods never mutate a node; they return a new one.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use serde_json::Value;
use tracing::{debug, trace};

use crate::composition::{self, Choice, Gate};
use crate::context::{Context, ContextBag, Frame, ValidateOptions};
use crate::error::{BuildError, Failure, Issue, IssueKind, Raised, Violations};
use crate::modifier;
use crate::options::{resolve, Absent, DeepOptions, Fallback, Options};
use crate::rule::Rule;
use crate::scalar::Scalar;
use crate::structural::{ArrayShape, MapShape, ObjectShape, TupleShape};

/// Caller-supplied pipeline step.
pub(crate) type StepFn = Arc<dyn Fn(&mut Context<'_>) -> Result<(), Failure> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct CustomStep {
    pub run: StepFn,
    pub fatal: bool,
}

#[derive(Clone)]
pub(crate) enum Step {
    /// Optional/cast interception followed by the kind's own check.
    Core,
    Rule(Rule),
    Custom(CustomStep),
}

/// Whether the pipeline goes on after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// Skip the remaining steps (absent value handled by optional).
    Stop,
}

pub(crate) struct LazyCell {
    label: Option<String>,
    cell: OnceLock<Validator>,
    thunk: Box<dyn Fn() -> Validator + Send + Sync>,
}

/// Child reference resolved on first use.
#[derive(Clone)]
pub(crate) enum LazyRef {
    Thunk(Arc<LazyCell>),
    /// Back-edge to an enclosing node built by [`Validator::recursive`].
    Cyclic(Weak<Node>),
}

impl LazyRef {
    pub fn resolve(&self) -> Result<Validator, BuildError> {
        match self {
            LazyRef::Thunk(lazy) => Ok(lazy
                .cell
                .get_or_init(|| {
                    trace!(label = ?lazy.label, "resolving lazy schema");
                    (lazy.thunk)()
                })
                .clone()),
            LazyRef::Cyclic(weak) => weak
                .upgrade()
                .map(Validator)
                .ok_or(BuildError::DanglingReference),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            LazyRef::Thunk(lazy) => lazy.label.as_deref(),
            LazyRef::Cyclic(_) => None,
        }
    }
}

/// Upper bound on lazy expansions followed by the derived views when a
/// recursive schema cannot be recognised by identity.
const MAX_LAZY_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Visit {
    Label(String),
    Node(usize),
}

/// Tracks lazy references being walked by a derived view, so recursive
/// schemas terminate.
#[derive(Debug, Default)]
pub(crate) struct LazyTrail {
    stack: Vec<Visit>,
}

impl LazyTrail {
    pub fn rooted(root: &Validator) -> Self {
        Self {
            stack: vec![Visit::Node(root.ptr())],
        }
    }

    /// Resolve `lazy` unless that would re-enter a schema already on the trail.
    pub fn enter(&mut self, lazy: &LazyRef) -> Option<Validator> {
        let target = lazy.resolve().ok()?;
        let visit = match lazy.label() {
            Some(label) => Visit::Label(label.to_string()),
            None => Visit::Node(target.ptr()),
        };
        if self.stack.contains(&visit) || self.stack.len() > MAX_LAZY_DEPTH {
            return None;
        }
        self.stack.push(visit);
        Some(target)
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }
}

#[derive(Clone)]
pub(crate) enum Kind {
    Scalar(Scalar),
    Object(ObjectShape),
    Array(ArrayShape),
    Tuple(TupleShape),
    Map(MapShape),
    Optional(Validator),
    Cast {
        inner: Validator,
        deep: bool,
    },
    /// `partial`/`required` and their deep variants.
    Presence {
        inner: Validator,
        optional: bool,
        deep: bool,
    },
    DeepOptions {
        inner: Validator,
        options: Options,
    },
    And(Vec<Validator>),
    Or(Choice),
    If(Gate),
    Lazy(LazyRef),
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Scalar(s) => s.type_name(),
            Kind::Object(_) => "object",
            Kind::Array(_) => "array",
            Kind::Tuple(_) => "tuple",
            Kind::Map(_) => "map",
            Kind::Optional(_) => "optional",
            Kind::Cast { deep: false, .. } => "cast",
            Kind::Cast { deep: true, .. } => "deepCast",
            Kind::Presence {
                optional: true,
                deep: false,
                ..
            } => "partial",
            Kind::Presence {
                optional: false,
                deep: false,
                ..
            } => "required",
            Kind::Presence {
                optional: true,
                deep: true,
                ..
            } => "deepPartial",
            Kind::Presence {
                optional: false,
                deep: true,
                ..
            } => "deepRequired",
            Kind::DeepOptions { .. } => "deepOptions",
            Kind::And(_) => "and",
            Kind::Or(_) => "or",
            Kind::If(_) => "if",
            Kind::Lazy(_) => "lazy",
        }
    }
}

#[derive(Clone)]
pub(crate) struct Node {
    pub kind: Kind,
    pub options: Options,
    pub steps: Vec<Step>,
}

impl Node {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            options: Options::default(),
            steps: vec![Step::Core],
        }
    }
}

/// Handle to a node of a schema graph.
///
/// Cloning is cheap and shares the node. Nodes are read-only once built,
/// so one validator may be reused across calls and threads.
#[derive(Clone)]
pub struct Validator(pub(crate) Arc<Node>);

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("kind", &self.kind_name())
            .field("options", &self.0.options)
            .finish()
    }
}

/// Child resolved on first use by calling `build`.
pub fn lazy<F>(build: F) -> Validator
where
    F: Fn() -> Validator + Send + Sync + 'static,
{
    lazy_cell(None, build)
}

/// Like [`lazy`], with a label that lets derived views recognise recursion.
pub fn lazy_named<F>(label: impl Into<String>, build: F) -> Validator
where
    F: Fn() -> Validator + Send + Sync + 'static,
{
    lazy_cell(Some(label.into()), build)
}

fn lazy_cell<F>(label: Option<String>, build: F) -> Validator
where
    F: Fn() -> Validator + Send + Sync + 'static,
{
    Validator::from_kind(Kind::Lazy(LazyRef::Thunk(Arc::new(LazyCell {
        label,
        cell: OnceLock::new(),
        thunk: Box::new(build),
    }))))
}

impl Validator {
    pub(crate) fn from_kind(kind: Kind) -> Self {
        Validator(Arc::new(Node::new(kind)))
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }

    pub(crate) fn ptr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    fn with_node(&self, edit: impl FnOnce(&mut Node)) -> Self {
        let mut node = (*self.0).clone();
        edit(&mut node);
        Validator(Arc::new(node))
    }

    /// Same options and steps, different kind.
    pub(crate) fn with_kind(&self, kind: Kind) -> Self {
        self.with_node(|node| node.kind = kind)
    }

    pub(crate) fn push_step(&self, step: Step) -> Self {
        self.with_node(|node| node.steps.push(step))
    }

    /// Build a self-referential schema.
    ///
    /// `build` receives a reference to the validator being defined; it is
    /// resolved through a weak back-edge, so the graph does not leak.
    ///
    /// ```
    /// use shape_schema::{array, object, string, Validator};
    /// use serde_json::json;
    ///
    /// let tree = Validator::recursive(|tree| {
    ///     object()
    ///         .property("name", string())
    ///         .property("children", array(tree).build().optional())
    ///         .build()
    /// });
    /// let value = json!({"name": "a", "children": [{"name": "b"}]});
    /// assert!(tree.validate(value).is_ok());
    /// ```
    pub fn recursive<F>(build: F) -> Validator
    where
        F: FnOnce(Validator) -> Validator,
    {
        Validator(Arc::new_cyclic(|weak| {
            let this = Validator::from_kind(Kind::Lazy(LazyRef::Cyclic(weak.clone())));
            let built = build(this);
            match Arc::try_unwrap(built.0) {
                Ok(node) => node,
                Err(shared) => (*shared).clone(),
            }
        }))
    }

    /// Kind tag, e.g. `"string"`, `"object"`, `"deepPartial"`.
    pub fn kind_name(&self) -> &'static str {
        self.0.kind.name()
    }

    /// Locally configured options.
    pub fn options(&self) -> &Options {
        &self.0.options
    }

    pub fn description(&self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with_node(|node| node.options.description = Some(text))
    }

    /// Value returned by [`Validator::sample`] instead of a synthesized one.
    pub fn example(&self, value: Value) -> Self {
        self.with_node(|node| node.options.sample = Some(value))
    }

    /// Coerce the input before this node's check.
    pub fn cast(&self) -> Self {
        self.with_node(|node| node.options.cast = Some(true))
    }

    /// Stop the enclosing validation on any issue raised by this node.
    pub fn fatal(&self) -> Self {
        self.with_node(|node| node.options.fatal = Some(true))
    }

    /// Overlay arbitrary local options.
    pub fn with_options(&self, options: &Options) -> Self {
        self.with_node(|node| node.options = node.options.overlay(options))
    }

    /// Accept an absent value.
    pub fn optional(&self) -> Self {
        match self.0.kind {
            Kind::Optional(_) => self.clone(),
            _ => modifier::optional(self.clone()),
        }
    }

    /// Accept an absent or `null` value.
    pub fn nullish(&self) -> Self {
        self.optional()
            .with_node(|node| node.options.absent = Some(Absent::Nullish))
    }

    /// Accept any falsy value as absent.
    pub fn falsy(&self) -> Self {
        self.optional()
            .with_node(|node| node.options.absent = Some(Absent::Falsy))
    }

    /// Substitute `value` when the input is absent.
    pub fn default(&self, value: Value) -> Self {
        self.default_from(Fallback::value(value))
    }

    pub fn default_from(&self, fallback: Fallback) -> Self {
        self.optional()
            .with_node(|node| node.options.default = Some(fallback))
    }

    /// Whether object/map properties with an absent result are deleted.
    ///
    /// When unset, a key missing from the input stays missing, but a key
    /// that was present is written back as `null`. Under `falsy()` that
    /// turns an input `0` into `null`; pass `true` to drop the key instead.
    pub fn delete_undefined(&self, delete: bool) -> Self {
        self.with_node(|node| node.options.delete_undefined = Some(delete))
    }

    /// Fail with `message` when `predicate` rejects the output.
    ///
    /// Skipped when the output is absent.
    pub fn test<F>(&self, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Context<'_>) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        self.custom(
            false,
            Arc::new(move |ctx: &mut Context<'_>| {
                let ctx: &Context<'_> = ctx;
                match ctx.output() {
                    Some(value) if !predicate(value, ctx) => Err(Failure::from(message.clone())),
                    _ => Ok(()),
                }
            }),
        )
    }

    /// Replace the output. Skipped when the output is absent.
    pub fn transform<F>(&self, map: F) -> Self
    where
        F: Fn(Value, &mut Context<'_>) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        self.custom(
            false,
            Arc::new(move |ctx: &mut Context<'_>| {
                let Some(value) = ctx.output.clone() else {
                    return Ok(());
                };
                let mapped = map(value, ctx)?;
                ctx.output = Some(mapped);
                Ok(())
            }),
        )
    }

    /// Append a raw pipeline step.
    pub fn step<F>(&self, run: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.custom(false, Arc::new(run))
    }

    /// Append a step whose failure stops the enclosing validation.
    pub fn step_fatal<F>(&self, run: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.custom(true, Arc::new(run))
    }

    fn custom(&self, fatal: bool, run: StepFn) -> Self {
        self.push_step(Step::Custom(CustomStep { run, fatal }))
    }

    /// Validate a value with default options.
    ///
    /// An absent result is returned as `null`.
    ///
    /// # Errors
    ///
    /// Returns the collected [`Violations`] when the value does not match.
    pub fn validate(&self, input: Value) -> Result<Value, Violations> {
        self.validate_with(Some(input), ValidateOptions::default())
            .map(|output| output.unwrap_or(Value::Null))
    }

    /// Validate a possibly-absent value with explicit call options.
    ///
    /// # Errors
    ///
    /// Returns the collected [`Violations`] (never empty) when the value
    /// does not match.
    pub fn validate_with(
        &self,
        input: Option<Value>,
        options: ValidateOptions<'_>,
    ) -> Result<Option<Value>, Violations> {
        let ValidateOptions {
            name,
            location,
            context,
            overrides,
        } = options;
        let mut own_bag = ContextBag::new();
        let bag = match context {
            Some(bag) => bag,
            None => &mut own_bag,
        };

        debug!(kind = self.kind_name(), %location, "validate");
        let frame = Frame {
            name,
            location,
            key: None,
            parent: None,
            bag,
            call: overrides,
            deep: DeepOptions::default(),
            scoped: Options::default(),
        };
        let result = self.run(input, frame);
        if let Err(violations) = &result {
            debug!(
                issues = violations.len(),
                fatal = violations.is_fatal(),
                "validation failed"
            );
        }
        result
    }

    /// Run this node's pipeline in a fresh context and aggregator.
    pub(crate) fn run(
        &self,
        input: Option<Value>,
        frame: Frame<'_>,
    ) -> Result<Option<Value>, Violations> {
        let node = self.node();
        let options = resolve(&frame.call, &frame.deep, &frame.scoped, &node.options);
        let mut ctx = Context::new(input, frame, options);
        let mut violations = Violations::new();

        for step in &node.steps {
            let outcome = match step {
                Step::Core => self.core(&mut ctx),
                Step::Rule(rule) => rule.apply(&ctx).map(|()| Flow::Continue),
                Step::Custom(custom) => (custom.run)(&mut ctx)
                    .map(|()| Flow::Continue)
                    .map_err(|failure| {
                        if custom.fatal {
                            failure.into_fatal()
                        } else {
                            failure
                        }
                    }),
            };
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(failure) => absorb(&mut violations, failure, &ctx)?,
            }
        }

        if violations.is_empty() {
            Ok(ctx.output)
        } else {
            Err(violations)
        }
    }

    fn core(&self, ctx: &mut Context<'_>) -> Result<Flow, Failure> {
        let own = &self.node().options;
        match &self.node().kind {
            Kind::Scalar(scalar) => {
                intercepted(ctx, |value| scalar.cast(value), |ctx| scalar.check(ctx))
            }
            Kind::Object(shape) => {
                intercepted(ctx, |value| shape.cast(value), |ctx| shape.check(ctx))
            }
            Kind::Array(shape) => {
                intercepted(ctx, |value| shape.cast(value), |ctx| shape.check(ctx))
            }
            Kind::Tuple(shape) => {
                intercepted(ctx, |value| shape.cast(value), |ctx| shape.check(ctx))
            }
            Kind::Map(shape) => {
                intercepted(ctx, |value| shape.cast(value), |ctx| shape.check(ctx))
            }
            kind @ (Kind::Optional(_)
            | Kind::Cast { .. }
            | Kind::Presence { .. }
            | Kind::DeepOptions { .. }) => modifier::run(kind, own, ctx),
            Kind::And(alternatives) => composition::run_and(alternatives, ctx),
            Kind::Or(choice) => composition::run_or(choice, ctx),
            Kind::If(gate) => composition::run_gate(gate, ctx),
            Kind::Lazy(lazy) => {
                let target = lazy
                    .resolve()
                    .map_err(|e| Failure::report(IssueKind::Custom, e.to_string()))?;
                let deep = ctx.deep.clone();
                let scoped = ctx.scoped.overlay(own);
                delegate(&target, ctx, deep, scoped)
            }
        }
    }
}

/// Push a step failure into the call's aggregator, re-throwing on fatal.
fn absorb(
    violations: &mut Violations,
    failure: Failure,
    ctx: &Context<'_>,
) -> Result<(), Violations> {
    let fatal = failure.fatal || ctx.options.fatal;
    let result = match failure.raised {
        Raised::Report { kind, message } => violations.push(
            Issue::new(kind, message)
                .at(&ctx.name, &ctx.location)
                .with_input(ctx.input.clone())
                .with_output(ctx.output.clone()),
            fatal,
        ),
        Raised::Issue(issue) => violations.push(issue, fatal),
        Raised::Nested(nested) => {
            let nested = if fatal { nested.into_fatal() } else { nested };
            violations.merge(nested)
        }
    };
    if let Err(thrown) = &result {
        debug!(location = %ctx.location, issues = thrown.len(), "fatal issue, aborting");
    }
    result
}

/// Optional/default interception, then casting, then the kind's check.
fn intercepted<C, K>(ctx: &mut Context<'_>, cast: C, check: K) -> Result<Flow, Failure>
where
    C: FnOnce(Option<Value>) -> Option<Value>,
    K: FnOnce(&mut Context<'_>) -> Result<(), Failure>,
{
    if intercept(ctx)? == Flow::Stop {
        return Ok(Flow::Stop);
    }
    if ctx.options.cast {
        let value = ctx.output.take();
        ctx.output = cast(value);
    }
    check(ctx)?;
    Ok(Flow::Continue)
}

fn intercept(ctx: &mut Context<'_>) -> Result<Flow, Failure> {
    if !ctx.options.is_absent(&ctx.output) {
        return Ok(Flow::Continue);
    }
    if ctx.options.optional || ctx.options.default.is_some() {
        return Ok(match ctx.options.default.clone() {
            None => {
                ctx.output = None;
                Flow::Stop
            }
            Some(fallback) => {
                ctx.output = Some(fallback.produce());
                if fallback.validates() {
                    Flow::Continue
                } else {
                    Flow::Stop
                }
            }
        });
    }
    if ctx.output.is_none() {
        return Err(Failure::report(IssueKind::Required, "value is required"));
    }
    Ok(Flow::Continue)
}

/// Run `inner` in place of the current node: same name, location and parent.
pub(crate) fn delegate(
    inner: &Validator,
    ctx: &mut Context<'_>,
    deep: DeepOptions,
    scoped: Options,
) -> Result<Flow, Failure> {
    let frame = Frame {
        name: ctx.name.clone(),
        location: ctx.location.clone(),
        key: ctx.key.clone(),
        parent: ctx.parent,
        bag: &mut *ctx.bag,
        call: ctx.call.clone(),
        deep,
        scoped,
    };
    let output = inner
        .run(ctx.output.clone(), frame)
        .map_err(Failure::nested)?;
    ctx.output = output;
    Ok(Flow::Continue)
}
