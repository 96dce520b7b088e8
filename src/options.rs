//! Option overlay resolution.
//!
//! Every node invocation sees one effective option set, merged from:
//!
//! | Tier | Source | Reaches |
//! |------|--------|---------|
//! | call | options passed to `validate_with` | the root node and modifiers it delegates to |
//! | deep | `deep_*` modifiers | every descendant until replaced |
//! | scoped | `cast`, `partial`, `required` | the wrapped node, or direct children of the next container |
//! | local | the node's own builder calls | that node only |
//!
//! Later tiers win. The one exception is `presence`, set by the
//! `partial`/`required` family: once merged it replaces the `optional`
//! flag, so `required` also reaches children built with `.optional()`. Resolution runs once per nested call and is never
//! cached, since the same node can sit under different overlays.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::is_falsy;

/// Which inputs count as "absent" for optional handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Absent {
    /// Only a missing value.
    #[default]
    Undefined,
    /// Missing or `null`.
    Nullish,
    /// Missing, `null`, `false`, `0` or `""`.
    Falsy,
}

impl Absent {
    pub fn matches(&self, value: &Option<Value>) -> bool {
        match self {
            Absent::Undefined => value.is_none(),
            Absent::Nullish => matches!(value, None | Some(Value::Null)),
            Absent::Falsy => is_falsy(value),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Absent::Undefined => "undefined",
            Absent::Nullish => "nullish",
            Absent::Falsy => "falsy",
        }
    }

    /// Parse a policy name; returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "undefined" => Some(Absent::Undefined),
            "nullish" => Some(Absent::Nullish),
            "falsy" => Some(Absent::Falsy),
            _ => None,
        }
    }
}

type Thunk = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
enum FallbackSource {
    Value(Value),
    Thunk(Thunk),
}

/// Default substituted for an absent value.
#[derive(Clone)]
pub struct Fallback {
    source: FallbackSource,
    validate: bool,
}

impl Fallback {
    pub fn value(value: Value) -> Self {
        Self {
            source: FallbackSource::Value(value),
            validate: false,
        }
    }

    /// Default computed on every use.
    pub fn with<F>(produce: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            source: FallbackSource::Thunk(Arc::new(produce)),
            validate: false,
        }
    }

    /// Run the default through the wrapped validator before accepting it.
    pub fn validated(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn validates(&self) -> bool {
        self.validate
    }

    pub fn produce(&self) -> Value {
        match &self.source {
            FallbackSource::Value(v) => v.clone(),
            FallbackSource::Thunk(f) => f(),
        }
    }

    /// The fixed value, if the default is not computed.
    pub fn fixed(&self) -> Option<&Value> {
        match &self.source {
            FallbackSource::Value(v) => Some(v),
            FallbackSource::Thunk(_) => None,
        }
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Fallback");
        match &self.source {
            FallbackSource::Value(v) => s.field("value", v),
            FallbackSource::Thunk(_) => s.field("value", &"<computed>"),
        };
        s.field("validate", &self.validate).finish()
    }
}

/// Options that may be set on a node or injected by an overlay.
///
/// Unset fields defer to lower tiers.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub description: Option<String>,
    pub sample: Option<Value>,
    pub cast: Option<bool>,
    pub fatal: Option<bool>,
    pub optional: Option<bool>,
    /// Optional status forced by a presence modifier; outranks `optional`.
    pub presence: Option<bool>,
    pub absent: Option<Absent>,
    pub default: Option<Fallback>,
    pub delete_undefined: Option<bool>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cast(mut self, cast: bool) -> Self {
        self.cast = Some(cast);
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn presence(mut self, optional: bool) -> Self {
        self.presence = Some(optional);
        self
    }

    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = Some(fatal);
        self
    }

    pub fn absent(mut self, absent: Absent) -> Self {
        self.absent = Some(absent);
        self
    }

    pub fn default_value(mut self, fallback: Fallback) -> Self {
        self.default = Some(fallback);
        self
    }

    pub fn delete_undefined(mut self, delete: bool) -> Self {
        self.delete_undefined = Some(delete);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Merge `higher` over `self`; set fields of `higher` win.
    pub fn overlay(&self, higher: &Options) -> Options {
        Options {
            description: higher
                .description
                .clone()
                .or_else(|| self.description.clone()),
            sample: higher.sample.clone().or_else(|| self.sample.clone()),
            cast: higher.cast.or(self.cast),
            fatal: higher.fatal.or(self.fatal),
            optional: higher.optional.or(self.optional),
            presence: higher.presence.or(self.presence),
            absent: higher.absent.or(self.absent),
            default: higher.default.clone().or_else(|| self.default.clone()),
            delete_undefined: higher.delete_undefined.or(self.delete_undefined),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.sample.is_none()
            && self.cast.is_none()
            && self.fatal.is_none()
            && self.optional.is_none()
            && self.presence.is_none()
            && self.absent.is_none()
            && self.default.is_none()
            && self.delete_undefined.is_none()
    }
}

/// Options injected by modifiers for the nodes below them.
#[derive(Debug, Clone, Default)]
pub struct DeepOptions {
    /// Applies to every descendant.
    pub all: Options,
    /// Applies only to the direct children of the next container.
    pub children: Options,
}

impl DeepOptions {
    /// Extend the descendant-wide options, clearing any pending
    /// child-scoped value for the same fields.
    pub fn with_all(&self, options: &Options) -> DeepOptions {
        DeepOptions {
            all: self.all.overlay(options),
            children: clear_fields(&self.children, options),
        }
    }

    pub fn with_children(&self, options: &Options) -> DeepOptions {
        DeepOptions {
            all: self.all.clone(),
            children: self.children.overlay(options),
        }
    }

    /// Split into the overlay a container hands to each child: the deep
    /// options it inherits and the child-scoped options it consumes.
    pub fn descend(&self) -> (DeepOptions, Options) {
        (
            DeepOptions {
                all: self.all.clone(),
                children: Options::default(),
            },
            self.children.clone(),
        )
    }
}

fn clear_fields(base: &Options, set: &Options) -> Options {
    let mut out = base.clone();
    if set.description.is_some() {
        out.description = None;
    }
    if set.sample.is_some() {
        out.sample = None;
    }
    if set.cast.is_some() {
        out.cast = None;
    }
    if set.fatal.is_some() {
        out.fatal = None;
    }
    if set.optional.is_some() {
        out.optional = None;
    }
    if set.presence.is_some() {
        out.presence = None;
    }
    if set.absent.is_some() {
        out.absent = None;
    }
    if set.default.is_some() {
        out.default = None;
    }
    if set.delete_undefined.is_some() {
        out.delete_undefined = None;
    }
    out
}

/// Effective options for one node invocation.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub description: Option<String>,
    pub sample: Option<Value>,
    pub cast: bool,
    pub fatal: bool,
    pub optional: bool,
    pub absent: Absent,
    pub default: Option<Fallback>,
    /// `None` means: delete unless the key pre-existed.
    pub delete_undefined: Option<bool>,
}

impl Resolved {
    /// Whether `value` should be treated as absent for optional handling.
    pub fn is_absent(&self, value: &Option<Value>) -> bool {
        self.absent.matches(value)
    }

    /// Options that pin every resolved field when set as a node's local options.
    pub fn to_options(&self) -> Options {
        Options {
            description: self.description.clone(),
            sample: self.sample.clone(),
            cast: Some(self.cast),
            fatal: Some(self.fatal),
            optional: Some(self.optional),
            presence: Some(self.optional),
            absent: Some(self.absent),
            default: self.default.clone(),
            delete_undefined: self.delete_undefined,
        }
    }
}

/// Resolve the effective options for one node invocation.
pub fn resolve(call: &Options, deep: &DeepOptions, scoped: &Options, local: &Options) -> Resolved {
    let merged = call.overlay(&deep.all).overlay(scoped).overlay(local);
    Resolved {
        description: merged.description,
        sample: merged.sample,
        cast: merged.cast.unwrap_or(false),
        fatal: merged.fatal.unwrap_or(false),
        optional: merged.presence.or(merged.optional).unwrap_or(false),
        absent: merged.absent.unwrap_or_default(),
        default: merged.default,
        delete_undefined: merged.delete_undefined,
    }
}
