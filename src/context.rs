//! Execution context threaded through one `validate` call.

use serde_json::{Map, Value};

use crate::options::{DeepOptions, Options, Resolved};
use crate::types::{Key, ROOT_LABEL};

/// Caller-owned side channel shared by every step of one call tree.
pub type ContextBag = Map<String, Value>;

/// Options for a top-level `validate_with` call.
pub struct ValidateOptions<'a> {
    /// Name reported on root-level issues.
    pub name: String,
    /// Root of every issue location.
    pub location: String,
    /// Side channel; a fresh empty bag is used when `None`.
    pub context: Option<&'a mut ContextBag>,
    /// Call-site option overrides (the lowest overlay tier).
    pub overrides: Options,
}

impl Default for ValidateOptions<'_> {
    fn default() -> Self {
        Self {
            name: ROOT_LABEL.to_string(),
            location: ROOT_LABEL.to_string(),
            context: None,
            overrides: Options::default(),
        }
    }
}

impl<'a> ValidateOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn context(mut self, bag: &'a mut ContextBag) -> Self {
        self.context = Some(bag);
        self
    }

    pub fn overrides(mut self, options: Options) -> Self {
        self.overrides = options;
        self
    }
}

/// Read-only view of an ancestor invocation.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub(crate) input: &'a Option<Value>,
    pub(crate) output: &'a Option<Value>,
    pub(crate) location: &'a str,
    pub(crate) key: Option<&'a Key>,
    pub(crate) parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn input(&self) -> Option<&'a Value> {
        self.input.as_ref()
    }

    /// Output of the ancestor as it stood before it descended.
    pub fn output(&self) -> Option<&'a Value> {
        self.output.as_ref()
    }

    pub fn location(&self) -> &'a str {
        self.location
    }

    pub fn key(&self) -> Option<&'a Key> {
        self.key
    }

    pub fn parent(&self) -> Option<&'a Scope<'a>> {
        self.parent
    }
}

/// Everything a node invocation needs to start.
pub(crate) struct Frame<'a> {
    pub name: String,
    pub location: String,
    pub key: Option<Key>,
    pub parent: Option<&'a Scope<'a>>,
    pub bag: &'a mut ContextBag,
    pub call: Options,
    pub deep: DeepOptions,
    pub scoped: Options,
}

/// Mutable state of one node invocation.
///
/// Steps read the original input, replace the output, and may use the
/// shared bag. The parent scope reaches every ancestor up to the root.
pub struct Context<'a> {
    pub(crate) input: Option<Value>,
    pub(crate) output: Option<Value>,
    pub(crate) name: String,
    pub(crate) location: String,
    pub(crate) key: Option<Key>,
    pub(crate) parent: Option<&'a Scope<'a>>,
    pub(crate) bag: &'a mut ContextBag,
    pub(crate) options: Resolved,
    pub(crate) call: Options,
    pub(crate) deep: DeepOptions,
    pub(crate) scoped: Options,
}

impl<'a> Context<'a> {
    pub(crate) fn new(input: Option<Value>, frame: Frame<'a>, options: Resolved) -> Self {
        Self {
            output: input.clone(),
            input,
            name: frame.name,
            location: frame.location,
            key: frame.key,
            parent: frame.parent,
            bag: frame.bag,
            options,
            call: frame.call,
            deep: frame.deep,
            scoped: frame.scoped,
        }
    }

    /// The value this invocation was called with.
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn set_output(&mut self, output: Option<Value>) {
        self.output = output;
    }

    pub fn take_output(&mut self) -> Option<Value> {
        self.output.take()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Property or index inside the structural parent, if any.
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn parent(&self) -> Option<&Scope<'a>> {
        self.parent
    }

    pub fn bag(&self) -> &ContextBag {
        &*self.bag
    }

    pub fn bag_mut(&mut self) -> &mut ContextBag {
        &mut *self.bag
    }

    /// Effective options of this invocation.
    pub fn options(&self) -> &Resolved {
        &self.options
    }
}
