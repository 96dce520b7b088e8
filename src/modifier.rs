//! Modifier validators.
//!
//! A modifier wraps a child without changing it: it adjusts the overlay
//! the child is run under (or bypasses it for absent values) and
//! delegates the actual check. The modifier's own local options reach
//! the wrapped node as scoped options, below the node's own. Reshaping modifiers (`omit`, `pick`)
//! return a new object node with a copied property list; shared nodes
//! are never rewritten in place.

use crate::context::Context;
use crate::error::{BuildError, Failure};
use crate::node::{delegate, Flow, Kind, Validator};
use crate::options::{DeepOptions, Options};

/// Bypass `inner` for absent values, substituting the configured default.
pub fn optional(inner: impl Into<Validator>) -> Validator {
    Validator::from_kind(Kind::Optional(inner.into()))
        .with_options(&Options::new().optional(true))
}

/// Force casting on the wrapped validator.
pub fn cast(inner: impl Into<Validator>) -> Validator {
    Validator::from_kind(Kind::Cast {
        inner: inner.into(),
        deep: false,
    })
}

/// Force casting on the wrapped validator and every descendant.
pub fn deep_cast(inner: impl Into<Validator>) -> Validator {
    Validator::from_kind(Kind::Cast {
        inner: inner.into(),
        deep: true,
    })
}

/// Make the direct children of the wrapped container optional.
pub fn partial(inner: impl Into<Validator>) -> Validator {
    presence(inner.into(), true, false)
}

/// Make the direct children of the wrapped container required.
pub fn required(inner: impl Into<Validator>) -> Validator {
    presence(inner.into(), false, false)
}

/// Make every descendant optional.
pub fn deep_partial(inner: impl Into<Validator>) -> Validator {
    presence(inner.into(), true, true)
}

/// Make every descendant required.
pub fn deep_required(inner: impl Into<Validator>) -> Validator {
    presence(inner.into(), false, true)
}

fn presence(inner: Validator, optional: bool, deep: bool) -> Validator {
    Validator::from_kind(Kind::Presence {
        inner,
        optional,
        deep,
    })
}

/// Inject `options` into every descendant's overlay.
pub fn deep_options(inner: impl Into<Validator>, options: Options) -> Validator {
    Validator::from_kind(Kind::DeepOptions {
        inner: inner.into(),
        options,
    })
}

/// Overlay a modifier hands to the node it wraps, or `None` for other kinds.
///
/// `scoped` is the modifier's own scoped tier with its local options
/// already applied.
pub(crate) fn overlay<'k>(
    kind: &'k Kind,
    deep: &DeepOptions,
    scoped: &Options,
) -> Option<(&'k Validator, DeepOptions, Options)> {
    let cast = Options::new().cast(true);
    match kind {
        Kind::Optional(inner) => Some((inner, deep.clone(), scoped.clone())),
        Kind::Cast { inner, deep: false } => Some((inner, deep.clone(), scoped.overlay(&cast))),
        Kind::Cast { inner, deep: true } => Some((inner, deep.with_all(&cast), scoped.clone())),
        Kind::Presence {
            inner,
            optional,
            deep: everywhere,
        } => {
            let flip = Options::new().presence(*optional);
            let deep = if *everywhere {
                deep.with_all(&flip)
            } else {
                deep.with_children(&flip)
            };
            Some((inner, deep, scoped.clone()))
        }
        Kind::DeepOptions { inner, options } => {
            Some((inner, deep.with_all(options), scoped.clone()))
        }
        _ => None,
    }
}

/// Core step of a modifier node.
///
/// An `optional` wrapper made required by an enclosing presence modifier
/// only bypasses its child when it has a default.
pub(crate) fn run(kind: &Kind, own: &Options, ctx: &mut Context<'_>) -> Result<Flow, Failure> {
    let bypass = ctx.options.optional || ctx.options.default.is_some();
    if matches!(kind, Kind::Optional(_)) && bypass && ctx.options.is_absent(&ctx.output) {
        match ctx.options.default.clone() {
            None => {
                ctx.output = None;
                return Ok(Flow::Stop);
            }
            Some(fallback) if !fallback.validates() => {
                ctx.output = Some(fallback.produce());
                return Ok(Flow::Stop);
            }
            Some(fallback) => ctx.output = Some(fallback.produce()),
        }
    }
    match overlay(kind, &ctx.deep, &ctx.scoped.overlay(own)) {
        Some((inner, deep, scoped)) => delegate(inner, ctx, deep, scoped),
        None => Ok(Flow::Continue),
    }
}

impl Validator {
    /// New object validator without the named properties.
    ///
    /// Rewrites through modifier wrappers and lazy references; the
    /// original graph is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotAnObject` if no object validator is found.
    pub fn omit<I, S>(&self, keys: I) -> Result<Validator, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        self.reshape("omit", &|properties| {
            properties.retain(|(name, _)| !keys.contains(name));
        })
    }

    /// New object validator with only the named properties.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::NotAnObject` if no object validator is found.
    pub fn pick<I, S>(&self, keys: I) -> Result<Validator, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        self.reshape("pick", &|properties| {
            properties.retain(|(name, _)| keys.contains(name));
        })
    }

    fn reshape(
        &self,
        operation: &'static str,
        edit: &dyn Fn(&mut Vec<(String, Validator)>),
    ) -> Result<Validator, BuildError> {
        let kind = match &self.node().kind {
            Kind::Object(shape) => {
                let mut shape = shape.clone();
                edit(&mut shape.properties);
                Kind::Object(shape)
            }
            Kind::Optional(inner) => Kind::Optional(inner.reshape(operation, edit)?),
            Kind::Cast { inner, deep } => Kind::Cast {
                inner: inner.reshape(operation, edit)?,
                deep: *deep,
            },
            Kind::Presence {
                inner,
                optional,
                deep,
            } => Kind::Presence {
                inner: inner.reshape(operation, edit)?,
                optional: *optional,
                deep: *deep,
            },
            Kind::DeepOptions { inner, options } => Kind::DeepOptions {
                inner: inner.reshape(operation, edit)?,
                options: options.clone(),
            },
            Kind::Lazy(lazy) => return lazy.resolve()?.reshape(operation, edit),
            other => {
                return Err(BuildError::NotAnObject {
                    operation,
                    kind: other.name(),
                })
            }
        };
        Ok(self.with_kind(kind))
    }
}
