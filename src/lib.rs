//! Shape Schema
//!
//! Composable validators for dynamically typed JSON values.
//!
//! A schema is a graph of [`Validator`] nodes built from small
//! constructor functions. Validating a value walks the graph, optionally
//! casts inputs towards the expected types, and either returns the
//! (possibly transformed) output or every issue found, each located by a
//! dotted path such as `input.items.2.price`.
//!
//! # Example
//!
//! ```
//! use shape_schema::{array, number, object, string, IssueKind};
//! use serde_json::json;
//!
//! let order = object()
//!     .property("id", string())
//!     .property("qty", number().cast().min(1.0))
//!     .property("tags", array(string()).build().optional())
//!     .build();
//!
//! let output = order.validate(json!({"id": "A1", "qty": "2"})).unwrap();
//! assert_eq!(output, json!({"id": "A1", "qty": 2}));
//!
//! let err = order.validate(json!({"id": 1, "qty": 0, "extra": true})).unwrap_err();
//! assert_eq!(err.locations(), vec!["input.id", "input.qty", "input.extra"]);
//! assert_eq!(err.issues()[2].kind, IssueKind::UnexpectedProperty);
//! ```
//!
//! # Option overlays
//!
//! | Modifier | Effect |
//! |----------|--------|
//! | `optional`, `.default(v)` | absent input passes, or takes the default |
//! | `cast` / `deep_cast` | coerce the wrapped node / every descendant |
//! | `partial` / `required` | toggle presence of direct children |
//! | `deep_partial` / `deep_required` | toggle presence of every descendant |
//! | `deep_options` | inject arbitrary options into every descendant |
//!
//! Options set on a node itself always win over inherited ones.
//!
//! # Derived views
//!
//! The same graph can be described ([`Validator::describe`]), sampled
//! ([`Validator::sample`]), compiled into an overlay-free graph
//! ([`Validator::to_static`]), exported as JSON Schema
//! ([`to_json_schema`]) and rebuilt from a JSON definition
//! ([`from_definition`]).

mod compile;
mod composition;
mod context;
mod definition;
mod describe;
mod error;
mod export;
mod loader;
mod modifier;
mod node;
mod options;
mod rule;
mod sample;
mod scalar;
mod structural;
mod types;

pub use composition::{and, gate, or, or_in_order, when};
pub use context::{Context, ContextBag, Scope, ValidateOptions};
pub use definition::from_definition;
pub use error::{
    BuildError, ConformanceError, DefinitionError, Failure, Issue, IssueKind, LoadError, Raised,
    SchemaError, Violations,
};
pub use export::{conforms, to_json_schema};
pub use loader::{is_url, load_definition, load_definition_auto, load_definition_str};
pub use modifier::{
    cast, deep_cast, deep_options, deep_partial, deep_required, optional, partial, required,
};
pub use node::{lazy, lazy_named, Validator};
pub use options::{Absent, DeepOptions, Fallback, Options, Resolved};
pub use sample::Sample;
pub use scalar::{any, boolean, choices, integer, literal, null, number, string};
pub use structural::{
    array, map, object, tuple, ArraySchema, Extra, KeyPolicy, MapSchema, ObjectSchema,
    TupleSchema,
};
pub use types::{json_type_name, Key, ROOT_LABEL};

#[cfg(feature = "remote")]
pub use loader::load_definition_url;
