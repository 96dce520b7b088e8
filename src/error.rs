//! Error types for schema construction, validation and definition loading.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Category of a single validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Input is not of the expected primitive or container type.
    TypeMismatch,
    /// A required value was absent.
    Required,
    /// String or array length outside the configured bounds.
    Length,
    /// Numeric value outside the configured bounds.
    Range,
    /// String did not match the configured pattern.
    Pattern,
    /// Value is not one of the allowed choices.
    Choice,
    /// Object carried a property the schema does not allow.
    UnexpectedProperty,
    /// Tuple has the wrong number of entries.
    Arity,
    /// A `when`/`gate` condition was not satisfied.
    Condition,
    /// No alternative of an `or` matched.
    NoMatch,
    /// Raised by a caller-supplied step.
    Custom,
}

/// Single validation issue with location context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Human-readable error message.
    pub message: String,
    /// Name of the value being validated (property name or root label).
    pub name: String,
    /// Dotted path from the root call (e.g. `input.items.2`).
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Failures of the individual alternatives behind a `NoMatch` issue.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Issue>,
}

impl Issue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            name: String::new(),
            location: String::new(),
            input: None,
            output: None,
            related: Vec::new(),
        }
    }

    /// Set the name and location of the issue.
    pub fn at(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.name = name.into();
        self.location = location.into();
        self
    }

    pub fn with_input(mut self, input: Option<Value>) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Option<Value>) -> Self {
        self.output = output;
        self
    }

    pub fn with_related(mut self, related: Vec<Issue>) -> Self {
        self.related = related;
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Collector of validation issues for one `validate` call.
///
/// The aggregator is *empty*, *collecting* (issues present) or *fatal*.
/// Pushing or merging a fatal entry returns the whole aggregator as `Err`,
/// so callers stop processing further steps or siblings by propagating it
/// with `?`. A non-fatal push returns `Ok(())` and the caller carries on.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("validation failed with {} issue(s)", .issues.len())]
pub struct Violations {
    issues: Vec<Issue>,
    fatal: bool,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one issue; a fatal push re-throws the aggregator.
    pub fn push(&mut self, issue: Issue, fatal: bool) -> Result<(), Violations> {
        self.issues.push(issue);
        if fatal {
            self.fatal = true;
            return Err(std::mem::take(self));
        }
        Ok(())
    }

    /// Concatenate the issues of a nested aggregator, inheriting its fatal flag.
    pub fn merge(&mut self, other: Violations) -> Result<(), Violations> {
        let fatal = other.fatal;
        self.issues.extend(other.issues);
        if fatal {
            self.fatal = true;
            return Err(std::mem::take(self));
        }
        Ok(())
    }

    /// Mark the aggregator as fatal without adding issues.
    pub fn into_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    /// Locations of all issues, in the order they were collected.
    pub fn locations(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.location.as_str()).collect()
    }
}

/// What a pipeline step reports when it fails.
#[derive(Debug, Clone)]
pub enum Raised {
    /// Message and category; location and values are filled from the context.
    Report { kind: IssueKind, message: String },
    /// A fully-formed issue, taken as-is.
    Issue(Issue),
    /// Issues collected by a nested call.
    Nested(Violations),
}

/// Failure returned by a step, optionally requesting fatal termination.
#[derive(Debug, Clone)]
pub struct Failure {
    pub raised: Raised,
    pub fatal: bool,
}

impl Failure {
    pub fn report(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            raised: Raised::Report {
                kind,
                message: message.into(),
            },
            fatal: false,
        }
    }

    pub fn nested(violations: Violations) -> Self {
        let fatal = violations.is_fatal();
        Self {
            raised: Raised::Nested(violations),
            fatal,
        }
    }

    /// Request that the enclosing aggregator stop on this failure.
    pub fn into_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::report(IssueKind::Custom, message)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::report(IssueKind::Custom, message)
    }
}

impl From<Issue> for Failure {
    fn from(issue: Issue) -> Self {
        Self {
            raised: Raised::Issue(issue),
            fatal: false,
        }
    }
}

impl From<Violations> for Failure {
    fn from(violations: Violations) -> Self {
        Failure::nested(violations)
    }
}

/// Errors while composing a schema graph.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{operation} requires an object schema, got {kind}")]
    NotAnObject {
        operation: &'static str,
        kind: &'static str,
    },

    #[error("recursive schema reference is no longer alive")]
    DanglingReference,

    #[error("invalid pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors while turning a schema definition document into a validator.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("invalid definition at {path}: expected {expected}, got {actual}")]
    InvalidType {
        path: String,
        expected: &'static str,
        actual: String,
    },

    #[error("unknown type \"{value}\" at {path}")]
    UnknownType { path: String, value: String },

    #[error("unresolved reference \"{name}\" at {path}")]
    UnknownRef { path: String, name: String },

    #[error("invalid definition at {path}: {source}")]
    Build {
        path: String,
        #[source]
        source: BuildError,
    },
}

/// Errors while loading a definition document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

/// Single conformance error against an exported JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors while checking a value against a validator's exported JSON Schema.
#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("exported schema is invalid: {message}")]
    InvalidSchema { message: String },

    #[error("value does not conform to description: {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl DefinitionError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}
