//! Refinement steps appended after a node's own check.
//!
//! Rules only look at outputs of the type they constrain; a value that
//! already failed its type check is left to that issue.

use regex::Regex;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{BuildError, Failure, IssueKind};
use crate::node::{Step, Validator};
use crate::scalar::number_value;

#[derive(Debug, Clone)]
pub(crate) enum Rule {
    /// Characters of a string or entries of an array.
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Minimum(f64),
    Maximum(f64),
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

impl Rule {
    pub fn apply(&self, ctx: &Context<'_>) -> Result<(), Failure> {
        let Some(value) = ctx.output() else {
            return Ok(());
        };
        match self {
            Rule::MinLength(min) => match length(value) {
                Some(len) if len < *min => Err(Failure::report(
                    IssueKind::Length,
                    format!("expected length of at least {}, got {}", min, len),
                )),
                _ => Ok(()),
            },
            Rule::MaxLength(max) => match length(value) {
                Some(len) if len > *max => Err(Failure::report(
                    IssueKind::Length,
                    format!("expected length of at most {}, got {}", max, len),
                )),
                _ => Ok(()),
            },
            Rule::Pattern(re) => match value {
                Value::String(s) if !re.is_match(s) => Err(Failure::report(
                    IssueKind::Pattern,
                    format!("does not match pattern {}", re.as_str()),
                )),
                _ => Ok(()),
            },
            Rule::Minimum(min) => match value.as_f64() {
                Some(n) if n < *min => Err(Failure::report(
                    IssueKind::Range,
                    format!("expected a value of at least {}, got {}", min, n),
                )),
                _ => Ok(()),
            },
            Rule::Maximum(max) => match value.as_f64() {
                Some(n) if n > *max => Err(Failure::report(
                    IssueKind::Range,
                    format!("expected a value of at most {}, got {}", max, n),
                )),
                _ => Ok(()),
            },
        }
    }

    /// Add this rule's keyword to a description. `items` selects the
    /// array vocabulary for length rules.
    pub fn describe(&self, out: &mut Map<String, Value>, items: bool) {
        let (key, value) = match self {
            Rule::MinLength(n) if items => ("minItems", Value::from(*n)),
            Rule::MaxLength(n) if items => ("maxItems", Value::from(*n)),
            Rule::MinLength(n) => ("minLength", Value::from(*n)),
            Rule::MaxLength(n) => ("maxLength", Value::from(*n)),
            Rule::Pattern(re) => ("pattern", Value::from(re.as_str())),
            Rule::Minimum(n) => ("minimum", number_value(*n)),
            Rule::Maximum(n) => ("maximum", number_value(*n)),
        };
        out.insert(key.to_string(), value);
    }
}

impl Validator {
    /// Minimum length of a string (in characters) or an array.
    pub fn min_length(&self, min: usize) -> Self {
        self.push_step(Step::Rule(Rule::MinLength(min)))
    }

    /// Maximum length of a string (in characters) or an array.
    pub fn max_length(&self, max: usize) -> Self {
        self.push_step(Step::Rule(Rule::MaxLength(max)))
    }

    /// Require strings to match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::InvalidPattern` if the regex does not compile.
    pub fn pattern(&self, pattern: &str) -> Result<Self, BuildError> {
        let re = Regex::new(pattern).map_err(|source| BuildError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(self.push_step(Step::Rule(Rule::Pattern(re))))
    }

    pub fn min(&self, min: f64) -> Self {
        self.push_step(Step::Rule(Rule::Minimum(min)))
    }

    pub fn max(&self, max: f64) -> Self {
        self.push_step(Step::Rule(Rule::Maximum(max)))
    }
}
