//! # Tuning Parameters
//!
//! A [`Parameter`] is a named [`Range`] with an optional [`Constraint`].
//! Constraints declare the parameter names they depend on explicitly:
//! the dependency list must contain the owning parameter itself and may
//! otherwise only name parameters declared earlier. The search space
//! uses the lists to split parameters into independent groups; the
//! predicate itself just reads the partial assignment it is handed.
//!
//! ```
//! use tunekit::parameter::{Constraint, Parameter};
//! use tunekit::range::Range;
//!
//! let cache = Parameter::new("cache_kb", Range::interval(1, 64).unwrap());
//! let line = Parameter::constrained(
//!     "line_kb",
//!     Range::interval(1, 64).unwrap(),
//!     Constraint::new(["line_kb", "cache_kb"], |config| {
//!         config["cache_kb"].as_int().unwrap() % config["line_kb"].as_int().unwrap() == 0
//!     }),
//! );
//! assert_eq!(line.constraint().unwrap().references(), ["line_kb", "cache_kb"]);
//! # let _ = cache;
//! ```

use crate::range::Range;
use crate::value::Configuration;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Feasibility predicate over a partial assignment.
#[derive(Clone)]
pub struct Constraint {
    references: Vec<String>,
    predicate: Arc<dyn Fn(&Configuration) -> bool + Send + Sync>,
    source: Option<String>,
}

impl Constraint {
    /// A constraint depending on `references`, which must include the
    /// owning parameter's name.
    pub fn new(
        references: impl IntoIterator<Item = impl Into<String>>,
        predicate: impl Fn(&Configuration) -> bool + Send + Sync + 'static,
    ) -> Self {
        Constraint {
            references: references.into_iter().map(Into::into).collect(),
            predicate: Arc::new(predicate),
            source: None,
        }
    }

    /// Attaches predicate source text for the tuning log.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The parameter names this constraint depends on.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Evaluates the predicate against a partial assignment that
    /// contains at least every referenced parameter.
    pub fn is_satisfied(&self, partial: &Configuration) -> bool {
        (self.predicate)(partial)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("references", &self.references)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// A named tuning parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    range: Range,
    constraint: Option<Constraint>,
}

impl Parameter {
    /// An unconstrained parameter.
    pub fn new(name: impl Into<String>, range: Range) -> Self {
        Parameter {
            name: name.into(),
            range,
            constraint: None,
        }
    }

    /// A parameter whose feasible values depend on earlier parameters.
    pub fn constrained(name: impl Into<String>, range: Range, constraint: Constraint) -> Self {
        Parameter {
            name: name.into(),
            range,
            constraint: Some(constraint),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    /// JSON descriptor for the tuning log.
    pub fn descriptor(&self) -> serde_json::Value {
        let mut json = json!({
            "name": self.name,
            "range": self.range.descriptor(),
        });
        if let Some(source) = self.constraint.as_ref().and_then(Constraint::source) {
            json["constraint"] = json!(source);
        }
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_constraint_evaluation() {
        let c = Constraint::new(["tp2", "tp1"], |config| {
            config["tp2"].as_int().unwrap() % config["tp1"].as_int().unwrap() == 0
        });
        let mut partial = Configuration::new();
        partial.insert("tp1".into(), Value::Int(3));
        partial.insert("tp2".into(), Value::Int(9));
        assert!(c.is_satisfied(&partial));
        partial.insert("tp2".into(), Value::Int(8));
        assert!(!c.is_satisfied(&partial));
    }

    #[test]
    fn test_descriptor_with_and_without_source() {
        let plain = Parameter::new("tp1", Range::interval(1, 10).unwrap());
        assert_eq!(
            plain.descriptor(),
            serde_json::json!({
                "name": "tp1",
                "range": {"kind": "Interval", "start": 1, "end": 10, "step": 1},
            })
        );

        let constrained = Parameter::constrained(
            "tp2",
            Range::interval(1, 10).unwrap(),
            Constraint::new(["tp2"], |_| true).with_source("tp2 % 2 == 0"),
        );
        assert_eq!(
            constrained.descriptor()["constraint"],
            serde_json::json!("tp2 % 2 == 0")
        );
    }
}
