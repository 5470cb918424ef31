//! Pattern construction
//!
//! A [`Pattern`] is a small tree describing a producer subgraph, rooted at the output
//! being matched and growing toward inputs:
//!
//! - [`any_input`]: accepts any output
//! - [`wrap_type`] / [`wrap_type_with_inputs`]: an output of one of the given op types
//! - [`optional`]: either a node of the given op types over `input`, or `input` itself
//! - [`or`]: the first of several alternatives that matches
//!
//! Any position can carry a label (to retrieve the bound output from a match) and a
//! [`Predicate`].

use indexmap::IndexSet;

use super::predicate::Predicate;

/// Pass-through op types
pub const PASS_THROUGH: &[&str] = &["Identity"];

/// Shape of one pattern position
#[derive(Debug, Clone)]
pub enum PatternKind {
    /// Any output
    Any,
    /// Output of a node whose op type is listed (empty list: any op type).
    /// `inputs` of `None` leaves the node's inputs unconstrained.
    Op {
        /// Accepted op types
        op_types: Vec<String>,
        /// Patterns for each input, in order
        inputs: Option<Vec<Pattern>>,
    },
    /// A node of `op_types` whose first input matches `input`, or `input` directly
    Optional {
        /// Op types of the skippable node
        op_types: Vec<String>,
        /// What lies below the skippable node
        input: Box<Pattern>,
    },
    /// Alternatives tried in declaration order
    Or(Vec<Pattern>),
}

/// A pattern position
#[derive(Debug, Clone)]
pub struct Pattern {
    pub(crate) kind: PatternKind,
    pub(crate) label: Option<String>,
    pub(crate) predicate: Option<Predicate>,
}

impl Pattern {
    fn from_kind(kind: PatternKind) -> Self {
        Self {
            kind,
            label: None,
            predicate: None,
        }
    }

    /// Bind the output matched here to `label`
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a predicate; several predicates must all hold
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Kind of this position
    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    /// Label of this position
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Op types the root position can match, if restricted.
    ///
    /// Used to skip candidates cheaply before a full match.
    pub fn root_op_types(&self) -> Option<Vec<&str>> {
        match &self.kind {
            PatternKind::Op { op_types, .. } if !op_types.is_empty() => {
                Some(op_types.iter().map(String::as_str).collect())
            }
            _ => None,
        }
    }

    /// Every label declared anywhere in the pattern
    pub fn declared_labels(&self) -> IndexSet<String> {
        let mut labels = IndexSet::new();
        self.collect_labels(&mut labels);
        labels
    }

    fn collect_labels(&self, labels: &mut IndexSet<String>) {
        if let Some(label) = &self.label {
            labels.insert(label.clone());
        }
        match &self.kind {
            PatternKind::Any => {}
            PatternKind::Op { inputs, .. } => {
                for input in inputs.iter().flatten() {
                    input.collect_labels(labels);
                }
            }
            PatternKind::Optional { input, .. } => input.collect_labels(labels),
            PatternKind::Or(branches) => {
                for branch in branches {
                    branch.collect_labels(labels);
                }
            }
        }
    }
}

fn to_strings(op_types: &[&str]) -> Vec<String> {
    op_types.iter().map(|s| s.to_string()).collect()
}

/// Any output
pub fn any_input() -> Pattern {
    Pattern::from_kind(PatternKind::Any)
}

/// Output of a node of one of `op_types`, inputs unconstrained
pub fn wrap_type(op_types: &[&str]) -> Pattern {
    Pattern::from_kind(PatternKind::Op {
        op_types: to_strings(op_types),
        inputs: None,
    })
}

/// Output of a node of one of `op_types` whose inputs match `inputs` in order
pub fn wrap_type_with_inputs(op_types: &[&str], inputs: Vec<Pattern>) -> Pattern {
    Pattern::from_kind(PatternKind::Op {
        op_types: to_strings(op_types),
        inputs: Some(inputs),
    })
}

/// Either a node of `op_types` over `input`, or `input` passed straight through.
///
/// The typed branch is tried first. A label on the optional position is only bound
/// when the typed branch is taken.
pub fn optional(op_types: &[&str], input: Pattern) -> Pattern {
    Pattern::from_kind(PatternKind::Optional {
        op_types: to_strings(op_types),
        input: Box::new(input),
    })
}

/// The first of `branches` that matches
pub fn or(branches: Vec<Pattern>) -> Pattern {
    Pattern::from_kind(PatternKind::Or(branches))
}
