//! Pattern matching engine
//!
//! Matches a [`Pattern`] against a candidate output, walking from the output toward
//! its producers. Alternatives (`or`, `optional`) are tried in declaration order and
//! the first that succeeds is taken; bindings made by a failed alternative are rolled
//! back before the next one is tried.
//!
//! Matching only reads the graph, so it can be retried freely and run from several
//! threads against a graph that is not being rewritten.

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::error::{OptResult, TransformError};
use crate::graph::{Graph, NodeRef, Output};

use super::ops::{Pattern, PatternKind};

type Bindings = IndexMap<String, Output>;

/// Result of a successful pattern match
#[derive(Debug, Clone)]
pub struct Match {
    root: Output,
    bindings: Bindings,
    declared: IndexSet<String>,
}

impl Match {
    /// The output the pattern root matched
    pub fn root(&self) -> &Output {
        &self.root
    }

    /// Producer node of the root output
    pub fn root_node(&self) -> &NodeRef {
        self.root.node()
    }

    /// Output bound to `label`.
    ///
    /// `Ok(None)` when the label is declared but was not bound (an optional branch
    /// took the pass-through); `UndeclaredLabel` when the pattern never declares it.
    pub fn get(&self, label: &str) -> OptResult<Option<&Output>> {
        if !self.declared.contains(label) {
            return Err(TransformError::UndeclaredLabel(label.to_string()));
        }
        Ok(self.bindings.get(label))
    }

    /// Producer node of the output bound to `label`
    pub fn node(&self, label: &str) -> OptResult<Option<NodeRef>> {
        Ok(self.get(label)?.map(|o| o.node().clone()))
    }

    /// Output bound to `label`, which must be bound
    pub fn expect(&self, label: &str) -> OptResult<&Output> {
        self.get(label)?.ok_or_else(|| {
            TransformError::internal(
                "pattern matcher",
                format!("label `{}` is declared but not bound in this match", label),
            )
        })
    }

    /// Check if `label` is bound
    pub fn is_bound(&self, label: &str) -> bool {
        self.bindings.contains_key(label)
    }

    /// Bound labels in binding order
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bound labels
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Pattern matcher over one graph
pub struct PatternMatcher<'a> {
    graph: &'a Graph,
}

impl<'a> PatternMatcher<'a> {
    /// Create a new pattern matcher
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Match a pattern rooted at a specific output
    pub fn match_output(&self, output: &Output, pattern: &Pattern) -> Option<Match> {
        let mut bindings = Bindings::new();
        let matched = match_at(pattern, output, &mut bindings);
        trace!(node = %output.node().friendly_name(), port = output.index(), matched, "pattern match attempt");

        matched.then(|| Match {
            root: output.clone(),
            bindings,
            declared: pattern.declared_labels(),
        })
    }

    /// Match a pattern starting from `node`.
    ///
    /// Output ports are tried in order; the first one that matches wins.
    pub fn match_pattern(&self, node: &NodeRef, pattern: &Pattern) -> Option<Match> {
        if !root_may_match(node, pattern) {
            return None;
        }
        node.outputs()
            .iter()
            .find_map(|output| self.match_output(output, pattern))
    }

    /// Match pattern with additional condition check
    pub fn match_pattern_with_condition<F>(
        &self,
        node: &NodeRef,
        pattern: &Pattern,
        condition: F,
    ) -> Option<Match>
    where
        F: FnOnce(&Match) -> bool,
    {
        let result = self.match_pattern(node, pattern)?;
        if condition(&result) {
            Some(result)
        } else {
            None
        }
    }

    /// Find all matches of a pattern in the graph
    ///
    /// Every output of every reachable node is tried, in topological order.
    pub fn find_all_matches(&self, pattern: &Pattern) -> Vec<Match> {
        self.find_all_matches_with_condition(pattern, |_| true)
    }

    /// Find all matches with condition
    pub fn find_all_matches_with_condition<F>(&self, pattern: &Pattern, condition: F) -> Vec<Match>
    where
        F: Fn(&Match) -> bool,
    {
        let mut results = Vec::new();

        for node in self.graph.get_ordered_ops() {
            if !root_may_match(&node, pattern) {
                continue;
            }
            for output in node.outputs() {
                if let Some(result) = self.match_output(&output, pattern) {
                    if condition(&result) {
                        results.push(result);
                    }
                }
            }
        }

        results
    }

    /// Check if `output` feeds exactly one input
    pub fn is_single_use(&self, output: &Output) -> bool {
        output.consumer_count() == 1
    }
}

/// Convenience function to create a pattern matcher
pub fn matcher(graph: &Graph) -> PatternMatcher<'_> {
    PatternMatcher::new(graph)
}

fn root_may_match(node: &NodeRef, pattern: &Pattern) -> bool {
    match pattern.root_op_types() {
        Some(op_types) => op_types.iter().any(|t| node.is_type(t)),
        None => true,
    }
}

fn check_predicate(pattern: &Pattern, output: &Output) -> bool {
    pattern
        .predicate
        .as_ref()
        .map_or(true, |predicate| predicate.check(output))
}

fn op_type_accepted(op_types: &[String], node: &NodeRef) -> bool {
    op_types.is_empty() || op_types.iter().any(|t| node.is_type(t))
}

/// Bind `label` to `output`; a label already bound elsewhere must agree
fn bind(label: &Option<String>, output: &Output, bindings: &mut Bindings) -> bool {
    let Some(label) = label else {
        return true;
    };
    match bindings.get(label) {
        Some(existing) => existing == output,
        None => {
            bindings.insert(label.clone(), output.clone());
            true
        }
    }
}

/// Try `pattern` at `output`; on failure `bindings` may hold partial entries that the
/// caller rolls back
fn match_at(pattern: &Pattern, output: &Output, bindings: &mut Bindings) -> bool {
    let node = output.node();

    let matched = match &pattern.kind {
        PatternKind::Any => check_predicate(pattern, output),

        PatternKind::Op { op_types, inputs } => {
            if !op_type_accepted(op_types, node) || !check_predicate(pattern, output) {
                return false;
            }
            match inputs {
                None => true,
                Some(inputs) => {
                    let values = node.input_values();
                    values.len() == inputs.len()
                        && inputs
                            .iter()
                            .zip(&values)
                            .all(|(input, value)| match_at(input, value, bindings))
                }
            }
        }

        PatternKind::Optional { op_types, input } => {
            let mark = bindings.len();
            let typed = op_types.iter().any(|t| node.is_type(t))
                && check_predicate(pattern, output)
                && node
                    .input_value(0)
                    .map_or(false, |value| match_at(input, &value, bindings));
            if typed {
                return bind(&pattern.label, output, bindings);
            }
            bindings.truncate(mark);
            // Pass-through: the optional position itself stays unbound
            return match_at(input, output, bindings);
        }

        PatternKind::Or(branches) => {
            check_predicate(pattern, output)
                && branches.iter().any(|branch| {
                    let mark = bindings.len();
                    let ok = match_at(branch, output, bindings);
                    if !ok {
                        bindings.truncate(mark);
                    }
                    ok
                })
        }
    };

    matched && bind(&pattern.label, output, bindings)
}
