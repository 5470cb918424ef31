//! Graph invariant checks
//!
//! `validate()` checks the DAG invariant, edge/back-reference consistency and that
//! every built-in node's declared outputs agree with its type inference.

use std::fmt;

use crate::error::{OptResult, TransformError};

use super::accessors::topological_sort;
use super::context::{check_parameter, check_result, Graph};
use super::node::NodeRef;
use super::ops::{infer_outputs, op_types};

/// One broken invariant, attributed to a node
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Friendly name of the offending node
    pub node: String,
    /// What is wrong
    pub error: TransformError,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.error)
    }
}

impl Graph {
    /// Check every invariant, returning the first violation as an error
    pub fn validate(&self) -> OptResult<()> {
        match self.violations().into_iter().next() {
            Some(v) => Err(v.error),
            None => Ok(()),
        }
    }

    /// Collect every invariant violation
    pub fn violations(&self) -> Vec<Violation> {
        let mut found = Vec::new();

        for result in &self.results {
            if let Err(error) = check_result(result) {
                found.push(violation(result, error));
            }
        }
        for parameter in &self.parameters {
            if let Err(error) = check_parameter(parameter) {
                found.push(violation(parameter, error));
            }
        }

        let nodes = self.reachable_nodes();
        let sorted = topological_sort(&nodes);
        if let Some(node) = sorted.unordered.first() {
            found.push(violation(
                node,
                TransformError::CycleDetected {
                    node: node.friendly_name(),
                },
            ));
        }

        for node in sorted.ordered.iter().chain(sorted.unordered.iter()) {
            if node.is_type(op_types::PARAMETER) && !self.is_parameter(node) {
                found.push(violation(
                    node,
                    TransformError::InvalidGraph(format!(
                        "Parameter `{}` is used but not listed",
                        node.friendly_name()
                    )),
                ));
            }
            check_edges(node, &mut found);
            check_types(node, &mut found);
        }

        found
    }
}

fn violation(node: &NodeRef, error: TransformError) -> Violation {
    Violation {
        node: node.friendly_name(),
        error,
    }
}

/// Input edges point at existing ports and both ends agree on every edge
fn check_edges(node: &NodeRef, found: &mut Vec<Violation>) {
    for (index, input) in node.input_values().iter().enumerate() {
        let producer = input.node();
        if input.index() >= producer.output_count() {
            found.push(violation(
                node,
                TransformError::DanglingReference {
                    node: node.friendly_name(),
                    port: index,
                },
            ));
            continue;
        }
        if !producer.has_consumer_entry(input.index(), node.id(), index) {
            found.push(violation(
                node,
                TransformError::InvalidGraph(format!(
                    "`{}` is missing consumer `{}` input {}",
                    producer.friendly_name(),
                    node.friendly_name(),
                    index
                )),
            ));
        }
    }

    for port in 0..node.output_count() {
        for entry in node.consumer_entries(port) {
            let consumer = match entry.node.upgrade() {
                Some(consumer) => consumer,
                None => continue,
            };
            let reads_back = consumer
                .input_value(entry.input_index)
                .map(|o| o.node().id() == node.id() && o.index() == port)
                .unwrap_or(false);
            if !reads_back {
                found.push(violation(
                    node,
                    TransformError::InvalidGraph(format!(
                        "stale consumer `{}` input {} on output {}",
                        consumer.friendly_name(),
                        entry.input_index,
                        port
                    )),
                ));
            }
        }
    }
}

/// Declared outputs of built-in ops agree with re-inferred ones
fn check_types(node: &NodeRef, found: &mut Vec<Violation>) {
    let inputs: Vec<_> = node.input_values().iter().map(|o| o.desc()).collect();
    let inferred = match infer_outputs(node.op_type(), &node.attributes(), &inputs) {
        Some(Ok(inferred)) => inferred,
        Some(Err(error)) => {
            found.push(violation(node, error));
            return;
        }
        None => return,
    };

    let declared = node.output_descs();
    if declared.len() != inferred.len() {
        found.push(violation(
            node,
            TransformError::InvalidNode(format!(
                "`{}` declares {} outputs, {} expected",
                node.friendly_name(),
                declared.len(),
                inferred.len()
            )),
        ));
        return;
    }
    for (port, (declared, inferred)) in declared.iter().zip(&inferred).enumerate() {
        if !declared.compatible(inferred) {
            found.push(violation(
                node,
                TransformError::TypeMismatch {
                    node: node.friendly_name(),
                    port,
                    expected: inferred.to_string(),
                    actual: declared.to_string(),
                },
            ));
        }
    }
}
