//! Node elimination transformations
//!
//! Bypasses pass-through nodes: consumers are moved onto the node's input and the
//! node is released once nothing holds it.

use tracing::trace;

use crate::error::OptResult;
use crate::graph::{op_types, Graph, NodeRef};

/// Result of an elimination operation
#[derive(Debug, Clone, PartialEq)]
pub struct EliminationResult {
    /// Name of the eliminated node
    pub node_name: String,
    /// Number of connections bridged
    pub bridged_connections: usize,
}

/// Check if a node can be bypassed
///
/// A node can be bypassed if:
/// 1. It has exactly one input and one output, of compatible descriptors
/// 2. It is not a Parameter or Result
/// 3. It is still wired into the graph
pub fn can_eliminate(graph: &Graph, node: &NodeRef) -> bool {
    if node.is_type(op_types::PARAMETER) || node.is_type(op_types::RESULT) {
        return false;
    }
    if node.input_count() != 1 || node.output_count() != 1 {
        return false;
    }
    if !graph.is_attached(node) {
        return false;
    }

    match (node.input_value(0), node.output_desc(0)) {
        (Some(input), Some(desc)) => input.desc().compatible(&desc),
        _ => false,
    }
}

/// Bypass a single node, keeping model output names stable
///
/// # Returns
/// * `Ok(Some(EliminationResult))` if the node was bypassed
/// * `Ok(None)` if it cannot be eliminated, or the output-name rule forbids it
pub fn eliminate_node(graph: &mut Graph, node: &NodeRef) -> OptResult<Option<EliminationResult>> {
    if !can_eliminate(graph, node) {
        return Ok(None);
    }
    let (input, output) = match (node.input_value(0), node.output(0)) {
        (Some(input), Some(output)) => (input, output),
        _ => return Ok(None),
    };

    let bridged = output.consumer_count();
    let node_name = node.friendly_name();
    if !graph.replace_output_update_name(&output, &input)? {
        trace!(node = %node_name, "elimination would rename a model input, kept");
        return Ok(None);
    }

    Ok(Some(EliminationResult {
        node_name,
        bridged_connections: bridged,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops;
    use crate::tensor::{ElementType, PartialShape};
    use std::sync::Arc;

    #[test]
    fn test_eliminate_inner_node() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let id = ops::identity(&p);
        let relu_a = ops::relu(&id);
        let relu_b = ops::relu(&id);
        let mut graph = Graph::from_outputs([&relu_a, &relu_b], vec![p.clone()]).unwrap();

        let result = eliminate_node(&mut graph, &id).unwrap().unwrap();

        assert_eq!(result.bridged_connections, 2);
        assert!(Arc::ptr_eq(&relu_a.input_node(0).unwrap(), &p));
        assert!(Arc::ptr_eq(&relu_b.input_node(0).unwrap(), &p));
        assert!(!can_eliminate(&graph, &id)); // detached now
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_eliminate_before_result_keeps_output_name() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let relu = ops::relu(&p);
        let id = ops::identity(&relu);
        id.set_friendly_name("logits");
        let mut graph = Graph::from_outputs([&id], vec![p.clone()]).unwrap();

        assert!(eliminate_node(&mut graph, &id).unwrap().is_some());
        assert_eq!(relu.friendly_name(), "logits");
    }

    #[test]
    fn test_parameter_to_result_identity_is_kept() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let id = ops::identity(&p);
        let mut graph = Graph::from_outputs([&id], vec![p.clone()]).unwrap();

        assert!(eliminate_node(&mut graph, &id).unwrap().is_none());
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_can_eliminate_rejects_type_changes() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let cvt = ops::convert(&p, ElementType::I32);
        let graph = Graph::from_outputs([&cvt], vec![p.clone()]).unwrap();

        assert!(!can_eliminate(&graph, &cvt));
        assert!(!can_eliminate(&graph, &p));
        assert!(!can_eliminate(&graph, &graph.results()[0]));
    }
}
