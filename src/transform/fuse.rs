//! Node fusion transformations
//!
//! Merges equivalent nodes into one representative: every consumer of a duplicate is
//! moved onto the representative, and the duplicate is released once nothing holds it.

use std::sync::Arc;

use tracing::warn;

use crate::error::OptResult;
use crate::graph::{attributes_equal, Graph, NodeRef};

/// Result of a fusion operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionResult {
    /// Name of the surviving representative
    pub fused_node_name: String,
    /// Names of nodes that were merged away
    pub eliminated_nodes: Vec<String>,
    /// Number of connections bridged
    pub bridged_connections: usize,
    /// Duplicates whose merge was refused by the graph
    pub refused: usize,
}

/// Check if two nodes compute the same thing
///
/// Conditions:
/// 1. Same op type and output descriptors
/// 2. Same producers feeding the same input positions
/// 3. Equal attributes, ignoring order
///
/// Friendly names are not compared.
pub fn can_fuse(a: &NodeRef, b: &NodeRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return false;
    }
    a.op_type() == b.op_type()
        && a.output_descs() == b.output_descs()
        && a.input_values() == b.input_values()
        && attributes_equal(&a.attributes(), &b.attributes())
}

/// Merge `duplicates` into `representative`
///
/// Each merge is one `replace_node` and stands on its own: a refused merge (would
/// close a cycle, incompatible types) is logged and counted, the others still apply.
/// The representative keeps its own name.
pub fn fuse_duplicates(
    graph: &mut Graph,
    representative: &NodeRef,
    duplicates: &[NodeRef],
) -> OptResult<FusionResult> {
    let mut result = FusionResult {
        fused_node_name: representative.friendly_name(),
        ..Default::default()
    };

    for duplicate in duplicates {
        match graph.replace_node(duplicate, representative, None) {
            Ok(rewired) => {
                result.bridged_connections += rewired;
                result.eliminated_nodes.push(duplicate.friendly_name());
            }
            Err(e) if e.is_site_local() => {
                warn!(
                    node = %duplicate.friendly_name(),
                    representative = %result.fused_node_name,
                    error = %e,
                    "merge refused, duplicate kept"
                );
                result.refused += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops;
    use crate::tensor::{ElementType, PartialShape};

    #[test]
    fn test_can_fuse() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let a = ops::non_zero(&p, ElementType::I32).unwrap();
        let b = ops::non_zero(&p, ElementType::I32).unwrap();
        let c = ops::non_zero(&p, ElementType::I64).unwrap();
        b.set_friendly_name("renamed");

        assert!(can_fuse(&a, &b));
        assert!(!can_fuse(&a, &c));
        assert!(!can_fuse(&a, &a));

        let q = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let d = ops::non_zero(&q, ElementType::I32).unwrap();
        assert!(!can_fuse(&a, &d));
    }

    #[test]
    fn test_fuse_duplicates() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let nz: Vec<NodeRef> = (0..3)
            .map(|_| ops::non_zero(&p, ElementType::I64).unwrap())
            .collect();
        let users: Vec<NodeRef> = nz.iter().map(ops::relu).collect();
        let mut graph = Graph::from_outputs(users.iter(), vec![p.clone()]).unwrap();

        let result = fuse_duplicates(&mut graph, &nz[0], &nz[1..]).unwrap();

        assert_eq!(result.eliminated_nodes.len(), 2);
        assert_eq!(result.bridged_connections, 2);
        assert_eq!(result.refused, 0);
        assert_eq!(nz[0].consumer_count(0), 3);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_refused_merge_is_counted() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let first = ops::relu(&p);
        let second = ops::relu(&first);
        let mut graph = Graph::from_outputs([&second], vec![p.clone()]).unwrap();

        // `second` is first's only consumer and is never rewired onto itself
        let result = fuse_duplicates(&mut graph, &second, &[first.clone()]).unwrap();
        assert_eq!(result.refused, 0);
        assert_eq!(result.bridged_connections, 0);

        // A consumer upstream of the representative closes a cycle
        let third = ops::relu(&second);
        let _ = graph.add_result(&third).unwrap();
        let result = fuse_duplicates(&mut graph, &third, &[first.clone()]).unwrap();
        assert_eq!(result.refused, 1);
        assert!(graph.validate().is_ok());
    }
}
