//! Graph queries
//!
//! Reachability, topological ordering and lookups.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use super::context::Graph;
use super::maps::{build_in_degree_map, build_name_map, build_users_map, NodeIdSet, NodeMap};
use super::node::{Node, NodeId, NodeRef, Output};

/// Outcome of a topological sort over a node set
pub(crate) struct TopoSort {
    /// Nodes in dependency order
    pub(crate) ordered: Vec<NodeRef>,
    /// Nodes that could not be ordered (members of or behind a cycle)
    pub(crate) unordered: Vec<NodeRef>,
}

/// Kahn's algorithm; ties between ready nodes go to the lowest creation id.
pub(crate) fn topological_sort(nodes: &NodeMap) -> TopoSort {
    let users = build_users_map(nodes);
    let mut in_degree = build_in_degree_map(nodes);

    let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| Reverse(id))
        .collect();

    let mut ordered = Vec::with_capacity(nodes.len());
    while let Some(Reverse(id)) = ready.pop() {
        if let Some(users) = users.get(&id) {
            for user in users {
                if let Some(degree) = in_degree.get_mut(user) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(*user));
                    }
                }
            }
        }
        if let Some(node) = nodes.get(&id) {
            ordered.push(node.clone());
        }
    }

    let unordered = if ordered.len() == nodes.len() {
        Vec::new()
    } else {
        let done: NodeIdSet = ordered.iter().map(|n| n.id()).collect();
        let mut rest: Vec<NodeRef> = nodes
            .values()
            .filter(|n| !done.contains(&n.id()))
            .cloned()
            .collect();
        rest.sort_by_key(|n| n.id());
        rest
    };

    TopoSort { ordered, unordered }
}

impl Graph {
    // ========================================================================
    // Reachability
    // ========================================================================

    /// Every node reachable backward from the Results, plus all Parameters
    pub fn reachable_nodes(&self) -> NodeMap {
        let mut nodes = NodeMap::default();
        let mut stack: Vec<NodeRef> = self
            .results
            .iter()
            .chain(self.parameters.iter())
            .cloned()
            .collect();

        while let Some(node) = stack.pop() {
            if nodes.contains_key(&node.id()) {
                continue;
            }
            for input in node.input_values() {
                if !nodes.contains_key(&input.node().id()) {
                    stack.push(input.node().clone());
                }
            }
            nodes.insert(node.id(), node);
        }

        nodes
    }

    /// Topological order of the reachable nodes.
    ///
    /// Producers come before consumers; among nodes that are ready at the same time
    /// the one created first comes first, so the order is stable across runs.
    pub fn get_ordered_ops(&self) -> Vec<NodeRef> {
        let sorted = topological_sort(&self.reachable_nodes());
        let mut ordered = sorted.ordered;
        // A cyclic graph fails validation; keep the rest visible to callers anyway
        ordered.extend(sorted.unordered);
        ordered
    }

    /// Number of reachable nodes
    pub fn node_count(&self) -> usize {
        self.reachable_nodes().len()
    }

    /// Check if a node is reachable from this graph
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.reachable_nodes().contains_key(&node.id())
    }

    /// Still wired into the graph: has consumers or is listed as Parameter/Result.
    ///
    /// A node that was bypassed or replaced by an earlier rewrite is detached.
    pub fn is_attached(&self, node: &NodeRef) -> bool {
        node.total_consumer_count() > 0 || self.is_parameter(node) || self.is_result(node)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Find a reachable node by display name
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeRef> {
        let ordered = self.get_ordered_ops();
        build_name_map(&ordered).get(name).cloned()
    }

    /// Find reachable nodes by op type, in topological order
    pub fn find_nodes_by_op(&self, op_type: &str) -> Vec<NodeRef> {
        self.get_ordered_ops()
            .into_iter()
            .filter(|n| n.is_type(op_type))
            .collect()
    }

    // ========================================================================
    // Copy
    // ========================================================================

    /// Copy every reachable node into a new, independent graph.
    ///
    /// Names, attributes and descriptors are kept; node ids are new.
    pub fn deep_clone(&self) -> Graph {
        let mut mapping: FxHashMap<NodeId, NodeRef> = FxHashMap::default();

        for node in self.get_ordered_ops() {
            let inputs: Vec<Output> = node
                .input_values()
                .iter()
                .filter_map(|input| {
                    mapping
                        .get(&input.node().id())
                        .and_then(|producer| producer.output(input.index()))
                })
                .collect();
            let copy = Node::new(
                node.op_type(),
                inputs,
                node.output_descs(),
                node.attributes(),
            );
            copy.set_friendly_name(node.friendly_name());
            mapping.insert(node.id(), copy);
        }

        let lookup = |nodes: &[NodeRef]| -> Vec<NodeRef> {
            nodes
                .iter()
                .filter_map(|n| mapping.get(&n.id()).cloned())
                .collect()
        };

        Graph {
            name: self.name.clone(),
            parameters: lookup(&self.parameters),
            results: lookup(&self.results),
        }
    }
}
