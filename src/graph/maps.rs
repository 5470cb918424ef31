//! Graph map types and builders
//!
//! Identity-keyed maps used by traversal, validation and rewriting.

use rustc_hash::{FxHashMap, FxHashSet};

use super::node::{NodeId, NodeRef};

/// Type alias for node map: id → node
pub type NodeMap = FxHashMap<NodeId, NodeRef>;

/// Type alias for a set of node ids
pub type NodeIdSet = FxHashSet<NodeId>;

/// Type alias for name map: friendly name → node
pub type NameMap = FxHashMap<String, NodeRef>;

/// Type alias for users map: producer id → consumer ids (one entry per edge)
pub type UsersMap = FxHashMap<NodeId, Vec<NodeId>>;

/// Build name map from nodes
///
/// Later nodes win when names collide.
pub fn build_name_map<'a>(nodes: impl IntoIterator<Item = &'a NodeRef>) -> NameMap {
    nodes
        .into_iter()
        .map(|n| (n.friendly_name(), n.clone()))
        .collect()
}

/// Build users map restricted to edges inside `nodes`
pub fn build_users_map(nodes: &NodeMap) -> UsersMap {
    let mut map: UsersMap = FxHashMap::default();

    for node in nodes.values() {
        for input in node.input_values() {
            let producer = input.node().id();
            if nodes.contains_key(&producer) {
                map.entry(producer).or_default().push(node.id());
            }
        }
    }

    map
}

/// Build in-degree map restricted to edges inside `nodes`
pub fn build_in_degree_map(nodes: &NodeMap) -> FxHashMap<NodeId, usize> {
    nodes
        .values()
        .map(|node| {
            let degree = node
                .input_values()
                .iter()
                .filter(|input| nodes.contains_key(&input.node().id()))
                .count();
            (node.id(), degree)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops;
    use crate::tensor::{ElementType, PartialShape};

    fn make_nodes() -> (NodeRef, NodeRef, NodeRef, NodeMap) {
        let param = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let relu = ops::relu(&param);
        let sum = ops::add(&relu, &param).unwrap();

        let map: NodeMap = [&param, &relu, &sum]
            .into_iter()
            .map(|n| (n.id(), n.clone()))
            .collect();
        (param, relu, sum, map)
    }

    #[test]
    fn test_build_users_map() {
        let (param, relu, sum, map) = make_nodes();
        let users = build_users_map(&map);

        let mut param_users = users.get(&param.id()).cloned().unwrap();
        param_users.sort();
        assert_eq!(param_users, vec![relu.id(), sum.id()]);
        assert_eq!(users.get(&relu.id()), Some(&vec![sum.id()]));
        assert!(users.get(&sum.id()).is_none());
    }

    #[test]
    fn test_build_in_degree_map() {
        let (param, relu, sum, map) = make_nodes();
        let degrees = build_in_degree_map(&map);

        assert_eq!(degrees[&param.id()], 0);
        assert_eq!(degrees[&relu.id()], 1);
        assert_eq!(degrees[&sum.id()], 2);
    }

    #[test]
    fn test_build_name_map() {
        let (param, _relu, _sum, _) = make_nodes();
        param.set_friendly_name("input");
        let names = build_name_map([&param]);
        assert!(names.contains_key("input"));
    }
}
