//! Graph traversal utilities
//!
//! Provides BFS and DFS traversal over nodes. Backward traversal follows the owning
//! input edges, forward traversal follows the consumer back-references.

use std::collections::VecDeque;

use super::maps::NodeIdSet;
use super::node::NodeRef;

/// Direction of traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Forward: follow consumer edges (input → output)
    Forward,
    /// Backward: follow producer edges (output → input)
    Backward,
}

fn neighbors(node: &NodeRef, direction: Direction) -> Vec<NodeRef> {
    match direction {
        Direction::Forward => (0..node.output_count())
            .flat_map(|port| node.consumers(port))
            .map(|input| input.node().clone())
            .collect(),
        Direction::Backward => node
            .input_values()
            .into_iter()
            .map(|output| output.node().clone())
            .collect(),
    }
}

/// BFS traversal iterator
pub struct BfsIterator {
    queue: VecDeque<NodeRef>,
    visited: NodeIdSet,
    direction: Direction,
}

impl BfsIterator {
    /// Create a new BFS iterator starting from the given node
    pub fn new(start: &NodeRef, direction: Direction) -> Self {
        let mut visited = NodeIdSet::default();
        visited.insert(start.id());

        Self {
            queue: VecDeque::from([start.clone()]),
            visited,
            direction,
        }
    }

    /// Create forward BFS (follows consumers)
    pub fn forward(start: &NodeRef) -> Self {
        Self::new(start, Direction::Forward)
    }

    /// Create backward BFS (follows producers)
    pub fn backward(start: &NodeRef) -> Self {
        Self::new(start, Direction::Backward)
    }
}

impl Iterator for BfsIterator {
    type Item = NodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;

        for next in neighbors(&node, self.direction) {
            if self.visited.insert(next.id()) {
                self.queue.push_back(next);
            }
        }

        Some(node)
    }
}

/// DFS traversal iterator
pub struct DfsIterator {
    stack: Vec<NodeRef>,
    visited: NodeIdSet,
    direction: Direction,
}

impl DfsIterator {
    /// Create a new DFS iterator starting from the given node
    pub fn new(start: &NodeRef, direction: Direction) -> Self {
        let mut visited = NodeIdSet::default();
        visited.insert(start.id());

        Self {
            stack: vec![start.clone()],
            visited,
            direction,
        }
    }

    /// Create forward DFS
    pub fn forward(start: &NodeRef) -> Self {
        Self::new(start, Direction::Forward)
    }

    /// Create backward DFS
    pub fn backward(start: &NodeRef) -> Self {
        Self::new(start, Direction::Backward)
    }
}

impl Iterator for DfsIterator {
    type Item = NodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;

        for next in neighbors(&node, self.direction) {
            if self.visited.insert(next.id()) {
                self.stack.push(next);
            }
        }

        Some(node)
    }
}

/// Collect all predecessor nodes (backward reachable)
pub fn predecessors(start: &NodeRef) -> Vec<NodeRef> {
    BfsIterator::backward(start).skip(1).collect() // skip start node
}

/// Collect all successor nodes (forward reachable)
pub fn successors(start: &NodeRef) -> Vec<NodeRef> {
    BfsIterator::forward(start).skip(1).collect() // skip start node
}

/// Ids of `start` and everything it depends on
pub fn ancestor_ids(start: &NodeRef) -> NodeIdSet {
    BfsIterator::backward(start).map(|n| n.id()).collect()
}

/// Check if `to` depends on `from` (a node trivially reaches itself)
pub fn has_path(from: &NodeRef, to: &NodeRef) -> bool {
    from.id() == to.id() || ancestor_ids(to).contains(&from.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops;
    use crate::tensor::{ElementType, PartialShape};

    fn make_chain() -> Vec<NodeRef> {
        let param = ops::parameter(ElementType::F32, PartialShape::dynamic());
        param.set_friendly_name("node_0");
        let a = ops::relu(&param);
        a.set_friendly_name("node_1");
        let b = ops::identity(&a);
        b.set_friendly_name("node_2");
        let c = ops::relu(&b);
        c.set_friendly_name("node_3");
        vec![param, a, b, c]
    }

    fn names(nodes: &[NodeRef]) -> Vec<String> {
        nodes.iter().map(|n| n.friendly_name()).collect()
    }

    #[test]
    fn test_bfs_forward() {
        let chain = make_chain();
        let nodes: Vec<_> = BfsIterator::forward(&chain[0]).collect();
        assert_eq!(names(&nodes), vec!["node_0", "node_1", "node_2", "node_3"]);
    }

    #[test]
    fn test_bfs_backward() {
        let chain = make_chain();
        let nodes: Vec<_> = BfsIterator::backward(&chain[3]).collect();
        assert_eq!(names(&nodes), vec!["node_3", "node_2", "node_1", "node_0"]);
    }

    #[test]
    fn test_dfs_forward() {
        let chain = make_chain();
        let nodes: Vec<_> = DfsIterator::forward(&chain[0]).collect();

        // DFS on a chain is same as BFS
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].friendly_name(), "node_0");
    }

    #[test]
    fn test_predecessors_and_successors() {
        let chain = make_chain();

        let preds = names(&predecessors(&chain[3]));
        assert_eq!(preds.len(), 3);
        assert!(preds.contains(&"node_0".to_string()));

        let succs = names(&successors(&chain[0]));
        assert_eq!(succs.len(), 3);
        assert!(succs.contains(&"node_3".to_string()));
    }

    #[test]
    fn test_has_path() {
        let chain = make_chain();

        assert!(has_path(&chain[0], &chain[3]));
        assert!(has_path(&chain[0], &chain[1]));
        assert!(has_path(&chain[1], &chain[1])); // same node
        assert!(!has_path(&chain[3], &chain[0])); // backward
    }

    #[test]
    fn test_diamond_visits_once() {
        let param = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let left = ops::relu(&param);
        let right = ops::identity(&param);
        let join = ops::add(&left, &right).unwrap();

        let nodes: Vec<_> = DfsIterator::backward(&join).collect();
        assert_eq!(nodes.len(), 4);
    }
}
