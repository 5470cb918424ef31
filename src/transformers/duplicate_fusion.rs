//! Duplicate producer fusion
//!
//! Several consumers often read the same value through separate but identical
//! producers, e.g. one NonZero per branch over the same input. This pass keeps one
//! producer per fusion key and moves every consumer of the others onto it.
//!
//! The fusion key of a node is the ordered list of `(producer, port)` pairs it reads
//! plus the value of a discriminator attribute (for NonZero: the index type). Nodes of
//! other op types are never touched, and consumers keep their names and attributes.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::OptResult;
use crate::graph::ops::{op_types, ATTR_OUTPUT_TYPE};
use crate::graph::{AttributeValue, Graph, NodeIdSet, NodeRef, Output};
use crate::pattern::{matcher, wrap_type};
use crate::traits::Transformation;
use crate::transform::{can_fuse, fuse_duplicates, TransformResult};

/// Identity of the value a node computes, for fusion purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FusionKey {
    /// Producer outputs read, in input order
    pub inputs: Vec<Output>,
    /// Discriminator attribute value, if any
    pub discriminator: Option<AttributeValue>,
}

/// Merge identical producers of one op type
#[derive(Debug, Clone)]
pub struct DuplicateFusion {
    op_type: String,
    discriminator: Option<String>,
}

impl DuplicateFusion {
    /// Fuse duplicates of `op_type` that read the same inputs
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            discriminator: None,
        }
    }

    /// Only fuse nodes whose `attribute` values are equal
    pub fn with_discriminator(mut self, attribute: impl Into<String>) -> Self {
        self.discriminator = Some(attribute.into());
        self
    }

    /// Target op type
    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Fusion key of `node`
    pub fn key(&self, node: &NodeRef) -> FusionKey {
        FusionKey {
            inputs: node.input_values(),
            discriminator: self
                .discriminator
                .as_ref()
                .and_then(|attr| node.attribute(attr)),
        }
    }

    /// Partition every node of the target op type by fusion key.
    ///
    /// Partitions and their members are in topological order, so the first member of
    /// each partition is the representative.
    pub fn partitions(&self, graph: &Graph) -> IndexMap<FusionKey, Vec<NodeRef>> {
        let pattern = wrap_type(&[self.op_type.as_str()]);
        let mut groups: IndexMap<FusionKey, Vec<NodeRef>> = IndexMap::new();
        let mut seen = NodeIdSet::default();

        for m in matcher(graph).find_all_matches(&pattern) {
            let node = m.root_node();
            // Multi-output nodes match once per port
            if seen.insert(node.id()) {
                groups.entry(self.key(node)).or_default().push(node.clone());
            }
        }

        groups
    }

    fn run(&self, name: &str, graph: &mut Graph) -> OptResult<TransformResult> {
        let mut result = TransformResult::new();
        let groups = self.partitions(graph);
        result.patterns_matched = groups.values().map(Vec::len).sum();

        for (_, members) in groups {
            let Some((representative, rest)) = members.split_first() else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }

            let (duplicates, mismatched): (Vec<NodeRef>, Vec<NodeRef>) = rest
                .iter()
                .cloned()
                .partition(|d| can_fuse(representative, d));
            for node in &mismatched {
                debug!(pass = name, node = %node.friendly_name(), "same key, different attributes");
                result.record_skip();
            }

            let fused = fuse_duplicates(graph, representative, &duplicates)?;
            for _ in 0..fused.refused {
                result.record_skip();
            }
            if !fused.eliminated_nodes.is_empty() {
                result.record(&fused.fused_node_name);
                for eliminated in &fused.eliminated_nodes {
                    result.record_elimination(eliminated);
                }
            }
        }

        debug!(
            pass = name,
            matched = result.patterns_matched,
            eliminated = result.nodes_eliminated,
            skipped = result.sites_skipped,
            "duplicate fusion finished"
        );
        Ok(result)
    }
}

impl Transformation for DuplicateFusion {
    fn name(&self) -> &str {
        "DuplicateFusion"
    }

    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult> {
        self.run("DuplicateFusion", graph)
    }
}

/// Share one NonZero per (input, index type)
///
/// Branches that read the input directly are left untouched.
#[derive(Debug, Clone)]
pub struct NonZeroFusion {
    inner: DuplicateFusion,
}

impl NonZeroFusion {
    /// Create the pass
    pub fn new() -> Self {
        Self {
            inner: DuplicateFusion::new(op_types::NON_ZERO).with_discriminator(ATTR_OUTPUT_TYPE),
        }
    }
}

impl Default for NonZeroFusion {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformation for NonZeroFusion {
    fn name(&self) -> &str {
        "NonZeroFusion"
    }

    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult> {
        self.inner.run("NonZeroFusion", graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{compare_graphs, CompareConfig, CompareFlag};
    use crate::graph::ops;
    use crate::tensor::{ElementType, PartialShape};
    use proptest::prelude::*;
    use test_case::test_case;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Branch {
        I32,
        I64,
        PassThrough,
    }

    use Branch::{PassThrough as NONE, I32, I64};

    fn index_type(branch: Branch) -> Option<ElementType> {
        match branch {
            I32 => Some(ElementType::I32),
            I64 => Some(ElementType::I64),
            NONE => None,
        }
    }

    fn input() -> NodeRef {
        ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4))
    }

    fn last_node(producer: &NodeRef, i: usize) -> NodeRef {
        let relu = ops::relu(producer);
        relu.set_friendly_name(format!("last_node_{}", i));
        relu
    }

    /// One NonZero per branch
    fn build_unfused(branches: &[Branch]) -> Graph {
        let input = input();
        let outputs: Vec<NodeRef> = branches
            .iter()
            .enumerate()
            .map(|(i, &branch)| {
                let producer = match index_type(branch) {
                    Some(et) => ops::non_zero(&input, et).unwrap(),
                    None => input.clone(),
                };
                last_node(&producer, i)
            })
            .collect();
        Graph::from_outputs(outputs.iter(), vec![input]).unwrap()
    }

    /// One NonZero per index type actually used
    fn build_reference(branches: &[Branch]) -> Graph {
        let input = input();
        let mut shared: IndexMap<ElementType, NodeRef> = IndexMap::new();
        let outputs: Vec<NodeRef> = branches
            .iter()
            .enumerate()
            .map(|(i, &branch)| {
                let producer = match index_type(branch) {
                    Some(et) => shared
                        .entry(et)
                        .or_insert_with(|| ops::non_zero(&input, et).unwrap())
                        .clone(),
                    None => input.clone(),
                };
                last_node(&producer, i)
            })
            .collect();
        Graph::from_outputs(outputs.iter(), vec![input]).unwrap()
    }

    fn oracle() -> CompareConfig {
        CompareConfig::default().enable(CompareFlag::ConsumersCount)
    }

    fn non_zero_count(graph: &Graph) -> usize {
        graph.find_nodes_by_op(op_types::NON_ZERO).len()
    }

    #[test_case(&[I32, I32, I32, I32, I32], 1 ; "five_i32")]
    #[test_case(&[I64, I64, I64, I64, I64], 1 ; "five_i64")]
    #[test_case(&[NONE, NONE], 0 ; "two_pass_through")]
    #[test_case(&[I32, I64, I32, I64, I32], 2 ; "alternating")]
    #[test_case(&[I32, I64, NONE, I64, I32], 2 ; "mixed_with_pass_through")]
    #[test_case(&[NONE, I64, NONE, I64, I32], 2 ; "pass_through_first")]
    fn test_non_zero_fusion(branches: &[Branch], shared_producers: usize) {
        let mut graph = build_unfused(branches);
        let result = NonZeroFusion::new().transform(&mut graph).unwrap();

        assert!(graph.validate().is_ok());
        assert_eq!(non_zero_count(&graph), shared_producers);
        let used = branches.iter().filter(|b| **b != NONE).count();
        assert_eq!(result.nodes_eliminated, used - shared_producers);

        let reference = build_reference(branches);
        let verdict = compare_graphs(&graph, &reference, &oracle());
        assert!(verdict.valid, "{}", verdict.message);
    }

    #[test]
    fn test_consumers_read_input_directly_on_pass_through() {
        let mut graph = build_unfused(&[NONE, I64, NONE, I64, I32]);
        NonZeroFusion::new().transform(&mut graph).unwrap();

        let input = graph.parameters()[0].clone();
        let direct: Vec<String> = input
            .consumers(0)
            .iter()
            .filter(|c| c.node().is_type(op_types::RELU))
            .map(|c| c.node().friendly_name())
            .collect();
        assert_eq!(direct.len(), 2);
        assert!(direct.contains(&"last_node_0".to_string()));
        assert!(direct.contains(&"last_node_2".to_string()));
    }

    #[test]
    fn test_representative_is_first_in_topological_order() {
        let mut graph = build_unfused(&[I32, I32, I32]);
        let first = graph.find_nodes_by_op(op_types::NON_ZERO)[0].clone();
        let first_name = first.friendly_name();

        NonZeroFusion::new().transform(&mut graph).unwrap();

        let survivors = graph.find_nodes_by_op(op_types::NON_ZERO);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id(), first.id());
        assert_eq!(survivors[0].friendly_name(), first_name);
        assert_eq!(first.consumer_count(0), 3);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut graph = build_unfused(&[I32, I64, NONE, I64, I32]);
        let mut pass = NonZeroFusion::new();

        assert!(pass.transform(&mut graph).unwrap().changed());
        let again = pass.transform(&mut graph).unwrap();
        assert!(!again.changed());
        assert_eq!(again.nodes_eliminated, 0);
    }

    #[test]
    fn test_different_inputs_are_not_fused() {
        let a = input();
        let b = input();
        let outputs = vec![
            last_node(&ops::non_zero(&a, ElementType::I64).unwrap(), 0),
            last_node(&ops::non_zero(&b, ElementType::I64).unwrap(), 1),
        ];
        let mut graph = Graph::from_outputs(outputs.iter(), vec![a, b]).unwrap();

        let result = NonZeroFusion::new().transform(&mut graph).unwrap();
        assert!(!result.changed());
        assert_eq!(non_zero_count(&graph), 2);
    }

    #[test]
    fn test_generic_duplicate_fusion() {
        let p = input();
        let relus: Vec<NodeRef> = (0..3).map(|_| ops::relu(&p)).collect();
        let users: Vec<NodeRef> = relus.iter().map(ops::identity).collect();
        drop(relus);
        let mut graph = Graph::from_outputs(users.iter(), vec![p.clone()]).unwrap();

        let result = DuplicateFusion::new(op_types::RELU)
            .transform(&mut graph)
            .unwrap();

        assert_eq!(result.nodes_eliminated, 2);
        assert_eq!(graph.find_nodes_by_op(op_types::RELU).len(), 1);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_multi_output_nodes_are_partitioned_once() {
        let p = input();
        let desc = crate::tensor::TensorDesc::new(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let split = || {
            crate::graph::Node::new(
                "Split",
                vec![Output::from(&p)],
                vec![desc.clone(), desc.clone()],
                Default::default(),
            )
        };
        let (first, second) = (split(), split());
        let users: Vec<NodeRef> = [&first, &second]
            .iter()
            .flat_map(|s| s.outputs())
            .map(ops::relu)
            .collect();
        let mut graph = Graph::from_outputs(users.iter(), vec![p.clone()]).unwrap();

        let mut fusion = DuplicateFusion::new("Split");
        let groups = fusion.partitions(&graph);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);

        let result = fusion.transform(&mut graph).unwrap();
        assert_eq!(result.nodes_eliminated, 1);
        assert_eq!(first.consumer_count(0), 2);
        assert_eq!(first.consumer_count(1), 2);
        assert!(graph.validate().is_ok());
    }

    fn branch_strategy() -> impl Strategy<Value = Vec<Branch>> {
        prop::collection::vec(prop_oneof![Just(I32), Just(I64), Just(NONE)], 1..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Fusion matches the hand-built reference for any branch layout.
        #[test]
        fn fusion_matches_reference(branches in branch_strategy()) {
            let mut graph = build_unfused(&branches);
            NonZeroFusion::new().transform(&mut graph).unwrap();

            prop_assert!(graph.validate().is_ok());
            let verdict = compare_graphs(&graph, &build_reference(&branches), &oracle());
            prop_assert!(verdict.valid, "{}", verdict.message);
        }

        /// One NonZero survives per index type in use.
        #[test]
        fn fusion_partitions_by_index_type(branches in branch_strategy()) {
            let mut graph = build_unfused(&branches);
            NonZeroFusion::new().transform(&mut graph).unwrap();

            let mut used: Vec<ElementType> = branches.iter().filter_map(|b| index_type(*b)).collect();
            used.sort_by_key(|t| t.as_str());
            used.dedup();
            prop_assert_eq!(non_zero_count(&graph), used.len());
        }

        /// Consumer names survive and a second run does nothing.
        #[test]
        fn fusion_is_idempotent_and_keeps_names(branches in branch_strategy()) {
            let mut graph = build_unfused(&branches);
            let mut pass = NonZeroFusion::new();
            pass.transform(&mut graph).unwrap();

            for i in 0..branches.len() {
                let name = format!("last_node_{}", i);
                prop_assert!(graph.find_node_by_name(&name).is_some());
            }
            prop_assert!(!pass.transform(&mut graph).unwrap().changed());
        }
    }
}
