//! Lock-step structural comparison of two graphs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::graph::{attributes_equal, Graph, NodeId, NodeRef};

/// Optional comparison criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFlag {
    /// Per-port consumer counts must match
    ConsumersCount,
    /// Friendly names must match
    Names,
    /// Attribute maps must match (order ignored)
    Attributes,
    /// Output element types and shapes must match
    Precision,
}

/// Comparator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareConfig {
    /// See [`CompareFlag::ConsumersCount`]
    pub consumers_count: bool,
    /// See [`CompareFlag::Names`]
    pub names: bool,
    /// See [`CompareFlag::Attributes`]
    pub attributes: bool,
    /// See [`CompareFlag::Precision`]
    pub precision: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            consumers_count: false,
            names: false,
            attributes: true,
            precision: true,
        }
    }
}

impl CompareConfig {
    /// Turn a criterion on
    pub fn enable(self, flag: CompareFlag) -> Self {
        self.set(flag, true)
    }

    /// Turn a criterion off
    pub fn disable(self, flag: CompareFlag) -> Self {
        self.set(flag, false)
    }

    /// Whether a criterion is on
    pub fn is_enabled(&self, flag: CompareFlag) -> bool {
        match flag {
            CompareFlag::ConsumersCount => self.consumers_count,
            CompareFlag::Names => self.names,
            CompareFlag::Attributes => self.attributes,
            CompareFlag::Precision => self.precision,
        }
    }

    fn set(mut self, flag: CompareFlag, on: bool) -> Self {
        match flag {
            CompareFlag::ConsumersCount => self.consumers_count = on,
            CompareFlag::Names => self.names = on,
            CompareFlag::Attributes => self.attributes = on,
            CompareFlag::Precision => self.precision = on,
        }
        self
    }
}

/// Verdict of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareResult {
    /// Whether the graphs are equivalent
    pub valid: bool,
    /// Empty when valid, otherwise why not
    pub message: String,
    /// Names of the first divergent (actual, expected) pair, when the failure is node-level
    pub divergence: Option<(String, String)>,
}

impl CompareResult {
    /// Equivalent graphs
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
            divergence: None,
        }
    }

    fn graph_level(message: String) -> Self {
        Self {
            valid: false,
            message,
            divergence: None,
        }
    }

    fn at(actual: &NodeRef, expected: &NodeRef, message: String) -> Self {
        Self {
            valid: false,
            message,
            divergence: Some((actual.friendly_name(), expected.friendly_name())),
        }
    }
}

impl fmt::Display for CompareResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "graphs are equivalent")
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Walks two graphs backward from their Results in lock-step
///
/// Nodes are paired by position: Results by index, Parameters by index, and then each
/// pair's inputs port by port. Pairing is a bijection, so one node standing in for two
/// distinct nodes of the other graph (an un-shared duplicate) is a divergence.
#[derive(Debug, Clone, Default)]
pub struct GraphComparator {
    config: CompareConfig,
}

/// Pairing state of one comparison
#[derive(Default)]
struct Pairing {
    forward: FxHashMap<NodeId, NodeRef>,
    backward: FxHashMap<NodeId, NodeRef>,
    queue: VecDeque<(NodeRef, NodeRef)>,
}

impl Pairing {
    /// Record `actual <-> expected`, queueing the pair the first time it is seen
    fn pair(&mut self, actual: &NodeRef, expected: &NodeRef) -> Result<(), CompareResult> {
        match (self.forward.get(&actual.id()), self.backward.get(&expected.id())) {
            (None, None) => {
                self.forward.insert(actual.id(), expected.clone());
                self.backward.insert(expected.id(), actual.clone());
                self.queue.push_back((actual.clone(), expected.clone()));
                Ok(())
            }
            (Some(e), Some(a)) if Arc::ptr_eq(e, expected) && Arc::ptr_eq(a, actual) => Ok(()),
            (Some(e), _) if !Arc::ptr_eq(e, expected) => Err(CompareResult::at(
                actual,
                expected,
                format!(
                    "`{}` already corresponds to `{}`, not `{}`",
                    actual.friendly_name(),
                    e.friendly_name(),
                    expected.friendly_name()
                ),
            )),
            (_, Some(a)) => Err(CompareResult::at(
                actual,
                expected,
                format!(
                    "`{}` already corresponds to `{}`, not `{}`",
                    expected.friendly_name(),
                    a.friendly_name(),
                    actual.friendly_name()
                ),
            )),
            _ => Err(CompareResult::at(actual, expected, "inconsistent pairing".to_string())),
        }
    }
}

impl GraphComparator {
    /// Create a comparator
    pub fn new(config: CompareConfig) -> Self {
        Self { config }
    }

    /// Configuration
    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    /// Compare `actual` against `expected`
    pub fn compare(&self, actual: &Graph, expected: &Graph) -> CompareResult {
        match self.walk(actual, expected) {
            Ok(()) => CompareResult::ok(),
            Err(result) => {
                trace!(message = %result.message, "graphs diverge");
                result
            }
        }
    }

    fn walk(&self, actual: &Graph, expected: &Graph) -> Result<(), CompareResult> {
        if actual.parameters().len() != expected.parameters().len() {
            return Err(CompareResult::graph_level(format!(
                "Number of parameters differ: {} vs {}",
                actual.parameters().len(),
                expected.parameters().len()
            )));
        }
        if actual.results().len() != expected.results().len() {
            return Err(CompareResult::graph_level(format!(
                "Number of results differ: {} vs {}",
                actual.results().len(),
                expected.results().len()
            )));
        }

        let mut pairing = Pairing::default();
        for (a, e) in actual.results().iter().zip(expected.results()) {
            pairing.pair(a, e)?;
        }
        for (a, e) in actual.parameters().iter().zip(expected.parameters()) {
            pairing.pair(a, e)?;
        }

        while let Some((a, e)) = pairing.queue.pop_front() {
            self.compare_nodes(&a, &e)?;

            for (port, (a_in, e_in)) in a.input_values().iter().zip(e.input_values()).enumerate() {
                if a_in.index() != e_in.index() {
                    return Err(CompareResult::at(
                        &a,
                        &e,
                        format!(
                            "Input {} of `{}` reads port {} instead of {}",
                            port,
                            a.friendly_name(),
                            a_in.index(),
                            e_in.index()
                        ),
                    ));
                }
                pairing.pair(a_in.node(), e_in.node())?;
            }
        }

        Ok(())
    }

    /// Compare the facts of one paired node
    fn compare_nodes(&self, a: &NodeRef, e: &NodeRef) -> Result<(), CompareResult> {
        let fail = |message: String| Err(CompareResult::at(a, e, message));

        if a.op_type() != e.op_type() {
            return fail(format!(
                "Different node types: {} `{}` vs {} `{}`",
                a.op_type(),
                a.friendly_name(),
                e.op_type(),
                e.friendly_name()
            ));
        }
        if self.config.names && a.friendly_name() != e.friendly_name() {
            return fail(format!(
                "Different names: `{}` vs `{}`",
                a.friendly_name(),
                e.friendly_name()
            ));
        }
        if a.input_count() != e.input_count() {
            return fail(format!(
                "Number of inputs differ for `{}`: {} vs {}",
                a.friendly_name(),
                a.input_count(),
                e.input_count()
            ));
        }
        if a.output_count() != e.output_count() {
            return fail(format!(
                "Number of outputs differ for `{}`: {} vs {}",
                a.friendly_name(),
                a.output_count(),
                e.output_count()
            ));
        }
        if self.config.attributes && !attributes_equal(&a.attributes(), &e.attributes()) {
            return fail(format!("Attributes differ for `{}`", a.friendly_name()));
        }

        for port in 0..a.output_count() {
            if self.config.precision && a.output_desc(port) != e.output_desc(port) {
                return fail(format!(
                    "Output {} of `{}` differs: {} vs {}",
                    port,
                    a.friendly_name(),
                    a.element_type(port),
                    e.element_type(port)
                ));
            }
            if self.config.consumers_count && a.consumer_count(port) != e.consumer_count(port) {
                return fail(format!(
                    "Consumer count of `{}` port {} differs: {} vs {}",
                    a.friendly_name(),
                    port,
                    a.consumer_count(port),
                    e.consumer_count(port)
                ));
            }
        }

        Ok(())
    }
}

/// Compare `actual` against `expected` under `config`
pub fn compare_graphs(actual: &Graph, expected: &Graph, config: &CompareConfig) -> CompareResult {
    GraphComparator::new(config.clone()).compare(actual, expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops;
    use crate::tensor::{ElementType, PartialShape};

    fn input() -> NodeRef {
        ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4))
    }

    /// Two Relus over one NonZero each, or over a shared one
    fn two_branches(shared: bool) -> Graph {
        let p = input();
        let first = ops::non_zero(&p, ElementType::I64).unwrap();
        let second = if shared {
            first.clone()
        } else {
            ops::non_zero(&p, ElementType::I64).unwrap()
        };
        let outputs = [ops::relu(&first), ops::relu(&second)];
        Graph::from_outputs(outputs.iter(), vec![p]).unwrap()
    }

    #[test]
    fn test_identical_graphs() {
        let result = compare_graphs(
            &two_branches(true),
            &two_branches(true),
            &CompareConfig::default().enable(CompareFlag::ConsumersCount),
        );
        assert!(result.valid, "{}", result.message);
        assert!(result.divergence.is_none());
    }

    #[test]
    fn test_unshared_duplicate_is_a_divergence() {
        // Even without consumer counts the pairing must be one-to-one
        let result = compare_graphs(
            &two_branches(false),
            &two_branches(true),
            &CompareConfig::default(),
        );
        assert!(!result.valid);
        assert!(result.divergence.is_some());

        let result = compare_graphs(
            &two_branches(true),
            &two_branches(false),
            &CompareConfig::default(),
        );
        assert!(!result.valid);
    }

    #[test]
    fn test_consumers_count() {
        // An extra dangling consumer only shows up with the flag on
        let actual = two_branches(true);
        let nz = actual.find_nodes_by_op("NonZero")[0].clone();
        let _extra = ops::relu(&nz);

        let expected = two_branches(true);
        assert!(compare_graphs(&actual, &expected, &CompareConfig::default()).valid);

        let result = compare_graphs(
            &actual,
            &expected,
            &CompareConfig::default().enable(CompareFlag::ConsumersCount),
        );
        assert!(!result.valid);
        assert!(result.message.contains("Consumer count"));
    }

    #[test]
    fn test_precision_and_attributes() {
        let build = |et: ElementType| {
            let p = input();
            let nz = ops::non_zero(&p, et).unwrap();
            Graph::from_outputs([&nz], vec![p]).unwrap()
        };

        let result = compare_graphs(
            &build(ElementType::I32),
            &build(ElementType::I64),
            &CompareConfig::default().disable(CompareFlag::Precision),
        );
        assert!(!result.valid);
        assert!(result.message.contains("Attributes differ"));

        let result = compare_graphs(
            &build(ElementType::I32),
            &build(ElementType::I64),
            &CompareConfig::default().disable(CompareFlag::Attributes),
        );
        assert!(!result.valid);
        assert!(result.message.contains("Output 0"));

        let loose = CompareConfig::default()
            .disable(CompareFlag::Attributes)
            .disable(CompareFlag::Precision);
        assert!(!loose.is_enabled(CompareFlag::Precision));
        assert!(compare_graphs(&build(ElementType::I32), &build(ElementType::I64), &loose).valid);
    }

    #[test]
    fn test_names_flag() {
        let build = |name: &str| {
            let p = input();
            p.set_friendly_name("input");
            let relu = ops::relu(&p);
            relu.set_friendly_name(name);
            let graph = Graph::from_outputs([&relu], vec![p]).unwrap();
            graph.results()[0].set_friendly_name("output");
            graph
        };

        assert!(compare_graphs(&build("a"), &build("b"), &CompareConfig::default()).valid);

        let result = compare_graphs(
            &build("a"),
            &build("b"),
            &CompareConfig::default().enable(CompareFlag::Names),
        );
        assert!(!result.valid);
        assert_eq!(result.divergence, Some(("a".to_string(), "b".to_string())));
    }

    #[test]
    fn test_op_type_divergence_is_reported_first() {
        let p = input();
        let actual = Graph::from_outputs([&ops::relu(&p)], vec![p]).unwrap();
        let q = input();
        let expected = Graph::from_outputs([&ops::identity(&q)], vec![q]).unwrap();

        let result = GraphComparator::default().compare(&actual, &expected);
        assert!(!result.valid);
        assert!(result.message.contains("Different node types"));
    }

    #[test]
    fn test_graph_level_counts() {
        let p = input();
        let q = input();
        let relu = ops::relu(&p);
        let one = Graph::from_outputs([&relu], vec![p.clone()]).unwrap();
        let two = Graph::from_outputs([&relu], vec![p, q]).unwrap();

        let result = compare_graphs(&one, &two, &CompareConfig::default());
        assert!(!result.valid);
        assert!(result.divergence.is_none());
        assert!(result.message.contains("parameters"));
    }
}
