//! Graph mutation operations
//!
//! Every rewrite is planned and checked before the first edge is touched: a refused
//! edit returns an error and leaves the graph exactly as it was.

use std::sync::Arc;

use crate::error::{OptResult, TransformError};

use super::context::{check_parameter, check_result, Graph};
use super::node::{Input, NodeRef, Output};
use super::ops::{self, op_types};
use super::traversal::ancestor_ids;

/// One planned edge move: input `index` of `consumer` will read `source`
struct Rewire {
    consumer: NodeRef,
    index: usize,
    source: Output,
}

impl Graph {
    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a node with the graph.
    ///
    /// Parameters and Results are appended to their lists. Any other node becomes part
    /// of the graph once something reachable consumes it; here its inputs are checked
    /// to come from this graph.
    pub fn add_node(&mut self, node: NodeRef) -> OptResult<()> {
        match node.op_type() {
            op_types::PARAMETER => self.add_parameter(node),
            op_types::RESULT => {
                check_result(&node)?;
                self.check_inputs_known(&node)?;
                if !self.is_result(&node) {
                    self.results.push(node);
                }
                Ok(())
            }
            _ => self.check_inputs_known(&node),
        }
    }

    /// Append a Parameter
    pub fn add_parameter(&mut self, node: NodeRef) -> OptResult<()> {
        check_parameter(&node)?;
        if !self.is_parameter(&node) {
            self.parameters.push(node);
        }
        Ok(())
    }

    /// Wrap `output` into a new Result and append it
    pub fn add_result(&mut self, output: impl Into<Output>) -> OptResult<NodeRef> {
        let result = ops::result(output);
        self.add_node(result.clone())?;
        Ok(result)
    }

    /// Remove a Result from the output list. Returns false if it was not listed.
    pub fn remove_result(&mut self, result: &NodeRef) -> bool {
        let before = self.results.len();
        self.results.retain(|r| r.id() != result.id());
        self.results.len() != before
    }

    /// Replace the Parameter at `index` with `parameter`, moving all its consumers
    pub fn replace_parameter(&mut self, index: usize, parameter: NodeRef) -> OptResult<NodeRef> {
        check_parameter(&parameter)?;
        let old = self.parameters.get(index).cloned().ok_or_else(|| {
            TransformError::InvalidGraph(format!(
                "no parameter at index {} (graph has {})",
                index,
                self.parameters.len()
            ))
        })?;
        self.replace_node(&old, &parameter, None)?;
        Ok(old)
    }

    fn check_inputs_known(&self, node: &NodeRef) -> OptResult<()> {
        let reachable = self.reachable_nodes();
        for (port, input) in node.input_values().iter().enumerate() {
            let producer = input.node();
            // Constants are free-standing sources; Parameters must be listed
            let known = reachable.contains_key(&producer.id())
                || (producer.input_count() == 0 && !producer.is_type(op_types::PARAMETER));
            if !known {
                return Err(TransformError::DanglingReference {
                    node: node.friendly_name(),
                    port,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Rewriting
    // ========================================================================

    /// Move every consumer of `old` onto `new`.
    ///
    /// Output port `p` of `old` maps to port `port_map[p]` of `new` (identity when
    /// `None`). `new` itself is never rewired, so `new` may consume `old`. When `old`
    /// is a listed Parameter or Result, `new` takes its place in the list.
    ///
    /// All-or-nothing: wrong port maps, missing ports, incompatible types and edits
    /// that would close a cycle are refused before anything changes. Returns the number
    /// of rewired inputs. Friendly names are left alone; the survivor keeps its own.
    pub fn replace_node(
        &mut self,
        old: &NodeRef,
        new: &NodeRef,
        port_map: Option<&[usize]>,
    ) -> OptResult<usize> {
        if Arc::ptr_eq(old, new) {
            return Ok(0);
        }

        let identity: Vec<usize>;
        let port_map = match port_map {
            Some(map) => map,
            None => {
                identity = (0..old.output_count()).collect();
                &identity
            }
        };
        if port_map.len() != old.output_count() {
            return Err(TransformError::internal(
                "replace_node",
                format!(
                    "port map for `{}` has {} entries, node has {} outputs",
                    old.friendly_name(),
                    port_map.len(),
                    old.output_count()
                ),
            ));
        }

        let mut plan = Vec::new();
        for (port, &target) in port_map.iter().enumerate() {
            let consumers = old.consumers(port);
            if consumers.is_empty() {
                continue;
            }
            let source = self.checked_source(old, port, new, target)?;
            plan.extend(
                consumers
                    .into_iter()
                    .filter(|c| !Arc::ptr_eq(c.node(), new))
                    .map(|c| Rewire {
                        consumer: c.node().clone(),
                        index: c.index(),
                        source: source.clone(),
                    }),
            );
        }

        let old_is_parameter = self.is_parameter(old);
        let old_is_result = self.is_result(old);
        if old_is_parameter {
            check_parameter(new)?;
        }
        if old_is_result {
            check_result(new)?;
        }

        check_acyclic(&plan, new)?;

        if old_is_parameter {
            swap_listed(&mut self.parameters, old, new);
        }
        if old_is_result {
            swap_listed(&mut self.results, old, new);
        }
        Ok(apply(plan))
    }

    /// Move every consumer of `from` onto `to`. Same checks as [`Graph::replace_node`].
    pub fn replace_output(&mut self, from: &Output, to: &Output) -> OptResult<usize> {
        if from == to {
            return Ok(0);
        }
        let source = self.checked_source(from.node(), from.index(), to.node(), to.index())?;
        let plan: Vec<Rewire> = from
            .consumers()
            .into_iter()
            .filter(|c| !Arc::ptr_eq(c.node(), to.node()))
            .map(|c| Rewire {
                consumer: c.node().clone(),
                index: c.index(),
                source: source.clone(),
            })
            .collect();

        check_acyclic(&plan, to.node())?;
        Ok(apply(plan))
    }

    /// Bypass `output` with `replacement`, keeping model output names stable.
    ///
    /// When `output` feeds a Result, the replacement's producer takes over the name of
    /// `output`'s producer. Returns false without changing anything when that rename is
    /// not possible: the replacement is a Parameter or already feeds a Result.
    pub fn replace_output_update_name(
        &mut self,
        output: &Output,
        replacement: &Output,
    ) -> OptResult<bool> {
        let feeds_result = |o: &Output| {
            o.consumers()
                .iter()
                .any(|c: &Input| c.node().is_type(op_types::RESULT))
        };

        let rename = feeds_result(output);
        if rename {
            if replacement.node().is_type(op_types::PARAMETER) || feeds_result(replacement) {
                return Ok(false);
            }
        }

        self.replace_output(output, replacement)?;
        if rename {
            copy_friendly_name(output.node(), replacement.node());
        }
        Ok(true)
    }

    /// Check that `new:target` can stand in for `old:port`
    fn checked_source(
        &self,
        old: &NodeRef,
        port: usize,
        new: &NodeRef,
        target: usize,
    ) -> OptResult<Output> {
        let source = new.output(target).ok_or_else(|| TransformError::DanglingReference {
            node: new.friendly_name(),
            port: target,
        })?;

        let (expected, actual) = (old.output_desc(port).unwrap_or_default(), source.desc());
        if !expected.compatible(&actual) {
            return Err(TransformError::TypeMismatch {
                node: new.friendly_name(),
                port: target,
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(source)
    }
}

/// Copy the display name of `from` onto `to`
pub fn copy_friendly_name(from: &NodeRef, to: &NodeRef) {
    to.set_friendly_name(from.friendly_name());
}

/// A consumer that `source` already depends on would close a cycle
fn check_acyclic(plan: &[Rewire], new: &NodeRef) -> OptResult<()> {
    if plan.is_empty() {
        return Ok(());
    }
    let upstream = ancestor_ids(new);
    match plan.iter().find(|r| upstream.contains(&r.consumer.id())) {
        Some(r) => Err(TransformError::CycleDetected {
            node: r.consumer.friendly_name(),
        }),
        None => Ok(()),
    }
}

fn apply(plan: Vec<Rewire>) -> usize {
    let count = plan.len();
    for rewire in plan {
        rewire.consumer.set_input(rewire.index, rewire.source);
    }
    count
}

fn swap_listed(list: &mut Vec<NodeRef>, old: &NodeRef, new: &NodeRef) {
    let already_listed = list.iter().any(|n| Arc::ptr_eq(n, new));
    if already_listed {
        list.retain(|n| !Arc::ptr_eq(n, old));
    } else if let Some(slot) = list.iter_mut().find(|n| Arc::ptr_eq(n, old)) {
        *slot = new.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{ElementType, PartialShape};

    fn param() -> NodeRef {
        ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4))
    }

    #[test]
    fn test_replace_node_rewires_consumers() {
        let p = param();
        let a = ops::relu(&p);
        let b = ops::relu(&p);
        let user_0 = ops::identity(&a);
        let user_1 = ops::identity(&a);
        user_0.set_friendly_name("user_0");
        let mut graph =
            Graph::from_outputs([&user_0, &user_1, &b], vec![p.clone()]).unwrap();

        let rewired = graph.replace_node(&a, &b, None).unwrap();

        assert_eq!(rewired, 2);
        assert_eq!(a.consumer_count(0), 0);
        assert_eq!(b.consumer_count(0), 3);
        assert!(Arc::ptr_eq(&user_0.input_node(0).unwrap(), &b));
        assert_eq!(user_0.friendly_name(), "user_0");
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_replace_node_refuses_cycle() {
        let p = param();
        let a = ops::relu(&p);
        let b = ops::relu(&a);
        let c = ops::relu(&b);
        let mut graph = Graph::from_outputs([&c], vec![p.clone()]).unwrap();

        // a's consumer b is upstream of c
        let err = graph.replace_node(&a, &c, None).unwrap_err();
        assert!(matches!(err, TransformError::CycleDetected { .. }));
        assert_eq!(a.consumer_count(0), 1);
        assert!(Arc::ptr_eq(&b.input_node(0).unwrap(), &a));

        // c is b's only consumer and is never rewired onto itself
        assert_eq!(graph.replace_node(&b, &c, None).unwrap(), 0);
        assert!(Arc::ptr_eq(&c.input_node(0).unwrap(), &b));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_replace_node_new_may_consume_old() {
        let p = param();
        let a = ops::relu(&p);
        let user = ops::identity(&a);
        let mut graph = Graph::from_outputs([&user], vec![p.clone()]).unwrap();

        let wrapper = ops::relu(&a);
        graph.replace_node(&a, &wrapper, None).unwrap();

        assert!(Arc::ptr_eq(&user.input_node(0).unwrap(), &wrapper));
        assert!(Arc::ptr_eq(&wrapper.input_node(0).unwrap(), &a));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_replace_node_refuses_bad_ports() {
        let p = param();
        let a = ops::relu(&p);
        let user = ops::identity(&a);
        let mut graph = Graph::from_outputs([&user], vec![p.clone()]).unwrap();
        let b = ops::relu(&p);

        let err = graph.replace_node(&a, &b, Some(&[0, 1])).unwrap_err();
        assert!(matches!(err, TransformError::Internal { .. }));

        let err = graph.replace_node(&a, &b, Some(&[3])).unwrap_err();
        assert!(matches!(err, TransformError::DanglingReference { port: 3, .. }));
        assert_eq!(a.consumer_count(0), 1);
    }

    #[test]
    fn test_replace_node_refuses_type_mismatch() {
        let p = param();
        let a = ops::relu(&p);
        let user = ops::identity(&a);
        let mut graph = Graph::from_outputs([&user], vec![p.clone()]).unwrap();

        let other = ops::parameter(ElementType::I32, PartialShape::dynamic());
        let err = graph.replace_node(&a, &other, None).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
        assert!(Arc::ptr_eq(&user.input_node(0).unwrap(), &a));
    }

    #[test]
    fn test_replace_parameter() {
        let p = param();
        let relu = ops::relu(&p);
        let mut graph = Graph::from_outputs([&relu], vec![p.clone()]).unwrap();

        let replacement = param();
        let old = graph.replace_parameter(0, replacement.clone()).unwrap();

        assert!(Arc::ptr_eq(&old, &p));
        assert!(graph.is_parameter(&replacement));
        assert!(!graph.is_parameter(&p));
        assert!(Arc::ptr_eq(&relu.input_node(0).unwrap(), &replacement));
        assert!(graph.replace_parameter(5, param()).is_err());
    }

    #[test]
    fn test_add_and_remove_result() {
        let p = param();
        let relu = ops::relu(&p);
        let mut graph = Graph::from_outputs([&relu], vec![p.clone()]).unwrap();

        let extra = graph.add_result(&p).unwrap();
        assert_eq!(graph.results().len(), 2);
        assert!(graph.remove_result(&extra));
        assert!(!graph.remove_result(&extra));
        assert_eq!(graph.results().len(), 1);
    }

    #[test]
    fn test_add_node_checks_inputs() {
        let p = param();
        let relu = ops::relu(&p);
        let mut graph = Graph::from_outputs([&relu], vec![p.clone()]).unwrap();

        let stranger = param();
        let foreign = ops::relu(&stranger);
        let err = graph.add_node(foreign).unwrap_err();
        assert!(matches!(err, TransformError::DanglingReference { .. }));

        assert!(graph.add_node(ops::identity(&relu)).is_ok());
        assert!(graph.add_node(stranger.clone()).is_ok());
        assert!(graph.is_parameter(&stranger));
    }

    #[test]
    fn test_replace_output_update_name() {
        let p = param();
        let relu = ops::relu(&p);
        let ident = ops::identity(&relu);
        ident.set_friendly_name("output");
        let mut graph = Graph::from_outputs([&ident], vec![p.clone()]).unwrap();

        let done = graph
            .replace_output_update_name(&Output::from(&ident), &Output::from(&relu))
            .unwrap();

        assert!(done);
        assert_eq!(relu.friendly_name(), "output");
        assert!(Arc::ptr_eq(&graph.results()[0].input_node(0).unwrap(), &relu));
    }

    #[test]
    fn test_replace_output_update_name_keeps_parameter_names() {
        let p = param();
        p.set_friendly_name("input");
        let ident = ops::identity(&p);
        let mut graph = Graph::from_outputs([&ident], vec![p.clone()]).unwrap();

        let done = graph
            .replace_output_update_name(&Output::from(&ident), &Output::from(&p))
            .unwrap();

        assert!(!done);
        assert_eq!(p.friendly_name(), "input");
        assert!(Arc::ptr_eq(&graph.results()[0].input_node(0).unwrap(), &ident));
    }
}
