//! Elimination transformers
//!
//! Transformers that remove nodes which do not change the value they forward.

use tracing::trace;

use crate::error::OptResult;
use crate::graph::ops::ATTR_DESTINATION_TYPE;
use crate::graph::{op_types, Graph, Output};
use crate::pattern::{
    any_input, optional, wrap_type, wrap_type_with_inputs, Match, Pattern, PASS_THROUGH,
};
use crate::traits::Transformation;
use crate::transform::{eliminate_node, MatcherPass, TransformResult};

use super::common::{get_attr_type, is_lossless_widening};

/// Eliminate Identity nodes
///
/// Identity nodes simply pass their input to output without modification.
/// Their consumers are moved onto the Identity's input.
#[derive(Debug)]
pub struct EliminateIdentity {
    pass: MatcherPass,
}

impl EliminateIdentity {
    /// Create the pass
    pub fn new() -> Self {
        let pass = MatcherPass::new("EliminateIdentity", wrap_type(PASS_THROUGH), |g, m| {
            Ok(eliminate_node(g, m.root_node())?.is_some())
        });
        Self { pass }
    }
}

impl Default for EliminateIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformation for EliminateIdentity {
    fn name(&self) -> &str {
        "EliminateIdentity"
    }

    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult> {
        let mut result = self.pass.transform(graph)?;
        // Every applied site removed exactly one node
        result.nodes_eliminated = result.transforms_applied;
        Ok(result)
    }
}

/// Eliminate Convert nodes that do not change the element type
///
/// Two shapes are handled:
/// - `Convert(x) -> T` where `x` is already `T`
/// - `Convert(Convert(x) -> W) -> T` where `x` is `T` and `W` holds every value of `T`,
///   so the round trip is exact
#[derive(Debug)]
pub struct EliminateNopConvert {
    pass: MatcherPass,
}

impl EliminateNopConvert {
    /// Create the pass
    pub fn new() -> Self {
        let pass = MatcherPass::new("EliminateNopConvert", Self::pattern(), Self::rewrite);
        Self { pass }
    }

    fn pattern() -> Pattern {
        let upstream =
            optional(&[op_types::CONVERT], any_input().with_label("src")).with_label("inner");
        wrap_type_with_inputs(&[op_types::CONVERT], vec![upstream]).with_label("outer")
    }

    fn rewrite(graph: &mut Graph, m: &Match) -> OptResult<bool> {
        let outer = m.root_node().clone();
        let target = get_attr_type(&outer, ATTR_DESTINATION_TYPE).unwrap_or_default();
        if !target.is_static() {
            return Ok(false);
        }
        let output = Output::from(&outer);

        // Round trip through a wider type
        if let (Some(inner), Some(src)) = (m.get("inner")?, m.get("src")?) {
            if src.element_type() == target && is_lossless_widening(target, inner.element_type()) {
                trace!(node = %outer.friendly_name(), "round-trip convert");
                return graph.replace_output_update_name(&output, src);
            }
        }

        match outer.input_value(0) {
            Some(input) if input.element_type() == target => {
                graph.replace_output_update_name(&output, &input)
            }
            _ => Ok(false),
        }
    }
}

impl Default for EliminateNopConvert {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformation for EliminateNopConvert {
    fn name(&self) -> &str {
        "EliminateNopConvert"
    }

    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult> {
        let mut result = self.pass.transform(graph)?;
        result.nodes_eliminated = result.transforms_applied;
        Ok(result)
    }
}
