//! Graph container
//!
//! `Graph` is the central structure for working with a model. It only lists the
//! entry points (Parameters) and outputs (Results); everything else is owned through
//! input edges and lives as long as some Result can reach it.

use crate::error::{OptResult, TransformError};

use super::node::{NodeRef, Output};
use super::ops::{self, op_types};

/// A computation graph
///
/// Every structural mutation goes through `&mut Graph`, so a graph has a single
/// writer. A graph that is not being rewritten can be shared across threads for
/// read-only matching.
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub(crate) name: String,

    /// Entry points, in declaration order
    pub(crate) parameters: Vec<NodeRef>,

    /// Outputs, in declaration order
    pub(crate) results: Vec<NodeRef>,
}

impl Graph {
    /// Create a graph from Result and Parameter nodes
    pub fn new(results: Vec<NodeRef>, parameters: Vec<NodeRef>) -> OptResult<Self> {
        for result in &results {
            check_result(result)?;
        }
        for parameter in &parameters {
            check_parameter(parameter)?;
        }

        Ok(Self {
            name: String::new(),
            parameters,
            results,
        })
    }

    /// Create a graph whose outputs are `outputs`, each wrapped into a new Result
    pub fn from_outputs<I, O>(outputs: I, parameters: Vec<NodeRef>) -> OptResult<Self>
    where
        I: IntoIterator<Item = O>,
        O: Into<Output>,
    {
        let results = outputs.into_iter().map(ops::result).collect();
        Self::new(results, parameters)
    }

    /// Set the graph name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry points
    pub fn parameters(&self) -> &[NodeRef] {
        &self.parameters
    }

    /// Outputs
    pub fn results(&self) -> &[NodeRef] {
        &self.results
    }

    /// Check if the node is listed as a Parameter
    pub fn is_parameter(&self, node: &NodeRef) -> bool {
        self.parameters.iter().any(|p| p.id() == node.id())
    }

    /// Check if the node is listed as a Result
    pub fn is_result(&self, node: &NodeRef) -> bool {
        self.results.iter().any(|r| r.id() == node.id())
    }
}

pub(crate) fn check_result(node: &NodeRef) -> OptResult<()> {
    if !node.is_type(op_types::RESULT) {
        return Err(TransformError::InvalidGraph(format!(
            "`{}` is a {}, expected a Result",
            node.friendly_name(),
            node.op_type()
        )));
    }
    if node.input_count() != 1 {
        return Err(TransformError::InvalidGraph(format!(
            "Result `{}` must have exactly one input, has {}",
            node.friendly_name(),
            node.input_count()
        )));
    }
    Ok(())
}

pub(crate) fn check_parameter(node: &NodeRef) -> OptResult<()> {
    if !node.is_type(op_types::PARAMETER) || node.input_count() != 0 {
        return Err(TransformError::InvalidGraph(format!(
            "`{}` is not a Parameter without inputs",
            node.friendly_name()
        )));
    }
    Ok(())
}
