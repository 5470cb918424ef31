//! Core traits for graph-optimizer
//!
//! Defines the fundamental interface for graph rewrites.

use crate::error::OptResult;
use crate::graph::Graph;
use crate::transform::TransformResult;

/// Transformation trait for in-place graph rewrites
///
/// This is the core abstraction for everything a [`PassManager`](crate::pass::PassManager)
/// runs, including nested pass managers. A transformation mutates the graph it is
/// given and reports what it did; `TransformResult::changed()` is the dirty flag the
/// pass manager iterates on.
///
/// # Example
///
/// ```
/// use graph_optimizer::error::OptResult;
/// use graph_optimizer::graph::Graph;
/// use graph_optimizer::traits::Transformation;
/// use graph_optimizer::transform::TransformResult;
///
/// struct NoOp;
///
/// impl Transformation for NoOp {
///     fn name(&self) -> &str {
///         "NoOp"
///     }
///
///     fn transform(&mut self, _graph: &mut Graph) -> OptResult<TransformResult> {
///         Ok(TransformResult::new())
///     }
/// }
/// ```
pub trait Transformation: Send {
    /// Name of the transformation, used in logs and errors
    fn name(&self) -> &str;

    /// Apply the transformation
    ///
    /// Errors returned here are fatal for the run. Problems confined to one match
    /// site are absorbed by the transformation and counted in
    /// [`TransformResult::sites_skipped`].
    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult>;

    /// Check if this transformation is applicable to the graph
    fn is_applicable(&self, _graph: &Graph) -> bool {
        true
    }
}

impl<T: Transformation + ?Sized> Transformation for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult> {
        (**self).transform(graph)
    }

    fn is_applicable(&self, graph: &Graph) -> bool {
        (**self).is_applicable(graph)
    }
}
