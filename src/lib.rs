//! # Graph Optimizer
//!
//! Graph IR, pattern matcher and pass manager for rewriting neural-network
//! computation graphs.
//!
//! This crate provides the structural core of a graph compiler: a shared-ownership
//! graph representation, a read-only pattern matcher, transformations built on it
//! and a pass manager that runs them to a fixed point.
//!
//! ## Features
//!
//! - **Graph IR**: nodes own their inputs and track consumers through weak
//!   back-references; `replace_node` is all-or-nothing
//! - **Pattern Matching**: wildcards, type predicates, optional and alternative branches
//! - **Transformations**: duplicate producer fusion, pass-through elimination
//! - **Pass Manager**: ordered, nestable pipelines with post-pass validation
//! - **Structural Comparison**: lock-step graph equivalence, used as a test oracle
//!
//! ## Example
//!
//! ```
//! use graph_optimizer::prelude::*;
//!
//! let input = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
//! let a = ops::relu(&ops::non_zero(&input, ElementType::I32).unwrap());
//! let b = ops::relu(&ops::non_zero(&input, ElementType::I32).unwrap());
//! let mut graph = Graph::from_outputs([&a, &b], vec![input]).unwrap();
//!
//! let mut manager = PassManager::default();
//! manager.register_pass(NonZeroFusion::new());
//! assert!(manager.run_on_model(&mut graph).unwrap());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod compare;
pub mod error;
pub mod frontend;
pub mod graph;
pub mod pass;
pub mod pattern;
pub mod tensor;
pub mod traits;
pub mod transform;
pub mod transformers;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use graph_optimizer::prelude::*`
pub mod prelude {
    pub use crate::compare::{compare_graphs, CompareConfig, CompareFlag, CompareResult};
    pub use crate::error::{OptResult, TransformError};
    pub use crate::graph::{ops, Graph, Node, NodeRef, Output};
    pub use crate::pass::{PassConfig, PassManager, PassManagerState, ValidationMode};
    pub use crate::pattern::{any_input, matcher, optional, or, wrap_type, Match, Pattern};
    pub use crate::tensor::{ElementType, PartialShape};
    pub use crate::traits::Transformation;
    pub use crate::transform::{MatcherPass, TransformResult};
    pub use crate::transformers::{
        DuplicateFusion, EliminateIdentity, EliminateNopConvert, NonZeroFusion,
        OptimizationPipeline,
    };
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use error::{OptResult, TransformError};
pub use traits::Transformation;

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
