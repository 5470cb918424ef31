//! Graph transformation module
//!
//! This module provides the core transformation infrastructure:
//!
//! - [`MatcherPass`]: a [`Transformation`](crate::traits::Transformation) built from a
//!   pattern and a per-site rewrite callback
//! - [`apply_pattern`]: the match-then-rewrite loop behind it
//! - [`fuse`]: merging equivalent nodes into one representative
//! - [`eliminate`]: bypassing pass-through nodes
//!
//! # Overview
//!
//! Transformations work on a [`Graph`](crate::graph::Graph) and modify it in-place.
//! The typical workflow is:
//!
//! 1. Describe the site with a [`Pattern`](crate::pattern::Pattern)
//! 2. Rewrite each match with `replace_node` / `replace_output`
//! 3. Report what changed in a [`TransformResult`]
//!
//! # Example
//!
//! ```
//! use graph_optimizer::graph::{ops, Graph};
//! use graph_optimizer::pattern::wrap_type;
//! use graph_optimizer::tensor::{ElementType, PartialShape};
//! use graph_optimizer::traits::Transformation;
//! use graph_optimizer::transform::{eliminate::eliminate_node, MatcherPass};
//!
//! let input = ops::parameter(ElementType::F32, PartialShape::dynamic());
//! let ident = ops::identity(&input);
//! let relu = ops::relu(&ident);
//! let mut graph = Graph::from_outputs([&relu], vec![input]).unwrap();
//!
//! let mut pass = MatcherPass::new("DropIdentity", wrap_type(&["Identity"]), |g, m| {
//!     Ok(eliminate_node(g, m.root_node())?.is_some())
//! });
//! assert!(pass.transform(&mut graph).unwrap().changed());
//! assert_eq!(graph.node_count(), 3);
//! ```

pub mod core;
pub mod eliminate;
pub mod fuse;

// Re-export main types and functions
pub use self::core::{
    apply_pattern, MatcherCallback, MatcherPass, MatcherPassConfig, TransformResult,
};

pub use eliminate::{can_eliminate, eliminate_node, EliminationResult};

pub use fuse::{can_fuse, fuse_duplicates, FusionResult};
