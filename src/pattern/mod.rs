//! Pattern matching module
//!
//! This module provides tools for identifying subgraphs to rewrite.
//!
//! # Overview
//!
//! The pattern matching system works by:
//! 1. Describing a producer subgraph as a [`Pattern`] tree (root = the output being matched)
//! 2. Matching from the root toward inputs, trying alternatives in declaration order
//! 3. Optionally filtering with [`predicate`]s and extra conditions
//!
//! # Example
//!
//! ```
//! use graph_optimizer::graph::{ops, Graph};
//! use graph_optimizer::pattern::{any_input, matcher, optional, wrap_type_with_inputs};
//! use graph_optimizer::tensor::{ElementType, PartialShape};
//!
//! let input = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
//! let relu = ops::relu(&input);
//! let graph = Graph::from_outputs([&relu], vec![input]).unwrap();
//!
//! // Relu over an optional Convert
//! let pattern = wrap_type_with_inputs(
//!     &["Relu"],
//!     vec![optional(&["Convert"], any_input().with_label("data")).with_label("cvt")],
//! );
//!
//! let m = matcher(&graph).match_pattern(&relu, &pattern).unwrap();
//! assert!(m.get("cvt").unwrap().is_none()); // pass-through branch
//! assert!(m.get("data").unwrap().is_some());
//! ```

pub mod matcher;
pub mod ops;
pub mod predicate;

// Re-export main types
pub use matcher::{matcher, Match, PatternMatcher};
pub use ops::{any_input, optional, or, wrap_type, wrap_type_with_inputs, Pattern, PatternKind};
pub use predicate::{
    attr_equals, consumers_count, has_static_rank, rank_equals, type_matches, type_matches_any,
    Predicate,
};

// Re-export common patterns
pub use ops::PASS_THROUGH;
