//! Structural graph comparison
//!
//! [`GraphComparator`] decides whether two graphs compute the same thing, structurally.
//! It is the oracle of the transformation tests: a transformed graph is compared
//! against a hand-built expected graph.
//!
//! Op types and input provenance are always compared. [`CompareConfig`] adds
//! attributes and output precision (on by default), and consumer counts and names
//! (off by default).
//!
//! # Example
//!
//! ```
//! use graph_optimizer::compare::{compare_graphs, CompareConfig, CompareFlag};
//! use graph_optimizer::graph::{ops, Graph};
//! use graph_optimizer::tensor::{ElementType, PartialShape};
//!
//! let build = || {
//!     let input = ops::parameter(ElementType::F32, PartialShape::dynamic());
//!     let relu = ops::relu(&input);
//!     Graph::from_outputs([&relu], vec![input]).unwrap()
//! };
//!
//! let config = CompareConfig::default().enable(CompareFlag::ConsumersCount);
//! let result = compare_graphs(&build(), &build(), &config);
//! assert!(result.valid, "{}", result.message);
//! ```

mod comparator;

pub use comparator::{compare_graphs, CompareConfig, CompareFlag, CompareResult, GraphComparator};
