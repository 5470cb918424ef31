//! Graph IR
//!
//! This module provides the core infrastructure for working with computation graphs:
//!
//! - [`Graph`]: Parameters and Results of a model; everything else is reached through edges
//! - [`Node`]: an operation instance with typed attributes and output descriptors
//! - [`Output`] / [`Input`]: the two ends of an edge
//! - [`ops`]: built-in op constructors and type inference
//! - [`traversal`]: BFS/DFS walks in either direction
//!
//! # Ownership
//!
//! A consumer holds its producers through `Arc` input edges. Producers know their
//! consumers only through `Weak` back-references, so a node lives exactly as long
//! as some consumer (or the graph's Parameter/Result lists) holds it.
//!
//! # Example
//!
//! ```
//! use graph_optimizer::graph::{ops, Graph};
//! use graph_optimizer::tensor::{ElementType, PartialShape};
//!
//! let input = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
//! let relu = ops::relu(&input);
//! let graph = Graph::from_outputs([&relu], vec![input]).unwrap();
//!
//! assert_eq!(graph.get_ordered_ops().len(), 3);
//! assert!(graph.validate().is_ok());
//! ```
//!
//! # Rewrites
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `replace_node` | move every consumer of a node onto another, all-or-nothing |
//! | `replace_output` | same for a single output port |
//! | `replace_output_update_name` | bypass a pass-through node, keeping output names |
//! | `replace_parameter` | swap a listed Parameter |

pub mod accessors;
pub mod attributes;
pub mod context;
pub mod maps;
pub mod mutators;
pub mod node;
pub mod ops;
pub mod traversal;
pub mod validation;

// Re-export main types
pub use attributes::{attributes_equal, AttributeValue, Attributes};
pub use context::Graph;
pub use maps::{NameMap, NodeIdSet, NodeMap, UsersMap};
pub use mutators::copy_friendly_name;
pub use node::{Input, Node, NodeBuilder, NodeId, NodeRef, Output};
pub use ops::op_types;
pub use traversal::{BfsIterator, DfsIterator, Direction};
pub use validation::Violation;
