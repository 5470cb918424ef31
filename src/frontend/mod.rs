//! Frontend interface
//!
//! The contract between a model-format frontend and the graph IR. A frontend wraps
//! each serialized operator in a [`Decoder`]; [`convert_model`] turns the decoders
//! into a [`Graph`](crate::graph::Graph).
//!
//! - [`ArgDefDecoder`]: function signature arguments, restricted by [`ArgRole`]
//! - [`NodeDefDecoder`]: plain operator descriptors
//! - [`parse_producer_name`]: `name`, `name:port` and `name:tag:port` references
//!
//! Misusing a role-restricted accessor fails with
//! [`TransformError::RoleMismatch`](crate::error::TransformError::RoleMismatch) or
//! [`TransformError::Internal`](crate::error::TransformError::Internal); an unknown
//! producer fails the whole conversion with
//! [`TransformError::UnresolvedReference`](crate::error::TransformError::UnresolvedReference).

pub mod argdef;
pub mod convert;
pub mod decoder;

pub use argdef::{ArgDefDecoder, ArgRole};
pub use convert::{convert_model, NodeDefDecoder};
pub use decoder::{parse_producer_name, Decoder, OpTypeByName};
