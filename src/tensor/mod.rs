//! Tensor descriptors
//!
//! This module describes what flows along graph edges. It never holds tensor data:
//! - Element types (`dtype`)
//! - Partial shapes with unknown rank/dimensions (`shape`)
//! - [`TensorDesc`], the pair of both attached to every node output
//!
//! # Example
//!
//! ```ignore
//! use graph_optimizer::tensor::{ElementType, PartialShape, TensorDesc};
//!
//! let desc = TensorDesc::new(ElementType::F32, PartialShape::dynamic_of_rank(4));
//! assert!(desc.compatible(&TensorDesc::new(ElementType::F32, PartialShape::dynamic())));
//! ```

pub mod dtype;
pub mod shape;

use std::fmt;

// Re-export commonly used items
pub use dtype::ElementType;
pub use shape::{broadcast_shape, Dimension, PartialShape};

/// Element type and shape of one node output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TensorDesc {
    /// Element type
    pub element_type: ElementType,
    /// Shape
    pub shape: PartialShape,
}

impl TensorDesc {
    /// Create a descriptor
    pub fn new(element_type: ElementType, shape: PartialShape) -> Self {
        Self {
            element_type,
            shape,
        }
    }

    /// Fully dynamic descriptor
    pub fn dynamic() -> Self {
        Self::default()
    }

    /// Both element type and shape are compatible
    pub fn compatible(&self, other: &TensorDesc) -> bool {
        self.element_type.compatible(other.element_type) && self.shape.compatible(&other.shape)
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.element_type, self.shape)
    }
}
