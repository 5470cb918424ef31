//! Common utilities for transformers
//!
//! Attribute access and element-type facts shared by the transformers.

use crate::graph::Node;
use crate::tensor::ElementType;

/// Get attribute value as element type
pub fn get_attr_type(node: &Node, name: &str) -> Option<ElementType> {
    node.attribute(name).and_then(|a| a.as_type())
}

/// Whether every value of `from` survives a conversion to `to` and back
pub fn is_lossless_widening(from: ElementType, to: ElementType) -> bool {
    use ElementType::*;

    if from == to {
        return from.is_static();
    }
    match (from, to) {
        (Boolean, t) => t.is_integral() || t.is_float(),
        (F16 | BF16, F32 | F64) | (F32, F64) => true,
        // Integers whose range fits the float mantissa
        (I8 | U8 | I16 | U16, F16) => matches!(from, I8 | U8),
        (I8 | U8 | I16 | U16, F32 | F64) => true,
        (I32 | U32, F64) => true,
        (f, t) if f.is_integral() && t.is_integral() => {
            match (f.size_in_bytes(), t.size_in_bytes()) {
                (Some(fs), Some(ts)) if f.is_signed() == t.is_signed() => ts >= fs,
                // Unsigned into a strictly wider signed type
                (Some(fs), Some(ts)) if !f.is_signed() => ts > fs,
                _ => false,
            }
        }
        _ => false,
    }
}
