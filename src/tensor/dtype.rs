//! Element types
//!
//! The closed set of element types a node output can carry.

use std::fmt;
use std::str::FromStr;

use crate::error::TransformError;

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementType {
    /// Not known yet; compatible with every type
    #[default]
    Dynamic,
    /// Boolean
    Boolean,
    /// 16-bit IEEE float
    F16,
    /// 16-bit brain float
    BF16,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
}

impl ElementType {
    /// Size in bytes, `None` for [`ElementType::Dynamic`]
    pub fn size_in_bytes(self) -> Option<usize> {
        match self {
            ElementType::Dynamic => None,
            ElementType::Boolean | ElementType::I8 | ElementType::U8 => Some(1),
            ElementType::F16 | ElementType::BF16 | ElementType::I16 | ElementType::U16 => Some(2),
            ElementType::F32 | ElementType::I32 | ElementType::U32 => Some(4),
            ElementType::F64 | ElementType::I64 | ElementType::U64 => Some(8),
        }
    }

    /// Check if the type is floating point
    pub fn is_float(self) -> bool {
        matches!(
            self,
            ElementType::F16 | ElementType::BF16 | ElementType::F32 | ElementType::F64
        )
    }

    /// Check if the type is an integer type
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            ElementType::I8
                | ElementType::I16
                | ElementType::I32
                | ElementType::I64
                | ElementType::U8
                | ElementType::U16
                | ElementType::U32
                | ElementType::U64
        )
    }

    /// Check if the type is signed
    pub fn is_signed(self) -> bool {
        self.is_float()
            || matches!(
                self,
                ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64
            )
    }

    /// Check if the type is static (not dynamic)
    pub fn is_static(self) -> bool {
        self != ElementType::Dynamic
    }

    /// Two types are compatible when equal or when either is dynamic
    pub fn compatible(self, other: ElementType) -> bool {
        self == other || self == ElementType::Dynamic || other == ElementType::Dynamic
    }

    /// Merge two compatible types, keeping the more specific one
    pub fn merge(self, other: ElementType) -> Option<ElementType> {
        match (self, other) {
            (ElementType::Dynamic, t) | (t, ElementType::Dynamic) => Some(t),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    /// Short type name (`"f32"`, `"i64"`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Dynamic => "dynamic",
            ElementType::Boolean => "boolean",
            ElementType::F16 => "f16",
            ElementType::BF16 => "bf16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s {
            "dynamic" | "undefined" => ElementType::Dynamic,
            "boolean" | "bool" => ElementType::Boolean,
            "f16" => ElementType::F16,
            "bf16" => ElementType::BF16,
            "f32" => ElementType::F32,
            "f64" => ElementType::F64,
            "i8" => ElementType::I8,
            "i16" => ElementType::I16,
            "i32" => ElementType::I32,
            "i64" => ElementType::I64,
            "u8" => ElementType::U8,
            "u16" => ElementType::U16,
            "u32" => ElementType::U32,
            "u64" => ElementType::U64,
            other => {
                return Err(TransformError::InvalidNode(format!(
                    "unknown element type `{}`",
                    other
                )))
            }
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(ElementType::F32.size_in_bytes(), Some(4));
        assert_eq!(ElementType::I64.size_in_bytes(), Some(8));
        assert_eq!(ElementType::U8.size_in_bytes(), Some(1));
        assert_eq!(ElementType::Dynamic.size_in_bytes(), None);
    }

    #[test]
    fn test_classification() {
        assert!(ElementType::F32.is_float());
        assert!(!ElementType::I32.is_float());
        assert!(ElementType::U8.is_integral());
        assert!(!ElementType::U8.is_signed());
        assert!(ElementType::BF16.is_signed());
    }

    #[test]
    fn test_compatible_and_merge() {
        assert!(ElementType::Dynamic.compatible(ElementType::I64));
        assert!(!ElementType::I32.compatible(ElementType::I64));
        assert_eq!(
            ElementType::Dynamic.merge(ElementType::I32),
            Some(ElementType::I32)
        );
        assert_eq!(ElementType::I32.merge(ElementType::I64), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("i64".parse::<ElementType>().unwrap(), ElementType::I64);
        assert_eq!("bool".parse::<ElementType>().unwrap(), ElementType::Boolean);
        assert!("complex".parse::<ElementType>().is_err());
        assert_eq!(ElementType::F16.to_string(), "f16");
    }
}
