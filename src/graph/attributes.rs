//! Typed node attributes

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use crate::tensor::{ElementType, PartialShape};

/// Attribute map of a node (insertion order kept for display, ignored for equality)
pub type Attributes = IndexMap<String, AttributeValue>;

/// A typed attribute value
///
/// Floats compare and hash by bit pattern so attribute values can be used in
/// hash keys.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Boolean flag
    Bool(bool),
    /// String
    String(String),
    /// Integer list (axes, pads, perms)
    Ints(Vec<i64>),
    /// Float list
    Floats(Vec<f64>),
    /// Element type, e.g. a NonZero index type
    Type(ElementType),
    /// Shape
    Shape(PartialShape),
}

impl AttributeValue {
    /// Get value as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get value as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get value as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get value as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get value as i64 list
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            AttributeValue::Ints(v) => Some(v),
            _ => None,
        }
    }

    /// Get value as f64 list
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            AttributeValue::Floats(v) => Some(v),
            _ => None,
        }
    }

    /// Get value as element type
    pub fn as_type(&self) -> Option<ElementType> {
        match self {
            AttributeValue::Type(v) => Some(*v),
            _ => None,
        }
    }

    /// Get value as shape
    pub fn as_shape(&self) -> Option<&PartialShape> {
        match self {
            AttributeValue::Shape(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Ints(a), Ints(b)) => a == b,
            (Floats(a), Floats(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Type(a), Type(b)) => a == b,
            (Shape(a), Shape(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AttributeValue::Int(v) => v.hash(state),
            AttributeValue::Float(v) => v.to_bits().hash(state),
            AttributeValue::Bool(v) => v.hash(state),
            AttributeValue::String(v) => v.hash(state),
            AttributeValue::Ints(v) => v.hash(state),
            AttributeValue::Floats(v) => {
                for x in v {
                    x.to_bits().hash(state);
                }
            }
            AttributeValue::Type(v) => v.hash(state),
            AttributeValue::Shape(v) => v.hash(state),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::String(v) => write!(f, "\"{}\"", v),
            AttributeValue::Ints(v) => write!(f, "{:?}", v),
            AttributeValue::Floats(v) => write!(f, "{:?}", v),
            AttributeValue::Type(v) => write!(f, "{}", v),
            AttributeValue::Shape(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(v: Vec<i64>) -> Self {
        AttributeValue::Ints(v)
    }
}

impl From<ElementType> for AttributeValue {
    fn from(v: ElementType) -> Self {
        AttributeValue::Type(v)
    }
}

impl From<PartialShape> for AttributeValue {
    fn from(v: PartialShape) -> Self {
        AttributeValue::Shape(v)
    }
}

/// Compare two attribute maps ignoring insertion order
pub fn attributes_equal(a: &Attributes, b: &Attributes) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(AttributeValue::from(4i64).as_int(), Some(4));
        assert_eq!(AttributeValue::from("same").as_str(), Some("same"));
        assert_eq!(
            AttributeValue::from(ElementType::I32).as_type(),
            Some(ElementType::I32)
        );
        assert_eq!(AttributeValue::from(true).as_int(), None);
    }

    #[test]
    fn test_float_equality_by_bits() {
        assert_eq!(AttributeValue::Float(f64::NAN), AttributeValue::Float(f64::NAN));
        assert_ne!(AttributeValue::Float(0.0), AttributeValue::Float(-0.0));
    }

    #[test]
    fn test_attributes_equal_ignores_order() {
        let mut a = Attributes::new();
        a.insert("axis".to_string(), 1i64.into());
        a.insert("mode".to_string(), "constant".into());

        let mut b = Attributes::new();
        b.insert("mode".to_string(), "constant".into());
        b.insert("axis".to_string(), 1i64.into());

        assert!(attributes_equal(&a, &b));

        b.insert("axis".to_string(), 2i64.into());
        assert!(!attributes_equal(&a, &b));
    }
}
