//! Partial shapes
//!
//! Shapes may be fully static, ranked with unknown dimensions, or of unknown rank.
//! Unknown values are valid and propagate; they are never an error by themselves.

use std::fmt;

use crate::error::{OptResult, TransformError};

/// A single dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Known extent
    Static(u64),
    /// Unknown extent
    Dynamic,
}

impl Dimension {
    /// Check if the dimension is static
    pub fn is_static(self) -> bool {
        matches!(self, Dimension::Static(_))
    }

    /// Static value, if any
    pub fn get(self) -> Option<u64> {
        match self {
            Dimension::Static(v) => Some(v),
            Dimension::Dynamic => None,
        }
    }

    /// Equal, or at least one side unknown
    pub fn compatible(self, other: Dimension) -> bool {
        match (self, other) {
            (Dimension::Static(a), Dimension::Static(b)) => a == b,
            _ => true,
        }
    }

    /// Merge two compatible dimensions, keeping the static one
    pub fn merge(self, other: Dimension) -> Option<Dimension> {
        match (self, other) {
            (Dimension::Dynamic, d) | (d, Dimension::Dynamic) => Some(d),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }
}

impl From<u64> for Dimension {
    fn from(v: u64) -> Self {
        Dimension::Static(v)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Static(v) => write!(f, "{}", v),
            Dimension::Dynamic => f.write_str("?"),
        }
    }
}

/// Shape of a tensor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PartialShape {
    /// Rank not known
    #[default]
    DynamicRank,
    /// Known rank, dimensions possibly unknown
    Ranked(Vec<Dimension>),
}

impl PartialShape {
    /// Shape of unknown rank
    pub fn dynamic() -> Self {
        PartialShape::DynamicRank
    }

    /// Known rank, every dimension unknown
    pub fn dynamic_of_rank(rank: usize) -> Self {
        PartialShape::Ranked(vec![Dimension::Dynamic; rank])
    }

    /// Fully static shape
    pub fn from_static(dims: &[u64]) -> Self {
        PartialShape::Ranked(dims.iter().map(|&d| Dimension::Static(d)).collect())
    }

    /// Scalar (rank 0)
    pub fn scalar() -> Self {
        PartialShape::Ranked(Vec::new())
    }

    /// Rank, if known
    pub fn rank(&self) -> Option<usize> {
        match self {
            PartialShape::DynamicRank => None,
            PartialShape::Ranked(dims) => Some(dims.len()),
        }
    }

    /// Dimensions, if the rank is known
    pub fn dims(&self) -> Option<&[Dimension]> {
        match self {
            PartialShape::DynamicRank => None,
            PartialShape::Ranked(dims) => Some(dims),
        }
    }

    /// Every dimension is known
    pub fn is_static(&self) -> bool {
        match self {
            PartialShape::DynamicRank => false,
            PartialShape::Ranked(dims) => dims.iter().all(|d| d.is_static()),
        }
    }

    /// Static dimensions as a plain vector
    pub fn to_static(&self) -> Option<Vec<u64>> {
        self.dims()?.iter().map(|d| d.get()).collect()
    }

    /// Total number of elements for static shapes (scalar = 1)
    pub fn numel(&self) -> Option<u64> {
        Some(self.to_static()?.iter().product())
    }

    /// Shapes could describe the same tensor
    pub fn compatible(&self, other: &PartialShape) -> bool {
        match (self, other) {
            (PartialShape::Ranked(a), PartialShape::Ranked(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.compatible(*y))
            }
            _ => true,
        }
    }

    /// Same rank scheme and same static dimensions (unknown matches only unknown)
    pub fn same_scheme(&self, other: &PartialShape) -> bool {
        self == other
    }

    /// Merge two compatible shapes into the most specific one
    pub fn merge(&self, other: &PartialShape) -> Option<PartialShape> {
        match (self, other) {
            (PartialShape::DynamicRank, s) | (s, PartialShape::DynamicRank) => Some(s.clone()),
            (PartialShape::Ranked(a), PartialShape::Ranked(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                a.iter()
                    .zip(b)
                    .map(|(x, y)| x.merge(*y))
                    .collect::<Option<Vec<_>>>()
                    .map(PartialShape::Ranked)
            }
        }
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialShape::DynamicRank => f.write_str("[...]"),
            PartialShape::Ranked(dims) => {
                f.write_str("[")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", d)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Compute the numpy-style broadcast of two shapes
pub fn broadcast_shape(shape_a: &PartialShape, shape_b: &PartialShape) -> OptResult<PartialShape> {
    let (a, b) = match (shape_a.dims(), shape_b.dims()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(PartialShape::DynamicRank),
    };

    let max_len = a.len().max(b.len());
    let mut result = vec![Dimension::Dynamic; max_len];

    for i in 0..max_len {
        // Broadcasting aligns from the trailing dimensions
        let dim_a = if i < a.len() { a[a.len() - 1 - i] } else { Dimension::Static(1) };
        let dim_b = if i < b.len() { b[b.len() - 1 - i] } else { Dimension::Static(1) };

        let out = match (dim_a, dim_b) {
            (Dimension::Static(1), d) | (d, Dimension::Static(1)) => d,
            (Dimension::Static(x), Dimension::Static(y)) if x == y => Dimension::Static(x),
            (Dimension::Static(x), Dimension::Static(y)) => {
                return Err(TransformError::InvalidNode(format!(
                    "Shapes {} and {} are not broadcastable (dim {} vs {})",
                    shape_a, shape_b, x, y
                )));
            }
            (Dimension::Dynamic, Dimension::Static(d)) | (Dimension::Static(d), Dimension::Dynamic) => {
                Dimension::Static(d)
            }
            (Dimension::Dynamic, Dimension::Dynamic) => Dimension::Dynamic,
        };

        result[max_len - 1 - i] = out;
    }

    Ok(PartialShape::Ranked(result))
}
