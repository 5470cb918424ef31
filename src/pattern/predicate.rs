//! Output predicates
//!
//! Predicates constrain what a pattern position accepts beyond its op type: the
//! element type of the output, its rank, how many consumers it has, or an attribute
//! of the producing node. They are cheap, side-effect free closures over node facts.

use std::fmt;
use std::sync::Arc;

use crate::graph::{AttributeValue, Output};
use crate::tensor::ElementType;

type CheckFn = dyn Fn(&Output) -> bool + Send + Sync;

/// A named check over a candidate output
#[derive(Clone)]
pub struct Predicate {
    description: String,
    check: Arc<CheckFn>,
}

impl Predicate {
    /// Create a predicate from a closure
    pub fn new<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Output) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Evaluate against an output
    pub fn check(&self, output: &Output) -> bool {
        (self.check)(output)
    }

    /// Both predicates must hold
    pub fn and(self, other: Predicate) -> Predicate {
        let description = format!("{} && {}", self.description, other.description);
        Predicate::new(description, move |o| self.check(o) && other.check(o))
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.description)
    }
}

/// Output element type equals `element_type`
pub fn type_matches(element_type: ElementType) -> Predicate {
    Predicate::new(format!("type == {}", element_type), move |o| {
        o.element_type() == element_type
    })
}

/// Output element type is one of `element_types`
pub fn type_matches_any(element_types: &[ElementType]) -> Predicate {
    let allowed = element_types.to_vec();
    let names: Vec<&str> = allowed.iter().map(|t| t.as_str()).collect();
    Predicate::new(format!("type in [{}]", names.join(", ")), move |o| {
        allowed.contains(&o.element_type())
    })
}

/// Output has exactly `count` consumers
pub fn consumers_count(count: usize) -> Predicate {
    Predicate::new(format!("consumers == {}", count), move |o| {
        o.consumer_count() == count
    })
}

/// Output rank is known
pub fn has_static_rank() -> Predicate {
    Predicate::new("static rank", |o| o.shape().rank().is_some())
}

/// Output rank equals `rank`
pub fn rank_equals(rank: usize) -> Predicate {
    Predicate::new(format!("rank == {}", rank), move |o| {
        o.shape().rank() == Some(rank)
    })
}

/// Producing node carries attribute `name` with exactly `value`
pub fn attr_equals(name: impl Into<String>, value: impl Into<AttributeValue>) -> Predicate {
    let (name, value) = (name.into(), value.into());
    Predicate::new(format!("{} == {}", name, value), move |o| {
        o.node().attribute(&name).as_ref() == Some(&value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops;
    use crate::tensor::PartialShape;

    #[test]
    fn test_type_predicates() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let out = Output::from(&p);

        assert!(type_matches(ElementType::F32).check(&out));
        assert!(!type_matches(ElementType::I32).check(&out));
        assert!(type_matches_any(&[ElementType::I32, ElementType::F32]).check(&out));
        assert_eq!(
            type_matches_any(&[ElementType::I32, ElementType::I64]).description(),
            "type in [i32, i64]"
        );
    }

    #[test]
    fn test_shape_and_consumer_predicates() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let _relu = ops::relu(&p);
        let out = Output::from(&p);

        assert!(has_static_rank().check(&out));
        assert!(rank_equals(4).check(&out));
        assert!(!rank_equals(3).check(&out));
        assert!(consumers_count(1).check(&out));
        assert!(consumers_count(1).and(rank_equals(4)).check(&out));
        assert!(!consumers_count(1).and(rank_equals(2)).check(&out));

        let unranked = ops::parameter(ElementType::F32, PartialShape::dynamic());
        assert!(!has_static_rank().check(&Output::from(&unranked)));
    }

    #[test]
    fn test_attr_equals() {
        let p = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let nz = ops::non_zero(&p, ElementType::I64).unwrap();
        let out = Output::from(&nz);

        assert!(attr_equals(ops::ATTR_OUTPUT_TYPE, ElementType::I64).check(&out));
        assert!(!attr_equals(ops::ATTR_OUTPUT_TYPE, ElementType::I32).check(&out));
        assert!(!attr_equals("missing", 1i64).check(&out));
    }
}
