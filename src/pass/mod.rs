//! Pass manager module
//!
//! [`PassManager`] runs registered [`Transformation`](crate::traits::Transformation)s
//! in declaration order:
//!
//! - once, or to a fixed point bounded by [`PassConfig::max_iterations`]
//! - with per-entry enable flags and applicability predicates
//! - validating the graph after every entry that ran ([`ValidationMode`])
//!
//! Its lifecycle is `Idle -> Running { pass, of } -> Converged | IterationCapReached -> Done`,
//! observable through [`PassManager::state`].

pub mod manager;

pub use manager::{PassConfig, PassEntry, PassManager, PassManagerState, RunReport, ValidationMode};
