//! Error types for graph-optimizer
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for graph construction and rewriting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Programmer error inside a component (misused accessor, broken contract)
    #[error("[{component}] Internal error: {message}")]
    Internal {
        /// Component that detected the misuse
        component: String,
        /// Description of the misuse
        message: String,
    },

    /// A pattern label was queried that the pattern never declared
    #[error("Pattern label `{0}` is not declared by the pattern")]
    UndeclaredLabel(String),

    /// Producer name could not be resolved while building a graph
    #[error("Unresolved input reference: `{node}` consumes unknown producer `{producer}`")]
    UnresolvedReference {
        /// Consumer that holds the reference
        node: String,
        /// Producer name that failed to resolve
        producer: String,
    },

    /// Role-restricted accessor used on the wrong argument kind
    #[error("Accessor `{accessor}` is not supported for argument `{arg}`")]
    RoleMismatch {
        /// Argument name
        arg: String,
        /// Accessor that was called
        accessor: String,
    },

    /// Rewrite would introduce a cycle
    #[error("Rewrite refused: cycle through node `{node}`")]
    CycleDetected {
        /// Node closing the cycle
        node: String,
    },

    /// Rewrite would leave an edge pointing at a non-existent output
    #[error("Rewrite refused: dangling reference to port {port} of `{node}`")]
    DanglingReference {
        /// Node that is referenced
        node: String,
        /// Missing output port
        port: usize,
    },

    /// Edge endpoints disagree on element type or shape
    #[error("Type mismatch at `{node}` port {port}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Node that owns the edge
        node: String,
        /// Port of the edge
        port: usize,
        /// Expected type/shape
        expected: String,
        /// Actual type/shape
        actual: String,
    },

    /// Post-pass validation failed
    #[error("Validation failed after pass `{pass}` at node `{node}`: {reason}")]
    ValidationFailed {
        /// Pass that ran last
        pass: String,
        /// Offending node
        node: String,
        /// Violation description
        reason: String,
    },

    /// A pass in a pipeline failed
    #[error("Pass `{pass}` failed: {source}")]
    PassFailed {
        /// Innermost pass that raised the error
        pass: String,
        /// Error raised by the pass
        #[source]
        source: Box<TransformError>,
    },

    /// Invalid node configuration
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Invalid graph
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),
}

impl TransformError {
    /// Shorthand for [`TransformError::Internal`]
    pub fn internal(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Attach the name of the pass that raised the error.
    ///
    /// Errors that already name a pass are returned as they are, so nested
    /// pipelines report the innermost failing pass.
    pub fn in_pass(self, pass: impl Into<String>) -> Self {
        match self {
            Self::PassFailed { .. } | Self::ValidationFailed { .. } => self,
            other => Self::PassFailed {
                pass: pass.into(),
                source: Box::new(other),
            },
        }
    }

    /// Pass named by the error, if any
    pub fn pass(&self) -> Option<&str> {
        match self {
            Self::PassFailed { pass, .. } | Self::ValidationFailed { pass, .. } => Some(pass),
            _ => None,
        }
    }

    /// Whether the error only concerns one rewrite site.
    ///
    /// These are raised before any mutation happens, so a Transformation may skip the
    /// site and keep going.
    pub fn is_site_local(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected { .. } | Self::DanglingReference { .. } | Self::TypeMismatch { .. }
        )
    }
}

/// Result type alias for graph operations
pub type OptResult<T> = Result<T, TransformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransformError::internal("ArgDefDecoder", "Incorrect use of decoder");
        assert!(err.to_string().contains("ArgDefDecoder"));
        assert!(err.to_string().contains("Incorrect use"));
    }

    #[test]
    fn test_site_local_classification() {
        let cycle = TransformError::CycleDetected {
            node: "relu".to_string(),
        };
        assert!(cycle.is_site_local());

        let validation = TransformError::ValidationFailed {
            pass: "NonZeroFusion".to_string(),
            node: "relu".to_string(),
            reason: "cycle".to_string(),
        };
        assert!(!validation.is_site_local());
        assert!(validation.to_string().contains("NonZeroFusion"));
    }

    #[test]
    fn test_in_pass_wraps_once() {
        let err = TransformError::internal("x", "boom").in_pass("Inner");
        assert_eq!(err.pass(), Some("Inner"));
        assert!(!err.is_site_local());
        assert!(err.to_string().contains("Pass `Inner` failed"));
        assert!(err.to_string().contains("boom"));

        let rewrapped = err.clone().in_pass("Outer");
        assert_eq!(rewrapped, err);
        assert_eq!(TransformError::InvalidNode("n".into()).pass(), None);
    }
}
