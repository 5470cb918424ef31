//! Ready-to-use transformations
//!
//! - **Fusion**: share duplicate producers ([`DuplicateFusion`], [`NonZeroFusion`])
//! - **Elimination**: remove value-preserving nodes ([`EliminateIdentity`],
//!   [`EliminateNopConvert`])
//!
//! # Overview
//!
//! Each transformer implements the [`Transformation`](crate::traits::Transformation)
//! trait and can be applied individually or combined through a [`PassManager`].
//!
//! # Example
//!
//! ```
//! use graph_optimizer::graph::{ops, Graph};
//! use graph_optimizer::tensor::{ElementType, PartialShape};
//! use graph_optimizer::traits::Transformation;
//! use graph_optimizer::transformers::{EliminateIdentity, NonZeroFusion};
//!
//! let input = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
//! let a = ops::relu(&ops::non_zero(&input, ElementType::I32).unwrap());
//! let b = ops::relu(&ops::identity(&ops::non_zero(&input, ElementType::I32).unwrap()));
//! let mut graph = Graph::from_outputs([&a, &b], vec![input]).unwrap();
//!
//! let removed = EliminateIdentity::new().transform(&mut graph).unwrap();
//! let fused = NonZeroFusion::new().transform(&mut graph).unwrap();
//!
//! assert_eq!(removed.nodes_eliminated, 1);
//! assert_eq!(fused.nodes_eliminated, 1);
//! ```
//!
//! # Using OptimizationPipeline
//!
//! [`OptimizationPipeline`] builds a [`PassManager`] from a few switches:
//!
//! ```
//! # use graph_optimizer::graph::{ops, Graph};
//! # use graph_optimizer::tensor::{ElementType, PartialShape};
//! use graph_optimizer::transformers::OptimizationPipeline;
//!
//! # let input = ops::parameter(ElementType::F32, PartialShape::dynamic());
//! # let relu = ops::relu(&ops::identity(&input));
//! # let mut graph = Graph::from_outputs([&relu], vec![input]).unwrap();
//! let report = OptimizationPipeline::default().run(&mut graph).unwrap();
//! assert!(report.changed);
//! ```

/// Common utilities
pub mod common;
/// Duplicate producer fusion
pub mod duplicate_fusion;
/// Elimination transformers
pub mod eliminate;

pub use common::{get_attr_type, is_lossless_widening};
pub use duplicate_fusion::{DuplicateFusion, FusionKey, NonZeroFusion};
pub use eliminate::{EliminateIdentity, EliminateNopConvert};

use crate::error::OptResult;
use crate::graph::Graph;
use crate::pass::{PassConfig, PassManager, RunReport, ValidationMode};

/// Optimization pipeline presets
#[derive(Debug, Clone)]
pub struct OptimizationPipeline {
    /// Enable fusion passes
    pub fuse: bool,
    /// Enable elimination passes
    pub eliminate: bool,
    /// Maximum number of sweeps; 1 disables iteration
    pub iterations: usize,
    /// Post-pass validation
    pub validation: ValidationMode,
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self {
            fuse: true,
            eliminate: true,
            iterations: 3,
            validation: ValidationMode::default(),
        }
    }
}

impl OptimizationPipeline {
    /// Create a new pipeline with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable only elimination passes
    pub fn eliminate_only() -> Self {
        Self {
            fuse: false,
            iterations: 1,
            ..Self::default()
        }
    }

    /// Enable only fusion passes
    pub fn fuse_only() -> Self {
        Self {
            eliminate: false,
            iterations: 1,
            ..Self::default()
        }
    }

    /// Set the validation mode
    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// Build the pass manager
    ///
    /// Elimination runs first so fusion sees producers with pass-through nodes
    /// already bypassed.
    pub fn build(&self) -> PassManager {
        let config = PassConfig::default()
            .with_iterate(self.iterations > 1)
            .with_max_iterations(self.iterations)
            .with_validation(self.validation);
        let mut manager = PassManager::new(config).with_name("OptimizationPipeline");

        if self.eliminate {
            manager
                .register_pass(EliminateIdentity::new())
                .register_pass(EliminateNopConvert::new());
        }
        if self.fuse {
            manager.register_pass(NonZeroFusion::new());
        }

        manager
    }

    /// Run the optimization pipeline
    pub fn run(&self, graph: &mut Graph) -> OptResult<RunReport> {
        self.build().run(graph)
    }
}
