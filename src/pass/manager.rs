//! Pass manager
//!
//! Runs an ordered list of transformations over one graph, optionally until nothing
//! changes, and validates the graph after every entry that ran. Errors leaving the
//! manager name the pass that raised them.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{OptResult, TransformError};
use crate::graph::Graph;
use crate::traits::Transformation;
use crate::transform::TransformResult;

/// What happens when the graph fails validation after a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Do not validate
    Off,
    /// Log violations and keep going
    Lenient,
    /// Fail the run with [`TransformError::ValidationFailed`]
    Strict,
}

impl Default for ValidationMode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ValidationMode::Strict
        } else {
            ValidationMode::Off
        }
    }
}

/// Pass manager configuration
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Re-run the whole list until a sweep changes nothing
    pub iterate: bool,
    /// Upper bound on sweeps when iterating
    pub max_iterations: usize,
    /// Post-pass validation
    pub validation: ValidationMode,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            iterate: false,
            max_iterations: 10,
            validation: ValidationMode::default(),
        }
    }
}

impl PassConfig {
    /// Set `iterate`
    pub fn with_iterate(mut self, iterate: bool) -> Self {
        self.iterate = iterate;
        self
    }

    /// Set `max_iterations` (at least one sweep always runs)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the validation mode
    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    fn sweep_cap(&self) -> usize {
        if self.iterate {
            self.max_iterations.max(1)
        } else {
            1
        }
    }
}

/// Lifecycle of a [`PassManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassManagerState {
    /// Nothing has run yet
    Idle,
    /// Entry `pass` (0-based) of `of` is running
    Running {
        /// Index of the running entry
        pass: usize,
        /// Number of registered entries
        of: usize,
    },
    /// The last sweep changed nothing
    Converged,
    /// The sweep cap was hit while the graph was still changing
    IterationCapReached,
    /// The run is over; the report carries the terminal state
    Done,
}

/// Summary of one [`PassManager::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// [`PassManagerState::Converged`] or [`PassManagerState::IterationCapReached`]
    pub outcome: PassManagerState,
    /// Number of sweeps over the entry list
    pub iterations: usize,
    /// Whether any entry changed the graph
    pub changed: bool,
    /// Statistics merged over every entry and sweep
    pub result: TransformResult,
}

type Applicability = Box<dyn Fn(&Graph) -> bool + Send>;

/// A registered transformation
pub struct PassEntry {
    transformation: Box<dyn Transformation>,
    enabled: bool,
    predicate: Option<Applicability>,
}

impl PassEntry {
    /// Name of the wrapped transformation
    pub fn name(&self) -> &str {
        self.transformation.name()
    }

    /// Whether the entry runs
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn applies_to(&self, graph: &Graph) -> bool {
        self.enabled
            && self.predicate.as_ref().map_or(true, |p| p(graph))
            && self.transformation.is_applicable(graph)
    }
}

impl fmt::Debug for PassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassEntry")
            .field("name", &self.name())
            .field("enabled", &self.enabled)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Ordered pipeline of transformations
///
/// Each manager is built explicitly per graph or compilation unit; there is no global
/// registry. A `PassManager` is itself a [`Transformation`], so pipelines nest.
///
/// # Example
///
/// ```
/// use graph_optimizer::graph::{ops, Graph};
/// use graph_optimizer::pass::{PassConfig, PassManager};
/// use graph_optimizer::tensor::{ElementType, PartialShape};
/// use graph_optimizer::transformers::{EliminateIdentity, NonZeroFusion};
///
/// let input = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
/// let a = ops::relu(&ops::non_zero(&input, ElementType::I64).unwrap());
/// let b = ops::relu(&ops::identity(&ops::non_zero(&input, ElementType::I64).unwrap()));
/// let mut graph = Graph::from_outputs([&a, &b], vec![input]).unwrap();
///
/// let mut manager = PassManager::new(PassConfig::default().with_iterate(true));
/// manager.register_pass(EliminateIdentity::new());
/// manager.register_pass(NonZeroFusion::new());
///
/// assert!(manager.run_on_model(&mut graph).unwrap());
/// assert_eq!(graph.find_nodes_by_op("NonZero").len(), 1);
/// ```
pub struct PassManager {
    name: String,
    entries: Vec<PassEntry>,
    config: PassConfig,
    state: PassManagerState,
}

impl PassManager {
    /// Create an empty pass manager
    pub fn new(config: PassConfig) -> Self {
        Self {
            name: "PassManager".to_string(),
            entries: Vec::new(),
            config,
            state: PassManagerState::Idle,
        }
    }

    /// Name used in logs and when nested
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Append a transformation (or a nested pass manager)
    pub fn register_pass<T>(&mut self, transformation: T) -> &mut Self
    where
        T: Transformation + 'static,
    {
        self.entries.push(PassEntry {
            transformation: Box::new(transformation),
            enabled: true,
            predicate: None,
        });
        self
    }

    /// Append a transformation that only runs while `predicate` holds
    pub fn register_pass_if<T, P>(&mut self, transformation: T, predicate: P) -> &mut Self
    where
        T: Transformation + 'static,
        P: Fn(&Graph) -> bool + Send + 'static,
    {
        self.entries.push(PassEntry {
            transformation: Box::new(transformation),
            enabled: true,
            predicate: Some(Box::new(predicate)),
        });
        self
    }

    /// Enable or disable every entry named `name`; returns whether any was found
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        for entry in self.entries.iter_mut().filter(|e| e.name() == name) {
            entry.enabled = enabled;
            found = true;
        }
        found
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Registered entries, in run order
    pub fn entries(&self) -> &[PassEntry] {
        &self.entries
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current lifecycle state
    pub fn state(&self) -> &PassManagerState {
        &self.state
    }

    /// Configuration
    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run the pipeline and report whether the graph changed
    pub fn run_on_model(&mut self, graph: &mut Graph) -> OptResult<bool> {
        Ok(self.run(graph)?.changed)
    }

    /// Run the pipeline
    ///
    /// Sweeps the entries in order, once or (when iterating) until a sweep changes
    /// nothing or the sweep cap is hit. An error from an entry ends the run as
    /// [`TransformError::PassFailed`]; a validation failure in strict mode ends it
    /// as [`TransformError::ValidationFailed`].
    pub fn run(&mut self, graph: &mut Graph) -> OptResult<RunReport> {
        let outcome = self.sweep(graph);
        self.state = PassManagerState::Done;
        outcome
    }

    fn sweep(&mut self, graph: &mut Graph) -> OptResult<RunReport> {
        let cap = self.config.sweep_cap();
        let of = self.entries.len();
        let mut total = TransformResult::new();
        let mut changed = false;
        let mut iterations = 0;
        let mut dirty = false;

        while iterations < cap {
            iterations += 1;
            dirty = false;

            for pass in 0..of {
                self.state = PassManagerState::Running { pass, of };
                let entry = &mut self.entries[pass];
                if !entry.applies_to(graph) {
                    continue;
                }

                let name = entry.name().to_string();
                let result = entry.transformation.transform(graph).map_err(|e| {
                    warn!(pipeline = %self.name, pass = %name, error = %e, "pass failed");
                    e.in_pass(name.as_str())
                })?;

                let pass_changed = result.changed();
                debug!(
                    pipeline = %self.name,
                    pass = %name,
                    iteration = iterations,
                    changed = pass_changed,
                    "pass finished"
                );
                total.merge(result);
                dirty |= pass_changed;

                // A pass may mutate the graph without reporting it
                check_graph(graph, &name, self.config.validation)?;
            }

            changed |= dirty;
            if !dirty {
                break;
            }
        }

        let outcome = if dirty {
            PassManagerState::IterationCapReached
        } else {
            PassManagerState::Converged
        };
        self.state = outcome.clone();
        debug!(
            pipeline = %self.name,
            iterations,
            changed,
            outcome = ?outcome,
            "pipeline finished"
        );

        Ok(RunReport {
            outcome,
            iterations,
            changed,
            result: total,
        })
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new(PassConfig::default())
    }
}

impl fmt::Debug for PassManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassManager")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

impl Transformation for PassManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult> {
        Ok(self.run(graph)?.result)
    }
}

/// Validate `graph` after `pass` ran
fn check_graph(graph: &Graph, pass: &str, mode: ValidationMode) -> OptResult<()> {
    match mode {
        ValidationMode::Off => Ok(()),
        ValidationMode::Lenient => {
            for violation in graph.violations() {
                warn!(pass, node = %violation.node, error = %violation.error, "graph invalid after pass");
            }
            Ok(())
        }
        ValidationMode::Strict => match graph.violations().into_iter().next() {
            Some(violation) => Err(TransformError::ValidationFailed {
                pass: pass.to_string(),
                node: violation.node,
                reason: violation.error.to_string(),
            }),
            None => Ok(()),
        },
    }
}
