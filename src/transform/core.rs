//! Core transformation loop
//!
//! Implements the pattern-driven rewrite loop: find every match, then visit the
//! sites in topological order and let a callback rewrite each one. Sites made stale
//! by an earlier rewrite in the same sweep are skipped, and rewrites refused by the
//! graph's all-or-nothing checks are logged and skipped rather than aborting the run.

use tracing::{debug, trace, warn};

use crate::error::OptResult;
use crate::graph::Graph;
use crate::pattern::{matcher, Match, Pattern};
use crate::traits::Transformation;

/// Statistics from a transform run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransformResult {
    /// Number of patterns matched
    pub patterns_matched: usize,
    /// Number of transformations applied
    pub transforms_applied: usize,
    /// Number of nodes eliminated
    pub nodes_eliminated: usize,
    /// Number of match sites skipped (stale or refused rewrites)
    pub sites_skipped: usize,
    /// Names of transformed nodes
    pub transformed_nodes: Vec<String>,
}

impl TransformResult {
    /// Create empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful transformation
    pub fn record(&mut self, node_name: &str) {
        self.transforms_applied += 1;
        self.transformed_nodes.push(node_name.to_string());
    }

    /// Record elimination
    pub fn record_elimination(&mut self, node_name: &str) {
        self.nodes_eliminated += 1;
        self.transformed_nodes.push(node_name.to_string());
    }

    /// Record a skipped site
    pub fn record_skip(&mut self) {
        self.sites_skipped += 1;
    }

    /// Whether the graph was modified
    pub fn changed(&self) -> bool {
        self.transforms_applied > 0 || self.nodes_eliminated > 0
    }

    /// Merge with another result
    pub fn merge(&mut self, other: TransformResult) {
        self.patterns_matched += other.patterns_matched;
        self.transforms_applied += other.transforms_applied;
        self.nodes_eliminated += other.nodes_eliminated;
        self.sites_skipped += other.sites_skipped;
        self.transformed_nodes.extend(other.transformed_nodes);
    }
}

/// Matcher pass configuration
#[derive(Debug, Clone, Default)]
pub struct MatcherPassConfig {
    /// Absorb every callback error as a skipped site, not only site-local ones
    pub continue_on_error: bool,
}

impl MatcherPassConfig {
    /// Set `continue_on_error`
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Whether every node bound by the match is still wired into the graph
fn is_live(graph: &Graph, m: &Match) -> bool {
    graph.is_attached(m.root_node()) && m.bindings().all(|(_, o)| graph.is_attached(o.node()))
}

/// Apply a rewrite callback to every match of `pattern`.
///
/// The callback returns `Ok(true)` when it rewrote the site and `Ok(false)` when it
/// decided not to. Site-local errors (a refused `replace_node`) are logged and the
/// site is skipped; other errors propagate unless `continue_on_error` is set.
pub fn apply_pattern<F>(
    graph: &mut Graph,
    pattern: &Pattern,
    config: &MatcherPassConfig,
    mut transform_fn: F,
) -> OptResult<TransformResult>
where
    F: FnMut(&mut Graph, &Match) -> OptResult<bool>,
{
    let mut result = TransformResult::new();

    // Collect matches first; the graph is only read while matching
    let matches = matcher(graph).find_all_matches(pattern);
    result.patterns_matched = matches.len();

    for m in matches {
        let root_name = m.root_node().friendly_name();

        // Skip sites an earlier rewrite already consumed
        if !is_live(graph, &m) {
            trace!(node = %root_name, "skipping stale match site");
            result.record_skip();
            continue;
        }

        match transform_fn(graph, &m) {
            Ok(true) => result.record(&root_name),
            Ok(false) => {
                // Transform decided not to apply
            }
            Err(e) if e.is_site_local() || config.continue_on_error => {
                warn!(node = %root_name, error = %e, "rewrite refused, site skipped");
                result.record_skip();
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}

/// Callback type of a [`MatcherPass`]
pub type MatcherCallback = Box<dyn FnMut(&mut Graph, &Match) -> OptResult<bool> + Send>;

/// A transformation built from a pattern and a per-site rewrite callback
pub struct MatcherPass {
    name: String,
    pattern: Pattern,
    callback: MatcherCallback,
    config: MatcherPassConfig,
}

impl MatcherPass {
    /// Create a matcher pass
    pub fn new<F>(name: impl Into<String>, pattern: Pattern, callback: F) -> Self
    where
        F: FnMut(&mut Graph, &Match) -> OptResult<bool> + Send + 'static,
    {
        Self {
            name: name.into(),
            pattern,
            callback: Box::new(callback),
            config: MatcherPassConfig::default(),
        }
    }

    /// Configure the pass
    pub fn with_config(mut self, config: MatcherPassConfig) -> Self {
        self.config = config;
        self
    }

    /// The pattern this pass matches
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

impl std::fmt::Debug for MatcherPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherPass")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("config", &self.config)
            .finish()
    }
}

impl Transformation for MatcherPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, graph: &mut Graph) -> OptResult<TransformResult> {
        let Self {
            name,
            pattern,
            callback,
            config,
        } = self;

        let result = apply_pattern(graph, pattern, config, |g, m| callback(g, m))?;
        debug!(
            pass = %name,
            matched = result.patterns_matched,
            applied = result.transforms_applied,
            skipped = result.sites_skipped,
            "matcher pass finished"
        );
        Ok(result)
    }
}
