//! Pass scheduler - dependency-aware ordering and execution
//!
//! Scheduling happens in two stages:
//! 1. **Ordering**: the transitive closure of hard dependencies is computed
//!    over the requested passes, a dependency graph is built, and Kahn's
//!    algorithm produces a topological order. Soft dependencies edge into
//!    the graph only when both ends were requested; remaining ties are
//!    broken by registration order, so the result is deterministic across
//!    runs. A hard-dependency cycle is a named failure - or, through the
//!    explicit fallback variant, the literal requested order with the
//!    ordering guarantee disabled.
//! 2. **Execution**: for each ordered pass the concrete targets are derived
//!    from the anchor node according to the pass's granularity, already
//!    executed (pass, target) pairs are skipped, and per-language pass
//!    substitution is applied right before instantiation.

use crate::frontend::LanguageRegistry;
use crate::graph::CpgGraph;
use crate::node::{NodeId, NodeKind};
use crate::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{PassGranularity, PassId, PassRegistry};

/// Whether a dependency edge is mandatory or advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepKind {
    Hard,
    Soft,
}

/// What a scheduler run did: every (pass, target) step in execution order,
/// and whether the dependency ordering guarantee held.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<(PassId, NodeId)>,
    pub ordered: bool,
}

/// Dependency-aware pass scheduler.
pub struct Scheduler<'a> {
    registry: &'a PassRegistry,
    languages: &'a LanguageRegistry,
    /// (pass, target) pairs that already ran; never re-executed
    executed: HashSet<(PassId, NodeId)>,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler over a pass registry and the known languages
    pub fn new(registry: &'a PassRegistry, languages: &'a LanguageRegistry) -> Self {
        Self {
            registry,
            languages,
            executed: HashSet::new(),
        }
    }

    /// The transitive closure of the requested passes under hard
    /// dependencies, in discovery order. Soft dependencies never pull
    /// passes in.
    pub fn closure(&self, requested: &[PassId]) -> Result<Vec<PassId>> {
        let mut out: Vec<PassId> = Vec::new();
        let mut worklist: Vec<PassId> = requested.to_vec();
        while let Some(id) = worklist.pop() {
            if out.contains(&id) {
                continue;
            }
            // Unknown passes fail here, before anything runs.
            let descriptor = self.registry.descriptor(id)?;
            out.push(id);
            for &dep in descriptor.hard_depends_on {
                worklist.push(dep);
            }
        }
        Ok(out)
    }

    /// Compute a deterministic execution order for the requested passes.
    ///
    /// Every hard dependency of a pass comes strictly before it; soft
    /// dependencies only break ties among otherwise-unordered passes. A
    /// hard-dependency cycle yields [`Error::DependencyCycle`] before any
    /// pass runs.
    pub fn order(&self, requested: &[PassId]) -> Result<Vec<PassId>> {
        let closure = self.closure(requested)?;

        let mut dep_graph: DiGraph<PassId, DepKind> = DiGraph::new();
        let mut indices: HashMap<PassId, NodeIndex> = HashMap::new();
        for &id in &closure {
            indices.insert(id, dep_graph.add_node(id));
        }
        for &id in &closure {
            let descriptor = self.registry.descriptor(id)?;
            for &dep in descriptor.hard_depends_on {
                dep_graph.add_edge(indices[&dep], indices[&id], DepKind::Hard);
            }
            for &dep in descriptor.soft_depends_on {
                // Advisory: only orders passes that are both scheduled.
                if let Some(&dep_index) = indices.get(&dep) {
                    dep_graph.add_edge(dep_index, indices[&id], DepKind::Soft);
                }
            }
        }

        let mut remaining: HashMap<NodeIndex, usize> = dep_graph
            .node_indices()
            .map(|index| {
                (
                    index,
                    dep_graph.neighbors_directed(index, Direction::Incoming).count(),
                )
            })
            .collect();

        let mut out = Vec::with_capacity(closure.len());
        while out.len() < closure.len() {
            // All currently satisfiable passes, stably keyed by
            // registration order so repeated runs agree.
            let mut ready: Vec<NodeIndex> = remaining
                .iter()
                .filter(|&(_, &deps)| deps == 0)
                .map(|(&index, _)| index)
                .collect();
            if ready.is_empty() {
                let mut stuck: Vec<&str> = remaining.keys().map(|&i| dep_graph[i].0).collect();
                stuck.sort_unstable();
                return Err(Error::DependencyCycle(stuck.join(", ")));
            }
            ready.sort_by_key(|&index| self.registry.registration_index(dep_graph[index]));

            for index in ready {
                out.push(dep_graph[index]);
                remaining.remove(&index);
                for successor in dep_graph.neighbors_directed(index, Direction::Outgoing) {
                    if let Some(deps) = remaining.get_mut(&successor) {
                        *deps = deps.saturating_sub(1);
                    }
                }
            }
        }
        debug!(order = ?out.iter().map(|p| p.0).collect::<Vec<_>>(), "pass order");
        Ok(out)
    }

    /// Like [`order`](Self::order), but a hard-dependency cycle degrades to
    /// the literal requested order with the ordering guarantee switched
    /// off. The degradation is logged; the flag makes it visible to the
    /// caller.
    pub fn order_with_fallback(&self, requested: &[PassId]) -> (Vec<PassId>, bool) {
        match self.order(requested) {
            Ok(order) => (order, true),
            Err(e) => {
                warn!("pass ordering failed ({e}); falling back to requested order");
                (requested.to_vec(), false)
            }
        }
    }

    /// Order and execute the requested passes against the graph, starting
    /// from `anchor` for target derivation.
    pub fn run(
        &mut self,
        graph: &mut CpgGraph,
        anchor: NodeId,
        requested: &[PassId],
    ) -> Result<RunReport> {
        let order = self.order(requested)?;
        let mut report = self.run_sequence(graph, anchor, &order)?;
        report.ordered = true;
        Ok(report)
    }

    /// Execute a pre-computed pass sequence. Used by [`run`](Self::run) and
    /// by callers that opted into the explicit ordering fallback.
    pub fn run_sequence(
        &mut self,
        graph: &mut CpgGraph,
        anchor: NodeId,
        sequence: &[PassId],
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        for &id in sequence {
            let descriptor = self.registry.descriptor(id)?;
            let targets = self.derive_targets(graph, anchor, descriptor.granularity);

            for target in targets {
                if self.executed.contains(&(id, target)) {
                    continue;
                }
                // Per-language substitution happens at execution time;
                // ordering above kept referring to the original pass.
                let actual = self.replacement_for(graph, id, target);
                let mut pass = self.registry.create(actual)?;
                debug!(pass = actual.0, target = %target, "running pass");
                pass.run(graph, target)?;
                pass.cleanup();
                self.executed.insert((id, target));
                report.steps.push((actual, target));
            }
        }
        Ok(report)
    }

    fn replacement_for(&self, graph: &CpgGraph, id: PassId, target: NodeId) -> PassId {
        let Some(language) = graph.node(target).language else {
            return id;
        };
        let Some(language) = self.languages.get(language) else {
            return id;
        };
        match language.replacement_for(id) {
            Some(replacement) if self.registry.contains(replacement) => replacement,
            Some(replacement) => {
                warn!(
                    "language {} replaces pass {id} with unregistered {replacement}; keeping {id}",
                    language.name()
                );
                id
            }
            None => id,
        }
    }

    /// Derive the concrete targets for a granularity from an anchor node.
    fn derive_targets(
        &self,
        graph: &CpgGraph,
        anchor: NodeId,
        granularity: PassGranularity,
    ) -> Vec<NodeId> {
        match granularity {
            // The whole-graph anchor is the arena origin, so the executed
            // set recognizes the repetition no matter which anchor a later
            // request starts from.
            PassGranularity::WholeGraph => {
                if graph.is_empty() {
                    Vec::new()
                } else {
                    vec![NodeId(0)]
                }
            }
            PassGranularity::PerComponent => self.kind_targets(graph, anchor, NodeKind::Component),
            PassGranularity::PerUnit => self.kind_targets(graph, anchor, NodeKind::TranslationUnit),
            PassGranularity::PerEogStarter => graph.eog_starter_targets(anchor),
        }
    }

    /// Anchor-or-ancestor of the wanted kind if one exists, else every node
    /// of that kind in the graph.
    fn kind_targets(&self, graph: &CpgGraph, anchor: NodeId, kind: NodeKind) -> Vec<NodeId> {
        if graph.node(anchor).kind == kind {
            return vec![anchor];
        }
        if let Some(ancestor) = graph
            .ancestors(anchor)
            .into_iter()
            .find(|&id| graph.node(id).kind == kind)
        {
            return vec![ancestor];
        }
        graph.nodes_of_kind(kind).to_vec()
    }
}
