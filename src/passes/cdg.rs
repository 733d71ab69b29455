//! Control-dependence construction
//!
//! Derives the CDG overlay for one EOG starter region from the labeled
//! branches of the evaluation order: a node is control-dependent on a
//! predicate, with outcome set B, when it is reachable from the arms in B
//! but not from every arm of that predicate. Nodes reachable regardless of
//! the outcome depend on nothing.

use crate::edge::ControlDependence;
use crate::graph::CpgGraph;
use crate::node::NodeId;
use crate::Result;
use indexmap::IndexMap;
use std::collections::HashSet;

use super::{Pass, PassDescriptor, PassGranularity, PassId};

pub const ID: PassId = PassId("control-dependence");

pub fn descriptor() -> PassDescriptor {
    PassDescriptor {
        id: ID,
        granularity: PassGranularity::PerEogStarter,
        hard_depends_on: &[super::eog::ID],
        soft_depends_on: &[],
    }
}

/// Builds the control-dependence overlay of one EOG starter region.
pub struct ControlDependencePass;

impl Pass for ControlDependencePass {
    fn descriptor(&self) -> PassDescriptor {
        descriptor()
    }

    fn run(&mut self, graph: &mut CpgGraph, target: NodeId) -> Result<()> {
        // Every branching node reachable from the starter, in EOG order.
        let region = reachable(graph, target);
        let mut dependences: IndexMap<(NodeId, NodeId), ControlDependence> = IndexMap::new();

        for &predicate in &region {
            let arms: Vec<(bool, NodeId)> = graph
                .eog
                .outgoing(predicate)
                .filter_map(|e| e.payload.branch.map(|b| (b, e.to)))
                .collect();
            if arms.len() < 2 {
                continue;
            }

            // Per-outcome reachability, and the nodes every outcome reaches.
            let mut per_outcome: Vec<(bool, HashSet<NodeId>)> = Vec::new();
            for &(branch, arm) in &arms {
                let set: HashSet<NodeId> = reachable(graph, arm).into_iter().collect();
                match per_outcome.iter_mut().find(|(b, _)| *b == branch) {
                    Some((_, existing)) => existing.extend(set),
                    None => per_outcome.push((branch, set)),
                }
            }
            let common: HashSet<NodeId> = per_outcome
                .iter()
                .skip(1)
                .fold(per_outcome[0].1.clone(), |acc, (_, set)| {
                    acc.intersection(set).copied().collect()
                });

            for &(branch, arm) in &arms {
                for node in reachable(graph, arm) {
                    if common.contains(&node) || node == predicate {
                        continue;
                    }
                    dependences
                        .entry((predicate, node))
                        .or_default()
                        .add_branch(branch);
                }
            }
        }

        for ((predicate, node), payload) in dependences {
            graph.add_cdg_edge(predicate, node, payload);
        }
        Ok(())
    }
}

/// Nodes reachable from `start` (inclusive) along evaluation-order edges,
/// in first-visit order.
fn reachable(graph: &CpgGraph, start: NodeId) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        order.push(node);
        for successor in graph.eog.successors(node) {
            stack.push(successor);
        }
    }
    order
}
