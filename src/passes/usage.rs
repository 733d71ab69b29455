//! Declaration-usage construction
//!
//! Connects every resolved reference in a translation unit back to the
//! declaration it names. The edge's access kind comes from the reference
//! node itself, through the graph insertion API, so the edge can never
//! contradict the reference's annotation.

use crate::graph::CpgGraph;
use crate::node::{NodeId, NodeKind};
use crate::Result;

use super::{Pass, PassDescriptor, PassGranularity, PassId};

pub const ID: PassId = PassId("usage");

pub fn descriptor() -> PassDescriptor {
    PassDescriptor {
        id: ID,
        granularity: PassGranularity::PerUnit,
        hard_depends_on: &[],
        soft_depends_on: &[],
    }
}

/// Builds the usage overlay of one translation unit.
pub struct UsagePass;

impl Pass for UsagePass {
    fn descriptor(&self) -> PassDescriptor {
        descriptor()
    }

    fn run(&mut self, graph: &mut CpgGraph, target: NodeId) -> Result<()> {
        for node in graph.subtree(target) {
            if graph.node(node).kind != NodeKind::Reference {
                continue;
            }
            if let Some(declaration) = graph.node(node).refers_to {
                graph.add_usage_edge(declaration, node);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AccessKind;
    use crate::passes::Pass;

    #[test]
    fn test_usages_carry_reference_access() {
        let mut graph = CpgGraph::new();
        let unit = graph.new_node(NodeKind::TranslationUnit);
        let var = graph.new_named_node(NodeKind::VariableDeclaration, "x");
        let read = graph.new_named_node(NodeKind::Reference, "x");
        let write = graph.new_named_node(NodeKind::Reference, "x");
        graph.node_mut(read).refers_to = Some(var);
        graph.node_mut(write).refers_to = Some(var);
        graph.node_mut(write).access = Some(AccessKind::Write);
        graph.add_ast_child(unit, var).unwrap();
        graph.add_ast_child(unit, read).unwrap();
        graph.add_ast_child(unit, write).unwrap();

        UsagePass.run(&mut graph, unit).unwrap();

        let usages: Vec<_> = graph.usages.outgoing(var).collect();
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].to, read);
        assert_eq!(usages[0].payload.access, AccessKind::Read);
        assert_eq!(usages[1].to, write);
        assert_eq!(usages[1].payload.access, AccessKind::Write);
    }

    #[test]
    fn test_unresolved_references_are_skipped() {
        let mut graph = CpgGraph::new();
        let unit = graph.new_node(NodeKind::TranslationUnit);
        let dangling = graph.new_named_node(NodeKind::Reference, "ghost");
        graph.add_ast_child(unit, dangling).unwrap();

        UsagePass.run(&mut graph, unit).unwrap();
        assert!(graph.usages.is_empty());
    }
}
