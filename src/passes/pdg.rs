//! Program-dependence construction
//!
//! Unifies control and data dependences for one EOG starter region under
//! the PDG overlay. Nothing is synthesized: every PDG edge is the
//! promotion of an edge that already exists in the CDG or DFG, so the
//! subset law PDG ⊆ CDG ∪ DFG holds by construction.

use crate::edge::DependenceType;
use crate::graph::CpgGraph;
use crate::node::NodeId;
use crate::Result;

use super::{Pass, PassDescriptor, PassGranularity, PassId};

pub const ID: PassId = PassId("program-dependence");

pub fn descriptor() -> PassDescriptor {
    PassDescriptor {
        id: ID,
        granularity: PassGranularity::PerEogStarter,
        hard_depends_on: &[super::cdg::ID, super::dfg::ID],
        soft_depends_on: &[],
    }
}

/// Promotes the CDG and DFG edges of one starter region into the PDG.
pub struct ProgramDependencePass;

impl Pass for ProgramDependencePass {
    fn descriptor(&self) -> PassDescriptor {
        descriptor()
    }

    fn run(&mut self, graph: &mut CpgGraph, target: NodeId) -> Result<()> {
        for node in graph.subtree(target) {
            let control: Vec<NodeId> = graph.cdg.successors(node).collect();
            for to in control {
                graph.promote_to_pdg(node, to, DependenceType::Control)?;
            }
            let data: Vec<NodeId> = graph.dfg.successors(node).collect();
            for to in data {
                graph.promote_to_pdg(node, to, DependenceType::Data)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{ControlDependence, Dataflow};
    use crate::node::NodeKind;
    use crate::passes::Pass;

    #[test]
    fn test_pdg_is_union_of_cdg_and_dfg() {
        let mut graph = CpgGraph::new();
        let func = graph.new_named_node(NodeKind::FunctionDeclaration, "f");
        let if_stmt = graph.new_node(NodeKind::IfStatement);
        let var = graph.new_named_node(NodeKind::VariableDeclaration, "x");
        let reference = graph.new_named_node(NodeKind::Reference, "x");
        graph.add_ast_child(func, if_stmt).unwrap();
        graph.add_ast_child(func, var).unwrap();
        graph.add_ast_child(func, reference).unwrap();

        graph.add_cdg_edge(if_stmt, var, ControlDependence::on(true));
        graph.add_dfg_edge(var, reference, Dataflow::full());

        ProgramDependencePass.run(&mut graph, func).unwrap();

        assert_eq!(graph.pdg.len(), 2);
        // Every PDG edge has its donor with identical endpoints.
        for edge in graph.pdg.iter() {
            let donor = match edge.payload.dependence {
                DependenceType::Control => graph.cdg.outgoing(edge.from).any(|e| e.to == edge.to),
                DependenceType::Data => graph.dfg.outgoing(edge.from).any(|e| e.to == edge.to),
            };
            assert!(donor, "PDG edge without donor: {edge}");
        }
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let mut graph = CpgGraph::new();
        let func = graph.new_named_node(NodeKind::FunctionDeclaration, "f");
        let a = graph.new_node(NodeKind::Literal);
        let b = graph.new_node(NodeKind::Reference);
        graph.add_ast_child(func, a).unwrap();
        graph.add_ast_child(func, b).unwrap();
        graph.add_dfg_edge(a, b, Dataflow::full());

        ProgramDependencePass.run(&mut graph, func).unwrap();
        ProgramDependencePass.run(&mut graph, func).unwrap();
        assert_eq!(graph.pdg.len(), 1);
    }
}
