//! Data-flow construction
//!
//! Builds the intraprocedural DFG overlay for one translation unit from
//! the AST and the resolved references:
//! - declaration → reading reference, writing reference → declaration,
//! - initializer → declared variable/field,
//! - operands → binary operator, value → return,
//! - argument *i* → call, at `Indexed(i)` granularity,
//! - member access ↔ base, at `Field` granularity for the accessed field.
//!
//! Interprocedural, call-site-tagged flows are added later by call
//! resolution; this pass stays context-insensitive.

use crate::edge::{Dataflow, Granularity};
use crate::graph::CpgGraph;
use crate::node::{AccessKind, NodeId, NodeKind};
use crate::Result;

use super::{Pass, PassDescriptor, PassGranularity, PassId};

pub const ID: PassId = PassId("dataflow");

pub fn descriptor() -> PassDescriptor {
    PassDescriptor {
        id: ID,
        granularity: PassGranularity::PerUnit,
        hard_depends_on: &[],
        soft_depends_on: &[super::eog::ID],
    }
}

/// Builds the context-insensitive data-flow overlay of one translation
/// unit.
pub struct DataflowPass;

impl Pass for DataflowPass {
    fn descriptor(&self) -> PassDescriptor {
        descriptor()
    }

    fn run(&mut self, graph: &mut CpgGraph, target: NodeId) -> Result<()> {
        for node in graph.subtree(target) {
            match graph.node(node).kind {
                NodeKind::Reference => handle_reference(graph, node),
                NodeKind::VariableDeclaration | NodeKind::FieldDeclaration => {
                    handle_declaration(graph, node)
                }
                NodeKind::BinaryOperator => handle_operator(graph, node),
                NodeKind::ReturnStatement => handle_return(graph, node),
                NodeKind::CallExpression => handle_call(graph, node),
                NodeKind::MemberAccessExpression => handle_member_access(graph, node),
                _ => {}
            }
        }
        Ok(())
    }
}

fn handle_reference(graph: &mut CpgGraph, reference: NodeId) {
    let Some(declaration) = graph.node(reference).refers_to else {
        return;
    };
    match graph.node(reference).access.unwrap_or(AccessKind::Read) {
        AccessKind::Read => graph.add_dfg_edge(declaration, reference, Dataflow::full()),
        AccessKind::Write => graph.add_dfg_edge(reference, declaration, Dataflow::full()),
        AccessKind::ReadWrite => {
            graph.add_dfg_edge(declaration, reference, Dataflow::full());
            graph.add_dfg_edge(reference, declaration, Dataflow::full());
        }
    }
}

/// The initializer value flows into the declaration.
fn handle_declaration(graph: &mut CpgGraph, declaration: NodeId) {
    for child in graph.ast_children(declaration) {
        if is_expression(graph.node(child).kind) {
            graph.add_dfg_edge(child, declaration, Dataflow::full());
        }
    }
}

fn handle_operator(graph: &mut CpgGraph, operator: NodeId) {
    for child in graph.ast_children(operator) {
        if is_expression(graph.node(child).kind) {
            graph.add_dfg_edge(child, operator, Dataflow::full());
        }
    }
}

fn handle_return(graph: &mut CpgGraph, ret: NodeId) {
    for child in graph.ast_children(ret) {
        if is_expression(graph.node(child).kind) {
            graph.add_dfg_edge(child, ret, Dataflow::full());
        }
    }
}

/// Each argument flows into the call, keyed by its position.
fn handle_call(graph: &mut CpgGraph, call: NodeId) {
    let arguments: Vec<NodeId> = graph
        .ast_children(call)
        .into_iter()
        .filter(|&c| is_expression(graph.node(c).kind))
        .collect();
    for (index, argument) in arguments.into_iter().enumerate() {
        graph.add_dfg_edge(
            argument,
            call,
            Dataflow::partial(Granularity::Indexed(index as u64)),
        );
    }
}

/// Partial flow between a member access and its base: reading `b.f` flows
/// the field out of the base, writing flows it back in. Either direction
/// carries `Field` granularity naming the accessed field, never `Full`.
fn handle_member_access(graph: &mut CpgGraph, member: NodeId) {
    let Some(base) = graph
        .ast_children(member)
        .into_iter()
        .find(|&c| is_expression(graph.node(c).kind))
    else {
        return;
    };
    let granularity = match graph.node(member).refers_to {
        Some(field) => Granularity::Field(field),
        None => Granularity::Full,
    };
    match graph.node(member).access.unwrap_or(AccessKind::Read) {
        AccessKind::Read => graph.add_dfg_edge(base, member, Dataflow::partial(granularity)),
        AccessKind::Write => graph.add_dfg_edge(member, base, Dataflow::partial(granularity)),
        AccessKind::ReadWrite => {
            graph.add_dfg_edge(base, member, Dataflow::partial(granularity.clone()));
            graph.add_dfg_edge(member, base, Dataflow::partial(granularity));
        }
    }
}

fn is_expression(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::CallExpression
            | NodeKind::MemberAccessExpression
            | NodeKind::Reference
            | NodeKind::Literal
            | NodeKind::BinaryOperator
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(graph: &mut CpgGraph) -> NodeId {
        graph.new_node(NodeKind::TranslationUnit)
    }

    #[test]
    fn test_reference_flows() {
        let mut graph = CpgGraph::new();
        let u = unit(&mut graph);
        let var = graph.new_named_node(NodeKind::VariableDeclaration, "x");
        let read = graph.new_named_node(NodeKind::Reference, "x");
        let write = graph.new_named_node(NodeKind::Reference, "x");
        graph.node_mut(read).refers_to = Some(var);
        graph.node_mut(write).refers_to = Some(var);
        graph.node_mut(write).access = Some(AccessKind::Write);
        graph.add_ast_child(u, var).unwrap();
        graph.add_ast_child(u, read).unwrap();
        graph.add_ast_child(u, write).unwrap();

        DataflowPass.run(&mut graph, u).unwrap();

        assert!(graph.dfg.outgoing(var).any(|e| e.to == read));
        assert!(graph.dfg.outgoing(write).any(|e| e.to == var));
    }

    #[test]
    fn test_initializer_flows_into_declaration() {
        let mut graph = CpgGraph::new();
        let u = unit(&mut graph);
        let var = graph.new_named_node(NodeKind::VariableDeclaration, "x");
        let init = graph.new_named_node(NodeKind::Literal, "42");
        graph.add_ast_child(u, var).unwrap();
        graph.add_ast_child(var, init).unwrap();

        DataflowPass.run(&mut graph, u).unwrap();

        let edge = graph.dfg.incoming(var).next().unwrap();
        assert_eq!(edge.from, init);
        assert_eq!(edge.payload.granularity, Granularity::Full);
    }

    #[test]
    fn test_call_arguments_indexed() {
        let mut graph = CpgGraph::new();
        let u = unit(&mut graph);
        let call = graph.new_named_node(NodeKind::CallExpression, "f");
        let first = graph.new_named_node(NodeKind::Literal, "1");
        let second = graph.new_named_node(NodeKind::Literal, "2");
        graph.add_ast_child(u, call).unwrap();
        graph.add_ast_child(call, first).unwrap();
        graph.add_ast_child(call, second).unwrap();

        DataflowPass.run(&mut graph, u).unwrap();

        let incoming: Vec<_> = graph.dfg.incoming(call).collect();
        assert_eq!(incoming.len(), 2);
        assert_eq!(incoming[0].payload.granularity, Granularity::Indexed(0));
        assert_eq!(incoming[1].payload.granularity, Granularity::Indexed(1));
    }

    #[test]
    fn test_member_write_flows_field_into_base() {
        // The granularity-distinction scenario: `buf.len = n` sends a
        // Field-granular flow into the base object, not a Full one.
        let mut graph = CpgGraph::new();
        let u = unit(&mut graph);
        let record = graph.new_named_node(NodeKind::RecordDeclaration, "Buf");
        let field = graph.new_named_node(NodeKind::FieldDeclaration, "len");
        graph.add_ast_child(u, record).unwrap();
        graph.add_ast_child(record, field).unwrap();

        let base = graph.new_named_node(NodeKind::Reference, "buf");
        let member = graph.new_named_node(NodeKind::MemberAccessExpression, "len");
        graph.node_mut(member).refers_to = Some(field);
        graph.node_mut(member).access = Some(AccessKind::Write);
        graph.add_ast_child(u, member).unwrap();
        graph.add_ast_child(member, base).unwrap();

        DataflowPass.run(&mut graph, u).unwrap();

        let edge = graph.dfg.incoming(base).next().unwrap();
        assert_eq!(edge.from, member);
        assert_eq!(edge.payload.granularity, Granularity::Field(field));
        assert_ne!(edge.payload.granularity, Granularity::Full);
    }

    #[test]
    fn test_member_read_flows_base_into_member() {
        let mut graph = CpgGraph::new();
        let u = unit(&mut graph);
        let field = graph.new_named_node(NodeKind::FieldDeclaration, "len");
        let base = graph.new_named_node(NodeKind::Reference, "buf");
        let member = graph.new_named_node(NodeKind::MemberAccessExpression, "len");
        graph.node_mut(member).refers_to = Some(field);
        graph.add_ast_child(u, member).unwrap();
        graph.add_ast_child(member, base).unwrap();

        DataflowPass.run(&mut graph, u).unwrap();

        let edge = graph.dfg.incoming(member).next().unwrap();
        assert_eq!(edge.from, base);
        assert_eq!(edge.payload.granularity, Granularity::Field(field));
    }
}
