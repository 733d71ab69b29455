//! Evaluation-order construction
//!
//! Builds the EOG overlay for one translation unit: statements and
//! expressions are sequenced the way an interpreter would evaluate them,
//! `if` arms get `branch` labels, arms behind a constant condition are
//! marked unreachable, and every holder of an independent evaluation path
//! (the unit, records, callables) records its starters.
//!
//! Expressions are sequenced operand-first (post-order); a callable's body
//! hangs off the callable node, a record's members are evaluated from the
//! record body in declaration order.

use crate::edge::EvaluationOrder;
use crate::graph::CpgGraph;
use crate::node::{NodeId, NodeKind};
use crate::Result;

use super::{Pass, PassDescriptor, PassGranularity, PassId};

pub const ID: PassId = PassId("evaluation-order");

pub fn descriptor() -> PassDescriptor {
    PassDescriptor {
        id: ID,
        granularity: PassGranularity::PerUnit,
        hard_depends_on: &[],
        soft_depends_on: &[],
    }
}

/// Builds the evaluation-order overlay of one translation unit.
pub struct EvaluationOrderPass;

impl Pass for EvaluationOrderPass {
    fn descriptor(&self) -> PassDescriptor {
        descriptor()
    }

    fn run(&mut self, graph: &mut CpgGraph, target: NodeId) -> Result<()> {
        let mut top_level = Vec::new();
        for child in graph.ast_children(target) {
            match graph.node(child).kind {
                NodeKind::RecordDeclaration => handle_record(graph, child),
                NodeKind::FunctionDeclaration | NodeKind::MethodDeclaration => {
                    handle_callable(graph, child)
                }
                _ => top_level.push(child),
            }
        }

        // Top-level code makes the unit itself an EOG starter.
        if !top_level.is_empty() {
            graph.node_mut(target).eog_starters.push(target);
            let mut current = vec![target];
            for statement in top_level {
                current = build(graph, &current, EvaluationOrder::step(), statement);
            }
        }
        Ok(())
    }
}

/// A record starts its own evaluation path: field initializers, then the
/// member callables, in declaration order. The members themselves remain
/// reachable from the record, so they are not independent starters.
fn handle_record(graph: &mut CpgGraph, record: NodeId) {
    graph.node_mut(record).eog_starters.push(record);
    let mut current = vec![record];
    for member in graph.ast_children(record) {
        match graph.node(member).kind {
            NodeKind::FunctionDeclaration | NodeKind::MethodDeclaration => {
                link(graph, &current, EvaluationOrder::step(), member);
                graph.node_mut(member).eog_starters.push(member);
                build_body(graph, member);
                current = vec![member];
            }
            _ => {
                current = build(graph, &current, EvaluationOrder::step(), member);
            }
        }
    }
}

fn handle_callable(graph: &mut CpgGraph, callable: NodeId) {
    graph.node_mut(callable).eog_starters.push(callable);
    build_body(graph, callable);
}

fn build_body(graph: &mut CpgGraph, callable: NodeId) {
    let mut current = vec![callable];
    for child in graph.ast_children(callable) {
        // Parameters carry no evaluation of their own.
        if graph.node(child).kind == NodeKind::ParameterDeclaration {
            continue;
        }
        current = build(graph, &current, EvaluationOrder::step(), child);
    }
}

/// Sequence `node` after the `prev` frontier. The `entry` payload goes on
/// the edges entering this subtree (carrying branch labels downward);
/// edges inside the subtree are plain steps. Returns the new frontier.
fn build(
    graph: &mut CpgGraph,
    prev: &[NodeId],
    entry: EvaluationOrder,
    node: NodeId,
) -> Vec<NodeId> {
    match graph.node(node).kind {
        NodeKind::Block => {
            link(graph, prev, entry, node);
            let mut current = vec![node];
            for child in graph.ast_children(node) {
                current = build(graph, &current, EvaluationOrder::step(), child);
                if current.is_empty() {
                    // A return ended every path through this block.
                    break;
                }
            }
            current
        }
        NodeKind::IfStatement => {
            let children = graph.ast_children(node);
            let condition = children.first().copied();
            let frontier = match condition {
                Some(condition) => build(graph, prev, entry, condition),
                None => prev.to_vec(),
            };
            let entry_to_if = if condition.is_some() {
                EvaluationOrder::step()
            } else {
                entry
            };
            link(graph, &frontier, entry_to_if, node);

            let constant = condition.and_then(|c| constant_bool(graph, c));
            let mut exits = Vec::new();

            if let Some(&then_branch) = children.get(1) {
                let mut arm = EvaluationOrder::branch(true);
                arm.unreachable = constant == Some(false);
                exits.extend(build(graph, &[node], arm, then_branch));
            }
            if let Some(&else_branch) = children.get(2) {
                let mut arm = EvaluationOrder::branch(false);
                arm.unreachable = constant == Some(true);
                exits.extend(build(graph, &[node], arm, else_branch));
            } else {
                // Without an else arm the predicate itself falls through.
                exits.push(node);
            }
            exits
        }
        NodeKind::ReturnStatement => {
            let mut current = prev.to_vec();
            let mut payload = entry;
            for child in graph.ast_children(node) {
                current = build(graph, &current, payload, child);
                payload = EvaluationOrder::step();
            }
            link(graph, &current, payload, node);
            // Nothing is evaluated after a return.
            Vec::new()
        }
        NodeKind::CallExpression
        | NodeKind::MemberAccessExpression
        | NodeKind::BinaryOperator
        | NodeKind::VariableDeclaration
        | NodeKind::FieldDeclaration => {
            // Operands first, then the node itself.
            let mut current = prev.to_vec();
            let mut payload = entry;
            for child in graph.ast_children(node) {
                current = build(graph, &current, payload, child);
                payload = EvaluationOrder::step();
            }
            link(graph, &current, payload, node);
            vec![node]
        }
        _ => {
            link(graph, prev, entry, node);
            vec![node]
        }
    }
}

fn link(graph: &mut CpgGraph, prev: &[NodeId], payload: EvaluationOrder, node: NodeId) {
    for &from in prev {
        graph.add_eog_edge(from, node, payload);
    }
}

/// A literal `true`/`false` condition, when statically known.
fn constant_bool(graph: &CpgGraph, node: NodeId) -> Option<bool> {
    let n = graph.node(node);
    if n.kind != NodeKind::Literal {
        return None;
    }
    match n.code.as_deref().or(n.name.as_deref()) {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}
