//! Call resolution
//!
//! Connects call expressions to the callables they may invoke, across all
//! translation units:
//! - exactly one candidate with a matching name → a static invoke edge,
//! - several plausible candidates (or a callee that is only a value) →
//!   a `dynamic` invoke edge to every one of them, never an arbitrary
//!   pick.
//!
//! For every resolved edge the interprocedural, call-site-tagged data
//! flows are added: argument → parameter entering the call, returned
//! value → call expression leaving it.

use crate::edge::{CallContextDirection, CallingContext, Dataflow};
use crate::graph::CpgGraph;
use crate::node::{NodeId, NodeKind};
use crate::Result;
use tracing::debug;

use super::{Pass, PassDescriptor, PassGranularity, PassId};

pub const ID: PassId = PassId("call-resolution");

pub fn descriptor() -> PassDescriptor {
    PassDescriptor {
        id: ID,
        granularity: PassGranularity::WholeGraph,
        hard_depends_on: &[],
        soft_depends_on: &[super::dfg::ID],
    }
}

/// Resolves invocation targets over the whole unified graph.
pub struct CallResolutionPass;

impl Pass for CallResolutionPass {
    fn descriptor(&self) -> PassDescriptor {
        descriptor()
    }

    fn run(&mut self, graph: &mut CpgGraph, _target: NodeId) -> Result<()> {
        let calls: Vec<NodeId> = graph.nodes_of_kind(NodeKind::CallExpression).to_vec();
        for call in calls {
            let Some(name) = graph.node(call).name.clone() else {
                continue;
            };
            let candidates = candidates_for(graph, &name);
            if candidates.is_empty() {
                debug!(call = %call, name, "no invocation candidates");
                continue;
            }

            let dynamic = candidates.len() > 1;
            for &callee in &candidates {
                graph.add_invoke_edge(call, callee, dynamic);
                connect_call_flows(graph, call, callee);
            }
        }
        Ok(())
    }
}

/// Callable declarations with a matching name, in creation order.
fn candidates_for(graph: &CpgGraph, name: &str) -> Vec<NodeId> {
    let mut out = Vec::new();
    for kind in [NodeKind::FunctionDeclaration, NodeKind::MethodDeclaration] {
        for &id in graph.nodes_of_kind(kind) {
            if graph.node(id).name.as_deref() == Some(name) {
                out.push(id);
            }
        }
    }
    out
}

/// Call-site-tagged flows along one invoke edge.
fn connect_call_flows(graph: &mut CpgGraph, call: NodeId, callee: NodeId) {
    let arguments: Vec<NodeId> = graph
        .ast_children(call)
        .into_iter()
        .filter(|&c| graph.node(c).kind != NodeKind::ParameterDeclaration)
        .collect();
    let parameters: Vec<NodeId> = graph
        .ast_children(callee)
        .into_iter()
        .filter(|&c| graph.node(c).kind == NodeKind::ParameterDeclaration)
        .collect();

    for (argument, parameter) in arguments.into_iter().zip(parameters) {
        graph.add_dfg_edge(
            argument,
            parameter,
            Dataflow::full().with_context(CallingContext {
                direction: CallContextDirection::In,
                call,
            }),
        );
    }

    let returns: Vec<NodeId> = graph
        .subtree(callee)
        .into_iter()
        .filter(|&n| graph.node(n).kind == NodeKind::ReturnStatement)
        .collect();
    for ret in returns {
        graph.add_dfg_edge(
            ret,
            call,
            Dataflow::full().with_context(CallingContext {
                direction: CallContextDirection::Out,
                call,
            }),
        );
    }
}
