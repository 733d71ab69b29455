//! Edge types - directed relations between graph nodes
//!
//! Each overlay graph has its own payload type:
//! - [`Ast`]: parent → child containment
//! - [`EvaluationOrder`]: runtime evaluation order with branch/reachability metadata
//! - [`Dataflow`]: value propagation with granularity and optional call context
//! - [`ControlDependence`]: which branch outcomes a node depends on
//! - [`ProgramDependence`]: unified CDG/DFG classification, promotion-only
//! - [`Invoke`]: call expression → invoked callable(s)
//! - [`Usage`]: declaration → referencing node
//!
//! Edges compare and hash by endpoint identity plus their own scalar fields.
//! They never recurse into the endpoints' edge sets: endpoints may reference
//! each other cyclically, and structural recursion would diverge.

use crate::node::{AccessKind, NodeId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A directed edge between two nodes of the graph arena.
///
/// Construction is side-effect-free; an edge participates in the graph only
/// once inserted into an [`EdgeStore`](crate::graph::EdgeStore), which keeps
/// the incoming and outgoing views of both endpoints consistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge<P> {
    /// Node where the edge is outgoing
    pub from: NodeId,
    /// Node where the edge is incoming
    pub to: NodeId,
    /// Overlay-specific payload
    pub payload: P,
}

impl<P> Edge<P> {
    /// Create a new edge. No side effects until inserted into a store.
    pub fn new(from: NodeId, to: NodeId, payload: P) -> Self {
        Self { from, to, payload }
    }
}

impl<P: std::fmt::Debug> std::fmt::Display for Edge<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} [{:?}]", self.from, self.to, self.payload)
    }
}

/// AST containment. Carries no data; the child order is kept by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ast;

/// Evaluation-order edge: the order in which a compiler or interpreter
/// would evaluate statements and expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationOrder {
    /// This path is statically dead, e.g. the arm behind `if (false)`
    pub unreachable: bool,
    /// When the source node has multiple outgoing evaluation-order edges
    /// (e.g. an `if`), which arm this edge is. `None` when there is no
    /// branching ambiguity.
    pub branch: Option<bool>,
}

impl EvaluationOrder {
    /// An ordinary, reachable, unlabeled step
    pub fn step() -> Self {
        Self::default()
    }

    /// A labeled branch arm
    pub fn branch(value: bool) -> Self {
        Self {
            unreachable: false,
            branch: Some(value),
        }
    }
}

/// How much of a value a data-flow edge carries.
///
/// Distinguishes whole-object flow from partial flow through a member,
/// array slot, or keyed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// The whole object flows
    #[default]
    Full,
    /// Only the named field flows; carries the field declaration
    Field(NodeId),
    /// Only the numerically indexed part flows
    Indexed(u64),
    /// Only the string-keyed part flows
    StringIndexed(String),
}

/// Direction of a context-sensitive data-flow edge relative to a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallContextDirection {
    /// The flow enters the call (argument → parameter)
    In,
    /// The flow leaves the call (return value → call expression)
    Out,
}

/// Tags a data-flow edge as entering or leaving a specific call site,
/// enabling call-site-disambiguated analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallingContext {
    pub direction: CallContextDirection,
    /// The call expression this context belongs to
    pub call: NodeId,
}

/// Data-flow edge: a value propagates from source to target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataflow {
    /// How much of the value flows
    pub granularity: Granularity,
    /// Call-site context, when the flow is context-sensitive
    pub context: Option<CallingContext>,
}

impl Dataflow {
    /// Whole-object, context-insensitive flow
    pub fn full() -> Self {
        Self {
            granularity: Granularity::Full,
            context: None,
        }
    }

    /// Partial flow with the given granularity
    pub fn partial(granularity: Granularity) -> Self {
        Self {
            granularity,
            context: None,
        }
    }

    /// Attach a calling context
    pub fn with_context(mut self, context: CallingContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Control-dependence edge: execution of the target depends on branch
/// outcomes of the source predicate.
///
/// The outcome set has at most one element for ordinary two-way branches;
/// it is a set rather than a single flag so multi-branch constructs fit the
/// same edge shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlDependence {
    /// Branch outcomes of the predicate this dependence holds for
    pub branches: SmallVec<[bool; 2]>,
}

impl ControlDependence {
    /// Dependence on a single branch outcome
    pub fn on(branch: bool) -> Self {
        let mut branches = SmallVec::new();
        branches.push(branch);
        Self { branches }
    }

    /// Add an outcome to the set. Duplicates are ignored.
    pub fn add_branch(&mut self, branch: bool) {
        if !self.branches.contains(&branch) {
            self.branches.push(branch);
        }
    }
}

/// Classification of a unified program-dependence edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependenceType {
    Control,
    Data,
}

/// Program-dependence edge payload.
///
/// There is deliberately no public constructor: a PDG edge is always
/// materialized by promoting an existing CDG or DFG edge through
/// [`CpgGraph::promote_to_pdg`](crate::CpgGraph::promote_to_pdg), which
/// guarantees PDG ⊆ CDG ∪ DFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramDependence {
    pub dependence: DependenceType,
    _adopted: (),
}

impl ProgramDependence {
    /// Crate-private: only the promotion API may mint the payload.
    pub(crate) fn adopted(dependence: DependenceType) -> Self {
        Self {
            dependence,
            _adopted: (),
        }
    }
}

/// Invoke edge: connects a call expression to a callable it may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Invoke {
    /// The call is resolved only at runtime (e.g. through a function
    /// value), as opposed to a statically determined target.
    pub dynamic: bool,
}

/// Usage edge: connects a declaration to a reference that reads or writes
/// it. The access kind is derived from the referencing node's own access
/// annotation at insertion time, so the two cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Usage {
    pub access: AccessKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_equality_is_shallow() {
        let a = Edge::new(NodeId(1), NodeId(2), Dataflow::full());
        let b = Edge::new(NodeId(1), NodeId(2), Dataflow::full());
        let c = Edge::new(
            NodeId(1),
            NodeId(2),
            Dataflow::partial(Granularity::Field(NodeId(9))),
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_branch_set_dedup() {
        let mut dep = ControlDependence::on(true);
        dep.add_branch(true);
        assert_eq!(dep.branches.len(), 1);
        dep.add_branch(false);
        assert_eq!(dep.branches.len(), 2);
    }

    #[test]
    fn test_evaluation_order_defaults() {
        let step = EvaluationOrder::step();
        assert!(!step.unreachable);
        assert_eq!(step.branch, None);

        let arm = EvaluationOrder::branch(false);
        assert_eq!(arm.branch, Some(false));
    }

    #[test]
    fn test_calling_context() {
        let flow = Dataflow::full().with_context(CallingContext {
            direction: CallContextDirection::In,
            call: NodeId(3),
        });
        assert_eq!(flow.context.unwrap().call, NodeId(3));
    }
}
