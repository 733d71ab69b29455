//! Overlay insertion APIs
//!
//! Thin, invariant-carrying wrappers around the raw [`EdgeStore`]s of a
//! [`CpgGraph`]:
//! - data-flow insertion runs the type-observer subscription hook,
//! - invoke insertion subscribes the call to the callee's type,
//! - usage insertion derives the access kind from the referencing node,
//! - the program-dependence overlay accepts promotions only.
//!
//! Passes and frontends go through these; the bare stores remain available
//! for read access.

use crate::edge::{
    ControlDependence, Dataflow, DependenceType, Edge, EvaluationOrder, Invoke, ProgramDependence,
    Usage,
};
use crate::node::{AccessKind, NodeId, NodeKind};
use crate::{Error, Result};

use super::CpgGraph;

impl CpgGraph {
    /// Insert an evaluation-order edge.
    pub fn add_eog_edge(&mut self, from: NodeId, to: NodeId, payload: EvaluationOrder) {
        self.eog.insert(Edge::new(from, to, payload));
    }

    /// Insert a data-flow edge.
    ///
    /// Post-insert hook: when the receiving node is a reference and the
    /// source carries inferable type information, the receiver subscribes
    /// to the source's type, so later type propagation can push through
    /// this flow.
    pub fn add_dfg_edge(&mut self, from: NodeId, to: NodeId, payload: Dataflow) {
        self.dfg.insert(Edge::new(from, to, payload));

        if self.node(to).kind == NodeKind::Reference && self.node(from).kind.carries_type_info() {
            self.node_mut(from).register_type_observer(to);
        }
    }

    /// Insert a control-dependence edge.
    pub fn add_cdg_edge(&mut self, from: NodeId, to: NodeId, payload: ControlDependence) {
        self.cdg.insert(Edge::new(from, to, payload));
    }

    /// Promote an existing control- or data-dependence edge into the
    /// program-dependence overlay.
    ///
    /// This is the only way PDG edges come into existence: the donor edge
    /// (same endpoints, in the store matching `dependence`) must already be
    /// present, which keeps PDG ⊆ CDG ∪ DFG at all times. Promoting the
    /// same dependence twice is a no-op.
    pub fn promote_to_pdg(
        &mut self,
        from: NodeId,
        to: NodeId,
        dependence: DependenceType,
    ) -> Result<()> {
        let donor_exists = match dependence {
            DependenceType::Control => self.cdg.outgoing(from).any(|e| e.to == to),
            DependenceType::Data => self.dfg.outgoing(from).any(|e| e.to == to),
        };
        if !donor_exists {
            return Err(Error::MissingDonor {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let edge = Edge::new(from, to, ProgramDependence::adopted(dependence));
        if !self.pdg.contains(&edge) {
            self.pdg.insert(edge);
        }
        Ok(())
    }

    /// Insert an invoke edge from a call expression to a callable it may
    /// reach.
    ///
    /// The call subscribes to the callee's type so its result type can be
    /// derived from the callee's return type once known. Duplicate edges
    /// are not inserted.
    pub fn add_invoke_edge(&mut self, call: NodeId, callee: NodeId, dynamic: bool) {
        let edge = Edge::new(call, callee, Invoke { dynamic });
        if !self.invokes.contains(&edge) {
            self.invokes.insert(edge);
        }
        self.node_mut(callee).register_type_observer(call);
    }

    /// Insert a usage edge from a declaration to a reference of it.
    ///
    /// The access kind is read off the referencing node's own annotation
    /// (defaulting to a plain read), never supplied by the caller, so edge
    /// and node cannot disagree.
    pub fn add_usage_edge(&mut self, declaration: NodeId, reference: NodeId) {
        let access = self.node(reference).access.unwrap_or(AccessKind::Read);
        self.usages
            .insert(Edge::new(declaration, reference, Usage { access }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Granularity;

    #[test]
    fn test_dfg_registers_type_observer() {
        let mut graph = CpgGraph::new();
        let literal = graph.new_node(NodeKind::Literal);
        let reference = graph.new_named_node(NodeKind::Reference, "x");

        graph.add_dfg_edge(literal, reference, Dataflow::full());

        // Mirrored views agree...
        assert_eq!(graph.dfg.successors(literal).collect::<Vec<_>>(), vec![reference]);
        assert_eq!(graph.dfg.predecessors(reference).collect::<Vec<_>>(), vec![literal]);
        // ...and the reference now observes the literal's type.
        assert_eq!(graph.node(literal).type_observers, vec![reference]);
    }

    #[test]
    fn test_dfg_hook_skips_untyped_sources() {
        let mut graph = CpgGraph::new();
        let block = graph.new_node(NodeKind::Block);
        let reference = graph.new_node(NodeKind::Reference);

        graph.add_dfg_edge(block, reference, Dataflow::full());
        assert!(graph.node(block).type_observers.is_empty());
    }

    #[test]
    fn test_pdg_promotion_requires_donor() {
        let mut graph = CpgGraph::new();
        let predicate = graph.new_node(NodeKind::IfStatement);
        let body = graph.new_node(NodeKind::Block);

        // No CDG edge yet: promotion is rejected.
        let err = graph
            .promote_to_pdg(predicate, body, DependenceType::Control)
            .unwrap_err();
        assert!(matches!(err, Error::MissingDonor { .. }));
        assert!(graph.pdg.is_empty());

        graph.add_cdg_edge(predicate, body, ControlDependence::on(true));
        graph
            .promote_to_pdg(predicate, body, DependenceType::Control)
            .unwrap();
        assert_eq!(graph.pdg.len(), 1);

        // Promoting again stays idempotent.
        graph
            .promote_to_pdg(predicate, body, DependenceType::Control)
            .unwrap();
        assert_eq!(graph.pdg.len(), 1);
    }

    #[test]
    fn test_pdg_control_donor_does_not_cover_data() {
        let mut graph = CpgGraph::new();
        let a = graph.new_node(NodeKind::Literal);
        let b = graph.new_node(NodeKind::Reference);
        graph.add_cdg_edge(a, b, ControlDependence::on(false));

        // The CDG donor cannot stand in for a data dependence.
        assert!(graph.promote_to_pdg(a, b, DependenceType::Data).is_err());
    }

    #[test]
    fn test_invoke_subscribes_call_to_callee() {
        let mut graph = CpgGraph::new();
        let call = graph.new_named_node(NodeKind::CallExpression, "f");
        let callee = graph.new_named_node(NodeKind::FunctionDeclaration, "f");

        graph.add_invoke_edge(call, callee, false);
        graph.add_invoke_edge(call, callee, false);

        assert_eq!(graph.invokes.len(), 1);
        assert_eq!(graph.node(callee).type_observers, vec![call]);
    }

    #[test]
    fn test_usage_access_derived_from_reference() {
        let mut graph = CpgGraph::new();
        let var = graph.new_named_node(NodeKind::VariableDeclaration, "x");
        let write = graph.new_named_node(NodeKind::Reference, "x");
        graph.node_mut(write).access = Some(AccessKind::Write);

        graph.add_usage_edge(var, write);
        let edge = graph.usages.outgoing(var).next().unwrap();
        assert_eq!(edge.payload.access, AccessKind::Write);

        // Unannotated references default to a read.
        let read = graph.new_named_node(NodeKind::Reference, "x");
        graph.add_usage_edge(var, read);
        let edge = graph.usages.incoming(read).next().unwrap();
        assert_eq!(edge.payload.access, AccessKind::Read);
    }

    #[test]
    fn test_member_access_field_granularity() {
        // A member access flowing from its base carries Field granularity
        // naming the accessed field, not Full.
        let mut graph = CpgGraph::new();
        let field = graph.new_named_node(NodeKind::FieldDeclaration, "len");
        let base = graph.new_named_node(NodeKind::Reference, "buf");
        let member = graph.new_named_node(NodeKind::MemberAccessExpression, "len");

        graph.add_dfg_edge(base, member, Dataflow::partial(Granularity::Field(field)));

        let edge = graph.dfg.incoming(member).next().unwrap();
        assert_eq!(edge.payload.granularity, Granularity::Field(field));
        assert_ne!(edge.payload.granularity, Granularity::Full);
    }
}
