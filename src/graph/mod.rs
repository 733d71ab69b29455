//! Unified code property graph
//!
//! [`CpgGraph`] owns every node in an arena and carries one mirrored
//! [`EdgeStore`] per overlay: AST containment, evaluation order (EOG),
//! data flow (DFG), control dependence (CDG), program dependence (PDG),
//! invocations and usages. Frontends build unit-local graphs which the
//! translation manager absorbs into one unified graph before the pass
//! phase runs.

pub mod flows;
pub mod store;

pub use store::EdgeStore;

use crate::edge::{
    Ast, ControlDependence, Dataflow, Edge, EvaluationOrder, Granularity, Invoke,
    ProgramDependence, Usage,
};
use crate::node::{Node, NodeId, NodeKind};
use crate::{Error, Result};
use indexmap::IndexMap;

/// The unified, language-agnostic program graph.
#[derive(Debug, Clone, Default)]
pub struct CpgGraph {
    /// Node arena; a [`NodeId`] is an index into this vector
    nodes: Vec<Node>,
    /// Secondary index: kind → nodes of that kind, in creation order
    by_kind: IndexMap<NodeKind, Vec<NodeId>>,
    /// AST containment overlay (exactly one parent per node)
    pub ast: EdgeStore<Ast>,
    /// Evaluation-order overlay
    pub eog: EdgeStore<EvaluationOrder>,
    /// Data-flow overlay
    pub dfg: EdgeStore<Dataflow>,
    /// Control-dependence overlay
    pub cdg: EdgeStore<ControlDependence>,
    /// Program-dependence overlay; populated only by promotion
    pub pdg: EdgeStore<ProgramDependence>,
    /// Invocation overlay
    pub invokes: EdgeStore<Invoke>,
    /// Declaration-usage overlay
    pub usages: EdgeStore<Usage>,
}

impl CpgGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a node of the given kind with a fresh, process-unique id
    pub fn new_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, kind));
        self.by_kind.entry(kind).or_default().push(id);
        id
    }

    /// Create a named node
    pub fn new_named_node(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeId {
        let id = self.new_node(kind);
        self.nodes[id.index()].name = Some(name.into());
        id
    }

    /// Create a problem node carrying a human-readable message
    pub fn new_problem_node(&mut self, message: impl Into<String>) -> NodeId {
        let id = self.new_node(NodeKind::Problem);
        self.nodes[id.index()].problem = Some(message.into());
        id
    }

    /// Get a node by id
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Get a node mutably by id
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// All nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All nodes of one kind, in creation order
    pub fn nodes_of_kind(&self, kind: NodeKind) -> &[NodeId] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    // ---- AST overlay ------------------------------------------------------

    /// Attach `child` under `parent` in the AST. A node has exactly one
    /// parent; attaching an already-parented node is an error.
    pub fn add_ast_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if let Some(existing) = self.nodes[child.index()].ast_parent {
            return Err(Error::AstParent {
                child: child.to_string(),
                parent: existing.to_string(),
            });
        }
        self.nodes[child.index()].ast_parent = Some(parent);
        self.ast.insert(Edge::new(parent, child, Ast));
        Ok(())
    }

    /// AST children of a node, in attachment order
    pub fn ast_children(&self, parent: NodeId) -> Vec<NodeId> {
        self.ast.successors(parent).collect()
    }

    /// The AST subtree rooted at `root`, preorder, including `root`
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Reverse so the leftmost child is visited first.
            let children = self.ast_children(id);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Walk from `node` to the AST root, excluding `node` itself
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes[node.index()].ast_parent;
        while let Some(id) = current {
            out.push(id);
            current = self.nodes[id.index()].ast_parent;
        }
        out
    }

    // ---- EOG starter queries ---------------------------------------------

    /// All unique EOG starters or singles within the subtree of `scope`:
    /// every starter recorded by a descendant holder that has no incoming
    /// evaluation-order edge, plus `scope` itself when it has neither
    /// incoming nor outgoing evaluation-order edges. Deduplicated, AST
    /// order.
    pub fn unique_eog_starters_or_singles(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for id in self.subtree(scope) {
            let node = self.node(id);
            if !node.kind.is_eog_starter_holder() {
                continue;
            }
            for &starter in &node.eog_starters {
                if self.eog.in_degree(starter) == 0 && !out.contains(&starter) {
                    out.push(starter);
                }
            }
        }
        if self.eog.in_degree(scope) == 0 && self.eog.out_degree(scope) == 0 && !out.contains(&scope)
        {
            out.push(scope);
        }
        out
    }

    /// Check if `node` begins an independent evaluation-order path
    pub fn is_eog_starter(&self, node: NodeId) -> bool {
        let n = self.node(node);
        (n.eog_starters.contains(&node)
            || (self.eog.out_degree(node) > 0))
            && self.eog.in_degree(node) == 0
    }

    /// Derive the concrete targets of a per-EOG-starter pass from an
    /// arbitrary anchor: the anchor itself if it already is a starter with
    /// no incoming edge, else its nearest ancestor that is, else all
    /// descendant starters.
    pub fn eog_starter_targets(&self, anchor: NodeId) -> Vec<NodeId> {
        if self.is_eog_starter(anchor) {
            return vec![anchor];
        }
        for ancestor in self.ancestors(anchor) {
            if self.is_eog_starter(ancestor) {
                return vec![ancestor];
            }
        }
        let mut out = Vec::new();
        for id in self.subtree(anchor) {
            let node = self.node(id);
            if !node.kind.is_eog_starter_holder() {
                continue;
            }
            for &starter in &node.eog_starters {
                if self.eog.in_degree(starter) == 0 && !out.contains(&starter) {
                    out.push(starter);
                }
            }
        }
        out
    }

    // ---- Duplication ------------------------------------------------------

    /// Structural clone of a node.
    ///
    /// The clone gets a fresh id and copies of all incident edges in every
    /// non-AST overlay, with their typed payloads (granularity, calling
    /// context), the clone substituted on the cloned endpoint and the far
    /// endpoint still linked to the original graph. AST containment is not
    /// copied: the clone starts unparented so the tree invariant holds.
    pub fn duplicate(&mut self, original: NodeId) -> NodeId {
        let mut copy = self.nodes[original.index()].clone();
        let id = NodeId(self.nodes.len() as u32);
        copy.id = id;
        copy.ast_parent = None;
        let kind = copy.kind;
        self.nodes.push(copy);
        self.by_kind.entry(kind).or_default().push(id);

        fn copy_incident<P: Clone>(store: &mut EdgeStore<P>, original: NodeId, clone: NodeId) {
            let outgoing: Vec<Edge<P>> = store.outgoing(original).cloned().collect();
            let incoming: Vec<Edge<P>> = store.incoming(original).cloned().collect();
            for edge in outgoing {
                store.insert(Edge::new(clone, edge.to, edge.payload));
            }
            for edge in incoming {
                // Self-loops were already copied by the outgoing half.
                if edge.from == original && edge.to == original {
                    continue;
                }
                store.insert(Edge::new(edge.from, clone, edge.payload));
            }
        }

        copy_incident(&mut self.eog, original, id);
        copy_incident(&mut self.dfg, original, id);
        copy_incident(&mut self.cdg, original, id);
        copy_incident(&mut self.pdg, original, id);
        copy_incident(&mut self.invokes, original, id);
        copy_incident(&mut self.usages, original, id);
        id
    }

    // ---- Fragment absorption ---------------------------------------------

    /// Merge a unit-local fragment into this graph.
    ///
    /// Every id of the fragment is rebased past the current arena; the
    /// offset is returned so the caller can translate fragment ids (e.g.
    /// the fragment's root) into the unified id space.
    pub fn absorb(&mut self, mut fragment: CpgGraph) -> u32 {
        let offset = self.nodes.len() as u32;

        for mut node in fragment.nodes.drain(..) {
            node.id = NodeId(node.id.0 + offset);
            node.ast_parent = node.ast_parent.map(|p| NodeId(p.0 + offset));
            node.refers_to = node.refers_to.map(|r| NodeId(r.0 + offset));
            for starter in &mut node.eog_starters {
                *starter = NodeId(starter.0 + offset);
            }
            for observer in &mut node.type_observers {
                *observer = NodeId(observer.0 + offset);
            }
            let kind = node.kind;
            let id = node.id;
            self.nodes.push(node);
            self.by_kind.entry(kind).or_default().push(id);
        }

        fragment.ast.shift(offset);
        fragment.eog.shift(offset);
        fragment.dfg.shift(offset);
        fragment.cdg.shift(offset);
        fragment.pdg.shift(offset);
        fragment.invokes.shift(offset);
        fragment.usages.shift(offset);

        // Data-flow payloads embed node ids of their own; rebase them too.
        for edge in fragment.dfg.iter_mut() {
            if let Granularity::Field(field) = &mut edge.payload.granularity {
                *field = NodeId(field.0 + offset);
            }
            if let Some(context) = &mut edge.payload.context {
                context.call = NodeId(context.call.0 + offset);
            }
        }

        self.ast.absorb(fragment.ast);
        self.eog.absorb(fragment.eog);
        self.dfg.absorb(fragment.dfg);
        self.cdg.absorb(fragment.cdg);
        self.pdg.absorb(fragment.pdg);
        self.invokes.absorb(fragment.invokes);
        self.usages.absorb(fragment.usages);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{CallContextDirection, CallingContext};
    use crate::node::AccessKind;

    #[test]
    fn test_arena_ids_are_stable() {
        let mut graph = CpgGraph::new();
        let a = graph.new_node(NodeKind::Literal);
        let b = graph.new_named_node(NodeKind::Reference, "x");
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));
        assert_eq!(graph.node(b).name.as_deref(), Some("x"));
        assert_eq!(graph.nodes_of_kind(NodeKind::Reference), &[b]);
    }

    #[test]
    fn test_single_ast_parent() {
        let mut graph = CpgGraph::new();
        let unit = graph.new_node(NodeKind::TranslationUnit);
        let func = graph.new_node(NodeKind::FunctionDeclaration);
        let other = graph.new_node(NodeKind::TranslationUnit);

        graph.add_ast_child(unit, func).unwrap();
        assert!(graph.add_ast_child(other, func).is_err());
        assert_eq!(graph.node(func).ast_parent, Some(unit));
    }

    #[test]
    fn test_subtree_preorder() {
        let mut graph = CpgGraph::new();
        let unit = graph.new_node(NodeKind::TranslationUnit);
        let func = graph.new_node(NodeKind::FunctionDeclaration);
        let body = graph.new_node(NodeKind::Block);
        let var = graph.new_node(NodeKind::VariableDeclaration);
        graph.add_ast_child(unit, func).unwrap();
        graph.add_ast_child(func, body).unwrap();
        graph.add_ast_child(body, var).unwrap();

        assert_eq!(graph.subtree(unit), vec![unit, func, body, var]);
        assert_eq!(graph.ancestors(var), vec![body, func, unit]);
    }

    #[test]
    fn test_unique_eog_starters_scenario() {
        // One record with a method, one free function, an otherwise empty
        // unit: the unique starters are the record, the function, and the
        // unit itself (as a single), in that order.
        let mut graph = CpgGraph::new();
        let unit = graph.new_node(NodeKind::TranslationUnit);
        let record = graph.new_named_node(NodeKind::RecordDeclaration, "Widget");
        let method = graph.new_named_node(NodeKind::MethodDeclaration, "draw");
        let func = graph.new_named_node(NodeKind::FunctionDeclaration, "main");
        graph.add_ast_child(unit, record).unwrap();
        graph.add_ast_child(record, method).unwrap();
        graph.add_ast_child(unit, func).unwrap();

        // What the evaluation-order pass would record: each holder starts
        // its own path; the method is evaluated from the record body.
        graph.node_mut(record).eog_starters.push(record);
        graph.node_mut(method).eog_starters.push(method);
        graph.node_mut(func).eog_starters.push(func);
        graph
            .eog
            .insert(Edge::new(record, method, EvaluationOrder::step()));
        let body = graph.new_node(NodeKind::Block);
        graph.add_ast_child(func, body).unwrap();
        graph.eog.insert(Edge::new(func, body, EvaluationOrder::step()));

        let starters = graph.unique_eog_starters_or_singles(unit);
        assert_eq!(starters, vec![record, func, unit]);
    }

    #[test]
    fn test_eog_starter_targets() {
        let mut graph = CpgGraph::new();
        let unit = graph.new_node(NodeKind::TranslationUnit);
        let func = graph.new_node(NodeKind::FunctionDeclaration);
        let body = graph.new_node(NodeKind::Block);
        graph.add_ast_child(unit, func).unwrap();
        graph.add_ast_child(func, body).unwrap();
        graph.node_mut(func).eog_starters.push(func);
        graph.eog.insert(Edge::new(func, body, EvaluationOrder::step()));

        // Anchor is the starter itself.
        assert_eq!(graph.eog_starter_targets(func), vec![func]);
        // Anchor inside the starter's subtree resolves to the ancestor.
        assert_eq!(graph.eog_starter_targets(body), vec![func]);
        // Anchor above any starter collects the descendants.
        assert_eq!(graph.eog_starter_targets(unit), vec![func]);
    }

    #[test]
    fn test_duplicate_clones_incident_edges() {
        let mut graph = CpgGraph::new();
        let call = graph.new_node(NodeKind::CallExpression);
        let field = graph.new_node(NodeKind::FieldDeclaration);
        let source = graph.new_node(NodeKind::Literal);
        let target = graph.new_node(NodeKind::Reference);

        graph.dfg.insert(Edge::new(
            source,
            target,
            Dataflow::partial(Granularity::Field(field)).with_context(CallingContext {
                direction: CallContextDirection::Out,
                call,
            }),
        ));
        graph.eog.insert(Edge::new(target, source, EvaluationOrder::step()));

        let clone = graph.duplicate(target);
        assert_ne!(clone, target);

        // Incoming DFG edge was copied onto the clone, payload intact.
        let incoming: Vec<_> = graph.dfg.incoming(clone).collect();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].from, source);
        assert_eq!(incoming[0].payload.granularity, Granularity::Field(field));
        assert_eq!(incoming[0].payload.context.unwrap().call, call);

        // Outgoing EOG edge was copied as well; the original keeps its own.
        assert_eq!(graph.eog.successors(clone).collect::<Vec<_>>(), vec![source]);
        assert_eq!(graph.eog.successors(target).collect::<Vec<_>>(), vec![source]);
    }

    #[test]
    fn test_absorb_rebases_ids_and_payloads() {
        let mut unified = CpgGraph::new();
        unified.new_node(NodeKind::Component);

        let mut fragment = CpgGraph::new();
        let unit = fragment.new_node(NodeKind::TranslationUnit);
        let field = fragment.new_node(NodeKind::FieldDeclaration);
        let reference = fragment.new_node(NodeKind::Reference);
        fragment.node_mut(reference).access = Some(AccessKind::Read);
        fragment.node_mut(reference).refers_to = Some(field);
        fragment.add_ast_child(unit, field).unwrap();
        fragment.dfg.insert(Edge::new(
            field,
            reference,
            Dataflow::partial(Granularity::Field(field)),
        ));

        let offset = unified.absorb(fragment);
        assert_eq!(offset, 1);
        let unit = NodeId(unit.0 + offset);
        let field = NodeId(field.0 + offset);
        let reference = NodeId(reference.0 + offset);

        assert_eq!(unified.node(field).ast_parent, Some(unit));
        assert_eq!(unified.node(reference).refers_to, Some(field));
        let edge = unified.dfg.outgoing(field).next().unwrap();
        assert_eq!(edge.to, reference);
        assert_eq!(edge.payload.granularity, Granularity::Field(field));
    }
}
