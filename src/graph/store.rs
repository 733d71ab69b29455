//! Mirrored edge container
//!
//! An [`EdgeStore`] holds every edge of one overlay exactly once and indexes
//! it from both endpoints. Inserting an edge A → B is a single mutation that
//! makes the edge visible from A's outgoing view and B's incoming view, so
//! the two views can never disagree - the central correctness property of
//! the overlay graphs.

use crate::edge::Edge;
use crate::node::NodeId;
use std::collections::HashMap;

/// Edge container keeping the incoming and outgoing views of all endpoints
/// consistent.
///
/// Equality and printing compare edges by endpoint identity and payload
/// only; they terminate in O(edges) even when the underlying nodes
/// reference each other cyclically.
#[derive(Debug, Clone)]
pub struct EdgeStore<P> {
    /// Every logical edge, stored once, in insertion order
    edges: Vec<Edge<P>>,
    /// Edge indices outgoing from a node
    outgoing: HashMap<NodeId, Vec<usize>>,
    /// Edge indices incoming to a node
    incoming: HashMap<NodeId, Vec<usize>>,
}

impl<P> Default for EdgeStore<P> {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        }
    }
}

impl<P> EdgeStore<P> {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge. Both endpoint views see it immediately.
    pub fn insert(&mut self, edge: Edge<P>) {
        let idx = self.edges.len();
        self.outgoing.entry(edge.from).or_default().push(idx);
        self.incoming.entry(edge.to).or_default().push(idx);
        self.edges.push(edge);
    }

    /// Number of logical edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Check if the store holds no edges
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All edges, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Edge<P>> {
        self.edges.iter()
    }

    /// Mutable edge iteration. Crate-internal: endpoints must not change
    /// behind the index maps, only payloads may be rewritten.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Edge<P>> {
        self.edges.iter_mut()
    }

    /// Edges outgoing from a node, in insertion order
    pub fn outgoing(&self, from: NodeId) -> impl Iterator<Item = &Edge<P>> {
        self.outgoing
            .get(&from)
            .into_iter()
            .flatten()
            .map(|&idx| &self.edges[idx])
    }

    /// Edges incoming to a node, in insertion order
    pub fn incoming(&self, to: NodeId) -> impl Iterator<Item = &Edge<P>> {
        self.incoming
            .get(&to)
            .into_iter()
            .flatten()
            .map(|&idx| &self.edges[idx])
    }

    /// Number of edges outgoing from a node
    pub fn out_degree(&self, from: NodeId) -> usize {
        self.outgoing.get(&from).map(Vec::len).unwrap_or(0)
    }

    /// Number of edges incoming to a node
    pub fn in_degree(&self, to: NodeId) -> usize {
        self.incoming.get(&to).map(Vec::len).unwrap_or(0)
    }

    /// Successor node ids of a node, in insertion order
    pub fn successors(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing(from).map(|e| e.to)
    }

    /// Predecessor node ids of a node, in insertion order
    pub fn predecessors(&self, to: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.incoming(to).map(|e| e.from)
    }

    /// Mutable access to the payloads of edges outgoing from a node
    pub fn outgoing_payloads_mut(&mut self, from: NodeId) -> Vec<&mut P> {
        let Some(indices) = self.outgoing.get(&from) else {
            return Vec::new();
        };
        let indices: Vec<usize> = indices.clone();
        let mut result = Vec::with_capacity(indices.len());
        let mut rest: &mut [Edge<P>] = &mut self.edges;
        let mut consumed = 0;
        // Indices are strictly increasing per endpoint, so disjoint
        // mutable borrows can be split off left to right.
        for idx in indices {
            let (_, tail) = rest.split_at_mut(idx - consumed);
            let (item, tail) = tail.split_first_mut().expect("edge index in range");
            result.push(&mut item.payload);
            rest = tail;
            consumed = idx + 1;
        }
        result
    }
}

impl<P: PartialEq> EdgeStore<P> {
    /// Check whether an equal edge (same endpoints, same payload) exists
    pub fn contains(&self, edge: &Edge<P>) -> bool {
        self.outgoing(edge.from).any(|e| e == edge)
    }
}

impl<P> EdgeStore<P> {
    /// Rebase every node id by `offset`. Used when a unit-local fragment is
    /// absorbed into the unified graph.
    pub fn shift(&mut self, offset: u32) {
        for edge in &mut self.edges {
            edge.from = NodeId(edge.from.0 + offset);
            edge.to = NodeId(edge.to.0 + offset);
        }
        let outgoing = std::mem::take(&mut self.outgoing);
        self.outgoing = outgoing
            .into_iter()
            .map(|(id, v)| (NodeId(id.0 + offset), v))
            .collect();
        let incoming = std::mem::take(&mut self.incoming);
        self.incoming = incoming
            .into_iter()
            .map(|(id, v)| (NodeId(id.0 + offset), v))
            .collect();
    }

    /// Append all edges of `other`, after `other` has been rebased into
    /// this store's id space.
    pub fn absorb(&mut self, other: EdgeStore<P>) {
        for edge in other.edges {
            self.insert(edge);
        }
    }
}

impl<P: PartialEq> PartialEq for EdgeStore<P> {
    /// Shallow comparison over (from, to, payload) triples in insertion
    /// order. Never descends into nodes, so mutually cyclic graphs compare
    /// in bounded time.
    fn eq(&self, other: &Self) -> bool {
        self.edges == other.edges
    }
}

impl<P: Eq> Eq for EdgeStore<P> {}

impl<P: std::fmt::Debug> std::fmt::Display for EdgeStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} edges", self.edges.len())?;
        for edge in &self.edges {
            writeln!(f, "  {}", edge)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{Dataflow, EvaluationOrder, Granularity};

    #[test]
    fn test_mirrored_insert() {
        let mut store = EdgeStore::new();
        store.insert(Edge::new(NodeId(0), NodeId(1), Dataflow::full()));

        // One logical edge, visible from both sides.
        assert_eq!(store.len(), 1);
        assert_eq!(store.successors(NodeId(0)).collect::<Vec<_>>(), vec![NodeId(1)]);
        assert_eq!(store.predecessors(NodeId(1)).collect::<Vec<_>>(), vec![NodeId(0)]);
        assert_eq!(store.out_degree(NodeId(0)), 1);
        assert_eq!(store.in_degree(NodeId(0)), 0);
        assert_eq!(store.in_degree(NodeId(1)), 1);
    }

    #[test]
    fn test_comparison_terminates_on_cycles() {
        // A references B and B references A in both stores; comparison must
        // stay shallow and terminate.
        let mut a = EdgeStore::new();
        a.insert(Edge::new(NodeId(0), NodeId(1), EvaluationOrder::step()));
        a.insert(Edge::new(NodeId(1), NodeId(0), EvaluationOrder::step()));

        let mut b = EdgeStore::new();
        b.insert(Edge::new(NodeId(0), NodeId(1), EvaluationOrder::step()));
        b.insert(Edge::new(NodeId(1), NodeId(0), EvaluationOrder::step()));

        assert_eq!(a, b);
        assert!(!format!("{}", a).is_empty());

        b.insert(Edge::new(NodeId(0), NodeId(0), EvaluationOrder::step()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_large_cyclic_store() {
        // Adversarial: 1e5 nodes in one big cycle, compared and printed.
        const N: u32 = 100_000;
        let build = || {
            let mut store = EdgeStore::new();
            for i in 0..N {
                store.insert(Edge::new(NodeId(i), NodeId((i + 1) % N), Dataflow::full()));
            }
            store
        };
        let a = build();
        let b = build();
        assert_eq!(a, b);
        assert_eq!(a.len(), N as usize);
        // Printing is linear in the edge count as well.
        let printed = format!("{}", a);
        assert!(printed.starts_with("100000 edges"));
    }

    #[test]
    fn test_shift() {
        let mut store = EdgeStore::new();
        store.insert(Edge::new(
            NodeId(0),
            NodeId(1),
            Dataflow::partial(Granularity::Indexed(2)),
        ));
        store.shift(10);

        assert_eq!(store.successors(NodeId(10)).collect::<Vec<_>>(), vec![NodeId(11)]);
        assert!(store.outgoing(NodeId(0)).next().is_none());
        let edge = store.iter().next().unwrap();
        assert_eq!(edge.payload.granularity, Granularity::Indexed(2));
    }

    #[test]
    fn test_payloads_mut() {
        let mut store = EdgeStore::new();
        store.insert(Edge::new(NodeId(0), NodeId(1), EvaluationOrder::step()));
        store.insert(Edge::new(NodeId(2), NodeId(3), EvaluationOrder::step()));
        store.insert(Edge::new(NodeId(0), NodeId(4), EvaluationOrder::step()));

        for payload in store.outgoing_payloads_mut(NodeId(0)) {
            payload.unreachable = true;
        }
        assert!(store.outgoing(NodeId(0)).all(|e| e.payload.unreachable));
        assert!(store.outgoing(NodeId(2)).all(|e| !e.payload.unreachable));
    }
}
