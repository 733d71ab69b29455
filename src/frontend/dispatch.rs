//! Handler dispatch - from raw frontend nodes to graph nodes
//!
//! A [`Dispatcher`] owns the unit-local graph fragment and a registry of
//! conversion handlers keyed by raw kind. Dispatch finds the most specific
//! handler by walking the kind hierarchy upward, degrades gracefully to
//! problem nodes when no handler fits or a handler yields nothing, and
//! notifies listeners waiting on a raw node as soon as it is processed.
//!
//! One dispatcher serves one translation unit on one thread. Concurrent
//! units each get their own instance; nothing here is shared.

use crate::graph::CpgGraph;
use crate::node::{NodeId, SourceLocation};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{LanguageId, RawKind, RawKindTable, RawNodeId, RawTree};

/// A conversion handler: turns one raw node (and, recursively through the
/// dispatcher, its children) into a graph node.
pub type HandlerFn = dyn Fn(&mut Dispatcher, &RawTree, RawNodeId) -> Option<NodeId>;

/// A callback fired once a specific raw node has been processed.
pub type ProcessedListener = Box<dyn FnMut(&mut CpgGraph, NodeId)>;

/// Severity of a translation diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One deterministic record of a dispatch irregularity.
///
/// Diagnostics are collected on the dispatcher in dispatch order (and
/// mirrored to the log); they never abort translation.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

/// Per-unit dispatch engine.
pub struct Dispatcher {
    language: LanguageId,
    kinds: Arc<RawKindTable>,
    handlers: IndexMap<RawKind, Rc<HandlerFn>>,
    /// The unit-local graph fragment being built
    pub graph: CpgGraph,
    /// Most recently produced node. Only meaningful for the sequential
    /// per-unit use this type is designed for.
    pub last_node: Option<NodeId>,
    diagnostics: Vec<Diagnostic>,
    processed: HashMap<RawNodeId, NodeId>,
    listeners: HashMap<RawNodeId, Vec<ProcessedListener>>,
}

impl Dispatcher {
    /// Create a dispatcher for one translation unit
    pub fn new(language: LanguageId, kinds: Arc<RawKindTable>) -> Self {
        Self {
            language,
            kinds,
            handlers: IndexMap::new(),
            graph: CpgGraph::new(),
            last_node: None,
            diagnostics: Vec::new(),
            processed: HashMap::new(),
            listeners: HashMap::new(),
        }
    }

    /// The language this dispatcher translates
    pub fn language(&self) -> LanguageId {
        self.language
    }

    /// Register a conversion handler for an exact raw kind
    pub fn register_handler(
        &mut self,
        kind: RawKind,
        handler: impl Fn(&mut Dispatcher, &RawTree, RawNodeId) -> Option<NodeId> + 'static,
    ) {
        self.handlers.insert(kind, Rc::new(handler));
    }

    /// Register a listener for the moment `raw` is processed. If the node
    /// was already processed, the listener fires immediately; otherwise it
    /// is queued.
    pub fn on_processed(&mut self, raw: RawNodeId, mut listener: ProcessedListener) {
        if let Some(&node) = self.processed.get(&raw) {
            listener(&mut self.graph, node);
        } else {
            self.listeners.entry(raw).or_default().push(listener);
        }
    }

    /// The graph node a raw node was translated to, if processed already
    pub fn translated(&self, raw: RawNodeId) -> Option<NodeId> {
        self.processed.get(&raw).copied()
    }

    /// Diagnostics collected so far, in dispatch order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain the collected diagnostics
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Consume the dispatcher, yielding the built fragment and diagnostics
    pub fn finish(self) -> (CpgGraph, Vec<Diagnostic>) {
        (self.graph, self.diagnostics)
    }

    /// Translate one raw node into a graph node.
    ///
    /// Never fails: dispatch gaps and empty handler results degrade to
    /// problem nodes so that one untranslatable element cannot abort the
    /// unit. Handlers recurse into this method for their children.
    pub fn handle(&mut self, tree: &RawTree, raw: RawNodeId) -> NodeId {
        let raw_node = tree.node(raw);
        let concrete = raw_node.kind;

        // Most specific handler first, then ancestor kinds up to the root.
        let mut lookup = Some(concrete);
        let mut matched = None;
        while let Some(kind) = lookup {
            if let Some(handler) = self.handlers.get(&kind) {
                matched = Some((Rc::clone(handler), kind));
                break;
            }
            lookup = self.kinds.parent(kind);
        }

        let produced = match matched {
            Some((handler, kind)) => {
                if kind != concrete && !self.kinds.is_literal(concrete) {
                    self.report(
                        Severity::Warning,
                        format!(
                            "no handler for kind '{}', falling back to '{}'",
                            self.kinds.name(concrete),
                            self.kinds.name(kind)
                        ),
                        raw_node.location.clone(),
                    );
                }
                match handler(self, tree, raw) {
                    Some(node) => {
                        debug!(kind = self.kinds.name(concrete), node = %node, "handled raw node");
                        node
                    }
                    None => {
                        let message = format!(
                            "handler for kind '{}' produced no node",
                            self.kinds.name(concrete)
                        );
                        self.report(Severity::Error, message.clone(), raw_node.location.clone());
                        self.graph.new_problem_node(message)
                    }
                }
            }
            None => {
                let message = format!(
                    "translation of kind '{}' is not supported",
                    self.kinds.name(concrete)
                );
                self.report(Severity::Error, message.clone(), raw_node.location.clone());
                self.graph.new_problem_node(message)
            }
        };

        // Stamp what the handler did not set itself.
        let raw_node = tree.node(raw);
        let node = self.graph.node_mut(produced);
        if node.location.is_none() {
            node.location = raw_node.location.clone();
        }
        if node.code.is_none() {
            node.code = raw_node.code.clone();
        }
        node.language = Some(self.language);

        self.last_node = Some(produced);
        self.processed.insert(raw, produced);
        if let Some(mut listeners) = self.listeners.remove(&raw) {
            for listener in &mut listeners {
                listener(&mut self.graph, produced);
            }
        }
        produced
    }

    fn report(&mut self, severity: Severity, message: String, location: Option<SourceLocation>) {
        match severity {
            Severity::Warning => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
        self.diagnostics.push(Diagnostic {
            severity,
            message,
            location,
        });
    }
}
