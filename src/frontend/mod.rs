//! Frontend model - languages, raw trees, and the frontend contract
//!
//! Per-language parsers live outside this crate. What they hand over is a
//! [`RawTree`]: an arena of [`RawNode`]s tagged with kinds from a
//! frontend-declared [`RawKindTable`]. The table fixes each kind's parent
//! kind and literal flag at startup, so handler dispatch can generalize to
//! ancestor kinds without any runtime type reflection.

pub mod dispatch;

pub use dispatch::{Diagnostic, Dispatcher, Severity};

use crate::Result;
use crate::node::SourceLocation;
use crate::passes::PassId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of a registered language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageId(pub u32);

impl std::fmt::Display for LanguageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lang{}", self.0)
    }
}

/// A source language known to the engine.
///
/// Besides its name, a language may declare pass substitutions: "when pass
/// P would run on one of my nodes, run P' instead". The scheduler consults
/// this table at execution time; dependency ordering keeps referring to the
/// original pass.
#[derive(Debug, Clone)]
pub struct Language {
    name: String,
    pass_replacements: IndexMap<PassId, PassId>,
}

impl Language {
    /// Create a new language with the given display name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pass_replacements: IndexMap::new(),
        }
    }

    /// Get the language name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare that `replacement` runs in place of `base` for this language
    pub fn replace_pass(mut self, base: PassId, replacement: PassId) -> Self {
        self.pass_replacements.insert(base, replacement);
        self
    }

    /// Look up the replacement for a pass, if any
    pub fn replacement_for(&self, base: PassId) -> Option<PassId> {
        self.pass_replacements.get(&base).copied()
    }
}

/// Registry of languages participating in a translation.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
}

impl LanguageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a language and return its id
    pub fn register(&mut self, language: Language) -> LanguageId {
        let id = LanguageId(self.languages.len() as u32);
        self.languages.push(language);
        id
    }

    /// Get a language by id
    pub fn get(&self, id: LanguageId) -> Option<&Language> {
        self.languages.get(id.0 as usize)
    }

    /// All registered languages
    pub fn iter(&self) -> impl Iterator<Item = (LanguageId, &Language)> {
        self.languages
            .iter()
            .enumerate()
            .map(|(i, l)| (LanguageId(i as u32), l))
    }
}

/// Interned raw-node kind within one frontend's [`RawKindTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawKind(pub u16);

#[derive(Debug, Clone)]
struct RawKindInfo {
    name: String,
    parent: Option<RawKind>,
    literal: bool,
}

/// The closed kind hierarchy a frontend declares for its raw nodes.
///
/// Built once at frontend startup. Each kind names an optional parent kind
/// (the generalization dispatch falls back to) and whether the kind is a
/// literal-expression variant, for which ancestor fallback is expected and
/// not diagnosed.
#[derive(Debug, Clone, Default)]
pub struct RawKindTable {
    kinds: Vec<RawKindInfo>,
    by_name: IndexMap<String, RawKind>,
}

impl RawKindTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind under an optional parent kind
    pub fn register(&mut self, name: impl Into<String>, parent: Option<RawKind>) -> RawKind {
        self.register_info(name.into(), parent, false)
    }

    /// Register a literal-expression kind under an optional parent kind
    pub fn register_literal(&mut self, name: impl Into<String>, parent: Option<RawKind>) -> RawKind {
        self.register_info(name.into(), parent, true)
    }

    fn register_info(&mut self, name: String, parent: Option<RawKind>, literal: bool) -> RawKind {
        let kind = RawKind(self.kinds.len() as u16);
        self.by_name.insert(name.clone(), kind);
        self.kinds.push(RawKindInfo {
            name,
            parent,
            literal,
        });
        kind
    }

    /// Get the display name of a kind
    pub fn name(&self, kind: RawKind) -> &str {
        &self.kinds[kind.0 as usize].name
    }

    /// Get the parent kind, if the kind is not a hierarchy root
    pub fn parent(&self, kind: RawKind) -> Option<RawKind> {
        self.kinds[kind.0 as usize].parent
    }

    /// Check whether a kind is a literal-expression variant.
    ///
    /// The single place where the "ancestor match is fine for literals"
    /// special case lives; dispatch consults it and nothing else does.
    pub fn is_literal(&self, kind: RawKind) -> bool {
        self.kinds[kind.0 as usize].literal
    }

    /// Look up a kind by name
    pub fn lookup(&self, name: &str) -> Option<RawKind> {
        self.by_name.get(name).copied()
    }
}

/// Index of a raw node within its [`RawTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawNodeId(pub u32);

/// One node of a frontend-produced raw tree.
#[derive(Debug, Clone)]
pub struct RawNode {
    /// Kind tag from the frontend's table
    pub kind: RawKind,
    /// Declared or referenced name, if the construct has one
    pub name: Option<String>,
    /// Literal value text, for literal-shaped nodes
    pub value: Option<String>,
    /// Raw source text of the construct
    pub code: Option<String>,
    /// Source range of the construct
    pub location: Option<SourceLocation>,
    /// Child nodes, in source order
    pub children: Vec<RawNodeId>,
}

/// A frontend-produced abstract syntax tree, arena-backed like the graph.
#[derive(Debug, Clone, Default)]
pub struct RawTree {
    nodes: Vec<RawNode>,
    root: Option<RawNodeId>,
}

impl RawTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node of the given kind
    pub fn add(&mut self, kind: RawKind) -> RawNodeId {
        let id = RawNodeId(self.nodes.len() as u32);
        self.nodes.push(RawNode {
            kind,
            name: None,
            value: None,
            code: None,
            location: None,
            children: Vec::new(),
        });
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Add a named node of the given kind
    pub fn add_named(&mut self, kind: RawKind, name: impl Into<String>) -> RawNodeId {
        let id = self.add(kind);
        self.nodes[id.0 as usize].name = Some(name.into());
        id
    }

    /// Append a child to a node
    pub fn add_child(&mut self, parent: RawNodeId, child: RawNodeId) {
        self.nodes[parent.0 as usize].children.push(child);
    }

    /// Get a node by id
    pub fn node(&self, id: RawNodeId) -> &RawNode {
        &self.nodes[id.0 as usize]
    }

    /// Get a node mutably by id
    pub fn node_mut(&mut self, id: RawNodeId) -> &mut RawNode {
        &mut self.nodes[id.0 as usize]
    }

    /// The first node added to the tree, by convention its root
    pub fn root(&self) -> Option<RawNodeId> {
        self.root
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Contract implemented by per-language frontends (external collaborators).
///
/// One frontend instance serves one translation unit at a time; the
/// manager creates a fresh frontend/dispatcher pair per unit, so parallel
/// units never share mutable frontend state.
pub trait Frontend {
    /// The language this frontend translates
    fn language(&self) -> LanguageId;

    /// The raw-kind hierarchy this frontend tags its nodes with
    fn kinds(&self) -> Arc<RawKindTable>;

    /// Parse one source artifact into a raw tree
    fn parse(&mut self, artifact: &str, code: &str) -> Result<RawTree>;

    /// Register this frontend's conversion handlers on a dispatcher
    fn register_handlers(&self, dispatcher: &mut Dispatcher);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_table_hierarchy() {
        let mut table = RawKindTable::new();
        let expr = table.register("expression", None);
        let call = table.register("call", Some(expr));
        let int_lit = table.register_literal("int_literal", Some(expr));

        assert_eq!(table.parent(call), Some(expr));
        assert_eq!(table.parent(expr), None);
        assert!(table.is_literal(int_lit));
        assert!(!table.is_literal(call));
        assert_eq!(table.lookup("call"), Some(call));
        assert_eq!(table.name(expr), "expression");
    }

    #[test]
    fn test_raw_tree_builder() {
        let mut table = RawKindTable::new();
        let unit = table.register("unit", None);
        let func = table.register("function", None);

        let mut tree = RawTree::new();
        let root = tree.add(unit);
        let f = tree.add_named(func, "main");
        tree.add_child(root, f);

        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.node(root).children, vec![f]);
        assert_eq!(tree.node(f).name.as_deref(), Some("main"));
    }

    #[test]
    fn test_language_replacements() {
        let lang = Language::new("go").replace_pass(PassId("dataflow"), PassId("dataflow-go"));
        assert_eq!(
            lang.replacement_for(PassId("dataflow")),
            Some(PassId("dataflow-go"))
        );
        assert_eq!(lang.replacement_for(PassId("usage")), None);
    }
}
