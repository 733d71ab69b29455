//! Node kernel - identity-bearing vertices of the code property graph
//!
//! Every semantic program element (declaration, statement, expression, or a
//! pseudo-element such as a problem marker) is one [`Node`] living in the
//! graph arena. Nodes are identified by [`NodeId`] and compared by identity
//! only - never structurally, because overlay edges may form cycles.

use crate::{Error, Result};
use crate::frontend::LanguageId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stable node identifier. An index into the [`CpgGraph`](crate::CpgGraph)
/// arena that created the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Convert to an arena index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Closed taxonomy of semantic elements the engine models.
///
/// Frontends for any language map their constructs onto these kinds. The
/// set is deliberately closed: passes and queries match on it exhaustively
/// instead of walking an open class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A software component: one library or application, grouping units
    Component,
    /// One translated source file
    TranslationUnit,
    /// Class, struct, interface - a record with members
    RecordDeclaration,
    /// A free function
    FunctionDeclaration,
    /// A function bound to a record
    MethodDeclaration,
    /// A member of a record
    FieldDeclaration,
    /// A local or global variable
    VariableDeclaration,
    /// A parameter of a callable
    ParameterDeclaration,
    /// A compound statement
    Block,
    /// A conditional statement with labeled branches
    IfStatement,
    /// Return from a callable
    ReturnStatement,
    /// Invocation of a callable
    CallExpression,
    /// Access of a field through a base object
    MemberAccessExpression,
    /// A usage of a declared name
    Reference,
    /// A literal value
    Literal,
    /// A binary operation
    BinaryOperator,
    /// Placeholder for an element that could not be translated
    Problem,
}

impl NodeKind {
    /// Get the string representation of the node kind
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Component => "component",
            NodeKind::TranslationUnit => "translation_unit",
            NodeKind::RecordDeclaration => "record_declaration",
            NodeKind::FunctionDeclaration => "function_declaration",
            NodeKind::MethodDeclaration => "method_declaration",
            NodeKind::FieldDeclaration => "field_declaration",
            NodeKind::VariableDeclaration => "variable_declaration",
            NodeKind::ParameterDeclaration => "parameter_declaration",
            NodeKind::Block => "block",
            NodeKind::IfStatement => "if_statement",
            NodeKind::ReturnStatement => "return_statement",
            NodeKind::CallExpression => "call_expression",
            NodeKind::MemberAccessExpression => "member_access_expression",
            NodeKind::Reference => "reference",
            NodeKind::Literal => "literal",
            NodeKind::BinaryOperator => "binary_operator",
            NodeKind::Problem => "problem",
        }
    }

    /// Check if this kind is a declaration
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::RecordDeclaration
                | NodeKind::FunctionDeclaration
                | NodeKind::MethodDeclaration
                | NodeKind::FieldDeclaration
                | NodeKind::VariableDeclaration
                | NodeKind::ParameterDeclaration
        )
    }

    /// Check if this kind is a callable declaration
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDeclaration | NodeKind::MethodDeclaration
        )
    }

    /// Check if nodes of this kind own independent evaluation-order paths.
    ///
    /// Holders record the entry nodes of those paths in
    /// [`Node::eog_starters`]: a translation unit starts one for its
    /// top-level code, a record for its field initializers, a callable for
    /// its body.
    pub fn is_eog_starter_holder(&self) -> bool {
        matches!(
            self,
            NodeKind::TranslationUnit
                | NodeKind::RecordDeclaration
                | NodeKind::FunctionDeclaration
                | NodeKind::MethodDeclaration
        )
    }

    /// Check if nodes of this kind carry inferable type information.
    ///
    /// Sources of this kind participate in type observation: inserting a
    /// data-flow edge out of them subscribes the receiving reference to
    /// later type changes.
    pub fn carries_type_info(&self) -> bool {
        matches!(
            self,
            NodeKind::Literal
                | NodeKind::CallExpression
                | NodeKind::FunctionDeclaration
                | NodeKind::MethodDeclaration
                | NodeKind::Reference
        )
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "component" => Ok(NodeKind::Component),
            "translation_unit" | "unit" | "file" => Ok(NodeKind::TranslationUnit),
            "record_declaration" | "record" | "class" | "struct" => Ok(NodeKind::RecordDeclaration),
            "function_declaration" | "function" | "fn" => Ok(NodeKind::FunctionDeclaration),
            "method_declaration" | "method" => Ok(NodeKind::MethodDeclaration),
            "field_declaration" | "field" => Ok(NodeKind::FieldDeclaration),
            "variable_declaration" | "variable" | "var" => Ok(NodeKind::VariableDeclaration),
            "parameter_declaration" | "parameter" | "param" => Ok(NodeKind::ParameterDeclaration),
            "block" => Ok(NodeKind::Block),
            "if_statement" | "if" => Ok(NodeKind::IfStatement),
            "return_statement" | "return" => Ok(NodeKind::ReturnStatement),
            "call_expression" | "call" => Ok(NodeKind::CallExpression),
            "member_access_expression" | "member_access" => Ok(NodeKind::MemberAccessExpression),
            "reference" | "ref" => Ok(NodeKind::Reference),
            "literal" => Ok(NodeKind::Literal),
            "binary_operator" | "binop" => Ok(NodeKind::BinaryOperator),
            "problem" => Ok(NodeKind::Problem),
            _ => Err(Error::UnknownKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a reference accesses the value it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// The value is only read
    Read,
    /// The value is only written
    Write,
    /// The value is read and written (e.g. compound assignment)
    ReadWrite,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
            AccessKind::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// A position range within one source artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path of the source artifact, relative to the component root
    pub artifact: String,
    /// Starting line (1-indexed)
    pub start_line: u32,
    /// Starting column (1-indexed)
    pub start_column: u32,
    /// Ending line (1-indexed, inclusive)
    pub end_line: u32,
    /// Ending column (1-indexed, inclusive)
    pub end_column: u32,
}

impl SourceLocation {
    pub fn new(artifact: impl Into<String>, start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            artifact: artifact.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.artifact, self.start_line, self.start_column)
    }
}

/// A node in the code property graph.
///
/// Nodes are created by handler dispatch during frontend translation (or by
/// graph factory methods) and mutated in place by later passes: edges are
/// added, types attached, observers registered. Nodes are never deleted -
/// untranslatable elements become [`NodeKind::Problem`] markers instead.
#[derive(Debug, Clone)]
pub struct Node {
    /// Identity within the owning graph arena
    pub id: NodeId,
    /// Semantic kind
    pub kind: NodeKind,
    /// Declared or referenced name, where one exists
    pub name: Option<String>,
    /// Source range this node was translated from
    pub location: Option<SourceLocation>,
    /// Raw source text of the element
    pub code: Option<String>,
    /// Language the node was translated from
    pub language: Option<LanguageId>,
    /// Owning AST parent. Weak: navigation only, the arena owns the node.
    pub ast_parent: Option<NodeId>,
    /// Declared or propagated type name
    pub ty: Option<String>,
    /// Access annotation. Only meaningful on [`NodeKind::Reference`] nodes.
    pub access: Option<AccessKind>,
    /// Declaration this reference resolves to. Filled by external symbol
    /// resolution; only meaningful on [`NodeKind::Reference`] nodes.
    pub refers_to: Option<NodeId>,
    /// Entry nodes of independent evaluation-order paths owned by this
    /// node. Only populated on kinds where
    /// [`NodeKind::is_eog_starter_holder`] holds.
    pub eog_starters: Vec<NodeId>,
    /// Nodes to notify when this node's type becomes known or changes
    pub type_observers: Vec<NodeId>,
    /// Human-readable message. Only meaningful on [`NodeKind::Problem`].
    pub problem: Option<String>,
}

impl Node {
    /// Create a new node. Exposed for the graph arena; frontends go through
    /// [`CpgGraph::new_node`](crate::CpgGraph::new_node) instead.
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            location: None,
            code: None,
            language: None,
            ast_parent: None,
            ty: None,
            access: None,
            refers_to: None,
            eog_starters: Vec::new(),
            type_observers: Vec::new(),
            problem: None,
        }
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register an observer to be notified when this node's type changes.
    /// Duplicate registrations are ignored.
    pub fn register_type_observer(&mut self, observer: NodeId) {
        if !self.type_observers.contains(&observer) {
            self.type_observers.push(observer);
        }
    }

    /// Get a short description for display
    pub fn short_description(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.kind, name),
            None => self.kind.to_string(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_roundtrip() {
        for kind in [
            NodeKind::Component,
            NodeKind::TranslationUnit,
            NodeKind::RecordDeclaration,
            NodeKind::FunctionDeclaration,
            NodeKind::CallExpression,
            NodeKind::Reference,
            NodeKind::Problem,
        ] {
            let parsed: NodeKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_node_kind_aliases() {
        assert_eq!(NodeKind::from_str("class").unwrap(), NodeKind::RecordDeclaration);
        assert_eq!(NodeKind::from_str("fn").unwrap(), NodeKind::FunctionDeclaration);
        assert_eq!(NodeKind::from_str("file").unwrap(), NodeKind::TranslationUnit);
    }

    #[test]
    fn test_starter_holders() {
        assert!(NodeKind::TranslationUnit.is_eog_starter_holder());
        assert!(NodeKind::RecordDeclaration.is_eog_starter_holder());
        assert!(NodeKind::MethodDeclaration.is_eog_starter_holder());
        assert!(!NodeKind::Block.is_eog_starter_holder());
        assert!(!NodeKind::CallExpression.is_eog_starter_holder());
    }

    #[test]
    fn test_identity_equality() {
        let mut a = Node::new(NodeId(1), NodeKind::Literal).with_name("x");
        let b = Node::new(NodeId(1), NodeKind::Reference);
        // Same id means same node, regardless of diverging payload.
        assert_eq!(a, b);
        a.ty = Some("int".into());
        assert_eq!(a, b);
        assert_ne!(a, Node::new(NodeId(2), NodeKind::Literal));
    }

    #[test]
    fn test_type_observer_dedup() {
        let mut node = Node::new(NodeId(0), NodeKind::Literal);
        node.register_type_observer(NodeId(7));
        node.register_type_observer(NodeId(7));
        assert_eq!(node.type_observers, vec![NodeId(7)]);
    }
}
