//! # cpgraph - Language-agnostic code property graph engine
//!
//! cpgraph ingests abstract syntax trees produced by independent
//! per-language frontends and unifies them into a single in-memory,
//! multi-overlay intermediate representation suitable for cross-language
//! static analysis.
//!
//! The engine provides:
//! - A node/edge kernel with identity-based equality over an arena
//! - Coexisting overlay graphs: AST, evaluation order (EOG), data flow
//!   (DFG), control dependence (CDG), program dependence (PDG),
//!   invocations and usages - kept mutually consistent by mirrored edge
//!   containers
//! - Generic handler dispatch turning raw frontend nodes into graph nodes,
//!   with hierarchy-aware fallback and graceful problem-node degradation
//! - A dependency-aware pass scheduler with hard/soft ordering,
//!   per-language pass substitution and granularity-derived targets

pub mod edge;
pub mod frontend;
pub mod graph;
pub mod node;
pub mod passes;
pub mod translation;

// Re-exports for convenient access
pub use edge::{
    CallContextDirection, CallingContext, ControlDependence, Dataflow, DependenceType, Edge,
    EvaluationOrder, Granularity, Invoke, ProgramDependence, Usage,
};
pub use frontend::{Dispatcher, Frontend, Language, LanguageId, RawKind, RawKindTable, RawTree};
pub use graph::{CpgGraph, EdgeStore};
pub use node::{AccessKind, Node, NodeId, NodeKind, SourceLocation};
pub use passes::{Pass, PassDescriptor, PassGranularity, PassId, PassRegistry, Scheduler};
pub use translation::{
    ComponentSource, SourceUnit, TranslationConfiguration, TranslationManager, TranslationResult,
};

/// Result type alias for cpgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cpgraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown node kind: {0}")]
    UnknownKind(String),

    #[error("Node {child} already has AST parent {parent}")]
    AstParent { child: String, parent: String },

    #[error("No donor edge for program dependence {from} -> {to}")]
    MissingDonor { from: String, to: String },

    #[error("Pass not found: {0}")]
    PassNotFound(String),

    #[error("Pass '{pass}' could not be constructed: {reason}")]
    PassConstruction { pass: String, reason: String },

    #[error("Hard dependency cycle among passes: {0}")]
    DependencyCycle(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Frontend error: {0}")]
    Frontend(String),
}
