//! Translation orchestration
//!
//! [`TranslationManager`] drives the whole engine: one frontend/dispatcher
//! pair per source unit (on parallel worker threads when enabled - no
//! mutable state is shared across units), unit fragments absorbed into one
//! unified [`CpgGraph`] under component nodes, then the single-threaded
//! pass phase over the unified graph.
//!
//! A unit that cannot be parsed degrades to a problem node plus a
//! diagnostic; translation never fails wholesale because one unit is bad.

use crate::frontend::{Diagnostic, Dispatcher, Frontend, Language, LanguageId, LanguageRegistry, Severity};
use crate::graph::CpgGraph;
use crate::node::{NodeId, NodeKind};
use crate::passes::scheduler::RunReport;
use crate::passes::{self, PassDescriptor, PassId, PassRegistry, Scheduler};
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// One source artifact to translate.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Path of the artifact, relative to the component root
    pub artifact: String,
    /// Raw source text
    pub code: String,
    /// Language the unit is written in
    pub language: LanguageId,
}

/// One component (library or application) made of source units.
#[derive(Debug, Clone)]
pub struct ComponentSource {
    pub name: String,
    pub units: Vec<SourceUnit>,
}

/// Factory producing a fresh frontend per translation unit.
pub type FrontendFactory = Box<dyn Fn() -> Box<dyn Frontend> + Send + Sync>;

/// Everything a translation run is configured with: languages, frontend
/// factories, the pass registry and the default pipeline.
pub struct TranslationConfiguration {
    pub(crate) languages: LanguageRegistry,
    frontends: HashMap<LanguageId, FrontendFactory>,
    pub(crate) registry: PassRegistry,
    default_passes: Vec<PassId>,
    parallel: bool,
}

impl Default for TranslationConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationConfiguration {
    /// Configuration with the bundled passes and the default pipeline
    pub fn new() -> Self {
        Self {
            languages: LanguageRegistry::new(),
            frontends: HashMap::new(),
            registry: PassRegistry::with_defaults(),
            default_passes: vec![
                passes::eog::ID,
                passes::dfg::ID,
                passes::cdg::ID,
                passes::pdg::ID,
                passes::calls::ID,
                passes::usage::ID,
            ],
            parallel: true,
        }
    }

    /// Register a language and return its id
    pub fn register_language(&mut self, language: Language) -> LanguageId {
        self.languages.register(language)
    }

    /// Register the frontend factory for a language
    pub fn register_frontend(
        &mut self,
        language: LanguageId,
        factory: impl Fn() -> Box<dyn Frontend> + Send + Sync + 'static,
    ) {
        self.frontends.insert(language, Box::new(factory));
    }

    /// Register an additional pass
    pub fn register_pass(
        &mut self,
        descriptor: PassDescriptor,
        factory: impl Fn() -> Result<Box<dyn crate::passes::Pass>> + 'static,
    ) {
        self.registry.register(descriptor, factory);
    }

    /// Replace the default pass pipeline
    pub fn with_default_passes(mut self, passes: Vec<PassId>) -> Self {
        self.default_passes = passes;
        self
    }

    /// Translate units sequentially even when there are several
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// What one worker hands back to the coordinator.
enum TranslationMessage {
    Translated {
        index: usize,
        fragment: CpgGraph,
        root: NodeId,
        diagnostics: Vec<Diagnostic>,
    },
    Failed {
        index: usize,
        artifact: String,
        error: String,
    },
}

impl TranslationMessage {
    fn index(&self) -> usize {
        match self {
            TranslationMessage::Translated { index, .. } => *index,
            TranslationMessage::Failed { index, .. } => *index,
        }
    }
}

/// Summary counters of one translation run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TranslationStats {
    pub units: usize,
    pub failed_units: usize,
    pub nodes: usize,
    pub problem_nodes: usize,
    pub pass_steps: usize,
    pub diagnostics: usize,
}

impl std::fmt::Display for TranslationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Translation Stats:")?;
        writeln!(f, "  Units: {} ({} failed)", self.units, self.failed_units)?;
        writeln!(f, "  Nodes: {} ({} problems)", self.nodes, self.problem_nodes)?;
        writeln!(f, "  Pass steps: {}", self.pass_steps)?;
        writeln!(f, "  Diagnostics: {}", self.diagnostics)
    }
}

/// Outcome of a translation: the unified graph, its component roots, all
/// diagnostics, the executed pass steps and summary counters.
pub struct TranslationResult {
    pub graph: CpgGraph,
    pub components: Vec<NodeId>,
    pub diagnostics: Vec<Diagnostic>,
    pub report: RunReport,
    pub stats: TranslationStats,
}

/// Drives frontends, fragment absorption and the pass phase.
pub struct TranslationManager {
    config: TranslationConfiguration,
}

impl TranslationManager {
    pub fn new(config: TranslationConfiguration) -> Self {
        Self { config }
    }

    /// Translate all components into one unified graph and run the default
    /// pass pipeline over it.
    pub fn translate(&self, sources: Vec<ComponentSource>) -> Result<TranslationResult> {
        let mut graph = CpgGraph::new();
        let mut components = Vec::new();
        let mut diagnostics = Vec::new();
        let mut units = 0;
        let mut failed_units = 0;

        for component in sources {
            let component_id = graph.new_named_node(NodeKind::Component, &component.name);
            components.push(component_id);
            units += component.units.len();

            let mut messages = self.translate_units(&component.units);
            // Workers finish in arbitrary order; absorption stays
            // deterministic.
            messages.sort_by_key(TranslationMessage::index);

            for message in messages {
                match message {
                    TranslationMessage::Translated {
                        fragment,
                        root,
                        diagnostics: unit_diagnostics,
                        ..
                    } => {
                        let offset = graph.absorb(fragment);
                        let root = NodeId(root.0 + offset);
                        graph.add_ast_child(component_id, root)?;
                        diagnostics.extend(unit_diagnostics);
                    }
                    TranslationMessage::Failed { artifact, error, .. } => {
                        failed_units += 1;
                        let message = format!("translation of '{artifact}' failed: {error}");
                        let problem = graph.new_problem_node(message.clone());
                        graph.add_ast_child(component_id, problem)?;
                        diagnostics.push(Diagnostic {
                            severity: Severity::Error,
                            message,
                            location: None,
                        });
                    }
                }
            }
        }

        // All overlay mutation happens here, single-threaded.
        let mut scheduler = Scheduler::new(&self.config.registry, &self.config.languages);
        let mut report = RunReport {
            ordered: true,
            ..Default::default()
        };
        for &component in &components {
            let run = scheduler.run(&mut graph, component, &self.config.default_passes)?;
            report.steps.extend(run.steps);
        }

        let stats = TranslationStats {
            units,
            failed_units,
            nodes: graph.len(),
            problem_nodes: graph.nodes_of_kind(NodeKind::Problem).len(),
            pass_steps: report.steps.len(),
            diagnostics: diagnostics.len(),
        };
        info!(%stats, "translation finished");

        Ok(TranslationResult {
            graph,
            components,
            diagnostics,
            report,
            stats,
        })
    }

    fn translate_units(&self, units: &[SourceUnit]) -> Vec<TranslationMessage> {
        if self.config.parallel && units.len() > 1 {
            let frontends = &self.config.frontends;
            let (tx, rx) = crossbeam::channel::unbounded();
            std::thread::scope(|scope| {
                for (index, unit) in units.iter().enumerate() {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        let message = match translate_unit(frontends, unit) {
                            Ok((fragment, root, diagnostics)) => TranslationMessage::Translated {
                                index,
                                fragment,
                                root,
                                diagnostics,
                            },
                            Err(e) => TranslationMessage::Failed {
                                index,
                                artifact: unit.artifact.clone(),
                                error: e.to_string(),
                            },
                        };
                        let _ = tx.send(message);
                    });
                }
                drop(tx);
                rx.iter().collect()
            })
        } else {
            units
                .iter()
                .enumerate()
                .map(|(index, unit)| match translate_unit(&self.config.frontends, unit) {
                    Ok((fragment, root, diagnostics)) => TranslationMessage::Translated {
                        index,
                        fragment,
                        root,
                        diagnostics,
                    },
                    Err(e) => TranslationMessage::Failed {
                        index,
                        artifact: unit.artifact.clone(),
                        error: e.to_string(),
                    },
                })
                .collect()
        }
    }
}

/// One frontend/dispatcher pair, one unit, one private graph fragment.
fn translate_unit(
    frontends: &HashMap<LanguageId, FrontendFactory>,
    unit: &SourceUnit,
) -> Result<(CpgGraph, NodeId, Vec<Diagnostic>)> {
    let factory = frontends
        .get(&unit.language)
        .ok_or_else(|| Error::UnknownLanguage(unit.language.to_string()))?;
    let mut frontend = factory();

    let tree = frontend.parse(&unit.artifact, &unit.code)?;
    let root = tree
        .root()
        .ok_or_else(|| Error::Parse(format!("'{}' parsed to an empty tree", unit.artifact)))?;

    let mut dispatcher = Dispatcher::new(unit.language, frontend.kinds());
    frontend.register_handlers(&mut dispatcher);

    debug!(artifact = unit.artifact, nodes = tree.len(), "translating unit");
    let root = dispatcher.handle(&tree, root);
    let (fragment, diagnostics) = dispatcher.finish();
    Ok((fragment, root, diagnostics))
}
