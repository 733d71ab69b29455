//! Pass model - named units of graph transformation
//!
//! A pass declares, through its [`PassDescriptor`]:
//! - a stable [`PassId`],
//! - the node granularity it operates on ([`PassGranularity`]),
//! - hard dependencies (must run first, pulled in even if not requested),
//! - soft dependencies (ordering preference among requested passes only).
//!
//! The [`PassRegistry`] maps ids to descriptors and fallible factories; the
//! [`scheduler`] orders and executes them. The bundled overlay-construction
//! passes live in the sibling modules.

pub mod calls;
pub mod cdg;
pub mod dfg;
pub mod eog;
pub mod pdg;
pub mod scheduler;
pub mod usage;

pub use scheduler::Scheduler;

use crate::graph::CpgGraph;
use crate::node::NodeId;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stable identifier of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PassId(pub &'static str);

impl std::fmt::Display for PassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The slice of the unified graph one pass invocation operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassGranularity {
    /// Once for the whole result, anchored at the arena origin
    WholeGraph,
    /// Once per component
    PerComponent,
    /// Once per translation unit
    PerUnit,
    /// Once per unique EOG starter
    PerEogStarter,
}

/// Static description of a pass: identity, granularity, dependencies.
#[derive(Debug, Clone)]
pub struct PassDescriptor {
    pub id: PassId,
    pub granularity: PassGranularity,
    /// Must run before this pass; pulled into the schedule unconditionally
    pub hard_depends_on: &'static [PassId],
    /// Run before this pass only if independently requested
    pub soft_depends_on: &'static [PassId],
}

/// A unit of graph transformation.
///
/// Passes mutate the unified graph in place and must be safe to re-run on
/// a target (idempotent); partial effects of an aborted run are never
/// rolled back.
pub trait Pass {
    /// The descriptor of this pass
    fn descriptor(&self) -> PassDescriptor;

    /// Run on one target node of the declared granularity
    fn run(&mut self, graph: &mut CpgGraph, target: NodeId) -> Result<()>;

    /// Tear down per-run state after all targets were consumed
    fn cleanup(&mut self) {}
}

/// Fallible pass constructor. A failing factory surfaces as
/// [`Error::PassConstruction`] without touching completed steps.
pub type PassFactory = Box<dyn Fn() -> Result<Box<dyn Pass>>>;

/// Registry of available passes.
#[derive(Default)]
pub struct PassRegistry {
    passes: IndexMap<PassId, (PassDescriptor, PassFactory)>,
}

impl PassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the bundled overlay-construction passes
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(eog::descriptor(), || Ok(Box::new(eog::EvaluationOrderPass)));
        registry.register(dfg::descriptor(), || Ok(Box::new(dfg::DataflowPass)));
        registry.register(cdg::descriptor(), || Ok(Box::new(cdg::ControlDependencePass)));
        registry.register(pdg::descriptor(), || Ok(Box::new(pdg::ProgramDependencePass)));
        registry.register(calls::descriptor(), || Ok(Box::new(calls::CallResolutionPass)));
        registry.register(usage::descriptor(), || Ok(Box::new(usage::UsagePass)));
        registry
    }

    /// Register a pass under its descriptor id
    pub fn register(
        &mut self,
        descriptor: PassDescriptor,
        factory: impl Fn() -> Result<Box<dyn Pass>> + 'static,
    ) {
        self.passes
            .insert(descriptor.id, (descriptor, Box::new(factory)));
    }

    /// Get the descriptor of a registered pass
    pub fn descriptor(&self, id: PassId) -> Result<&PassDescriptor> {
        self.passes
            .get(&id)
            .map(|(descriptor, _)| descriptor)
            .ok_or_else(|| Error::PassNotFound(id.to_string()))
    }

    /// Instantiate a registered pass
    pub fn create(&self, id: PassId) -> Result<Box<dyn Pass>> {
        let (_, factory) = self
            .passes
            .get(&id)
            .ok_or_else(|| Error::PassNotFound(id.to_string()))?;
        factory().map_err(|e| Error::PassConstruction {
            pass: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Check whether a pass id is registered
    pub fn contains(&self, id: PassId) -> bool {
        self.passes.contains_key(&id)
    }

    /// Position of a pass in registration order; used as the stable final
    /// tie-break during scheduling
    pub fn registration_index(&self, id: PassId) -> usize {
        self.passes.get_index_of(&id).unwrap_or(usize::MAX)
    }

    /// All registered pass ids, in registration order
    pub fn ids(&self) -> impl Iterator<Item = PassId> + '_ {
        self.passes.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_descriptor() -> PassDescriptor {
        PassDescriptor {
            id: PassId("noop"),
            granularity: PassGranularity::PerUnit,
            hard_depends_on: &[],
            soft_depends_on: &[],
        }
    }

    struct Noop(PassDescriptor);

    impl Pass for Noop {
        fn descriptor(&self) -> PassDescriptor {
            self.0.clone()
        }
        fn run(&mut self, _graph: &mut CpgGraph, _target: NodeId) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = PassRegistry::new();
        registry.register(noop_descriptor(), || Ok(Box::new(Noop(noop_descriptor()))));

        assert!(registry.contains(PassId("noop")));
        assert!(registry.descriptor(PassId("noop")).is_ok());
        assert!(registry.create(PassId("noop")).is_ok());
        assert!(matches!(
            registry.descriptor(PassId("missing")),
            Err(Error::PassNotFound(_))
        ));
    }

    #[test]
    fn test_failing_factory_is_named() {
        let mut registry = PassRegistry::new();
        registry.register(noop_descriptor(), || {
            Err(Error::Frontend("no context".into()))
        });

        let err = registry.create(PassId("noop")).err().unwrap();
        match err {
            Error::PassConstruction { pass, .. } => assert_eq!(pass, "noop"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_registry_carries_builders() {
        let registry = PassRegistry::with_defaults();
        for id in ["evaluation-order", "dataflow", "control-dependence", "program-dependence", "call-resolution", "usage"] {
            assert!(registry.contains(PassId(id)), "missing pass {id}");
        }
    }
}
