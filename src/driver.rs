use anyhow::Result;

use graph::JobGraph;
use model::{PipelineDefinition, Registry, SchedulerLimits};

use crate::gen::{self, ScriptArtifact};

/// Compiles pipeline definition text into script artifacts.
/// Pure and synchronous; holds no external resources, so a run can be
/// abandoned at any point. Component errors pass through with stage
/// context attached but their original kind intact.
pub struct Pipeline {
    limits: SchedulerLimits,
    registry: Registry,
}

impl Pipeline {
    pub fn new(limits: SchedulerLimits) -> Self {
        Self::with_registry(limits, Registry::default())
    }

    /// Use a custom application registry instead of the built-in set.
    pub fn with_registry(limits: SchedulerLimits, registry: Registry) -> Self {
        Self { limits, registry }
    }

    /// parse -> load -> graph. Exposed separately so callers can
    /// inspect the graph (e.g. to print a summary) before rendering.
    pub fn compile(&self, text: &str) -> Result<JobGraph> {
        let items = syntax::parse(text)?;
        let definition = PipelineDefinition::load(items)?;
        JobGraph::build(&definition, &self.limits, &self.registry)
    }

    /// Full run: compile the text and render every artifact, in the
    /// graph's deterministic order. All or nothing; a failure in any
    /// stage means no artifacts at all.
    pub fn generate(&self, text: &str) -> Result<Vec<ScriptArtifact>> {
        let graph = self.compile(text)?;
        Ok(gen::render(&graph))
    }
}
