use anyhow::Result;

use model::{PipelineDefinition, Registry, SchedulerLimits};
use util::IdVec;

use crate::build::GraphBuilder;
use crate::{JobId, JobNode};

/// A validated, acyclic graph of job nodes with a deterministic
/// total order consistent with the dependency partial order.
#[derive(Debug)]
pub struct JobGraph {
    nodes: IdVec<JobId, JobNode>,
    order: Vec<JobId>,
}

impl JobGraph {
    /// Build the job graph for a definition: normalize resources and
    /// build commands per stage, wire dependency edges, reject
    /// cycles, and compute the emission order.
    pub fn build(
        definition: &PipelineDefinition,
        limits: &SchedulerLimits,
        registry: &Registry,
    ) -> Result<Self> {
        let builder = GraphBuilder::new(definition, limits, registry);
        let (nodes, order) = builder.build()?;
        log::debug!("built job graph with {} nodes", nodes.len());
        Ok(Self { nodes, order })
    }

    /// Get the node with the given id.
    #[inline]
    pub fn get(&self, id: JobId) -> &JobNode {
        self.nodes.get(id)
    }

    /// Nodes in deterministic topological order: every predecessor
    /// appears before its dependents.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &JobNode> {
        self.order.iter().map(|&id| self.nodes.get(id))
    }

    /// Predecessor stage names of a node, in declaration order.
    pub fn dep_names(&self, node: &JobNode) -> Vec<&str> {
        node.deps.iter().map(|&d| self.nodes.get(d).name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
