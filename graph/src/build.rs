use anyhow::{Context, Result};

use model::{PipelineDefinition, Registry, ResourceSpec, SchedulerLimits};
use util::IdVec;

use crate::{Error, JobId, JobNode};

/// Three-color marking for the cycle-detecting depth-first traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Builds the node arena and emission order for a [`crate::JobGraph`].
pub struct GraphBuilder<'a> {
    definition: &'a PipelineDefinition,
    limits: &'a SchedulerLimits,
    registry: &'a Registry,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        definition: &'a PipelineDefinition,
        limits: &'a SchedulerLimits,
        registry: &'a Registry,
    ) -> Self {
        Self {
            definition,
            limits,
            registry,
        }
    }

    pub fn build(self) -> Result<(IdVec<JobId, JobNode>, Vec<JobId>)> {
        let mut nodes = self.make_nodes()?;
        self.wire_edges(&mut nodes)?;
        check_cycles(&nodes)?;
        let order = emission_order(&nodes);
        Ok((nodes, order))
    }

    /// Step 1: one node per stage, no edges yet. Resource and command
    /// errors propagate with the stage name attached; their underlying
    /// kind stays downcastable.
    fn make_nodes(&self) -> Result<IdVec<JobId, JobNode>> {
        let mut nodes = IdVec::with_capacity(self.definition.len());
        for (idx, stage) in self.definition.stages().iter().enumerate() {
            let resources = ResourceSpec::normalize(
                &stage.kind,
                &stage.overrides,
                self.definition.defaults(),
                self.limits,
            )
            .with_context(|| format!("in stage '{}'", stage.name))?;

            let command = self
                .registry
                .build(&stage.app, &stage.params)
                .with_context(|| format!("in stage '{}'", stage.name))?;

            nodes.push(JobNode {
                name: stage.name.clone(),
                kind: stage.kind,
                resources,
                command,
                deps: Vec::with_capacity(stage.after.len()),
                def_index: idx,
            });
        }
        Ok(nodes)
    }

    /// Step 2: resolve declared predecessor names to node ids.
    fn wire_edges(&self, nodes: &mut IdVec<JobId, JobNode>) -> Result<()> {
        for (idx, stage) in self.definition.stages().iter().enumerate() {
            for dep in &stage.after {
                // existence was checked when the definition loaded:
                let dep_idx = self
                    .definition
                    .position(dep)
                    .with_context(|| format!("unresolved predecessor '{dep}'"))?;
                nodes.get_mut(JobId::from(idx)).deps.push(JobId::from(dep_idx));
            }
        }
        Ok(())
    }
}

/// Step 3: depth-first traversal with three-color marking; an edge
/// back to an in-progress node is a cycle. A stage that names itself
/// as a predecessor forms a one-node cycle and is caught here too.
fn check_cycles(nodes: &IdVec<JobId, JobNode>) -> Result<(), Error> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut path = Vec::new();
    for start in 0..nodes.len() {
        if marks[start] == Mark::Unvisited {
            visit(start, nodes, &mut marks, &mut path)?;
        }
    }
    Ok(())
}

fn visit(
    idx: usize,
    nodes: &IdVec<JobId, JobNode>,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
) -> Result<(), Error> {
    marks[idx] = Mark::InProgress;
    path.push(idx);
    for &dep in &nodes.get(JobId::from(idx)).deps {
        let dep: usize = dep.into();
        match marks[dep] {
            Mark::Unvisited => visit(dep, nodes, marks, path)?,
            Mark::InProgress => {
                // the cycle is the current path from the back edge's
                // target onward:
                let from = path.iter().position(|&p| p == dep).unwrap_or(0);
                let members = path[from..]
                    .iter()
                    .map(|&p| nodes.get(JobId::from(p)).name.clone())
                    .collect();
                return Err(Error::CycleDetected { members });
            }
            Mark::Done => {}
        }
    }
    path.pop();
    marks[idx] = Mark::Done;
    Ok(())
}

/// Step 4: deterministic total order. Primary key is dependency depth
/// (a node is always strictly deeper than its predecessors), ties are
/// broken by definition order, so repeated runs over the same
/// definition emit identical sequences.
fn emission_order(nodes: &IdVec<JobId, JobNode>) -> Vec<JobId> {
    let mut memo = vec![None; nodes.len()];
    let mut order: Vec<JobId> = nodes.enumerate().map(|(id, _)| id).collect();
    order.sort_by_key(|&id| (depth_of(id.into(), nodes, &mut memo), nodes.get(id).def_index));
    order
}

fn depth_of(idx: usize, nodes: &IdVec<JobId, JobNode>, memo: &mut Vec<Option<u32>>) -> u32 {
    if let Some(d) = memo[idx] {
        return d;
    }
    let d = nodes
        .get(JobId::from(idx))
        .deps
        .iter()
        .map(|&dep| depth_of(dep.into(), nodes, memo) + 1)
        .max()
        .unwrap_or(0);
    memo[idx] = Some(d);
    d
}
