use model::{JobKind, ResourceSpec};

use crate::JobId;

/// One schedulable job, fully resolved: resources normalized,
/// command built, predecessor edges wired. Immutable after the
/// graph is built.
#[derive(Debug)]
pub struct JobNode {
    /// Stage name this node was built from (the node's identity).
    pub name: String,
    /// Job-type variant.
    pub kind: JobKind,
    /// Normalized resource request.
    pub resources: ResourceSpec,
    /// Literal command invocation for the script body.
    pub command: String,
    /// Ids of predecessor nodes, in declaration order.
    pub deps: Vec<JobId>,
    /// Position of the originating stage in the definition file,
    /// used to break ties when ordering nodes.
    pub def_index: usize,
}
