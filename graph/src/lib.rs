//!
//! Builds a directed acyclic graph of job nodes from a parsed pipeline
//! definition, and computes the deterministic order in which their
//! scripts must be emitted and submitted.
//!
//! The graph is built in 3 steps:
//! 1. Normalize each stage's resources and build its command, producing one node per stage.
//! 2. Wire predecessor edges from the declared dependency names.
//! 3. Reject cycles, then sort nodes by (dependency depth, definition order).
//!
//! The resulting order is total and reproducible: two runs over the
//! same definition always emit nodes in the same sequence, and a
//! predecessor always appears before its dependents.

mod node;
pub use node::JobNode;

mod graph;
pub use graph::JobGraph;

mod build;

macro_rules! id {
    ($name:ident, $ty:ty) => {
        #[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
        pub struct $name($ty);

        impl From<$name> for usize {
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl From<usize> for $name {
            fn from(val: usize) -> $name {
                Self(val as $ty)
            }
        }
    };
}

id!(JobId, u32);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("dependency cycle detected between stages: {}", .members.join(" -> "))]
    CycleDetected { members: Vec<String> },
}
