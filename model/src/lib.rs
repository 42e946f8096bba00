mod definition;
pub use definition::{DefinitionError, PipelineDefinition, StageSpec};

mod job;
pub use job::{ArrayRange, JobKind};

mod resource;
pub use resource::{
    Memory, ResourceError, ResourceOverrides, ResourceSpec, SchedulerLimits, Walltime,
};

mod command;
pub use command::{Application, CommandError, Registry};

mod coyote;
pub use coyote::CoyoteApp;
