//! Planning and execution.
//!
//! - Resolving remote state per desired resource
//! - Classifying each resource and recording field differences
//! - Assembling an ordered plan
//! - Executing the plan under the overwrite policy

mod assembler;
mod diff;
mod executor;
pub mod payload;
mod plan;
mod resolver;

pub use assembler::PlanAssembler;
pub use diff::{reconstruct_url, Action, DiffEngine, FieldDiff, ResourceDiff};
pub use executor::{
    ApplyOptions, ChangeOutcome, ExecutionReport, Outcome, PlanExecutor, SkipNotice,
};
pub use plan::{ActionCounts, Change, Plan};
pub use resolver::RemoteResolver;
