//! Gantry Pipeline - task dependency build pipeline
//!
//! This crate provides the scheduling core: a registry of named,
//! immutable tasks, a resolver that expands requested targets into a
//! deterministic run plan, a sequential executor with fail-fast
//! semantics, a partitioner for sharded test execution, and an artifact
//! tracker connecting producing and consuming tasks.

pub mod artifacts;
pub mod executor;
pub mod partition;
pub mod registry;
pub mod reporter;
pub mod resolver;
pub mod task;

pub use artifacts::{ArtifactError, ArtifactTracker};
pub use executor::{ActionContext, ExecError, Executor, RunReport, TaskOutcome, TaskStatus};
pub use partition::{Partition, PartitionError};
pub use registry::{RegistryError, TaskRegistry};
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TracingReporter};
pub use resolver::{resolve, ResolveError, RunPlan};
pub use task::Task;
