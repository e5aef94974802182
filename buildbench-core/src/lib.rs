#![warn(missing_docs)]
//! BuildBench Core - Scenario Model and Scheduling
//!
//! This crate provides the data model shared by the rest of the workspace:
//! - `Scenario` and `ScenarioExecution` describing what to run
//! - the invocation schedule expanding an execution into ordered build phases
//! - the source mutator applying reversible edits between invocations
//! - the run log, the process-wide stdout + log-file tee

pub mod mutator;
pub mod output;
pub mod scenario;
pub mod schedule;

pub use mutator::{mutate, SourceMutator};
pub use output::RunLog;
pub use scenario::{
    BuckOptions, BuckTargets, BuildTool, MavenOptions, MutationKind, MutatorSpec, RunUsing,
    Scenario, ScenarioExecution,
};
pub use schedule::{plan, Invocation, InvocationLabel, InvocationSchedule, RunMode};
