//! Invocation Schedule
//!
//! Expands a scenario execution into the ordered list of build invocations
//! the orchestrator drives: an untimed probe, an optional initial clean
//! build, W warm-ups and I measured builds. The shape depends on the build
//! tool and on the run mode (benchmark vs profile-only vs dry run).

use crate::scenario::{BuildTool, RunUsing, Scenario};
use std::fmt;

/// Warm-up count when builds share a daemon.
const DAEMON_WARM_UPS: usize = 6;
/// Warm-up count when every build pays JVM start-up.
const NO_DAEMON_WARM_UPS: usize = 1;
/// Measured build count when benchmarking.
const BENCHMARK_ITERATIONS: usize = 10;
/// Defaults when profiling without benchmarking.
const PROFILE_WARM_UPS: usize = 2;
const PROFILE_ITERATIONS: usize = 1;

/// Display label of one build invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationLabel {
    /// Untimed preparatory build confirming the tool works
    Probe,
    /// The timed build from a clean state
    InitialCleanBuild,
    /// 1-based timed warm-up build
    WarmUp(usize),
    /// 1-based timed, optionally profiled, measured build
    Measured(usize),
}

impl InvocationLabel {
    /// Whether this invocation's duration is recorded.
    pub fn is_timed(self) -> bool {
        !matches!(self, InvocationLabel::Probe)
    }
}

impl fmt::Display for InvocationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationLabel::Probe => write!(f, "probe build"),
            InvocationLabel::InitialCleanBuild => write!(f, "initial clean build"),
            InvocationLabel::WarmUp(n) => write!(f, "warm-up build {}", n),
            InvocationLabel::Measured(n) => write!(f, "build {}", n),
        }
    }
}

/// One build request
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Phase label, also the report row this invocation records into
    pub label: InvocationLabel,
    /// Tasks submitted to the build tool; empty for buck and maven, whose
    /// invokers supply their own targets
    pub tasks: Vec<String>,
    /// Whether the source mutator runs before this invocation
    pub mutated: bool,
    /// Whether profilers are armed around this invocation
    pub profiled: bool,
}

/// Run-level settings governing the schedule shape
#[derive(Debug, Clone, Copy, Default)]
pub struct RunMode {
    /// `--benchmark` was requested
    pub benchmark: bool,
    /// At least one `--profile` was requested
    pub profile: bool,
    /// `--dry-run` was requested
    pub dry_run: bool,
    /// `--warmups` override, honored when profiling without benchmarking
    pub warmups: Option<usize>,
    /// `--iterations` override, honored when profiling without benchmarking
    pub iterations: Option<usize>,
}

/// The ordered invocations of one scenario execution
#[derive(Debug, Clone)]
pub struct InvocationSchedule {
    /// Invocations in execution order
    pub invocations: Vec<Invocation>,
    /// Whether the schedule starts with an initial clean build
    pub has_initial: bool,
    /// Number of warm-up invocations
    pub warmup_count: usize,
    /// Number of measured invocations
    pub iteration_count: usize,
}

/// Expand a scenario into its invocation schedule.
pub fn plan(tool: BuildTool, scenario: &Scenario, mode: &RunMode) -> InvocationSchedule {
    let (warmup_count, iteration_count) = if mode.dry_run {
        (1, 1)
    } else if mode.benchmark {
        let warmups = match (tool, scenario.run_using) {
            (BuildTool::Gradle, RunUsing::NoDaemon) => NO_DAEMON_WARM_UPS,
            _ => DAEMON_WARM_UPS,
        };
        (warmups, BENCHMARK_ITERATIONS)
    } else {
        (
            mode.warmups.unwrap_or(PROFILE_WARM_UPS),
            mode.iterations.unwrap_or(PROFILE_ITERATIONS),
        )
    };

    // Buck and maven skip the probe and the initial clean build; Gradle
    // always probes, and cleans first only when benchmarking.
    let is_gradle = tool == BuildTool::Gradle;
    let has_initial = is_gradle && mode.benchmark;

    let mut invocations = Vec::with_capacity(2 + warmup_count + iteration_count);
    if is_gradle {
        invocations.push(Invocation {
            label: InvocationLabel::Probe,
            tasks: vec!["help".to_string()],
            mutated: false,
            profiled: false,
        });
    }
    if has_initial {
        invocations.push(Invocation {
            label: InvocationLabel::InitialCleanBuild,
            tasks: scenario.initial_tasks(),
            mutated: false,
            profiled: false,
        });
    }
    let tasks = if is_gradle {
        scenario.tasks.clone()
    } else {
        Vec::new()
    };
    for n in 1..=warmup_count {
        invocations.push(Invocation {
            label: InvocationLabel::WarmUp(n),
            tasks: tasks.clone(),
            mutated: true,
            profiled: false,
        });
    }
    for n in 1..=iteration_count {
        invocations.push(Invocation {
            label: InvocationLabel::Measured(n),
            tasks: tasks.clone(),
            mutated: true,
            profiled: mode.profile && is_gradle,
        });
    }

    InvocationSchedule {
        invocations,
        has_initial,
        warmup_count,
        iteration_count,
    }
}
