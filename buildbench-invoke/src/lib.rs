//! BuildBench Invoke - Build Tool Invokers
//!
//! Drives the external build tool. Every invoker exposes the same three
//! operations: `probe` (prepare the tool and capture its environment),
//! `run` (execute one invocation and measure its wall-clock time) and
//! `shutdown` (release whatever the invoker kept alive). An invoker is
//! exclusively owned by one scenario execution.

mod buck;
mod gradle;
mod maven;

pub use buck::BuckInvoker;
pub use gradle::GradleInvoker;
pub use maven::MavenInvoker;

use buildbench_core::schedule::Invocation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokerError {
    /// The tool process could not be started at all. For the daemon-backed
    /// Gradle mode this is a connection-level failure: the daemon identity
    /// is discarded.
    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported a build failure.
    #[error("Build failed with exit code {code}")]
    BuildFailed { code: i32 },

    /// The tool's environment is unusable (missing home, bad distribution).
    #[error("{0}")]
    Environment(String),
}

impl InvokerError {
    /// Whether this failure happened before the build tool could run at all.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, InvokerError::Spawn { .. })
    }

    pub(crate) fn from_status(output: &Output) -> Option<InvokerError> {
        if output.status.success() {
            None
        } else {
            Some(InvokerError::BuildFailed {
                code: output.status.code().unwrap_or(-1),
            })
        }
    }
}

/// Build environment captured by the probe
#[derive(Debug, Clone, Serialize)]
pub struct BuildEnv {
    /// Tool version reported by the probe
    pub version: String,
    /// PID of the long-lived build process, when one exists
    pub daemon_pid: Option<u32>,
    /// When the probe ran
    pub captured_at: DateTime<Utc>,
}

/// Extra build settings contributed by profilers before the first invocation
#[derive(Debug, Clone, Default)]
pub struct BuildConfiguration {
    /// JVM arguments for the build process, applied at daemon start-up
    pub jvm_args: Vec<String>,
    /// Generated init scripts passed via `--init-script`
    pub init_scripts: Vec<PathBuf>,
    /// Extra Gradle command-line arguments
    pub gradle_args: Vec<String>,
}

/// The three-operation invoker contract shared by all build tools
pub trait BuildInvoker {
    /// Prepare the tool for the execution. Untimed and never recorded.
    /// Returns the captured environment when the tool reports one.
    fn probe(&mut self) -> Result<Option<BuildEnv>, InvokerError>;

    /// Run one invocation, returning its wall-clock duration.
    fn run(&mut self, invocation: &Invocation) -> Result<Duration, InvokerError>;

    /// Release the tool: stop the daemon, drain subprocesses.
    fn shutdown(&mut self) -> Result<(), InvokerError>;

    /// PID of the long-lived build process, when one exists.
    fn daemon_pid(&self) -> Option<u32> {
        None
    }
}
