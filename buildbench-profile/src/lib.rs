//! BuildBench Profile - Profiler Control Plane
//!
//! Each profiler is one variant of the [`Profiler`] enum and implements the
//! same four operations: adjust the build configuration before the daemon
//! starts, start and stop recording around each measured build, and collect
//! artifacts into the output directory when the execution ends. Profilers
//! compose: every `--profile` flag adds one variant, applied independently
//! in flag order.

mod agent;
mod init_scripts;
mod jfr;

pub use agent::{HonestProfilerAgent, JProfilerAgent, YourKitAgent};
pub use init_scripts::{BuildScanPublisher, ChromeTraceWriter, DEFAULT_BUILD_SCAN_VERSION};
pub use jfr::JfrRecorder;

use buildbench_core::output::RunLog;
use buildbench_invoke::BuildConfiguration;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfilerError {
    /// The requested profiler cannot run in this configuration.
    #[error("{0}")]
    Configuration(String),

    /// An external control command failed.
    #[error("Failed to run {command}: {message}")]
    Control { command: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The profilers a user can request with `--profile`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerKind {
    Jfr,
    HonestProfiler,
    YourKit,
    JProfiler,
    BuildScan,
    ChromeTrace,
}

impl FromStr for ProfilerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jfr" => Ok(ProfilerKind::Jfr),
            "hp" => Ok(ProfilerKind::HonestProfiler),
            "yourkit" => Ok(ProfilerKind::YourKit),
            "jprofiler" => Ok(ProfilerKind::JProfiler),
            "buildscan" => Ok(ProfilerKind::BuildScan),
            "chrome-trace" => Ok(ProfilerKind::ChromeTrace),
            other => Err(format!(
                "Unknown profiler '{}'. Known profilers are: jfr, hp, yourkit, jprofiler, buildscan, chrome-trace",
                other
            )),
        }
    }
}

impl fmt::Display for ProfilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfilerKind::Jfr => "jfr",
            ProfilerKind::HonestProfiler => "hp",
            ProfilerKind::YourKit => "yourkit",
            ProfilerKind::JProfiler => "jprofiler",
            ProfilerKind::BuildScan => "buildscan",
            ProfilerKind::ChromeTrace => "chrome-trace",
        };
        write!(f, "{}", name)
    }
}

impl ProfilerKind {
    /// Whether this profiler needs the PID of a long-lived daemon.
    pub fn requires_daemon(self) -> bool {
        matches!(self, ProfilerKind::Jfr)
    }
}

/// Tuning options collected from the CLI
#[derive(Debug, Clone, Default)]
pub struct ProfilerSettings {
    pub buildscan_version: Option<String>,
    pub yourkit_sampling: bool,
    pub yourkit_memory: bool,
    pub jprofiler_home: Option<PathBuf>,
    pub jprofiler_config: Option<PathBuf>,
    pub jprofiler_session_id: Option<String>,
}

/// One attached profiler
pub enum Profiler {
    Jfr(JfrRecorder),
    HonestProfiler(HonestProfilerAgent),
    YourKit(YourKitAgent),
    JProfiler(JProfilerAgent),
    BuildScan(BuildScanPublisher),
    ChromeTrace(ChromeTraceWriter),
}

impl Profiler {
    /// Create a profiler writing its artifacts under `output_dir`.
    pub fn create(
        kind: ProfilerKind,
        output_dir: &Path,
        settings: &ProfilerSettings,
        log: &RunLog,
    ) -> Result<Profiler, ProfilerError> {
        match kind {
            ProfilerKind::Jfr => Ok(Profiler::Jfr(JfrRecorder::new(output_dir, log.clone()))),
            ProfilerKind::HonestProfiler => Ok(Profiler::HonestProfiler(
                HonestProfilerAgent::new(output_dir)?,
            )),
            ProfilerKind::YourKit => Ok(Profiler::YourKit(YourKitAgent::new(
                output_dir,
                settings.yourkit_sampling,
                settings.yourkit_memory,
            )?)),
            ProfilerKind::JProfiler => Ok(Profiler::JProfiler(JProfilerAgent::new(
                output_dir, settings,
            )?)),
            ProfilerKind::BuildScan => Ok(Profiler::BuildScan(BuildScanPublisher::new(
                output_dir,
                settings.buildscan_version.as_deref(),
                log,
            )?)),
            ProfilerKind::ChromeTrace => Ok(Profiler::ChromeTrace(ChromeTraceWriter::new(
                output_dir,
            )?)),
        }
    }

    /// Contribute JVM args, init scripts and gradle args to the execution's
    /// build configuration. Runs once, before the daemon starts.
    pub fn adjust_build(&self, build: &mut BuildConfiguration) -> Result<(), ProfilerError> {
        match self {
            Profiler::Jfr(_) => Ok(()),
            Profiler::HonestProfiler(agent) => agent.adjust_build(build),
            Profiler::YourKit(agent) => agent.adjust_build(build),
            Profiler::JProfiler(agent) => agent.adjust_build(build),
            Profiler::BuildScan(scan) => scan.adjust_build(build),
            Profiler::ChromeTrace(trace) => trace.adjust_build(build),
        }
    }

    /// Start recording before a measured invocation.
    pub fn before_measured(&mut self, pid: Option<u32>) -> Result<(), ProfilerError> {
        match self {
            Profiler::Jfr(recorder) => recorder.start(pid),
            Profiler::HonestProfiler(agent) => agent.send_command("start"),
            _ => Ok(()),
        }
    }

    /// Stop recording after a measured invocation.
    pub fn after_measured(&mut self, pid: Option<u32>) -> Result<(), ProfilerError> {
        match self {
            Profiler::Jfr(recorder) => recorder.stop(pid),
            Profiler::HonestProfiler(agent) => agent.send_command("stop"),
            _ => Ok(()),
        }
    }

    /// Collect artifacts once the measured series is over.
    pub fn finalize(&mut self) -> Result<(), ProfilerError> {
        match self {
            Profiler::HonestProfiler(agent) => agent.post_process(),
            Profiler::JProfiler(agent) => agent.collect_snapshot(),
            _ => Ok(()),
        }
    }
}
