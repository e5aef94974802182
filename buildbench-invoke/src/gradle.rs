//! Gradle Invoker
//!
//! One struct covers both execution modes. In tool-api mode every
//! invocation passes `--daemon`, so the daemon started by the probe serves
//! the whole scenario execution and its PID (recorded by a generated init
//! script in the isolated user home) is available to profilers. In
//! no-daemon mode each invocation is a fresh `--no-daemon` process, drained
//! to completion before the next one starts.
//!
//! All builds route through the isolated user home so caches and init
//! scripts never leak into the operator's own `~/.gradle`.

use crate::{BuildConfiguration, BuildEnv, BuildInvoker, InvokerError};
use buildbench_core::output::RunLog;
use buildbench_core::scenario::{RunUsing, Scenario};
use buildbench_core::schedule::Invocation;
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

const PID_INIT_SCRIPT: &str = "\
// Records the daemon PID so profilers can attach to the right process.
def runtime = java.lang.management.ManagementFactory.runtimeMXBean
new File(gradle.gradleUserHomeDir, 'daemon.pid').text = runtime.name.split('@')[0]
";

pub struct GradleInvoker {
    project_dir: PathBuf,
    user_home: PathBuf,
    version: String,
    run_using: RunUsing,
    system_properties: BTreeMap<String, String>,
    gradle_args: Vec<String>,
    build_config: BuildConfiguration,
    dry_run: bool,
    daemon_pid: Option<u32>,
    shutdown_done: bool,
    log: RunLog,
}

impl GradleInvoker {
    /// Prepare an invoker for one scenario execution. Creates the isolated
    /// user home and installs the PID instrumentation init script.
    pub fn new(
        project_dir: &Path,
        user_home: &Path,
        version: &str,
        scenario: &Scenario,
        dry_run: bool,
        build_config: BuildConfiguration,
        log: RunLog,
    ) -> Result<Self, InvokerError> {
        let init_dir = user_home.join("init.d");
        fs::create_dir_all(&init_dir).map_err(|e| {
            InvokerError::Environment(format!(
                "Cannot create Gradle user home {}: {}",
                user_home.display(),
                e
            ))
        })?;
        fs::write(init_dir.join("buildbench-pid.gradle"), PID_INIT_SCRIPT).map_err(|e| {
            InvokerError::Environment(format!("Cannot write init script: {}", e))
        })?;

        Ok(GradleInvoker {
            project_dir: project_dir.to_path_buf(),
            user_home: user_home.to_path_buf(),
            version: version.to_string(),
            run_using: scenario.run_using,
            system_properties: scenario.system_properties.clone(),
            gradle_args: scenario.gradle_args.clone(),
            build_config,
            dry_run,
            daemon_pid: None,
            shutdown_done: false,
            log,
        })
    }

    /// The launcher for the requested version: a distribution under the
    /// isolated user home when installed, else the project's wrapper, else
    /// `gradle` on the PATH.
    fn launcher(&self) -> PathBuf {
        let distribution = self
            .user_home
            .join("distributions")
            .join(format!("gradle-{}", self.version))
            .join("bin")
            .join("gradle");
        if distribution.exists() {
            return distribution;
        }
        let wrapper = self.project_dir.join("gradlew");
        if wrapper.exists() {
            return wrapper;
        }
        PathBuf::from("gradle")
    }

    pub(crate) fn command(&self, tasks: &[String], daemon: bool) -> Command {
        let mut cmd = Command::new(self.launcher());
        cmd.current_dir(&self.project_dir);
        cmd.arg("--gradle-user-home").arg(&self.user_home);
        cmd.arg(if daemon { "--daemon" } else { "--no-daemon" });
        if self.dry_run {
            cmd.arg("-m");
        }
        for script in &self.build_config.init_scripts {
            cmd.arg("--init-script").arg(script);
        }
        for (name, value) in &self.system_properties {
            cmd.arg(format!("-D{}={}", name, value));
        }
        if !self.build_config.jvm_args.is_empty() {
            cmd.arg(format!(
                "-Dorg.gradle.jvmargs={}",
                self.build_config.jvm_args.join(" ")
            ));
        }
        cmd.args(&self.gradle_args);
        cmd.args(&self.build_config.gradle_args);
        cmd.args(tasks);
        cmd
    }

    /// Run a prepared command, capturing its output into the log.
    fn execute(&self, mut cmd: Command) -> Result<(Output, Duration), InvokerError> {
        tracing::debug!(command = ?cmd, "starting gradle build");
        let start = Instant::now();
        let output = cmd.output().map_err(|source| InvokerError::Spawn {
            command: cmd.get_program().to_string_lossy().into_owned(),
            source,
        })?;
        let elapsed = start.elapsed();
        self.log.child_output(&output.stdout);
        self.log.child_output(&output.stderr);
        Ok((output, elapsed))
    }

    fn read_daemon_pid(&self) -> Option<u32> {
        fs::read_to_string(self.user_home.join("daemon.pid"))
            .ok()
            .and_then(|text| text.trim().parse().ok())
    }
}

/// Extract the version from the `Gradle <version>` build-environment line.
fn parse_build_environment(output: &[u8]) -> Option<String> {
    let pattern = Regex::new(r"(?m)^Gradle (\S+)").expect("static pattern");
    let text = String::from_utf8_lossy(output);
    pattern
        .captures(&text)
        .map(|captures| captures[1].to_string())
}

impl BuildInvoker for GradleInvoker {
    fn probe(&mut self) -> Result<Option<BuildEnv>, InvokerError> {
        // The probe always runs with the daemon so tool-api executions have
        // a live daemon before the first timed build.
        let cmd = self.command(&["help".to_string()], true);
        let (output, _) = self.execute(cmd)?;
        if let Some(err) = InvokerError::from_status(&output) {
            return Err(err);
        }
        self.daemon_pid = self.read_daemon_pid();
        let version =
            parse_build_environment(&output.stdout).unwrap_or_else(|| self.version.clone());
        tracing::debug!(version = %version, pid = ?self.daemon_pid, "probe completed");
        Ok(Some(BuildEnv {
            version,
            daemon_pid: self.daemon_pid,
            captured_at: Utc::now(),
        }))
    }

    fn run(&mut self, invocation: &Invocation) -> Result<Duration, InvokerError> {
        let daemon = self.run_using == RunUsing::ToolApi;
        let cmd = self.command(&invocation.tasks, daemon);
        let (output, elapsed) = match self.execute(cmd) {
            Ok(result) => result,
            Err(e) => {
                // A connection-level failure invalidates the daemon
                // identity; a build failure does not.
                if e.is_connection_error() {
                    self.daemon_pid = None;
                }
                return Err(e);
            }
        };
        if let Some(err) = InvokerError::from_status(&output) {
            return Err(err);
        }
        Ok(elapsed)
    }

    fn shutdown(&mut self) -> Result<(), InvokerError> {
        if self.shutdown_done {
            return Ok(());
        }
        self.shutdown_done = true;
        if self.run_using == RunUsing::ToolApi {
            let mut cmd = Command::new(self.launcher());
            cmd.current_dir(&self.project_dir);
            cmd.arg("--gradle-user-home").arg(&self.user_home);
            cmd.arg("--stop");
            match cmd.output() {
                Ok(output) => {
                    self.log.child_output(&output.stdout);
                    self.log.child_output(&output.stderr);
                }
                Err(e) => tracing::warn!(error = %e, "failed to stop gradle daemon"),
            }
        }
        self.daemon_pid = None;
        Ok(())
    }

    fn daemon_pid(&self) -> Option<u32> {
        self.daemon_pid
    }
}

impl Drop for GradleInvoker {
    fn drop(&mut self) {
        // Safety net for early exits; shutdown() is idempotent.
        let _ = self.shutdown();
    }
}
