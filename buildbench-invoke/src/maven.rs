//! Maven Invoker
//!
//! Runs `$MAVEN_HOME/bin/mvn` with the scenario's targets. `MAVEN_HOME`
//! must point at an installation; builds never consult a wrapper.

use crate::{BuildEnv, BuildInvoker, InvokerError};
use buildbench_core::output::RunLog;
use buildbench_core::scenario::MavenOptions;
use buildbench_core::schedule::Invocation;
use std::env;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

pub struct MavenInvoker {
    project_dir: PathBuf,
    maven_home: PathBuf,
    targets: Vec<String>,
    log: RunLog,
}

impl std::fmt::Debug for MavenInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MavenInvoker")
            .field("project_dir", &self.project_dir)
            .field("maven_home", &self.maven_home)
            .field("targets", &self.targets)
            .finish()
    }
}

impl MavenInvoker {
    pub fn new(
        project_dir: PathBuf,
        options: &MavenOptions,
        log: RunLog,
    ) -> Result<Self, InvokerError> {
        let maven_home = env::var_os("MAVEN_HOME").map(PathBuf::from).ok_or_else(|| {
            InvokerError::Environment("MAVEN_HOME must be set to run Maven builds.".to_string())
        })?;
        Ok(MavenInvoker {
            project_dir,
            maven_home,
            targets: options.targets.clone(),
            log,
        })
    }

    fn mvn(&self) -> PathBuf {
        self.maven_home.join("bin").join("mvn")
    }
}

impl BuildInvoker for MavenInvoker {
    fn probe(&mut self) -> Result<Option<BuildEnv>, InvokerError> {
        Ok(None)
    }

    fn run(&mut self, _invocation: &Invocation) -> Result<Duration, InvokerError> {
        let mut cmd = Command::new(self.mvn());
        cmd.current_dir(&self.project_dir);
        cmd.args(&self.targets);
        tracing::debug!(command = ?cmd, "running maven");

        let start = Instant::now();
        let output = cmd.output().map_err(|source| InvokerError::Spawn {
            command: self.mvn().display().to_string(),
            source,
        })?;
        let elapsed = start.elapsed();
        self.log.child_output(&output.stdout);
        self.log.child_output(&output.stderr);
        if let Some(err) = InvokerError::from_status(&output) {
            return Err(err);
        }
        Ok(elapsed)
    }

    fn shutdown(&mut self) -> Result<(), InvokerError> {
        Ok(())
    }
}
