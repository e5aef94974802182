//! Buck Invoker
//!
//! Shells out to the project's `buckw` wrapper. Target discovery happens
//! once, before the first build: literal targets are used as given, `type =
//! "all"` asks `buckw targets` for the complete list, and any other type
//! filters with `buckw targets --type <T>`.

use crate::{BuildEnv, BuildInvoker, InvokerError};
use buildbench_core::output::RunLog;
use buildbench_core::scenario::{BuckOptions, BuckTargets};
use buildbench_core::schedule::Invocation;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

pub struct BuckInvoker {
    project_dir: PathBuf,
    targets: BuckTargets,
    resolved: Option<Vec<String>>,
    log: RunLog,
}

impl BuckInvoker {
    pub fn new(project_dir: PathBuf, options: &BuckOptions, log: RunLog) -> Self {
        BuckInvoker {
            project_dir,
            targets: options.targets.clone(),
            resolved: None,
            log,
        }
    }

    fn buckw(&self) -> PathBuf {
        self.project_dir.join("buckw")
    }

    fn execute(&self, args: &[&str]) -> Result<std::process::Output, InvokerError> {
        let mut cmd = Command::new(self.buckw());
        cmd.current_dir(&self.project_dir);
        cmd.args(args);
        tracing::debug!(command = ?cmd, "running buck");
        cmd.output().map_err(|source| InvokerError::Spawn {
            command: self.buckw().display().to_string(),
            source,
        })
    }

    /// Resolve and remember the target list, logging it on first use.
    fn resolve_targets(&mut self) -> Result<Vec<String>, InvokerError> {
        if let Some(targets) = &self.resolved {
            return Ok(targets.clone());
        }
        let targets = match &self.targets {
            BuckTargets::Literal(targets) => targets.clone(),
            BuckTargets::All => self.query_targets(&["targets"])?,
            BuckTargets::Type(type_name) => {
                self.query_targets(&["targets", "--type", type_name])?
            }
        };
        self.log
            .line(&format!("* Buck targets: [{}]", targets.join(", ")));
        self.resolved = Some(targets.clone());
        Ok(targets)
    }

    fn query_targets(&self, args: &[&str]) -> Result<Vec<String>, InvokerError> {
        let output = self.execute(args)?;
        self.log.child_output(&output.stderr);
        if let Some(err) = InvokerError::from_status(&output) {
            return Err(err);
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl BuildInvoker for BuckInvoker {
    fn probe(&mut self) -> Result<Option<BuildEnv>, InvokerError> {
        Ok(None)
    }

    fn run(&mut self, _invocation: &Invocation) -> Result<Duration, InvokerError> {
        let targets = self.resolve_targets()?;
        let mut args = vec!["build".to_string()];
        args.extend(targets);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let start = Instant::now();
        let output = self.execute(&arg_refs)?;
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
