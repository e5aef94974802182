//! Java Flight Recorder
//!
//! Records the Gradle daemon via the JDK's `jcmd` diagnostic command, so it
//! only works in tool-api mode where a daemon PID exists. The recording
//! covers the measured series and lands as `profile.jfr` in the output
//! directory.

use crate::ProfilerError;
use buildbench_core::output::RunLog;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct JfrRecorder {
    output_dir: PathBuf,
    log: RunLog,
    recording: bool,
}

impl JfrRecorder {
    pub fn new(output_dir: &Path, log: RunLog) -> Self {
        JfrRecorder {
            output_dir: output_dir.to_path_buf(),
            log,
            recording: false,
        }
    }

    pub fn start(&mut self, pid: Option<u32>) -> Result<(), ProfilerError> {
        let pid = require_pid(pid)?;
        if self.recording {
            return Ok(());
        }
        self.log
            .line(&format!("Starting recording for daemon with pid {}", pid));
        jcmd(&[
            &pid.to_string(),
            "JFR.start",
            "name=profile",
            "settings=profile",
        ])?;
        self.recording = true;
        Ok(())
    }

    pub fn stop(&mut self, pid: Option<u32>) -> Result<(), ProfilerError> {
        let pid = require_pid(pid)?;
        if !self.recording {
            return Ok(());
        }
        let destination = self.output_dir.join("profile.jfr");
        jcmd(&[
            &pid.to_string(),
            "JFR.stop",
            "name=profile",
            &format!("filename={}", destination.display()),
        ])?;
        self.recording = false;
        tracing::debug!(path = %destination.display(), "flight recording written");
        Ok(())
    }
}

fn require_pid(pid: Option<u32>) -> Result<u32, ProfilerError> {
    pid.ok_or_else(|| {
        ProfilerError::Configuration(
            "Profiling with JFR requires the Gradle daemon.".to_string(),
        )
    })
}

/// The `jcmd` launcher: `$JAVA_HOME/bin/jcmd` when set, else from the PATH.
fn jcmd_launcher() -> PathBuf {
    match env::var_os("JAVA_HOME") {
        Some(home) => PathBuf::from(home).join("bin").join("jcmd"),
        None => PathBuf::from("jcmd"),
    }
}

fn jcmd(args: &[&str]) -> Result<(), ProfilerError> {
    let launcher = jcmd_launcher();
    let output = Command::new(&launcher)
        .args(args)
        .output()
        .map_err(|e| ProfilerError::Control {
            command: launcher.display().to_string(),
            message: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(ProfilerError::Control {
            command: format!("{} {}", launcher.display(), args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}
