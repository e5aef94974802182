//! JVM Agent Profilers
//!
//! YourKit, Honest Profiler and JProfiler all attach by injecting an agent
//! into the build JVM at daemon start-up; they differ in how recording is
//! controlled and how artifacts are collected.

use crate::ProfilerError;
use buildbench_invoke::BuildConfiguration;
use std::env;
use std::fs::File;
use std::io::Write;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Control port the Honest Profiler agent listens on.
const HP_CONTROL_PORT: u16 = 18000;
/// Entry point of the sanitizer bundled with Honest Profiler.
const HP_SANITIZER_MAIN: &str =
    "com.insightfullogic.honest_profiler.ports.console.SanitizerEntry";

fn required_home(var: &str, purpose: &str) -> Result<PathBuf, ProfilerError> {
    env::var_os(var).map(PathBuf::from).ok_or_else(|| {
        ProfilerError::Configuration(format!("{} must point at {}.", var, purpose))
    })
}

/// YourKit: agent attached at daemon start, snapshot dumped when the daemon
/// exits at scenario teardown.
pub struct YourKitAgent {
    home: PathBuf,
    output_dir: PathBuf,
    sampling: bool,
    memory: bool,
}

impl YourKitAgent {
    pub fn new(output_dir: &Path, sampling: bool, memory: bool) -> Result<Self, ProfilerError> {
        Ok(YourKitAgent {
            home: required_home("YOURKIT_HOME", "a YourKit installation")?,
            output_dir: output_dir.to_path_buf(),
            sampling,
            memory,
        })
    }

    pub fn adjust_build(&self, build: &mut BuildConfiguration) -> Result<(), ProfilerError> {
        let mut options = format!(
            "dir={},snapshot_name_format=profile,onexit=snapshot",
            self.output_dir.display()
        );
        if self.sampling {
            options.push_str(",sampling");
        } else if self.memory {
            options.push_str(",alloceach=10");
        } else {
            options.push_str(",tracing");
        }
        let agent = self.home.join("bin/linux-x86-64/libyjpagent.so");
        build
            .jvm_args
            .push(format!("-agentpath:{}={}", agent.display(), options));
        Ok(())
    }
}

/// Honest Profiler: agent attached at daemon start, recording toggled over
/// the agent's control port around each measured build. All of its
/// artifacts live under the `hp/` subdirectory of the execution's output
/// directory.
pub struct HonestProfilerAgent {
    home: PathBuf,
    artifact_dir: PathBuf,
}

impl HonestProfilerAgent {
    pub fn new(output_dir: &Path) -> Result<Self, ProfilerError> {
        let artifact_dir = output_dir.join("hp");
        std::fs::create_dir_all(&artifact_dir)?;
        Ok(HonestProfilerAgent {
            home: required_home("HP_HOME_DIR", "an Honest Profiler installation")?,
            artifact_dir,
        })
    }

    fn log_path(&self) -> PathBuf {
        self.artifact_dir.join("hp.log")
    }

    pub fn adjust_build(&self, build: &mut BuildConfiguration) -> Result<(), ProfilerError> {
        let agent = self.home.join("liblagent.so");
        build.jvm_args.push(format!(
            "-agentpath:{}=interval=7,logPath={},start=0,host=127.0.0.1,port={}",
            agent.display(),
            self.log_path().display(),
            HP_CONTROL_PORT
        ));
        Ok(())
    }

    pub fn send_command(&self, command: &str) -> Result<(), ProfilerError> {
        let mut stream =
            TcpStream::connect(("127.0.0.1", HP_CONTROL_PORT)).map_err(|e| {
                ProfilerError::Control {
                    command: command.to_string(),
                    message: format!("cannot reach agent control port: {}", e),
                }
            })?;
        stream
            .write_all(format!("{}\r\n", command).as_bytes())
            .map_err(|e| ProfilerError::Control {
                command: command.to_string(),
                message: e.to_string(),
            })
    }

    /// Sanitize the raw log and, when `FG_HOME_DIR` is set, render a flame
    /// graph from the sanitized stacks.
    pub fn post_process(&self) -> Result<(), ProfilerError> {
        let sanitized = self.artifact_dir.join("hp.txt");
        let status = Command::new("java")
            .arg("-cp")
            .arg(self.home.join("honest-profiler.jar"))
            .arg(HP_SANITIZER_MAIN)
            .arg(self.log_path())
            .arg(&sanitized)
            .status()
            .map_err(|e| ProfilerError::Control {
                command: "honest-profiler sanitizer".to_string(),
                message: e.to_string(),
            })?;
        if !status.success() {
            return Err(ProfilerError::Control {
                command: "honest-profiler sanitizer".to_string(),
                message: format!("exited with {}", status),
            });
        }

        if let Some(fg_home) = env::var_os("FG_HOME_DIR") {
            let svg = File::create(self.artifact_dir.join("flames.svg"))?;
            let status = Command::new(PathBuf::from(fg_home).join("flamegraph.pl"))
                .arg(&sanitized)
                .stdout(svg)
                .status()
                .map_err(|e| ProfilerError::Control {
                    command: "flamegraph.pl".to_string(),
                    message: e.to_string(),
                })?;
            if !status.success() {
                tracing::warn!(status = %status, "flame graph generation failed");
            }
        }
        Ok(())
    }
}

/// JProfiler: offline-mode agent; the session config decides what gets
/// recorded, the snapshot is directed at the execution's output directory.
pub struct JProfilerAgent {
    home: PathBuf,
    output_dir: PathBuf,
    config: Option<PathBuf>,
    session_id: String,
}

impl JProfilerAgent {
    pub fn new(
        output_dir: &Path,
        settings: &crate::ProfilerSettings,
    ) -> Result<Self, ProfilerError> {
        let home = match &settings.jprofiler_home {
            Some(home) => home.clone(),
            None => required_home("JPROFILER_HOME", "a JProfiler installation")?,
        };
        Ok(JProfilerAgent {
            home,
            output_dir: output_dir.to_path_buf(),
            config: settings.jprofiler_config.clone(),
            session_id: settings
                .jprofiler_session_id
                .clone()
                .unwrap_or_else(|| "1".to_string()),
        })
    }

    pub fn adjust_build(&self, build: &mut BuildConfiguration) -> Result<(), ProfilerError> {
        let agent = self.home.join("bin/linux-x64/libjprofilerti.so");
        let mut options = format!(
            "offline,id={},snapshotdir={}",
            self.session_id,
            self.output_dir.display()
        );
        if let Some(config) = &self.config {
            options.push_str(&format!(",config={}", config.display()));
        }
        build
            .jvm_args
            .push(format!("-agentpath:{}={}", agent.display(), options));
        Ok(())
    }

    /// Record whether the offline agent has saved a snapshot yet. The agent
    /// writes into the snapshot directory either when the session config
    /// triggers a save or when the daemon exits at scenario teardown, so an
    /// empty directory at this point is not an error.
    pub fn collect_snapshot(&self) -> Result<(), ProfilerError> {
        let found = std::fs::read_dir(&self.output_dir)?
            .flatten()
            .any(|entry| entry.path().extension().is_some_and(|ext| ext == "jps"));
        tracing::debug!(
            dir = %self.output_dir.display(),
            snapshot_present = found,
            "jprofiler snapshot check"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProfilerSettings;

    #[test]
    fn yourkit_agent_options_follow_settings() {
        env::set_var("YOURKIT_HOME", "/opt/yourkit");
        let agent = YourKitAgent::new(Path::new("/tmp/out"), true, false).unwrap();
        let mut build = BuildConfiguration::default();
        agent.adjust_build(&mut build).unwrap();

        let arg = &build.jvm_args[0];
        assert!(arg.starts_with("-agentpath:/opt/yourkit/bin/linux-x86-64/libyjpagent.so="));
        assert!(arg.contains("dir=/tmp/out"));
        assert!(arg.ends_with(",sampling"));
    }

    #[test]
    fn jprofiler_agent_directs_snapshot_at_the_output_directory() {
        let settings = ProfilerSettings {
            jprofiler_home: Some(PathBuf::from("/opt/jprofiler")),
            jprofiler_config: Some(PathBuf::from("/home/u/.jprofiler/config.xml")),
            jprofiler_session_id: Some("42".to_string()),
            ..ProfilerSettings::default()
        };
        let agent = JProfilerAgent::new(Path::new("/tmp/out"), &settings).unwrap();
        let mut build = BuildConfiguration::default();
        agent.adjust_build(&mut build).unwrap();

        assert_eq!(
            build.jvm_args[0],
            "-agentpath:/opt/jprofiler/bin/linux-x64/libjprofilerti.so=offline,id=42,snapshotdir=/tmp/out,config=/home/u/.jprofiler/config.xml"
        );
    }

    #[test]
    fn jprofiler_snapshot_collection_accepts_a_written_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = ProfilerSettings {
            jprofiler_home: Some(PathBuf::from("/opt/jprofiler")),
            ..ProfilerSettings::default()
        };
        let agent = JProfilerAgent::new(dir.path(), &settings).unwrap();
        std::fs::write(dir.path().join("session.jps"), b"").unwrap();

        agent.collect_snapshot().unwrap();
    }

    #[test]
    fn honest_profiler_artifacts_nest_under_hp() {
        env::set_var("HP_HOME_DIR", "/opt/hp");
        let dir = tempfile::TempDir::new().unwrap();
        let agent = HonestProfilerAgent::new(dir.path()).unwrap();
        let mut build = BuildConfiguration::default();
        agent.adjust_build(&mut build).unwrap();

        assert!(dir.path().join("hp").is_dir());
        let arg = &build.jvm_args[0];
        assert!(arg.contains("start=0"), "recording must start disarmed");
        let log_path = dir.path().join("hp").join("hp.log");
        assert!(arg.contains(&format!("logPath={}", log_path.display())));
    }
}
