//! End-to-end tests driving the orchestrator against synthetic build tools.
//!
//! A fake Gradle launcher is installed as a distribution under the isolated
//! user home; it prints the same build-environment markers a scripted test
//! project would, so the log and the CSV can be asserted without a real
//! Gradle installation.

#![cfg(unix)]

use buildbench_cli::{run_with_cli, Cli};
use clap::Parser;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GRADLE_TEMPLATE: &str = r#"#!/bin/sh
version="@VERSION@"
counter="@COUNTER@"
limit="@LIMIT@"
daemon=true
tasks=""
user_home=""
init_scripts=false
skip=""
for arg in "$@"; do
  if [ -n "$skip" ]; then
    if [ "$skip" = "home" ]; then user_home="$arg"; fi
    skip=""
    continue
  fi
  case "$arg" in
    --gradle-user-home) skip="home" ;;
    --init-script) skip="value"; init_scripts=true ;;
    --daemon) daemon=true ;;
    --no-daemon) daemon=false ;;
    --stop) exit 0 ;;
    -*) ;;
    *)
      if [ -z "$tasks" ]; then tasks="$arg"; else tasks="$tasks, $arg"; fi
      ;;
  esac
done
if [ -n "$counter" ]; then
  count=$(cat "$counter" 2>/dev/null || echo 0)
  count=$((count + 1))
  echo "$count" > "$counter"
  if [ "$count" -gt "$limit" ]; then
    echo "BUILD FAILED: injected failure"
    exit 1
  fi
fi
echo "Gradle $version"
echo "<gradle-version: $version>"
echo "<daemon: $daemon>"
echo "<tasks: [$tasks]>"
if [ "$init_scripts" = true ]; then
  echo "Publishing build information..."
fi
if [ -n "$user_home" ]; then
  echo $$ > "$user_home/daemon.pid"
fi
exit 0
"#;

const JCMD_SCRIPT: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    filename=*)
      : > "${arg#filename=}"
      ;;
  esac
done
exit 0
"#;

const BUCKW_SCRIPT: &str = r#"#!/bin/sh
if [ "$1" = targets ]; then
  echo '//target:android_binary'
  echo '//target:java_library'
  echo '//target:cpp_library'
  echo '//target/child:android_library'
  echo '//target/child:cpp_library'
else
  echo "built $@"
fi
exit 0
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Fixture {
        let fixture = Fixture {
            dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(fixture.project_dir()).unwrap();
        fixture
    }

    fn project_dir(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    fn user_home(&self) -> PathBuf {
        self.dir.path().join("user-home")
    }

    fn install_gradle(&self, version: &str) {
        self.install_gradle_failing_after(version, None);
    }

    /// Install a fake distribution that fails every invocation after the
    /// first `fail_after` ones.
    fn install_gradle_failing_after(&self, version: &str, fail_after: Option<u32>) {
        let bin = self
            .user_home()
            .join("distributions")
            .join(format!("gradle-{}", version))
            .join("bin");
        fs::create_dir_all(&bin).unwrap();
        let counter = match fail_after {
            Some(_) => self
                .dir
                .path()
                .join(format!("invocations-{}", version))
                .display()
                .to_string(),
            None => String::new(),
        };
        let script = GRADLE_TEMPLATE
            .replace("@VERSION@", version)
            .replace("@COUNTER@", &counter)
            .replace("@LIMIT@", &fail_after.unwrap_or(0).to_string());
        write_executable(&bin.join("gradle"), &script);
    }

    fn install_buckw(&self) {
        write_executable(&self.project_dir().join("buckw"), BUCKW_SCRIPT);
    }

    fn write_scenario_file(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("scenarios.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<()> {
        self.run_with_output(args, &self.output_dir())
    }

    fn run_with_output(&self, args: &[&str], output_dir: &Path) -> anyhow::Result<()> {
        let mut full: Vec<String> = vec![
            "buildbench".to_string(),
            "--project-dir".to_string(),
            self.project_dir().display().to_string(),
            "--output-dir".to_string(),
            output_dir.display().to_string(),
            "--gradle-user-home".to_string(),
            self.user_home().display().to_string(),
        ];
        full.extend(args.iter().map(|s| s.to_string()));
        run_with_cli(Cli::parse_from(full))
    }

    fn log(&self) -> String {
        fs::read_to_string(self.output_dir().join("profile.log")).unwrap()
    }

    fn csv_lines(&self) -> Vec<String> {
        csv_lines_at(&self.output_dir())
    }
}

fn csv_lines_at(output_dir: &Path) -> Vec<String> {
    fs::read_to_string(output_dir.join("benchmark.csv"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn profile_default_schedule_records_a_flight_recording() {
    let fixture = Fixture::new();
    fixture.install_gradle("3.1");
    let java_bin = fixture.dir.path().join("java/bin");
    fs::create_dir_all(&java_bin).unwrap();
    write_executable(&java_bin.join("jcmd"), JCMD_SCRIPT);
    std::env::set_var("JAVA_HOME", fixture.dir.path().join("java"));

    fixture
        .run(&["--gradle-version", "3.1", "--profile", "jfr", "assemble"])
        .unwrap();

    let log = fixture.log();
    // Probe, two warm-ups, one measured build.
    assert_eq!(count(&log, "<gradle-version: 3.1>"), 4);
    assert_eq!(count(&log, "<tasks: [help]>"), 1);
    assert_eq!(count(&log, "<tasks: [assemble]>"), 3);
    assert!(count(&log, "Starting recording for daemon with pid ") >= 1);
    assert!(fixture.output_dir().join("profile.jfr").is_file());
    // Profiling without benchmarking writes no CSV.
    assert!(!fixture.output_dir().join("benchmark.csv").exists());
}

#[test]
fn benchmark_single_scenario_single_version() {
    let fixture = Fixture::new();
    fixture.install_gradle("3.1");

    fixture
        .run(&["--benchmark", "--gradle-version", "3.1", "assemble"])
        .unwrap();

    let log = fixture.log();
    // Probe + initial clean build + 6 warm-ups + 10 measured builds.
    assert_eq!(count(&log, "<gradle-version: 3.1>"), 18);
    assert_eq!(count(&log, "<tasks: [help]>"), 1);
    assert_eq!(count(&log, "<tasks: [clean, assemble]>"), 1);
    assert_eq!(count(&log, "<tasks: [assemble]>"), 16);
    assert_eq!(count(&log, "* Running warm-up build"), 6);
    assert_eq!(count(&log, "* Running build"), 10);

    let lines = fixture.csv_lines();
    assert_eq!(lines.len(), 22);
    assert_eq!(lines[0], "build,3.1");
    assert_eq!(lines[1], "tasks,assemble");
    assert!(lines[2].starts_with("initial clean build,"));
}

#[test]
fn benchmark_without_daemon_probes_with_daemon_once() {
    let fixture = Fixture::new();
    fixture.install_gradle("3.1");

    fixture
        .run(&[
            "--benchmark",
            "--no-daemon",
            "--gradle-version",
            "3.1",
            "assemble",
        ])
        .unwrap();

    let log = fixture.log();
    assert_eq!(count(&log, "<daemon: true>"), 1);
    // Initial clean build, one warm-up, ten measured builds.
    assert_eq!(count(&log, "<daemon: false>"), 12);
    assert_eq!(fixture.csv_lines().len(), 17);
}

#[test]
fn benchmark_multiple_scenarios_and_versions() {
    let fixture = Fixture::new();
    fixture.install_gradle("3.0");
    fixture.install_gradle("3.1");
    let scenario_file = fixture.write_scenario_file(
        r#"
[assemble]
versions = ["3.0", "3.1"]
tasks = "assemble"

[help]
versions = "3.1"
tasks = ["help"]
run-using = "no-daemon"
"#,
    );

    fixture
        .run(&["--benchmark", "--scenario-file", &scenario_file.display().to_string()])
        .unwrap();

    let lines = fixture.csv_lines();
    assert_eq!(lines[0], "build,assemble 3.0,assemble 3.1,help 3.1");
    assert_eq!(lines.len(), 22);
    assert_eq!(lines[1], "tasks,assemble,assemble,help");

    let log = fixture.log();
    assert_eq!(count(&log, "(scenario 1/3)"), 1);
    assert_eq!(count(&log, "(scenario 3/3)"), 1);
}

#[test]
fn build_failure_empties_remaining_cells_and_fails_the_run() {
    let fixture = Fixture::new();
    // Probe, initial clean build and three warm-ups succeed, then every
    // invocation fails.
    fixture.install_gradle_failing_after("3.1", Some(5));

    let err = fixture
        .run(&["--benchmark", "--gradle-version", "3.1", "assemble"])
        .unwrap_err();
    assert_eq!(err.to_string(), "Scenario 'default' failed");

    let log = fixture.log();
    // Warm-ups 4..6 and builds 1..10 all fail.
    assert_eq!(
        count(&log, "ERROR: failed to run build. See log file for details."),
        13
    );

    let lines = fixture.csv_lines();
    assert_eq!(lines.len(), 22);
    assert!(lines[5].starts_with("warm-up build 3,"));
    assert_ne!(lines[5], "warm-up build 3,");
    assert_eq!(lines[6], "warm-up build 4,");
    assert_eq!(lines[7], "warm-up build 5,");
    assert_eq!(lines[8], "warm-up build 6,");
    assert_eq!(lines[9], "build 1,");
    assert_eq!(lines[18], "build 10,");
    assert_eq!(lines[19], "mean,NaN");
    assert_eq!(lines[20], "median,NaN");
    assert_eq!(lines[21], "stddev,NaN");
}

#[test]
fn buck_benchmark_discovers_all_targets() {
    let fixture = Fixture::new();
    fixture.install_buckw();
    let scenario_file = fixture.write_scenario_file(
        r#"
[buildTarget]
[buildTarget.buck]
type = "all"
"#,
    );

    fixture
        .run(&[
            "--benchmark",
            "--buck",
            "--scenario-file",
            &scenario_file.display().to_string(),
        ])
        .unwrap();

    let log = fixture.log();
    assert!(log.contains(
        "* Buck targets: [//target:android_binary, //target:java_library, \
         //target:cpp_library, //target/child:android_library, //target/child:cpp_library]"
    ));

    let lines = fixture.csv_lines();
    assert_eq!(lines.len(), 21);
    assert_eq!(lines[1], "tasks,");
    assert!(lines.iter().all(|l| !l.starts_with("initial clean build")));
}

#[test]
fn profiling_a_buck_scenario_is_a_configuration_error() {
    let fixture = Fixture::new();
    fixture.install_buckw();
    let scenario_file = fixture.write_scenario_file(
        r#"
[buildTarget]
[buildTarget.buck]
type = "all"
"#,
    );

    let err = fixture
        .run(&[
            "--benchmark",
            "--buck",
            "--profile",
            "buildscan",
            "--scenario-file",
            &scenario_file.display().to_string(),
        ])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Can only profile scenario 'buildTarget' when building using Gradle."
    );
    // Fatal before any build: nothing was invoked.
    assert_eq!(count(&fixture.log(), "* Running"), 0);
}

#[test]
fn build_scan_profiler_publishes_during_measured_builds() {
    let fixture = Fixture::new();
    fixture.install_gradle("3.1");

    fixture
        .run(&[
            "--benchmark",
            "--profile",
            "buildscan",
            "--gradle-version",
            "3.1",
            "assemble",
        ])
        .unwrap();

    let log = fixture.log();
    assert!(log.contains("Using build scan profiler version 1.6"));
    assert!(count(&log, "Publishing build information...") >= 1);
    assert!(fixture
        .output_dir()
        .join("build-scan-init.gradle")
        .is_file());
}

#[test]
fn jfr_without_a_daemon_is_a_configuration_error() {
    let fixture = Fixture::new();
    fixture.install_gradle("3.1");

    let err = fixture
        .run(&[
            "--benchmark",
            "--no-daemon",
            "--profile",
            "jfr",
            "--gradle-version",
            "3.1",
            "assemble",
        ])
        .unwrap_err();
    assert_eq!(err.to_string(), "Profiling with JFR requires the Gradle daemon.");
}

#[test]
fn mutated_file_is_restored_even_when_builds_fail() {
    let fixture = Fixture::new();
    fixture.install_gradle_failing_after("3.1", Some(2));
    let source_dir = fixture.project_dir().join("src/main/java");
    fs::create_dir_all(&source_dir).unwrap();
    let source = "class Thing {\n    void existing() {\n    }\n}\n";
    fs::write(source_dir.join("Thing.java"), source).unwrap();
    let scenario_file = fixture.write_scenario_file(
        r#"
[assemble]
versions = "3.1"
tasks = "assemble"
apply-abi-change-to = "src/main/java/Thing.java"
"#,
    );

    let err = fixture
        .run(&["--benchmark", "--scenario-file", &scenario_file.display().to_string()])
        .unwrap_err();
    assert_eq!(err.to_string(), "Scenario 'assemble' failed");

    let restored = fs::read_to_string(source_dir.join("Thing.java")).unwrap();
    assert_eq!(restored, source);
}

#[test]
fn dry_run_is_structurally_idempotent() {
    let fixture = Fixture::new();
    fixture.install_gradle("3.1");
    let first = fixture.dir.path().join("out-first");
    let second = fixture.dir.path().join("out-second");

    fixture
        .run_with_output(
            &["--benchmark", "--dry-run", "--gradle-version", "3.1", "assemble"],
            &first,
        )
        .unwrap();
    fixture
        .run_with_output(
            &["--benchmark", "--dry-run", "--gradle-version", "3.1", "assemble"],
            &second,
        )
        .unwrap();

    let first_lines = csv_lines_at(&first);
    let second_lines = csv_lines_at(&second);
    assert_eq!(first_lines.len(), second_lines.len());
    // Headers, initial, warm-up 1, build 1, then the stats rows.
    assert_eq!(first_lines[0], "build,3.1");
    assert_eq!(first_lines[2].split(',').next(), Some("initial clean build"));
    assert_eq!(first_lines[3].split(',').next(), Some("warm-up build 1"));
    assert_eq!(first_lines[4].split(',').next(), Some("build 1"));
    for (a, b) in first_lines.iter().zip(&second_lines) {
        assert_eq!(a.split(',').next(), b.split(',').next());
    }
}
