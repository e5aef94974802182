#![warn(missing_docs)]
//! BuildBench CLI
//!
//! Command-line surface and top-level orchestration. `run()` parses the
//! arguments and drives the whole run; `run_with_cli()` accepts pre-parsed
//! arguments so tests can exercise the orchestrator in-process.

pub mod config;
mod orchestrator;

use anyhow::bail;
use buildbench_profile::ProfilerKind;
use clap::Parser;
use std::path::PathBuf;

/// Benchmark and profile builds of Gradle, Buck and Maven projects.
#[derive(Parser, Debug)]
#[command(name = "buildbench")]
#[command(author, version, about)]
pub struct Cli {
    /// Directory of the project to build
    #[arg(long, value_name = "PATH")]
    pub project_dir: Option<PathBuf>,

    /// Directory for benchmark results and profiler artifacts
    #[arg(long, value_name = "PATH", default_value = "profile-out")]
    pub output_dir: PathBuf,

    /// Gradle version to use when scenarios don't specify one; repeatable
    #[arg(long = "gradle-version", value_name = "VERSION")]
    pub gradle_version: Vec<String>,

    /// Scenario definition file
    #[arg(long, visible_alias = "config-file", value_name = "PATH")]
    pub scenario_file: Option<PathBuf>,

    /// Benchmark the scenarios and write benchmark.csv
    #[arg(long)]
    pub benchmark: bool,

    /// Profile the scenarios with the given profiler; repeatable.
    /// One of: jfr, hp, yourkit, jprofiler, buildscan, chrome-trace
    #[arg(long = "profile", value_name = "NAME")]
    pub profile: Vec<ProfilerKind>,

    /// Run all Gradle scenarios with --no-daemon instead of the tool API
    #[arg(long)]
    pub no_daemon: bool,

    /// Number of warm-up builds when profiling without benchmarking
    #[arg(long, value_name = "N")]
    pub warmups: Option<usize>,

    /// Number of measured builds when profiling without benchmarking
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,

    /// Pass -m to Gradle and collapse the schedule to one build of each kind
    #[arg(long)]
    pub dry_run: bool,

    /// Run scenarios that declare a buck block using Buck
    #[arg(long)]
    pub buck: bool,

    /// Run scenarios that declare a maven block using Maven
    #[arg(long)]
    pub maven: bool,

    /// Build-scan plugin version applied by the buildscan profiler
    #[arg(long, value_name = "VERSION")]
    pub buildscan_version: Option<String>,

    /// Isolated Gradle user home used for all builds
    #[arg(long, value_name = "PATH", default_value = "gradle-user-home")]
    pub gradle_user_home: PathBuf,

    /// Use YourKit CPU sampling instead of tracing
    #[arg(long)]
    pub yourkit_sampling: bool,

    /// Use YourKit memory allocation recording
    #[arg(long)]
    pub yourkit_memory: bool,

    /// JProfiler installation directory; defaults to $JPROFILER_HOME
    #[arg(long, value_name = "PATH")]
    pub jprofiler_home: Option<PathBuf>,

    /// JProfiler session configuration file
    #[arg(long, value_name = "PATH")]
    pub jprofiler_config: Option<PathBuf>,

    /// JProfiler session id recorded in offline mode
    #[arg(long, value_name = "ID")]
    pub jprofiler_session_id: Option<String>,

    /// System property applied to every scenario, as key=value; repeatable
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_system_property)]
    pub system_property: Vec<(String, String)>,

    /// Scenario names to run (with --scenario-file), or the tasks of a
    /// default scenario (without); all scenarios run when omitted
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
}

fn parse_system_property(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("invalid system property '{}', expected key=value", s))
}

/// Parse the command line and drive the run.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Drive the run with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Diagnostics go through tracing; the stdout protocol stays clean
    // unless the operator opts in via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("buildbench=warn")),
        )
        .try_init()
        .ok();

    if cli.profile.is_empty() && !cli.benchmark {
        bail!("Neither --profile or --benchmark specified.");
    }
    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => bail!("No project directory specified."),
    };

    orchestrator::run(&cli, &project_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_runs_without_a_goal() {
        let cli = Cli::parse_from(["buildbench", "--project-dir", "/tmp/p"]);
        let err = run_with_cli(cli).unwrap_err();
        assert_eq!(err.to_string(), "Neither --profile or --benchmark specified.");
    }

    #[test]
    fn rejects_runs_without_a_project() {
        let cli = Cli::parse_from(["buildbench", "--benchmark"]);
        let err = run_with_cli(cli).unwrap_err();
        assert_eq!(err.to_string(), "No project directory specified.");
    }

    #[test]
    fn profile_flags_accumulate() {
        let cli = Cli::parse_from([
            "buildbench",
            "--profile",
            "jfr",
            "--profile",
            "buildscan",
            "--project-dir",
            "/tmp/p",
            "assemble",
        ]);
        assert_eq!(
            cli.profile,
            vec![ProfilerKind::Jfr, ProfilerKind::BuildScan]
        );
        assert_eq!(cli.targets, vec!["assemble"]);
    }

    #[test]
    fn system_properties_parse_as_pairs() {
        let cli = Cli::parse_from([
            "buildbench",
            "--benchmark",
            "-Dorg.gradle.parallel=true",
            "-Dfoo=bar=baz",
        ]);
        assert_eq!(
            cli.system_property,
            vec![
                ("org.gradle.parallel".to_string(), "true".to_string()),
                ("foo".to_string(), "bar=baz".to_string()),
            ]
        );
    }

    #[test]
    fn config_file_is_an_alias_for_scenario_file() {
        let cli = Cli::parse_from(["buildbench", "--benchmark", "--config-file", "s.toml"]);
        assert_eq!(cli.scenario_file, Some(PathBuf::from("s.toml")));
    }
}
