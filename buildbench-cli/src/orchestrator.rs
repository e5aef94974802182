//! Orchestrator
//!
//! The top-level loop: expand scenarios into executions, then for each one
//! acquire the mutator, the profilers and an invoker, drive the invocation
//! schedule, and feed timings into the results table. Executions run
//! strictly sequentially; a failed execution empties its remaining cells
//! and the run continues, surfacing the first failure only at the very end.

use crate::{config, Cli};
use anyhow::{anyhow, bail, Context, Result};
use buildbench_core::output::RunLog;
use buildbench_core::scenario::{BuildTool, RunUsing, Scenario, ScenarioExecution};
use buildbench_core::schedule::{plan, InvocationLabel, RunMode};
use buildbench_core::SourceMutator;
use buildbench_invoke::{
    BuckInvoker, BuildConfiguration, BuildInvoker, GradleInvoker, MavenInvoker,
};
use buildbench_profile::{Profiler, ProfilerSettings};
use buildbench_report::{write_csv, BenchmarkResults, BuildColumn};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn run(cli: &Cli, project_dir: &Path) -> Result<()> {
    fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!("Cannot create output directory {}", cli.output_dir.display())
    })?;
    let log = RunLog::create(&cli.output_dir.join("profile.log"))?;
    ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst)).ok();

    let scenarios = match &cli.scenario_file {
        Some(path) => config::load_scenarios(path, &cli.targets)?,
        None => vec![config::default_scenario(cli.targets.clone())],
    };
    let executions = expand_executions(cli, project_dir, scenarios)?;
    validate_profiling(cli, &executions)?;

    let mode = RunMode {
        benchmark: cli.benchmark,
        profile: !cli.profile.is_empty(),
        dry_run: cli.dry_run,
        warmups: cli.warmups,
        iterations: cli.iterations,
    };
    let settings = ProfilerSettings {
        buildscan_version: cli.buildscan_version.clone(),
        yourkit_sampling: cli.yourkit_sampling,
        yourkit_memory: cli.yourkit_memory,
        jprofiler_home: cli.jprofiler_home.clone(),
        jprofiler_config: cli.jprofiler_config.clone(),
        jprofiler_session_id: cli.jprofiler_session_id.clone(),
    };

    let mut version_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for execution in &executions {
        *version_counts.entry(execution.scenario.name.as_str()).or_default() += 1;
    }
    let scenario_count = version_counts.len();

    let mut results = BenchmarkResults::new();
    let mut first_failure: Option<anyhow::Error> = None;
    for execution in &executions {
        if interrupted() {
            first_failure.get_or_insert_with(|| anyhow!("Interrupted"));
            break;
        }
        let version_count = version_counts[execution.scenario.name.as_str()];
        let (column, outcome) = run_execution(
            cli,
            project_dir,
            execution,
            &mode,
            &settings,
            &log,
            scenario_count,
            version_count,
        );
        results.push(column);
        if let Err(failure) = outcome {
            tracing::debug!(scenario = %execution.scenario.name, "execution failed");
            if first_failure.is_none() {
                first_failure = Some(failure);
            }
        }
    }

    // The report is written even when the run aborted; unfilled cells of an
    // incomplete execution stay blank.
    if cli.benchmark {
        write_csv(&results, &cli.output_dir.join("benchmark.csv"))
            .context("Cannot write benchmark results")?;
    }
    log.flush();

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}

/// Expand scenarios into the flat, deterministically ordered execution list.
fn expand_executions(
    cli: &Cli,
    project_dir: &Path,
    scenarios: Vec<Scenario>,
) -> Result<Vec<ScenarioExecution>> {
    let mut expanded: Vec<(Scenario, BuildTool, String)> = Vec::new();
    for mut scenario in scenarios {
        if cli.no_daemon {
            scenario.run_using = RunUsing::NoDaemon;
        }
        let mut properties: BTreeMap<String, String> =
            cli.system_property.iter().cloned().collect();
        properties.extend(std::mem::take(&mut scenario.system_properties));
        scenario.system_properties = properties;

        if cli.buck {
            // Scenarios without a buck block are silently skipped.
            if scenario.buck.is_none() {
                tracing::debug!(scenario = %scenario.name, "no buck block, skipped");
                continue;
            }
            expanded.push((scenario, BuildTool::Buck, "buck".to_string()));
        } else if cli.maven {
            if scenario.maven.is_none() {
                tracing::debug!(scenario = %scenario.name, "no maven block, skipped");
                continue;
            }
            expanded.push((scenario, BuildTool::Maven, "maven".to_string()));
        } else {
            let versions =
                config::resolve_versions(&scenario, &cli.gradle_version, project_dir)?;
            for version in versions {
                expanded.push((scenario.clone(), BuildTool::Gradle, version));
            }
        }
    }
    if expanded.is_empty() {
        bail!("No scenarios to run.");
    }

    let total = expanded.len();
    Ok(expanded
        .into_iter()
        .enumerate()
        .map(|(i, (scenario, tool, version))| ScenarioExecution {
            scenario,
            tool,
            version,
            index: i + 1,
            total,
        })
        .collect())
}

/// Profiler combination checks; fatal before any build runs.
fn validate_profiling(cli: &Cli, executions: &[ScenarioExecution]) -> Result<()> {
    if cli.profile.is_empty() {
        return Ok(());
    }
    for execution in executions {
        if execution.tool != BuildTool::Gradle {
            bail!(
                "Can only profile scenario '{}' when building using Gradle.",
                execution.scenario.name
            );
        }
        if cli.profile.iter().any(|kind| kind.requires_daemon())
            && execution.scenario.run_using == RunUsing::NoDaemon
        {
            bail!("Profiling with JFR requires the Gradle daemon.");
        }
    }
    Ok(())
}

/// Drive one scenario execution. The column is returned even on failure so
/// the report keeps a blank-celled record of what never ran.
#[allow(clippy::too_many_arguments)]
fn run_execution(
    cli: &Cli,
    project_dir: &Path,
    execution: &ScenarioExecution,
    mode: &RunMode,
    settings: &ProfilerSettings,
    log: &RunLog,
    scenario_count: usize,
    version_count: usize,
) -> (BuildColumn, Result<()>) {
    let scenario = &execution.scenario;
    let schedule = plan(execution.tool, scenario, mode);
    let mut column = BuildColumn::new(
        execution.column_label(),
        execution.task_display(),
        schedule.has_initial,
        schedule.warmup_count,
        schedule.iteration_count,
    );

    let using = match execution.tool {
        BuildTool::Gradle => format!("Gradle {}", execution.version),
        tool => tool.to_string(),
    };
    let mut banner = format!("* Running scenario {} using {}", scenario.name, using);
    if execution.total > 1 {
        banner.push_str(&format!(" (scenario {}/{})", execution.index, execution.total));
    }
    log.line(&banner);

    let artifact_dir = execution.artifact_dir(&cli.output_dir, scenario_count, version_count);

    let result = (|| -> Result<()> {
        fs::create_dir_all(&artifact_dir)?;

        // The mutator guard reverts the file on every exit path below.
        let mut mutator = match &scenario.mutator {
            Some(spec) => Some(SourceMutator::acquire(project_dir, spec).with_context(|| {
                format!("Cannot read mutated file {}", spec.target.display())
            })?),
            None => None,
        };

        let mut profilers = Vec::with_capacity(cli.profile.len());
        for kind in &cli.profile {
            profilers.push(Profiler::create(*kind, &artifact_dir, settings, log)?);
        }
        let mut build_config = BuildConfiguration::default();
        for profiler in &profilers {
            profiler.adjust_build(&mut build_config)?;
        }

        let mut invoker: Box<dyn BuildInvoker> = match execution.tool {
            BuildTool::Gradle => Box::new(GradleInvoker::new(
                project_dir,
                &cli.gradle_user_home,
                &execution.version,
                scenario,
                cli.dry_run,
                build_config,
                log.clone(),
            )?),
            BuildTool::Buck => {
                let options = scenario
                    .buck
                    .as_ref()
                    .ok_or_else(|| anyhow!("Scenario '{}' has no buck block", scenario.name))?;
                Box::new(BuckInvoker::new(project_dir.to_path_buf(), options, log.clone()))
            }
            BuildTool::Maven => {
                let options = scenario
                    .maven
                    .as_ref()
                    .ok_or_else(|| anyhow!("Scenario '{}' has no maven block", scenario.name))?;
                Box::new(MavenInvoker::new(
                    project_dir.to_path_buf(),
                    options,
                    log.clone(),
                )?)
            }
        };

        let mut build_failure: Option<anyhow::Error> = None;
        for invocation in &schedule.invocations {
            if interrupted() {
                bail!("Interrupted");
            }
            if invocation.label == InvocationLabel::Probe {
                // The probe prepares the tool; it is never timed, recorded
                // or profiled, and its failure fails the whole execution.
                log.line(&format!("* Running {}", invocation.label));
                if let Some(env) = invoker.probe()? {
                    fs::write(
                        artifact_dir.join("build-environment.json"),
                        serde_json::to_string_pretty(&env)?,
                    )?;
                }
                log.flush();
                continue;
            }
            if invocation.mutated {
                if let Some(mutator) = mutator.as_mut() {
                    mutator.apply_next().context("Cannot apply source mutation")?;
                }
            }
            log.line(&format!("* Running {}", invocation.label));
            let pid = invoker.daemon_pid();
            if invocation.profiled {
                for profiler in &mut profilers {
                    profiler.before_measured(pid)?;
                }
            }
            let outcome = invoker.run(invocation);
            if invocation.profiled {
                for profiler in &mut profilers {
                    profiler.after_measured(pid)?;
                }
            }
            match outcome {
                Ok(elapsed) => {
                    if invocation.label.is_timed() {
                        column.record(invocation.label, elapsed);
                    }
                }
                Err(failure) => {
                    log.line("ERROR: failed to run build. See log file for details.");
                    log.detail(&failure.to_string());
                    if build_failure.is_none() {
                        build_failure = Some(anyhow::Error::new(failure));
                    }
                }
            }
            log.flush();
        }

        for profiler in &mut profilers {
            profiler.finalize()?;
        }
        invoker.shutdown()?;
        if let Some(mutator) = mutator.as_mut() {
            mutator.revert().context("Cannot revert mutated file")?;
        }

        match build_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    })();

    let result = result.map_err(|failure| {
        failure.context(format!("Scenario '{}' failed", scenario.name))
    });
    (column, result)
}
