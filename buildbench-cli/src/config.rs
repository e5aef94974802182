//! Scenario File Loading
//!
//! The scenario file is a TOML document whose top-level tables are scenario
//! names. Unrecognized keys fail loudly, naming the key and the file, so a
//! typo never silently changes what gets benchmarked. Without a scenario
//! file a single scenario named `default` is synthesized from the command
//! line, whose positional arguments are then task names.

use anyhow::{anyhow, bail, Result};
use buildbench_core::scenario::{
    BuckOptions, BuckTargets, MavenOptions, MutationKind, MutatorSpec, RunUsing, Scenario,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

const RECOGNIZED_KEYS: &[&str] = &[
    "versions",
    "tasks",
    "cleanup-tasks",
    "run-using",
    "system-properties",
    "gradle-args",
    "apply-abi-change-to",
    "apply-non-abi-change-to",
    "apply-android-resource-change-to",
    "apply-android-resource-value-change-to",
    "buck",
    "maven",
];

const MUTATION_KEYS: &[(&str, MutationKind)] = &[
    ("apply-abi-change-to", MutationKind::AbiJava),
    ("apply-non-abi-change-to", MutationKind::NonAbiJava),
    ("apply-android-resource-change-to", MutationKind::AndroidResource),
    (
        "apply-android-resource-value-change-to",
        MutationKind::AndroidResourceValue,
    ),
];

/// Load the scenario file and select the scenarios to run.
///
/// `requested` names keep their command-line order; an empty request runs
/// every scenario in alphabetical order.
pub fn load_scenarios(path: &Path, requested: &[String]) -> Result<Vec<Scenario>> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow!("Cannot read scenario file {}: {}", path.display(), e))?;
    let document: Value = text
        .parse()
        .map_err(|e| anyhow!("Cannot parse scenario file {}: {}", path.display(), e))?;
    let Value::Table(table) = document else {
        bail!("Scenario file {} is not a table", path.display());
    };

    let mut scenarios = BTreeMap::new();
    for (name, value) in &table {
        scenarios.insert(name.clone(), parse_scenario(name, value, path)?);
    }

    if requested.is_empty() {
        return Ok(scenarios.into_values().collect());
    }
    requested
        .iter()
        .map(|name| {
            scenarios.get(name).cloned().ok_or_else(|| {
                let available: Vec<&str> = scenarios.keys().map(String::as_str).collect();
                anyhow!(
                    "Unknown scenario '{}' requested. Available scenarios are: {}",
                    name,
                    available.join(", ")
                )
            })
        })
        .collect()
}

/// The scenario used when no scenario file is given: the positional command
/// line arguments are its tasks.
pub fn default_scenario(tasks: Vec<String>) -> Scenario {
    Scenario::named("default", tasks)
}

fn parse_scenario(name: &str, value: &Value, path: &Path) -> Result<Scenario> {
    let Value::Table(table) = value else {
        bail!(
            "Scenario '{}' in scenario file {} is not a table",
            name,
            path.display()
        );
    };
    for key in table.keys() {
        if !RECOGNIZED_KEYS.contains(&key.as_str()) {
            bail!(
                "Unrecognized key '{}.{}' defined in scenario file {}",
                name,
                key,
                path.display()
            );
        }
    }

    let mut scenario = Scenario::named(name, Vec::new());
    if let Some(value) = table.get("versions") {
        scenario.versions = string_or_list(value, name, "versions")?;
    }
    if let Some(value) = table.get("tasks") {
        scenario.tasks = string_or_list(value, name, "tasks")?;
    }
    if let Some(value) = table.get("cleanup-tasks") {
        scenario.cleanup_tasks = string_or_list(value, name, "cleanup-tasks")?;
    }
    if let Some(value) = table.get("run-using") {
        scenario.run_using = match value.as_str() {
            Some("tool-api") => RunUsing::ToolApi,
            Some("no-daemon") => RunUsing::NoDaemon,
            _ => bail!(
                "Scenario '{}' has an invalid 'run-using' value; use 'tool-api' or 'no-daemon'",
                name
            ),
        };
    }
    if let Some(value) = table.get("system-properties") {
        scenario.system_properties = system_properties(value, name)?;
    }
    if let Some(value) = table.get("gradle-args") {
        scenario.gradle_args = string_or_list(value, name, "gradle-args")?;
    }

    let mut mutations = Vec::new();
    for (key, kind) in MUTATION_KEYS {
        if let Some(value) = table.get(*key) {
            let target = value.as_str().ok_or_else(|| {
                anyhow!("Scenario '{}' key '{}' must be a file path", name, key)
            })?;
            mutations.push(MutatorSpec {
                kind: *kind,
                target: PathBuf::from(target),
            });
        }
    }
    if mutations.len() > 1 {
        bail!("Scenario '{}' defines more than one source mutation", name);
    }
    scenario.mutator = mutations.pop();

    if let Some(value) = table.get("buck") {
        scenario.buck = Some(parse_buck(name, value, path)?);
    }
    if let Some(value) = table.get("maven") {
        scenario.maven = Some(parse_maven(name, value)?);
    }

    if scenario.tasks.is_empty() && scenario.buck.is_none() && scenario.maven.is_none() {
        bail!("Scenario '{}' does not define any tasks.", name);
    }
    Ok(scenario)
}

fn parse_buck(name: &str, value: &Value, path: &Path) -> Result<BuckOptions> {
    let Value::Table(table) = value else {
        bail!("Scenario '{}' key 'buck' must be a table", name);
    };
    for key in table.keys() {
        if key != "targets" && key != "type" {
            bail!(
                "Unrecognized key '{}.buck.{}' defined in scenario file {}",
                name,
                key,
                path.display()
            );
        }
    }
    match (table.get("targets"), table.get("type")) {
        (Some(_), Some(_)) => bail!(
            "Scenario '{}' may define either 'buck.targets' or 'buck.type', not both",
            name
        ),
        (Some(targets), None) => Ok(BuckOptions {
            targets: BuckTargets::Literal(string_or_list(targets, name, "buck.targets")?),
        }),
        (None, Some(type_value)) => {
            let type_name = type_value.as_str().ok_or_else(|| {
                anyhow!("Scenario '{}' key 'buck.type' must be a string", name)
            })?;
            Ok(BuckOptions {
                targets: if type_name == "all" {
                    BuckTargets::All
                } else {
                    BuckTargets::Type(type_name.to_string())
                },
            })
        }
        (None, None) => bail!(
            "Scenario '{}' must define 'buck.targets' or 'buck.type'",
            name
        ),
    }
}

fn parse_maven(name: &str, value: &Value) -> Result<MavenOptions> {
    let Value::Table(table) = value else {
        bail!("Scenario '{}' key 'maven' must be a table", name);
    };
    let targets = table
        .get("targets")
        .ok_or_else(|| anyhow!("Scenario '{}' must define 'maven.targets'", name))?;
    Ok(MavenOptions {
        targets: string_or_list(targets, name, "maven.targets")?,
    })
}

fn string_or_list(value: &Value, scenario: &str, key: &str) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    anyhow!(
                        "Scenario '{}' key '{}' must contain only strings",
                        scenario,
                        key
                    )
                })
            })
            .collect(),
        _ => bail!(
            "Scenario '{}' key '{}' must be a string or a list of strings",
            scenario,
            key
        ),
    }
}

fn system_properties(value: &Value, scenario: &str) -> Result<BTreeMap<String, String>> {
    let Value::Table(table) = value else {
        bail!(
            "Scenario '{}' key 'system-properties' must be a table",
            scenario
        );
    };
    let mut properties = BTreeMap::new();
    for (key, value) in table {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            _ => bail!(
                "Scenario '{}' system property '{}' must be a scalar",
                scenario,
                key
            ),
        };
        properties.insert(key.clone(), value);
    }
    Ok(properties)
}

/// Versions to run a scenario against: the scenario's own list, else the
/// `--gradle-version` values, else the project wrapper's version.
pub fn resolve_versions(
    scenario: &Scenario,
    cli_versions: &[String],
    project_dir: &Path,
) -> Result<Vec<String>> {
    if !scenario.versions.is_empty() {
        return Ok(scenario.versions.clone());
    }
    if !cli_versions.is_empty() {
        return Ok(cli_versions.to_vec());
    }
    if let Some(version) = wrapper_version(project_dir) {
        return Ok(vec![version]);
    }
    bail!(
        "Unable to determine a Gradle version for scenario '{}'. Use --gradle-version or add a 'versions' entry.",
        scenario.name
    );
}

/// Version pinned by `gradle/wrapper/gradle-wrapper.properties`, if any.
fn wrapper_version(project_dir: &Path) -> Option<String> {
    let properties = project_dir.join("gradle/wrapper/gradle-wrapper.properties");
    let text = fs::read_to_string(properties).ok()?;
    let pattern = Regex::new(r"distributionUrl=.*gradle-([0-9][^-/]*)-(?:bin|all)\.zip")
        .expect("static pattern");
    pattern
        .captures(&text)
        .map(|captures| captures[1].to_string())
}
