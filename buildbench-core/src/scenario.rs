//! Scenario Model
//!
//! Immutable descriptions of what to run. A `Scenario` is produced by the
//! config loader and never changes afterwards; pairing it with one target
//! version yields a `ScenarioExecution`, the unit the orchestrator drives and
//! the unit that owns one column of the benchmark report.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Build tool driven by a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTool {
    /// Gradle, via the daemon or a transient process
    Gradle,
    /// Buck, via the project's `buckw` wrapper
    Buck,
    /// Maven, via `$MAVEN_HOME/bin/mvn`
    Maven,
}

impl fmt::Display for BuildTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildTool::Gradle => write!(f, "Gradle"),
            BuildTool::Buck => write!(f, "buck"),
            BuildTool::Maven => write!(f, "maven"),
        }
    }
}

/// How Gradle invocations are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunUsing {
    /// One long-lived daemon shared by every invocation of the execution
    #[default]
    ToolApi,
    /// A fresh `--no-daemon` process per invocation
    NoDaemon,
}

impl fmt::Display for RunUsing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunUsing::ToolApi => write!(f, "tool-api"),
            RunUsing::NoDaemon => write!(f, "no-daemon"),
        }
    }
}

/// Reversible source edit applied between invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Add a new public method with a unique signature per invocation
    AbiJava,
    /// Add a statement to an existing method body, signature unchanged
    NonAbiJava,
    /// Add a new `<string>` resource with a unique name per invocation
    AndroidResource,
    /// Change the text of an existing `<string>` resource
    AndroidResourceValue,
}

/// Mutation kind plus the file it applies to, relative to the project dir
#[derive(Debug, Clone)]
pub struct MutatorSpec {
    /// Which edit to apply
    pub kind: MutationKind,
    /// Target file, relative to the project directory
    pub target: PathBuf,
}

/// Buck target selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuckTargets {
    /// Literal target paths given in the scenario file
    Literal(Vec<String>),
    /// Every target reported by `buckw targets`
    All,
    /// Targets of one type, reported by `buckw targets --type <T>`
    Type(String),
}

/// The `buck { .. }` block of a scenario
#[derive(Debug, Clone)]
pub struct BuckOptions {
    /// What to build
    pub targets: BuckTargets,
}

/// The `maven { .. }` block of a scenario
#[derive(Debug, Clone)]
pub struct MavenOptions {
    /// Arguments passed to `mvn`
    pub targets: Vec<String>,
}

/// Named description of a reproducible build to benchmark or profile
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name, the top-level key in the scenario file
    pub name: String,
    /// Target Gradle versions; empty means "use the run-level default"
    pub versions: Vec<String>,
    /// Tasks of the warm-up and measured invocations
    pub tasks: Vec<String>,
    /// Tasks prepended for the initial clean build only
    pub cleanup_tasks: Vec<String>,
    /// Gradle execution mode
    pub run_using: RunUsing,
    /// `-Dname=value` properties forwarded to every invocation
    pub system_properties: BTreeMap<String, String>,
    /// Extra Gradle command-line arguments, forwarded verbatim
    pub gradle_args: Vec<String>,
    /// Optional source mutation applied before warm-up and measured builds
    pub mutator: Option<MutatorSpec>,
    /// Buck options, when the scenario can run under buck
    pub buck: Option<BuckOptions>,
    /// Maven options, when the scenario can run under maven
    pub maven: Option<MavenOptions>,
}

impl Scenario {
    /// A scenario with nothing but a name and tasks, everything else default.
    pub fn named(name: impl Into<String>, tasks: Vec<String>) -> Self {
        Scenario {
            name: name.into(),
            versions: Vec::new(),
            tasks,
            cleanup_tasks: Vec::new(),
            run_using: RunUsing::default(),
            system_properties: BTreeMap::new(),
            gradle_args: Vec::new(),
            mutator: None,
            buck: None,
            maven: None,
        }
    }

    /// Task list of the initial clean build: cleanup tasks (defaulting to
    /// `clean`) followed by the scenario tasks.
    pub fn initial_tasks(&self) -> Vec<String> {
        let mut tasks = if self.cleanup_tasks.is_empty() {
            vec!["clean".to_string()]
        } else {
            self.cleanup_tasks.clone()
        };
        tasks.extend(self.tasks.iter().cloned());
        tasks
    }
}

/// One (scenario, version, build tool) tuple, producing one report column
#[derive(Debug, Clone)]
pub struct ScenarioExecution {
    /// The scenario being executed
    pub scenario: Scenario,
    /// Tool actually driving the builds
    pub tool: BuildTool,
    /// Target version; the tool name for buck and maven
    pub version: String,
    /// 1-based position in the run
    pub index: usize,
    /// Number of executions in the run
    pub total: usize,
}

impl ScenarioExecution {
    /// Column header in the benchmark report.
    ///
    /// A run with exactly one execution labels its column with the bare
    /// version; any larger run qualifies every column with the scenario name.
    pub fn column_label(&self) -> String {
        if self.total == 1 {
            self.version.clone()
        } else {
            format!("{} {}", self.scenario.name, self.version)
        }
    }

    /// Content of the `tasks` report row; empty for buck and maven.
    pub fn task_display(&self) -> String {
        match self.tool {
            BuildTool::Gradle => self.scenario.tasks.join(" "),
            BuildTool::Buck | BuildTool::Maven => String::new(),
        }
    }

    /// Artifact directory of this execution under the output root.
    ///
    /// A single execution writes at the root. A single scenario with several
    /// versions splits by version, several scenarios split by name, and both
    /// at once split by name then version.
    pub fn artifact_dir(
        &self,
        output_root: &Path,
        scenario_count: usize,
        version_count: usize,
    ) -> PathBuf {
        match (scenario_count > 1, version_count > 1) {
            (false, false) => output_root.to_path_buf(),
            (false, true) => output_root.join(&self.version),
            (true, false) => output_root.join(&self.scenario.name),
            (true, true) => output_root.join(&self.scenario.name).join(&self.version),
        }
    }
}
