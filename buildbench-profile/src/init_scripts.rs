//! Generated Init Scripts
//!
//! Build Scan and Chrome Trace both work by handing Gradle a generated init
//! script. The scripts are written into the execution's output directory
//! and passed to every invocation via `--init-script`.

use crate::ProfilerError;
use buildbench_core::output::RunLog;
use buildbench_invoke::BuildConfiguration;
use std::fs;
use std::path::{Path, PathBuf};

/// Build-scan plugin version applied when none is requested.
pub const DEFAULT_BUILD_SCAN_VERSION: &str = "1.6";

/// Publishes a build scan for every build of the execution.
pub struct BuildScanPublisher {
    script: PathBuf,
}

impl BuildScanPublisher {
    pub fn new(
        output_dir: &Path,
        version: Option<&str>,
        log: &RunLog,
    ) -> Result<Self, ProfilerError> {
        let version = version.unwrap_or(DEFAULT_BUILD_SCAN_VERSION);
        let script = output_dir.join("build-scan-init.gradle");
        fs::write(&script, build_scan_script(version))?;
        log.line(&format!("Using build scan profiler version {}", version));
        Ok(BuildScanPublisher { script })
    }

    pub fn adjust_build(&self, build: &mut BuildConfiguration) -> Result<(), ProfilerError> {
        build.init_scripts.push(self.script.clone());
        Ok(())
    }
}

fn build_scan_script(version: &str) -> String {
    format!(
        "initscript {{
    repositories {{
        maven {{
            url \"https://plugins.gradle.org/m2\"
        }}
    }}
    dependencies {{
        classpath \"com.gradle:build-scan-plugin:{}\"
    }}
}}

rootProject {{ prj ->
    apply plugin: initscript.classLoader.loadClass(\"com.gradle.scan.plugin.BuildScanPlugin\")
    buildScan {{
        licenseAgreementUrl = 'https://gradle.com/terms-of-service'
        licenseAgree = 'yes'
        publishAlways()
    }}
}}
",
        version
    )
}

/// Writes a `chrome-trace.html` task timeline for every build.
pub struct ChromeTraceWriter {
    script: PathBuf,
}

impl ChromeTraceWriter {
    pub fn new(output_dir: &Path) -> Result<Self, ProfilerError> {
        let script = output_dir.join("chrome-trace-init.gradle");
        fs::write(&script, chrome_trace_script(&output_dir.join("chrome-trace.html")))?;
        Ok(ChromeTraceWriter { script })
    }

    pub fn adjust_build(&self, build: &mut BuildConfiguration) -> Result<(), ProfilerError> {
        build.init_scripts.push(self.script.clone());
        Ok(())
    }
}

fn chrome_trace_script(trace_file: &Path) -> String {
    format!(
        "import groovy.json.JsonOutput

def events = []
def clock = System.&nanoTime

gradle.taskGraph.beforeTask {{ task ->
    task.ext.traceStart = clock()
}}
gradle.taskGraph.afterTask {{ task ->
    events << [name: task.path, ph: 'X', pid: 1, tid: 1,
               ts: (long) (task.ext.traceStart / 1000),
               dur: (long) ((clock() - task.ext.traceStart) / 1000)]
}}
gradle.buildFinished {{
    def trace = new File('{}')
    trace.parentFile?.mkdirs()
    trace.text = \"<html><body><script>var trace = \" +
        JsonOutput.toJson([traceEvents: events]) + \";</script></body></html>\"
}}
",
        trace_file.display()
    )
}
