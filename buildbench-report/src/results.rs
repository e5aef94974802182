//! Results Table
//!
//! One `BuildColumn` per scenario execution, pre-sized from the planned
//! schedule so that an aborted execution keeps its unfilled cells blank.
//! Rows are addressed by invocation label; the probe is never recorded.

use buildbench_core::schedule::InvocationLabel;
use std::time::Duration;

/// Timings of one scenario execution, one column of the report
#[derive(Debug, Clone)]
pub struct BuildColumn {
    pub(crate) label: String,
    pub(crate) tasks: String,
    pub(crate) initial: Option<Option<Duration>>,
    pub(crate) warmups: Vec<Option<Duration>>,
    pub(crate) measured: Vec<Option<Duration>>,
}

impl BuildColumn {
    /// A column sized for the planned schedule, all cells empty.
    pub fn new(
        label: String,
        tasks: String,
        has_initial: bool,
        warmup_count: usize,
        iteration_count: usize,
    ) -> Self {
        BuildColumn {
            label,
            tasks,
            initial: if has_initial { Some(None) } else { None },
            warmups: vec![None; warmup_count],
            measured: vec![None; iteration_count],
        }
    }

    /// Record a completed invocation's duration under its label.
    ///
    /// Out-of-range labels and the probe are ignored; failed invocations are
    /// simply never recorded, leaving their cell blank.
    pub fn record(&mut self, label: InvocationLabel, elapsed: Duration) {
        match label {
            InvocationLabel::Probe => {}
            InvocationLabel::InitialCleanBuild => {
                if let Some(cell) = self.initial.as_mut() {
                    *cell = Some(elapsed);
                }
            }
            InvocationLabel::WarmUp(n) => {
                if let Some(cell) = n.checked_sub(1).and_then(|i| self.warmups.get_mut(i)) {
                    *cell = Some(elapsed);
                }
            }
            InvocationLabel::Measured(n) => {
                if let Some(cell) = n.checked_sub(1).and_then(|i| self.measured.get_mut(i)) {
                    *cell = Some(elapsed);
                }
            }
        }
    }

    /// Column header text.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Recorded measured builds, in milliseconds, skipping blank cells.
    pub fn measured_millis(&self) -> Vec<f64> {
        self.measured
            .iter()
            .flatten()
            .map(|d| d.as_millis() as f64)
            .collect()
    }
}

/// The full results table, columns in execution order
#[derive(Debug, Default)]
pub struct BenchmarkResults {
    pub(crate) columns: Vec<BuildColumn>,
}

impl BenchmarkResults {
    /// An empty table.
    pub fn new() -> Self {
        BenchmarkResults::default()
    }

    /// Append the next execution's column.
    pub fn push(&mut self, column: BuildColumn) {
        self.columns.push(column);
    }

    /// Columns recorded so far.
    pub fn columns(&self) -> &[BuildColumn] {
        &self.columns
    }

    /// Whether any column has an initial clean build row.
    pub fn has_initial_row(&self) -> bool {
        self.columns.iter().any(|c| c.initial.is_some())
    }

    /// Widest warm-up series across columns.
    pub fn max_warmups(&self) -> usize {
        self.columns.iter().map(|c| c.warmups.len()).max().unwrap_or(0)
    }

    /// Widest measured series across columns.
    pub fn max_measured(&self) -> usize {
        self.columns.iter().map(|c| c.measured.len()).max().unwrap_or(0)
    }
}
