//! CSV Output
//!
//! Writes the benchmark table: a `build` header naming every column, one
//! `tasks` row, one row per timed phase, then the three summary rows.
//! Blank cells mark failed invocations and phases a column never had.

use crate::results::{BenchmarkResults, BuildColumn};
use crate::stats;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Write the results table to `path`, overwriting any previous report.
pub fn write_csv(results: &BenchmarkResults, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    write_row(&mut out, "build", results.columns(), |c| {
        c.label().to_string()
    })?;
    write_row(&mut out, "tasks", results.columns(), |c| c.tasks.clone())?;

    if results.has_initial_row() {
        write_row(&mut out, "initial clean build", results.columns(), |c| {
            cell(c.initial.flatten())
        })?;
    }
    for n in 1..=results.max_warmups() {
        let title = format!("warm-up build {}", n);
        write_row(&mut out, &title, results.columns(), |c| {
            cell(c.warmups.get(n - 1).copied().flatten())
        })?;
    }
    for n in 1..=results.max_measured() {
        let title = format!("build {}", n);
        write_row(&mut out, &title, results.columns(), |c| {
            cell(c.measured.get(n - 1).copied().flatten())
        })?;
    }

    write_row(&mut out, "mean", results.columns(), |c| {
        format!("{:.2}", stats::mean(&c.measured_millis()))
    })?;
    write_row(&mut out, "median", results.columns(), |c| {
        format!("{:.2}", stats::median(&c.measured_millis()))
    })?;
    write_row(&mut out, "stddev", results.columns(), |c| {
        format!("{:.2}", stats::std_dev(&c.measured_millis()))
    })?;

    out.flush()
}

fn write_row(
    out: &mut impl Write,
    title: &str,
    columns: &[BuildColumn],
    value: impl Fn(&BuildColumn) -> String,
) -> io::Result<()> {
    write!(out, "{}", title)?;
    for column in columns {
        write!(out, ",{}", value(column))?;
    }
    writeln!(out)
}

fn cell(value: Option<Duration>) -> String {
    match value {
        Some(elapsed) => elapsed.as_millis().to_string(),
        None => String::new(),
    }
}
