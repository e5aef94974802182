#![warn(missing_docs)]
//! BuildBench Report - Result Aggregation
//!
//! Accumulates per-invocation timings into a row-per-phase,
//! column-per-execution table, computes the summary statistics and writes
//! the `benchmark.csv` report.

mod csv;
mod results;
mod stats;

pub use csv::write_csv;
pub use results::{BenchmarkResults, BuildColumn};
pub use stats::{mean, median, std_dev};
