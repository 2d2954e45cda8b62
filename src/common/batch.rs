//! Build one table per run folder, in parallel

use std::path::{Path, PathBuf};

use log::info;
use rayon::prelude::*;

use crate::error::Result;
use crate::metric_group::summary_metrics_to_load;
use crate::run_loader::{read_run, LoadOutcome, ReadOptions};
use crate::run_metrics::RunMetrics;
use crate::summary_table::{summary_table, SummaryOptions};
use crate::table::Table;

/// Load `run_path` and build a table from it. A run that is not found, or
/// that lacks a required group, gives an empty table named after the path.
pub fn table_for_run<F>(run_path: &Path, options: &ReadOptions, build: F) -> Result<Table>
where
    F: Fn(&RunMetrics) -> Result<Table>,
{
    match read_run(run_path.into(), options)? {
        LoadOutcome::Loaded(run) => build(&run),
        _ => Ok(Table::empty(&run_path.display().to_string())),
    }
}

/// `table_for_run` over many runs on the rayon pool. Results keep the
/// order of `run_paths` and each run fails on its own.
pub fn tables_for_runs<F>(run_paths: &[PathBuf], options: &ReadOptions, build: F) -> Vec<Result<Table>>
where
    F: Fn(&RunMetrics) -> Result<Table> + Sync,
{
    info!("building tables for {} runs", run_paths.len());
    run_paths
        .par_iter()
        .map(|path| table_for_run(path, options, &build))
        .collect()
}

/// Summary tables for many runs, loading only the groups a summary needs
pub fn summarize_runs(run_paths: &[PathBuf], options: &SummaryOptions) -> Vec<Result<Table>> {
    let read_options = ReadOptions::with_mask(summary_metrics_to_load());
    tables_for_runs(run_paths, &read_options, |run| summary_table(run, options))
}
