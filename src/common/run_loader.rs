//! Load a run for table building, skipping runs that cannot produce a table

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Result, TableError};
use crate::metric_group::{LoadMask, MetricGroup};
use crate::run_metrics::RunMetrics;

/// Where stand-alone index metrics are written by the on-instrument analysis
pub const DEFAULT_SEARCH_PATHS: [&str; 1] = ["Analysis/1/Data/Reports"];

/// A run folder on disk, or a run that was already loaded
#[derive(Debug)]
pub enum RunSource<'a> {
    Folder(&'a Path),
    Loaded(RunMetrics),
}

impl<'a> From<&'a Path> for RunSource<'a> {
    fn from(path: &'a Path) -> Self {
        RunSource::Folder(path)
    }
}

impl From<RunMetrics> for RunSource<'_> {
    fn from(run: RunMetrics) -> Self {
        RunSource::Loaded(run)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Groups to decode, all of them when `None`
    pub mask: Option<LoadMask>,
    /// Groups that must hold records for the run to be used
    pub required: Vec<MetricGroup>,
    /// Folders under the run searched for `IndexMetricsOut.bin` when the
    /// InterOp folder has none
    pub search_paths: Vec<PathBuf>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            mask: None,
            required: Vec::new(),
            search_paths: DEFAULT_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl ReadOptions {
    pub fn with_mask(mask: LoadMask) -> ReadOptions {
        ReadOptions { mask: Some(mask), ..ReadOptions::default() }
    }

    pub fn require(mut self, groups: &[MetricGroup]) -> ReadOptions {
        self.required.extend_from_slice(groups);
        self
    }

    fn wants(&self, group: MetricGroup) -> bool {
        self.mask.as_ref().map_or(true, |m| m.contains(group))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(RunMetrics),
    /// A required group has no records
    SkippedMissingRequiredGroup(MetricGroup),
    /// The folder has no RunInfo.xml
    NotFound(PathBuf),
}

impl LoadOutcome {
    pub fn into_run(self) -> Option<RunMetrics> {
        match self {
            LoadOutcome::Loaded(run) => Some(run),
            _ => None,
        }
    }
}

/// Merge the first stand-alone index file found under `search_paths`
fn read_fallback_index(run: &mut RunMetrics, run_path: &Path, search_paths: &[PathBuf]) -> Result<()> {
    let file_name = MetricGroup::Index.file_name();
    for search_path in search_paths {
        let path = run_path.join(search_path).join(&file_name);
        if path.exists() {
            debug!("reading index metrics from {}", path.display());
            run.read_metric_file(&path)?;
            return Ok(());
        }
    }
    Ok(())
}

/// Load `source`. An already loaded run is returned as is. A folder
/// without RunInfo.xml, or whose required groups are empty, gives an
/// outcome without a run instead of an error.
pub fn read_run(source: RunSource, options: &ReadOptions) -> Result<LoadOutcome> {
    let run_path = match source {
        RunSource::Loaded(run) => return Ok(LoadOutcome::Loaded(run)),
        RunSource::Folder(path) => path,
    };

    let mut run = match RunMetrics::read_unfinalized(run_path, options.mask.as_ref()) {
        Ok(run) => run,
        Err(TableError::RunInfoNotFound(path)) => {
            warn!("skipping {}: no RunInfo.xml", run_path.display());
            return Ok(LoadOutcome::NotFound(path));
        }
        Err(e) => return Err(e),
    };

    if options.wants(MetricGroup::Index) && run.index.is_empty() {
        read_fallback_index(&mut run, run_path, &options.search_paths)?;
    }
    run.finalize_after_load();
    run.log_loaded();

    if let Some(&group) = options.required.iter().find(|&&g| run.is_group_empty(g)) {
        warn!("skipping {}: no {} metrics", run_path.display(), group);
        return Ok(LoadOutcome::SkippedMissingRequiredGroup(group));
    }

    Ok(LoadOutcome::Loaded(run))
}
