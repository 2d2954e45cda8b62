//! Represents the decoded InterOp metrics of one sequencing run as a struct
//! that can be shared across threads

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::corrected_int_decoder::{corrected_int_decoder, CorrectedIntMetric};
use crate::error::Result;
use crate::error_decoder::{error_decoder, ErrorMetric};
use crate::extraction_decoder::{extraction_decoder, ExtractionMetric};
use crate::image_decoder::{image_decoder, ImageMetric};
use crate::index_decoder::{index_decoder, IndexMetric};
use crate::metric_group::{group_from_filename, LoadMask, MetricGroup};
use crate::metric_set::{Metric, MetricSet};
use crate::q_decoder::{q_decoder, QMetric};
use crate::run_info_parser::{parse_run_info, RunInfo};
use crate::tile_decoder::{tile_decoder, TileMetric};

/// Channel names used when RunInfo.xml predates the `ImageChannels` element
pub fn legacy_channel_names(channel_count: usize) -> Vec<String> {
    let names: &[&str] = match channel_count {
        4 => &["A", "C", "G", "T"],
        _ => &["Red", "Green"],
    };
    names.iter().map(|&n| n.to_owned()).collect()
}

/// The run configuration and one collection of records per metric group
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics {
    /// the root path of the sequencing run, if it was read from disk
    pub run_path: Option<PathBuf>,
    /// RunInfo object, stores the contents of RunInfo.xml
    pub run_info: RunInfo,
    pub corrected_int: MetricSet<CorrectedIntMetric>,
    pub error: MetricSet<ErrorMetric>,
    pub extraction: MetricSet<ExtractionMetric>,
    pub image: MetricSet<ImageMetric>,
    pub index: MetricSet<IndexMetric>,
    pub q: MetricSet<QMetric>,
    pub tile: MetricSet<TileMetric>,
}

impl RunMetrics {
    /// An empty run with the given configuration
    pub fn new(run_info: RunInfo) -> RunMetrics {
        RunMetrics {
            run_path: None,
            run_info,
            corrected_int: MetricSet::new(),
            error: MetricSet::new(),
            extraction: MetricSet::new(),
            image: MetricSet::new(),
            index: MetricSet::new(),
            q: MetricSet::new(),
            tile: MetricSet::new(),
        }
    }

    /// Loads the run located in `run_path`. Only groups enabled in `mask`
    /// are decoded, every group when `mask` is `None`. InterOp files that
    /// do not exist leave their group empty.
    pub fn read(run_path: &Path, mask: Option<&LoadMask>) -> Result<RunMetrics> {
        let mut run_metrics = RunMetrics::read_unfinalized(run_path, mask)?;
        run_metrics.finalize_after_load();
        run_metrics.log_loaded();

        Ok(run_metrics)
    }

    /// Like `read`, but leaves `finalize_after_load` to the caller so more
    /// files can be merged in first
    pub fn read_unfinalized(run_path: &Path, mask: Option<&LoadMask>) -> Result<RunMetrics> {
        let run_info = parse_run_info(&run_path.join("RunInfo.xml"))?;
        let mut run_metrics = RunMetrics::new(run_info);
        run_metrics.run_path = Some(run_path.to_path_buf());

        let interop = run_path.join("InterOp");
        for group in MetricGroup::ALL.iter().copied() {
            if let Some(mask) = mask {
                if !mask.contains(group) {
                    continue;
                }
            }

            let candidates = [
                interop.join(group.file_name()),
                interop.join(format!("{}Metrics.bin", group.name())),
            ];
            match candidates.iter().find(|p| p.exists()) {
                Some(path) => {
                    run_metrics.read_group_file(group, path)?;
                }
                None => debug!("no InterOp file for {} in {}", group, interop.display()),
            }
        }

        Ok(run_metrics)
    }

    pub(crate) fn log_loaded(&self) {
        info!(
            "loaded run {} with {} metric groups",
            self.run_info.id,
            MetricGroup::ALL.iter().filter(|&&g| !self.is_group_empty(g)).count()
        );
    }

    /// Decode one InterOp file into this run, working out the group from the
    /// file name. Call `finalize_after_load` after the last file.
    pub fn read_metric_file(&mut self, path: &Path) -> Result<MetricGroup> {
        let group = group_from_filename(path)?;
        self.read_group_file(group, path)?;

        Ok(group)
    }

    fn read_group_file(&mut self, group: MetricGroup, path: &Path) -> Result<()> {
        debug!("reading {}", path.display());
        match group {
            MetricGroup::CorrectedInt => self.corrected_int.merge(corrected_int_decoder(path)?),
            MetricGroup::Error => self.error.merge(error_decoder(path)?),
            MetricGroup::Extraction => self.extraction.merge(extraction_decoder(path)?),
            MetricGroup::Image => self.image.merge(image_decoder(path)?),
            MetricGroup::Index => self.index.merge(index_decoder(path)?),
            MetricGroup::Q => self.q.merge(q_decoder(path)?),
            MetricGroup::Tile => self.tile.merge(tile_decoder(path)?),
            other => debug!("no decoder for {} metrics, skipping {}", other, path.display()),
        }

        Ok(())
    }

    /// Sort every collection, fill in channel names for older runs and copy
    /// tile cluster counts onto the index metrics
    pub fn finalize_after_load(&mut self) {
        self.corrected_int.sort();
        self.error.sort();
        self.extraction.sort();
        self.image.sort();
        self.index.sort();
        self.q.sort();
        self.tile.sort();

        if self.run_info.channels.is_empty() {
            let channel_count = self
                .image
                .at(0)
                .map(ImageMetric::channel_count)
                .or_else(|| self.extraction.at(0).map(ExtractionMetric::channel_count));
            if let Some(count) = channel_count {
                self.run_info.channels = legacy_channel_names(count);
                debug!("using legacy channel names {:?}", self.run_info.channels);
            }
        }

        let channels = self.run_info.channels.len();
        if channels > 0 {
            self.extraction.iter_mut().for_each(|m| m.trim_channels(channels));
            self.image.iter_mut().for_each(|m| m.trim_channels(channels));
        }

        let tiles: BTreeMap<(u16, u32), (f32, f32)> = self
            .tile
            .iter()
            .map(|t| ((t.lane, t.tile), (t.cluster_count, t.cluster_count_pf)))
            .collect();
        for metric in self.index.iter_mut() {
            let (count, count_pf) = tiles.get(&(metric.lane, metric.tile)).copied().unwrap_or((0.0, 0.0));
            metric.cluster_count = count;
            metric.cluster_count_pf = count_pf;
        }
    }

    pub fn run_info(&self) -> &RunInfo {
        &self.run_info
    }

    pub fn is_group_empty(&self, group: MetricGroup) -> bool {
        match group {
            MetricGroup::CorrectedInt => self.corrected_int.is_empty(),
            MetricGroup::Error => self.error.is_empty(),
            MetricGroup::Extraction => self.extraction.is_empty(),
            MetricGroup::Image => self.image.is_empty(),
            MetricGroup::Index => self.index.is_empty(),
            MetricGroup::Q => self.q.is_empty(),
            MetricGroup::Tile => self.tile.is_empty(),
            _ => true,
        }
    }

    /// True when no group holds any record
    pub fn is_empty(&self) -> bool {
        MetricGroup::ALL.iter().all(|&g| self.is_group_empty(g))
    }

    /// Distinct (lane, tile) pairs seen in any group
    pub fn tiles(&self) -> BTreeSet<(u16, u32)> {
        let mut tiles = BTreeSet::new();
        tiles.extend(self.corrected_int.iter().map(|m| (m.lane(), m.tile())));
        tiles.extend(self.error.iter().map(|m| (m.lane(), m.tile())));
        tiles.extend(self.extraction.iter().map(|m| (m.lane(), m.tile())));
        tiles.extend(self.image.iter().map(|m| (m.lane(), m.tile())));
        tiles.extend(self.q.iter().map(|m| (m.lane(), m.tile())));
        tiles.extend(self.tile.iter().map(|m| (m.lane(), m.tile())));
        tiles
    }
}
