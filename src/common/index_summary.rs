//! Aggregate demultiplexing counts per lane and per sample barcode

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::column_schema::{Accessor, ColumnValue, MetricStat, SummaryColumns};
use crate::index_decoder::IndexInfo;
use crate::run_metrics::RunMetrics;
use crate::tile_decoder::TileMetric;

/// Reads assigned to one sample barcode within a lane
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCountSummary {
    /// 1-based rank of the index sequence within its lane
    pub id: u64,
    pub lane: u16,
    pub index1: String,
    pub index2: String,
    pub sample_id: String,
    pub project_name: String,
    pub cluster_count: u64,
    pub fraction_mapped: f32,
}

impl SummaryColumns for IndexCountSummary {
    const ACCESSORS: &'static [Accessor<Self>] = &[
        Accessor::value("lane", |s| ColumnValue::Scalar(s.lane as f32)),
        Accessor::value("cluster_count", |s| ColumnValue::Scalar(s.cluster_count as f32)),
        Accessor::value("fraction_mapped", |s| ColumnValue::Scalar(s.fraction_mapped)),
        Accessor::value("id", |s| ColumnValue::Scalar(s.id as f32)),
        Accessor::text("index1", |s| ColumnValue::Text(s.index1.clone())),
        Accessor::text("index2", |s| ColumnValue::Text(s.index2.clone())),
        Accessor::text("project_name", |s| ColumnValue::Text(s.project_name.clone())),
        Accessor::text("sample_id", |s| ColumnValue::Text(s.sample_id.clone())),
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexLaneSummary {
    pub lane: u16,
    pub total_reads: u64,
    pub total_pf_reads: u64,
    pub total_fraction_mapped_reads: f32,
    /// Coefficient of variation of the fraction mapped over samples
    pub mapped_reads_cv: f32,
    pub min_mapped_reads: f32,
    pub max_mapped_reads: f32,
    pub counts: Vec<IndexCountSummary>,
}

impl SummaryColumns for IndexLaneSummary {
    const ACCESSORS: &'static [Accessor<Self>] = &[
        Accessor::value("lane", |s| ColumnValue::Scalar(s.lane as f32)),
        Accessor::value("mapped_reads_cv", |s| ColumnValue::Scalar(s.mapped_reads_cv)),
        Accessor::value("max_mapped_reads", |s| ColumnValue::Scalar(s.max_mapped_reads)),
        Accessor::value("min_mapped_reads", |s| ColumnValue::Scalar(s.min_mapped_reads)),
        Accessor::value("total_fraction_mapped_reads", |s| ColumnValue::Scalar(s.total_fraction_mapped_reads)),
        Accessor::value("total_pf_reads", |s| ColumnValue::Scalar(s.total_pf_reads as f32)),
        Accessor::value("total_reads", |s| ColumnValue::Scalar(s.total_reads as f32)),
    ];
}

impl IndexLaneSummary {
    fn empty(lane: u16) -> IndexLaneSummary {
        IndexLaneSummary {
            lane,
            total_reads: 0,
            total_pf_reads: 0,
            total_fraction_mapped_reads: 0.0,
            mapped_reads_cv: 0.0,
            min_mapped_reads: 0.0,
            max_mapped_reads: 0.0,
            counts: Vec::new(),
        }
    }
}

fn round4(value: f32) -> f32 {
    (value * 10000.0).round() / 10000.0
}

/// Summarize one lane over the index records whose tile has a tile metric
fn summarize_lane(run: &RunMetrics, tiles: &BTreeMap<(u16, u32), &TileMetric>, lane: u16) -> IndexLaneSummary {
    let mut summary = IndexLaneSummary::empty(lane);
    let mut by_sequence: HashMap<&str, (&IndexInfo, u64)> = HashMap::new();
    let mut total_mapped: u64 = 0;

    for metric in run.index.iter().filter(|m| m.lane == lane) {
        let tile = match tiles.get(&(metric.lane, metric.tile)) {
            Some(tile) => tile,
            None => continue,
        };
        summary.total_pf_reads += tile.cluster_count_pf as u64;
        summary.total_reads += tile.cluster_count as u64;

        for info in &metric.indices {
            by_sequence.entry(info.index_seq.as_str()).or_insert((info, 0)).1 += info.cluster_count;
            total_mapped += info.cluster_count;
        }
    }
    if by_sequence.is_empty() {
        return summary;
    }

    let pf = summary.total_pf_reads as f64;
    let mut sequences: Vec<_> = by_sequence.into_iter().collect();
    sequences.sort_by(|a, b| a.0.cmp(b.0));
    summary.counts = sequences
        .into_iter()
        .enumerate()
        .map(|(i, (_, (info, count)))| {
            let (index1, index2) = info.index1_index2();
            IndexCountSummary {
                id: i as u64 + 1,
                lane,
                index1: index1.to_owned(),
                index2: index2.to_owned(),
                sample_id: info.sample_id.clone(),
                project_name: info.sample_proj.clone(),
                cluster_count: count,
                fraction_mapped: if pf > 0.0 { (count as f64 / pf * 100.0) as f32 } else { 0.0 },
            }
        })
        .collect();

    let fractions: Vec<f32> = summary.counts.iter().map(|c| c.fraction_mapped).collect();
    let stat = MetricStat::from_values(&fractions);
    let (min, max) = fractions
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &f| (lo.min(f), hi.max(f)));

    if pf > 0.0 {
        summary.total_fraction_mapped_reads = round4((total_mapped as f64 / pf * 100.0) as f32);
    }
    summary.mapped_reads_cv = round4(stat.stddev / stat.mean);
    if summary.total_reads > 0 {
        summary.min_mapped_reads = round4(min);
        summary.max_mapped_reads = round4(max);
    }

    summary
}

/// One summary per lane of the flowcell, empty when there are no index or
/// no tile metrics
pub fn summarize_index_metrics(run: &RunMetrics) -> Vec<IndexLaneSummary> {
    if run.index.is_empty() || run.tile.is_empty() {
        return Vec::new();
    }
    let tiles: BTreeMap<(u16, u32), &TileMetric> = run.tile.iter().map(|t| ((t.lane, t.tile), t)).collect();
    let lane_count = run.run_info().flowcell_layout.lane_count as u16;

    let lanes: Vec<IndexLaneSummary> = (1..=lane_count).map(|lane| summarize_lane(run, &tiles, lane)).collect();
    debug!("summarized index metrics for {} lanes", lanes.len());
    lanes
}
