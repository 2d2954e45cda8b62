//! Aggregate the metrics of a run into a tree of summaries: the whole run,
//! the non-index reads, each read, each lane of a read and each surface of
//! a lane.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;

use crate::column_schema::{Accessor, ColumnValue, MetricStat, Subcolumns, SummaryColumns};
use crate::run_info_parser::Read;
use crate::run_metrics::RunMetrics;
use crate::tile_decoder::TileMetric;

const ERROR_RATE_CYCLES: [usize; 4] = [35, 50, 75, 100];

/// Summary of a read, of the non-index reads or of the whole run
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub cluster_count: f32,
    pub cluster_count_pf: f32,
    pub error_rate: f32,
    pub first_cycle_intensity: f32,
    pub percent_aligned: f32,
    pub percent_base: Vec<f32>,
    pub percent_gt_q30: f32,
    pub projected_yield_g: f32,
    pub reads: f32,
    pub reads_pf: f32,
    pub yield_g: f32,
}

impl SummaryColumns for MetricSummary {
    const ACCESSORS: &'static [Accessor<Self>] = &[
        Accessor::value("cluster_count", |s| ColumnValue::Scalar(s.cluster_count)),
        Accessor::value("cluster_count_pf", |s| ColumnValue::Scalar(s.cluster_count_pf)),
        Accessor::value("error_rate", |s| ColumnValue::Scalar(s.error_rate)),
        Accessor::value("first_cycle_intensity", |s| ColumnValue::Scalar(s.first_cycle_intensity)),
        Accessor::value("percent_aligned", |s| ColumnValue::Scalar(s.percent_aligned)),
        Accessor::expanded("percent_base", |s| ColumnValue::Array(s.percent_base.clone()), Subcolumns::Bases),
        Accessor::value("percent_gt_q30", |s| ColumnValue::Scalar(s.percent_gt_q30)),
        Accessor::value("projected_yield_g", |s| ColumnValue::Scalar(s.projected_yield_g)),
        Accessor::value("reads", |s| ColumnValue::Scalar(s.reads)),
        Accessor::value("reads_pf", |s| ColumnValue::Scalar(s.reads_pf)),
        Accessor::value("yield_g", |s| ColumnValue::Scalar(s.yield_g)),
    ];
}

/// Summary of one lane, or of one surface of a lane, within a read
#[derive(Debug, Clone, PartialEq)]
pub struct StatSummary {
    pub lane: u16,
    /// 0 for a whole lane
    pub surface: u16,
    pub tile_count: usize,
    pub cluster_count: MetricStat,
    pub cluster_count_pf: MetricStat,
    pub density: MetricStat,
    pub density_pf: MetricStat,
    pub error_rate: MetricStat,
    /// Error rate over the first 35, 50, 75 and 100 cycles of the read
    pub error_rate_cycles: [MetricStat; 4],
    pub first_cycle_intensity: MetricStat,
    pub fwhm: Vec<f32>,
    pub percent_aligned: MetricStat,
    pub percent_gt_q30: f32,
    pub percent_pf: MetricStat,
    pub phasing: MetricStat,
    pub prephasing: MetricStat,
    pub projected_yield_g: f32,
    pub reads: f32,
    pub reads_pf: f32,
    pub yield_g: f32,
}

impl SummaryColumns for StatSummary {
    const ACCESSORS: &'static [Accessor<Self>] = &[
        Accessor::value("lane", |s| ColumnValue::Scalar(s.lane as f32)),
        Accessor::value("surface", |s| ColumnValue::Scalar(s.surface as f32)),
        Accessor::value("cluster_count", |s| ColumnValue::Stat(s.cluster_count)),
        Accessor::value("cluster_count_pf", |s| ColumnValue::Stat(s.cluster_count_pf)),
        Accessor::value("density", |s| ColumnValue::Stat(s.density)),
        Accessor::value("density_pf", |s| ColumnValue::Stat(s.density_pf)),
        Accessor::value("error_rate", |s| ColumnValue::Stat(s.error_rate)),
        Accessor::value("error_rate_35", |s| ColumnValue::Stat(s.error_rate_cycles[0])),
        Accessor::value("error_rate_50", |s| ColumnValue::Stat(s.error_rate_cycles[1])),
        Accessor::value("error_rate_75", |s| ColumnValue::Stat(s.error_rate_cycles[2])),
        Accessor::value("error_rate_100", |s| ColumnValue::Stat(s.error_rate_cycles[3])),
        Accessor::value("first_cycle_intensity", |s| ColumnValue::Stat(s.first_cycle_intensity)),
        Accessor::expanded("fwhm", |s| ColumnValue::Array(s.fwhm.clone()), Subcolumns::Channels),
        Accessor::value("percent_aligned", |s| ColumnValue::Stat(s.percent_aligned)),
        Accessor::value("percent_gt_q30", |s| ColumnValue::Scalar(s.percent_gt_q30)),
        Accessor::value("percent_pf", |s| ColumnValue::Stat(s.percent_pf)),
        Accessor::value("phasing", |s| ColumnValue::Stat(s.phasing)),
        Accessor::value("prephasing", |s| ColumnValue::Stat(s.prephasing)),
        Accessor::value("projected_yield_g", |s| ColumnValue::Scalar(s.projected_yield_g)),
        Accessor::value("reads", |s| ColumnValue::Scalar(s.reads)),
        Accessor::value("reads_pf", |s| ColumnValue::Scalar(s.reads_pf)),
        Accessor::value("tile_count", |s| ColumnValue::Scalar(s.tile_count as f32)),
        Accessor::value("yield_g", |s| ColumnValue::Scalar(s.yield_g)),
    ];
}

pub type SurfaceSummary = StatSummary;

#[derive(Debug, Clone, PartialEq)]
pub struct LaneSummary {
    pub summary: StatSummary,
    /// Empty when the flowcell has a single surface
    pub surfaces: Vec<SurfaceSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadSummary {
    pub read: Read,
    pub summary: MetricSummary,
    pub lanes: Vec<LaneSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total: MetricSummary,
    pub nonindex: MetricSummary,
    pub reads: Vec<ReadSummary>,
}

/// Everything recorded for one tile within one read
#[derive(Debug, Clone)]
struct TileRead {
    /// (cycle within read, error rate)
    errors: Vec<(usize, f32)>,
    first_cycle_intensity: f32,
    focus: Vec<Vec<f32>>,
    q_total: u64,
    q_over_30: u64,
    q_cycles: usize,
    base_counts: [u64; 4],
}

impl TileRead {
    fn new(channels: usize) -> TileRead {
        TileRead {
            errors: Vec::new(),
            first_cycle_intensity: f32::NAN,
            focus: vec![Vec::new(); channels],
            q_total: 0,
            q_over_30: 0,
            q_cycles: 0,
            base_counts: [0; 4],
        }
    }

    fn error_rate(&self, max_cycle: Option<usize>) -> f32 {
        let rates: Vec<f32> = self
            .errors
            .iter()
            .filter(|(c, _)| max_cycle.map_or(true, |m| *c <= m))
            .map(|&(_, e)| e)
            .collect();
        mean(&rates)
    }
}

/// Values of one read summed or collected over some tiles
#[derive(Debug, Clone, Default)]
struct Totals {
    errors: Vec<f32>,
    first_cycle_intensity: Vec<f32>,
    percent_aligned: Vec<f32>,
    q_total: u64,
    q_over_30: u64,
    projected_yield_g: f64,
    base_counts: [u64; 4],
}

impl Totals {
    fn add(&mut self, other: &Totals) {
        self.errors.extend(&other.errors);
        self.first_cycle_intensity.extend(&other.first_cycle_intensity);
        self.percent_aligned.extend(&other.percent_aligned);
        self.q_total += other.q_total;
        self.q_over_30 += other.q_over_30;
        self.projected_yield_g += other.projected_yield_g;
        for (a, b) in self.base_counts.iter_mut().zip(other.base_counts.iter()) {
            *a += b;
        }
    }

    fn percent_gt_q30(&self) -> f32 {
        if self.q_total == 0 {
            return f32::NAN;
        }
        (self.q_over_30 as f64 / self.q_total as f64 * 100.0) as f32
    }

    fn yield_g(&self) -> f32 {
        if self.q_total == 0 {
            return f32::NAN;
        }
        (self.q_total as f64 / 1e9) as f32
    }

    fn percent_base(&self) -> Vec<f32> {
        let total: u64 = self.base_counts.iter().sum();
        self.base_counts
            .iter()
            .map(|&c| if total == 0 { f32::NAN } else { (c as f64 / total as f64 * 100.0) as f32 })
            .collect()
    }

    fn summary(&self, clusters: &ClusterTotals) -> MetricSummary {
        MetricSummary {
            cluster_count: clusters.cluster_count,
            cluster_count_pf: clusters.cluster_count_pf,
            error_rate: mean(&self.errors),
            first_cycle_intensity: mean(&self.first_cycle_intensity),
            percent_aligned: mean(&self.percent_aligned),
            percent_base: self.percent_base(),
            percent_gt_q30: self.percent_gt_q30(),
            projected_yield_g: if self.q_total == 0 { f32::NAN } else { self.projected_yield_g as f32 },
            reads: clusters.reads,
            reads_pf: clusters.reads_pf,
            yield_g: self.yield_g(),
        }
    }
}

/// Cluster counts do not depend on the read
struct ClusterTotals {
    cluster_count: f32,
    cluster_count_pf: f32,
    reads: f32,
    reads_pf: f32,
}

impl ClusterTotals {
    fn new<'a, I: Iterator<Item = &'a TileMetric> + Clone>(tiles: I) -> ClusterTotals {
        let counts: Vec<f32> = tiles.clone().map(|t| t.cluster_count).collect();
        let counts_pf: Vec<f32> = tiles.map(|t| t.cluster_count_pf).collect();

        ClusterTotals {
            cluster_count: mean(&counts),
            cluster_count_pf: mean(&counts_pf),
            reads: counts.iter().filter(|c| c.is_finite()).sum(),
            reads_pf: counts_pf.iter().filter(|c| c.is_finite()).sum(),
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    MetricStat::from_values(values).mean
}

fn projected_yield(tile_read: &TileRead, read: &Read) -> f64 {
    if tile_read.q_cycles == 0 {
        return 0.0;
    }
    tile_read.q_total as f64 / 1e9 * read.num_cycles as f64 / tile_read.q_cycles as f64
}

/// Collect the per-tile values of one read
fn collect_tile_reads(run: &RunMetrics, read: &Read) -> BTreeMap<(u16, u32), TileRead> {
    let channels = run.run_info.channels.len();
    let first = read.first_cycle();
    let last = read.last_cycle();
    let in_read = |cycle: u16| cycle >= first && cycle <= last;
    let within = |cycle: u16| (cycle - first) as usize + 1;

    let mut tiles: BTreeMap<(u16, u32), TileRead> = run
        .tiles()
        .into_iter()
        .map(|key| (key, TileRead::new(channels)))
        .collect();

    for m in run.error.iter().filter(|m| in_read(m.cycle)) {
        if let Some(t) = tiles.get_mut(&(m.lane, m.tile)) {
            t.errors.push((within(m.cycle), m.error_rate));
        }
    }

    for m in run.extraction.iter().filter(|m| in_read(m.cycle)) {
        if let Some(t) = tiles.get_mut(&(m.lane, m.tile)) {
            if m.cycle == first {
                t.first_cycle_intensity = m.max_intensity.first().map_or(f32::NAN, |&v| v as f32);
            }
            for (values, &f) in t.focus.iter_mut().zip(m.focus.iter()) {
                values.push(f);
            }
        }
    }

    for m in run.q.iter().filter(|m| in_read(m.cycle)) {
        if let Some(t) = tiles.get_mut(&(m.lane, m.tile)) {
            t.q_total += m.total();
            t.q_over_30 += m.total_over_qscore(30);
            t.q_cycles += 1;
        }
    }

    for m in run.corrected_int.iter().filter(|m| in_read(m.cycle)) {
        if let Some(t) = tiles.get_mut(&(m.lane, m.tile)) {
            for (total, &count) in t.base_counts.iter_mut().zip(&m.called_counts[1..]) {
                *total += count as u64;
            }
        }
    }

    tiles
}

fn totals<'a, I>(tiles: I, tile_metrics: &BTreeMap<(u16, u32), &TileMetric>, read: &Read) -> Totals
where
    I: Iterator<Item = (&'a (u16, u32), &'a TileRead)>,
{
    let mut totals = Totals::default();
    for (key, t) in tiles {
        totals.errors.extend(t.errors.iter().map(|&(_, e)| e));
        totals.first_cycle_intensity.push(t.first_cycle_intensity);
        if let Some(tm) = tile_metrics.get(key) {
            totals.percent_aligned.push(tm.percent_aligned_at(read.number));
        }
        totals.q_total += t.q_total;
        totals.q_over_30 += t.q_over_30;
        totals.projected_yield_g += projected_yield(t, read);
        for (a, b) in totals.base_counts.iter_mut().zip(t.base_counts.iter()) {
            *a += b;
        }
    }
    totals
}

fn stat_summary(
    lane: u16,
    surface: u16,
    tiles: &[(&(u16, u32), &TileRead)],
    tile_metrics: &BTreeMap<(u16, u32), &TileMetric>,
    read: &Read,
    channels: usize,
) -> StatSummary {
    let metrics: Vec<&TileMetric> = tiles
        .iter()
        .filter_map(|(key, _)| tile_metrics.get(key).copied())
        .collect();
    let stat = |f: &dyn Fn(&TileMetric) -> f32| {
        MetricStat::from_values(&metrics.iter().map(|&t| f(t)).collect::<Vec<_>>())
    };
    let tile_stat = |f: &dyn Fn(&TileRead) -> f32| {
        MetricStat::from_values(&tiles.iter().map(|(_, t)| f(t)).collect::<Vec<_>>())
    };

    let mut error_rate_cycles = [MetricStat::default(); 4];
    for (slot, &cycles) in error_rate_cycles.iter_mut().zip(ERROR_RATE_CYCLES.iter()) {
        if read.num_cycles >= cycles {
            *slot = tile_stat(&|t| t.error_rate(Some(cycles)));
        }
    }

    let fwhm = (0..channels)
        .map(|ch| {
            let tile_means: Vec<f32> = tiles.iter().map(|(_, t)| mean(&t.focus[ch])).collect();
            mean(&tile_means)
        })
        .collect();

    let totals = totals(tiles.iter().copied(), tile_metrics, read);
    let clusters = ClusterTotals::new(metrics.iter().copied());

    StatSummary {
        lane,
        surface,
        tile_count: tiles.len(),
        cluster_count: stat(&|t| t.cluster_count),
        cluster_count_pf: stat(&|t| t.cluster_count_pf),
        density: stat(&|t| t.cluster_density),
        density_pf: stat(&|t| t.cluster_density_pf),
        error_rate: tile_stat(&|t| t.error_rate(None)),
        error_rate_cycles,
        first_cycle_intensity: tile_stat(&|t| t.first_cycle_intensity),
        fwhm,
        percent_aligned: stat(&|t| t.percent_aligned_at(read.number)),
        percent_gt_q30: totals.percent_gt_q30(),
        percent_pf: stat(&|t| t.percent_pf()),
        phasing: stat(&|t| t.percent_phasing_at(read.number)),
        prephasing: stat(&|t| t.percent_prephasing_at(read.number)),
        projected_yield_g: if totals.q_total == 0 { f32::NAN } else { totals.projected_yield_g as f32 },
        reads: clusters.reads,
        reads_pf: clusters.reads_pf,
        yield_g: totals.yield_g(),
    }
}

/// Summarize a run into its total, non-index, read, lane and surface levels
pub fn summarize_run_metrics(run: &RunMetrics) -> RunSummary {
    let run_info = run.run_info();
    let naming = run_info.tile_naming();
    let channels = run_info.channels.len();
    let multi_surface = run_info.flowcell_layout.surface_count > 1;

    let tile_metrics: BTreeMap<(u16, u32), &TileMetric> =
        run.tile.iter().map(|t| ((t.lane, t.tile), t)).collect();
    let clusters = ClusterTotals::new(run.tile.iter());

    let mut total = Totals::default();
    let mut nonindex = Totals::default();
    let mut reads = Vec::with_capacity(run_info.reads.len());

    for read in &run_info.reads {
        let tile_reads = collect_tile_reads(run, read);
        let read_totals = totals(tile_reads.iter(), &tile_metrics, read);

        let lanes = tile_reads
            .iter()
            .group_by(|((lane, _), _)| *lane)
            .into_iter()
            .map(|(lane, group)| {
                let tiles: Vec<_> = group.collect();
                let summary = stat_summary(lane, 0, &tiles, &tile_metrics, read, channels);

                let surfaces = if multi_surface {
                    tiles
                        .iter()
                        .map(|&(key, t)| (naming.surface(key.1) as u16, (key, t)))
                        .into_group_map()
                        .into_iter()
                        .sorted_by_key(|(surface, _)| *surface)
                        .map(|(surface, tiles)| {
                            stat_summary(lane, surface, &tiles, &tile_metrics, read, channels)
                        })
                        .collect()
                } else {
                    Vec::new()
                };

                LaneSummary { summary, surfaces }
            })
            .collect();

        total.add(&read_totals);
        if !read.is_indexed_read {
            nonindex.add(&read_totals);
        }

        reads.push(ReadSummary {
            read: read.clone(),
            summary: read_totals.summary(&clusters),
            lanes,
        });
    }

    debug!("summarized {} reads", reads.len());

    RunSummary {
        total: total.summary(&clusters),
        nonindex: nonindex.summary(&clusters),
        reads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_decoder::{QMetric, MAX_Q_BINS};
    use crate::test_fixtures::run_metrics_fixture;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn total_error_rate() {
        let summary = summarize_run_metrics(&run_metrics_fixture());

        assert!(close(summary.total.error_rate, 0.3));
        assert!(close(summary.nonindex.error_rate, 0.2));
        assert!(close(summary.reads[1].summary.error_rate, 0.4));
        assert!(close(summary.reads[2].summary.error_rate, 0.5));
    }

    #[test]
    fn read_structure() {
        let summary = summarize_run_metrics(&run_metrics_fixture());

        let numbers: Vec<_> = summary.reads.iter().map(|r| (r.read.number, r.read.is_indexed_read)).collect();
        assert_eq!(numbers, vec![(1, false), (2, true), (3, true)]);
        assert_eq!(summary.reads[0].lanes.len(), 1);
        assert_eq!(summary.reads[0].lanes[0].summary.lane, 1);
        assert_eq!(summary.reads[0].lanes[0].summary.tile_count, 1);
        // single surface flowcell
        assert!(summary.reads[0].lanes[0].surfaces.is_empty());
    }

    #[test]
    fn first_cycle_intensity_and_bases() {
        let summary = summarize_run_metrics(&run_metrics_fixture());

        assert_eq!(summary.reads[0].summary.first_cycle_intensity, 10.0);
        assert_eq!(summary.reads[1].summary.first_cycle_intensity, 10.0);
        assert_eq!(summary.reads[2].summary.first_cycle_intensity, 15.0);

        // read 1 calls: A 35, C 35, G 25, T 0
        let bases = &summary.reads[0].summary.percent_base;
        assert!(close(bases[0], 36.842106));
        assert!(close(bases[1], 36.842106));
        assert!(close(bases[2], 26.315790));
        assert!(close(bases[3], 0.0));

        let fwhm = &summary.reads[0].lanes[0].summary.fwhm;
        assert_eq!(fwhm.len(), 2);
        assert!(close(fwhm[0], 25.0 / 3.0));
    }

    #[test]
    fn missing_groups_are_nan() {
        let summary = summarize_run_metrics(&run_metrics_fixture());

        assert!(summary.total.cluster_count.is_nan());
        assert!(summary.total.percent_aligned.is_nan());
        assert!(summary.total.percent_gt_q30.is_nan());
        assert_eq!(summary.total.reads, 0.0);
        assert!(summary.reads[0].lanes[0].summary.density.mean.is_nan());
        // read 1 has 3 cycles
        assert!(summary.reads[0].lanes[0].summary.error_rate_cycles[0].mean.is_nan());
    }

    #[test]
    fn quality_and_yield() {
        let mut run = run_metrics_fixture();
        for cycle in 1..=3 {
            let mut histogram = vec![0; MAX_Q_BINS];
            histogram[19] = 25;
            histogram[34] = 75;
            run.q.insert(QMetric { lane: 1, tile: 1101, cycle, histogram });
        }
        run.finalize_after_load();

        let summary = summarize_run_metrics(&run);
        assert!(close(summary.reads[0].summary.percent_gt_q30, 75.0));
        assert!(close(summary.total.percent_gt_q30, 75.0));
        assert!(close(summary.reads[0].summary.yield_g, 300.0 / 1e9));
        assert!(summary.reads[1].summary.yield_g.is_nan());
    }
}
