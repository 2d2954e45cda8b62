//! Demultiplexing tables: the lane and barcode summaries, and the per-tile
//! indexing table

use std::{fmt, str::FromStr};

use crate::column_schema::resolve;
use crate::error::{Result, TableError};
use crate::index_summary::{summarize_index_metrics, IndexCountSummary, IndexLaneSummary};
use crate::run_metrics::RunMetrics;
use crate::summary_table::flatten;
use crate::table::{Cell, Column, ColumnType, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLevel {
    Lane,
    Barcode,
}

impl IndexLevel {
    pub const ALL: [IndexLevel; 2] = [IndexLevel::Lane, IndexLevel::Barcode];

    pub fn name(self) -> &'static str {
        match self {
            IndexLevel::Lane => "Lane",
            IndexLevel::Barcode => "Barcode",
        }
    }
}

impl fmt::Display for IndexLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexLevel {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        IndexLevel::ALL
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TableError::unknown_column(s, IndexLevel::ALL.iter().map(|l| l.name())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummaryOptions {
    pub level: IndexLevel,
    pub columns: Option<Vec<String>>,
    pub ignore_missing_columns: bool,
}

impl Default for IndexSummaryOptions {
    fn default() -> Self {
        IndexSummaryOptions { level: IndexLevel::Lane, columns: None, ignore_missing_columns: true }
    }
}

/// Names of the value columns available at `level`
pub fn index_summary_columns(level: IndexLevel) -> Vec<String> {
    match level {
        IndexLevel::Lane => resolve::<IndexLaneSummary>().into_iter().map(|e| e.name).collect(),
        IndexLevel::Barcode => resolve::<IndexCountSummary>().into_iter().map(|e| e.name).collect(),
    }
}

/// Lane or barcode summary of the demultiplexing counts. Rows are keyed by
/// lane.
pub fn index_summary_table(run: &RunMetrics, options: &IndexSummaryOptions) -> Result<Table> {
    let name = format!("{} Index Summary", options.level);
    let keys = vec![Column::new("Lane", ColumnType::UInt16)];
    let requested = options.columns.as_deref();
    let ignore = options.ignore_missing_columns;
    let lanes = summarize_index_metrics(run);

    match options.level {
        IndexLevel::Lane => {
            let nodes: Vec<_> = lanes.iter().map(|l| (vec![Cell::UInt(l.lane as u64)], l)).collect();
            flatten(&name, keys, &nodes, run.run_info(), requested, ignore)
        }
        IndexLevel::Barcode => {
            let nodes: Vec<_> = lanes
                .iter()
                .flat_map(|l| l.counts.iter().map(move |c| (vec![Cell::UInt(l.lane as u64)], c)))
                .collect();
            flatten(&name, keys, &nodes, run.run_info(), requested, ignore)
        }
    }
}

/// Per-tile demultiplexing for the first index read: one row per sample, or
/// one row per tile when `per_sample` is false. `% Demux` is 0 for tiles
/// without PF clusters.
pub fn indexing_table(run: &RunMetrics, per_sample: bool) -> Result<Table> {
    let mut columns = vec![Column::new("Lane", ColumnType::UInt16), Column::new("Tile", ColumnType::UInt16)];
    if per_sample {
        columns.push(Column::new("Barcode", ColumnType::Text));
        columns.push(Column::new("SampleID", ColumnType::Text));
    }
    columns.extend(["Cluster Count", "Cluster Count PF", "% Demux"].iter().map(|&n| Column::float(n)));

    let first_read = match run.index.at(0) {
        Some(metric) => metric.read,
        None => return Ok(Table::empty("Indexing")),
    };

    let mut table = Table::new("Indexing", columns);
    for metric in run.index.iter().filter(|m| m.read == first_read) {
        let key = [Cell::UInt(metric.lane as u64), Cell::UInt(metric.tile as u64)];
        let pf = metric.cluster_count_pf;
        if per_sample {
            for info in &metric.indices {
                let count = info.cluster_count as f32;
                let demux = if pf > 0.0 { count / pf * 100.0 } else { 0.0 };
                let mut row = key.to_vec();
                row.extend(vec![
                    Cell::Text(info.index_seq.clone()),
                    Cell::Text(info.sample_id.clone()),
                    Cell::Float(count),
                    Cell::Float(pf),
                    Cell::Float(demux),
                ]);
                table.push_row(row)?;
            }
        } else {
            let demux = metric.percent_demultiplexed();
            let mut row = key.to_vec();
            row.extend(vec![
                Cell::Float(metric.cluster_count),
                Cell::Float(pf),
                Cell::Float(if demux.is_finite() { demux } else { 0.0 }),
            ]);
            table.push_row(row)?;
        }
    }

    Ok(table)
}
