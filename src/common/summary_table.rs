//! Flatten a run summary into a table at one of five levels
//!
//! Each level has its own key columns followed by the columns resolved from
//! the level's summary type. Columns with no finite value in the first row
//! are dropped unless the caller asks to keep missing columns.

use std::{fmt, str::FromStr};

use log::debug;

use crate::column_schema::{column_map, resolve, Accessor, ColumnValue, Subcolumns, SummaryColumns};
use crate::error::{Result, TableError};
use crate::run_info_parser::RunInfo;
use crate::run_metrics::RunMetrics;
use crate::run_summary::{summarize_run_metrics, MetricSummary, StatSummary};
use crate::table::{Cell, Column, ColumnType, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLevel {
    Total,
    NonIndex,
    Read,
    Lane,
    Surface,
}

impl SummaryLevel {
    pub const ALL: [SummaryLevel; 5] = [
        SummaryLevel::Total,
        SummaryLevel::NonIndex,
        SummaryLevel::Read,
        SummaryLevel::Lane,
        SummaryLevel::Surface,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SummaryLevel::Total => "Total",
            SummaryLevel::NonIndex => "NonIndex",
            SummaryLevel::Read => "Read",
            SummaryLevel::Lane => "Lane",
            SummaryLevel::Surface => "Surface",
        }
    }

    /// Key columns written ahead of the summary values
    pub fn key_columns(self) -> Vec<Column> {
        let keys = [
            ("ReadNumber", ColumnType::UInt16),
            ("IsIndex", ColumnType::UInt8),
            ("Lane", ColumnType::UInt16),
            ("Surface", ColumnType::UInt16),
        ];
        let n = match self {
            SummaryLevel::Total | SummaryLevel::NonIndex => 0,
            SummaryLevel::Read => 2,
            SummaryLevel::Lane => 3,
            SummaryLevel::Surface => 4,
        };
        keys[..n].iter().map(|&(name, dtype)| Column::new(name, dtype)).collect()
    }
}

impl fmt::Display for SummaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SummaryLevel {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        SummaryLevel::ALL
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TableError::unknown_column(s, SummaryLevel::ALL.iter().map(|l| l.name())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOptions {
    pub level: SummaryLevel,
    /// Column names to report, every column of the level when `None`
    pub columns: Option<Vec<String>>,
    /// Drop columns with no finite value in the first row
    pub ignore_missing_columns: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        SummaryOptions { level: SummaryLevel::Total, columns: None, ignore_missing_columns: true }
    }
}

impl SummaryOptions {
    pub fn level(level: SummaryLevel) -> SummaryOptions {
        SummaryOptions { level, ..SummaryOptions::default() }
    }
}

/// Names of the value columns available at `level`, in table order
pub fn summary_columns(level: SummaryLevel) -> Vec<String> {
    match level {
        SummaryLevel::Total | SummaryLevel::NonIndex | SummaryLevel::Read => {
            resolve::<MetricSummary>().into_iter().map(|e| e.name).collect()
        }
        SummaryLevel::Lane | SummaryLevel::Surface => resolve::<StatSummary>().into_iter().map(|e| e.name).collect(),
    }
}

/// Look up the requested columns, or take every column of the type
pub(crate) fn select_columns<T: SummaryColumns>(
    requested: Option<&[String]>,
) -> Result<Vec<(String, &'static Accessor<T>)>> {
    match requested {
        None => Ok(resolve::<T>().into_iter().map(|e| (e.name, e.accessor)).collect()),
        Some(names) => {
            let map = column_map::<T>();
            names
                .iter()
                .map(|name| match map.get(name) {
                    Some(&accessor) => Ok((name.clone(), accessor)),
                    None => Err(TableError::unknown_column(name, map.keys().cloned())),
                })
                .collect()
        }
    }
}

/// Turn one accessor value into cells, checking it against the header width
pub(crate) fn value_cells(value: ColumnValue, width: usize) -> Result<Vec<Cell>> {
    if let ColumnValue::Text(text) = value {
        return Ok(vec![Cell::Text(text)]);
    }
    let values = value.to_floats();
    if values.len() != width {
        return Err(TableError::InvalidColumnShape { expected: width, actual: values.len() });
    }
    Ok(values.into_iter().map(Cell::Float).collect())
}

/// Build a table from keyed summary nodes. The column set is decided on the
/// first node and kept for every following node.
pub(crate) fn flatten<'a, T: SummaryColumns>(
    name: &str,
    keys: Vec<Column>,
    nodes: &[(Vec<Cell>, &'a T)],
    run_info: &RunInfo,
    requested: Option<&[String]>,
    ignore_missing_columns: bool,
) -> Result<Table> {
    let selected = select_columns::<T>(requested)?;
    let (first_keys, first) = match nodes.first() {
        Some(node) => node,
        None => return Ok(Table::empty(name)),
    };
    debug_assert_eq!(first_keys.len(), keys.len());

    let mut kept: Vec<(&'static Accessor<T>, usize)> = Vec::with_capacity(selected.len());
    let mut columns = keys;
    for (column, accessor) in selected {
        let value = (accessor.get)(first);
        if ignore_missing_columns && !value.any_finite() {
            debug!("dropping column {} with no values", column);
            continue;
        }
        let dtype = if accessor.is_text { ColumnType::Text } else { ColumnType::Float32 };
        if accessor.subcolumns == Subcolumns::None {
            columns.push(Column::new(&column, dtype));
            kept.push((accessor, 1));
            continue;
        }

        // channel names can be unknown when no image or extraction metrics were loaded
        let labels = accessor.subcolumns.labels(run_info);
        if labels.is_empty() {
            debug!("dropping column {} without subcolumn labels", column);
            continue;
        }
        columns.extend(labels.iter().map(|label| Column::new(&format!("{} {}", column, label), dtype)));
        kept.push((accessor, labels.len()));
    }

    let mut table = Table::new(name, columns);
    for (key_cells, node) in nodes {
        let mut row = key_cells.clone();
        for &(accessor, width) in &kept {
            row.extend(value_cells((accessor.get)(node), width)?);
        }
        table.push_row(row)?;
    }

    Ok(table)
}

fn read_keys(number: u16, is_index: bool) -> Vec<Cell> {
    vec![Cell::UInt(number as u64), Cell::Code(if is_index { b'Y' } else { b'N' })]
}

/// Summarize `run` and flatten the level named in `options`. A run without
/// any metric records, or a level with no nodes, gives an empty table.
pub fn summary_table(run: &RunMetrics, options: &SummaryOptions) -> Result<Table> {
    let level = options.level;
    let name = format!("{} Summary", level);
    let requested = options.columns.as_deref();
    let keys = level.key_columns();
    let run_info = run.run_info();

    if run.is_empty() {
        // still reject bad column names on an empty run
        match level {
            SummaryLevel::Lane | SummaryLevel::Surface => select_columns::<StatSummary>(requested).map(|_| ())?,
            _ => select_columns::<MetricSummary>(requested).map(|_| ())?,
        }
        return Ok(Table::empty(&name));
    }

    let summary = summarize_run_metrics(run);
    let ignore = options.ignore_missing_columns;

    match level {
        SummaryLevel::Total => flatten(&name, keys, &[(Vec::new(), &summary.total)], run_info, requested, ignore),
        SummaryLevel::NonIndex => {
            flatten(&name, keys, &[(Vec::new(), &summary.nonindex)], run_info, requested, ignore)
        }
        SummaryLevel::Read => {
            let nodes: Vec<_> = summary
                .reads
                .iter()
                .map(|r| (read_keys(r.read.number, r.read.is_indexed_read), &r.summary))
                .collect();
            flatten(&name, keys, &nodes, run_info, requested, ignore)
        }
        SummaryLevel::Lane => {
            let nodes: Vec<_> = summary
                .reads
                .iter()
                .flat_map(|r| {
                    r.lanes.iter().filter(|l| l.summary.tile_count > 0).map(move |l| {
                        let mut cells = read_keys(r.read.number, r.read.is_indexed_read);
                        cells.push(Cell::UInt(l.summary.lane as u64));
                        (cells, &l.summary)
                    })
                })
                .collect();
            flatten(&name, keys, &nodes, run_info, requested, ignore)
        }
        SummaryLevel::Surface => {
            let nodes: Vec<_> = summary
                .reads
                .iter()
                .flat_map(|r| {
                    r.lanes.iter().flat_map(move |l| {
                        l.surfaces.iter().filter(|s| s.tile_count > 0).map(move |s| {
                            let mut cells = read_keys(r.read.number, r.read.is_indexed_read);
                            cells.push(Cell::UInt(s.lane as u64));
                            cells.push(Cell::UInt(s.surface as u64));
                            (cells, s)
                        })
                    })
                })
                .collect();
            flatten(&name, keys, &nodes, run_info, requested, ignore)
        }
    }
}
