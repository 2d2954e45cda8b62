//! The imaging table: one row per (lane, tile, cycle) holding every per-cycle
//! metric of that cycle and the tile metrics of its read.
//!
//! Columns come from a fixed list and are kept only when a loaded metric
//! group can fill them. Rows are ordered by lane, tile and cycle.

use std::collections::BTreeMap;

use log::debug;
use ndarray::{Array2, ArrayViewMut1};

use crate::corrected_int_decoder::BASES;
use crate::error::{Result, TableError};
use crate::run_info_parser::{RunInfo, TileNaming};
use crate::run_metrics::RunMetrics;
use crate::table::Table;
use crate::tile_decoder::TileMetric;

use ColumnKind::*;
use ImagingColumnId as C;

pub const IMAGING_COLUMN_COUNT: usize = 29;

/// Every column the imaging table can hold, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImagingColumnId {
    Lane,
    Tile,
    Cycle,
    Read,
    CycleWithinRead,
    DensityK,
    DensityPfK,
    ClusterCountK,
    ClusterCountPfK,
    PercentPassFilter,
    PercentAligned,
    PercentPhasing,
    PercentPrephasing,
    ErrorRate,
    PercentGtQ20,
    PercentGtQ30,
    P90,
    PercentNoCalls,
    PercentBase,
    Fwhm,
    Corrected,
    Called,
    SignalToNoise,
    MinimumContrast,
    MaximumContrast,
    Surface,
    Swath,
    Section,
    TileNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Identifies the row
    Id,
    Value,
    /// One column per base
    Bases,
    /// One column per imaging channel
    Channels,
}

pub struct ColumnDef {
    pub id: ImagingColumnId,
    pub header: &'static str,
    pub kind: ColumnKind,
    /// Digits kept after the decimal point
    pub digits: i32,
}

const fn def(id: ImagingColumnId, header: &'static str, kind: ColumnKind, digits: i32) -> ColumnDef {
    ColumnDef { id, header, kind, digits }
}

pub const IMAGING_COLUMNS: [ColumnDef; IMAGING_COLUMN_COUNT] = [
    def(C::Lane, "Lane", Id, 0),
    def(C::Tile, "Tile", Id, 0),
    def(C::Cycle, "Cycle", Id, 0),
    def(C::Read, "Read", Id, 0),
    def(C::CycleWithinRead, "Cycle Within Read", Id, 0),
    def(C::DensityK, "Density (k/mm2)", Value, 1),
    def(C::DensityPfK, "Density Pf (k/mm2)", Value, 1),
    def(C::ClusterCountK, "Cluster Count (k)", Value, 1),
    def(C::ClusterCountPfK, "Cluster Count Pf (k)", Value, 1),
    def(C::PercentPassFilter, "% Pass Filter", Value, 1),
    def(C::PercentAligned, "% Aligned", Value, 1),
    def(C::PercentPhasing, "% Phasing", Value, 3),
    def(C::PercentPrephasing, "% Prephasing", Value, 3),
    def(C::ErrorRate, "Error Rate", Value, 3),
    def(C::PercentGtQ20, "% >= Q20", Value, 2),
    def(C::PercentGtQ30, "% >= Q30", Value, 2),
    def(C::P90, "P90", Channels, 0),
    def(C::PercentNoCalls, "% No Calls", Value, 1),
    def(C::PercentBase, "% Base", Bases, 1),
    def(C::Fwhm, "Fwhm", Channels, 2),
    def(C::Corrected, "Corrected", Bases, 0),
    def(C::Called, "Called", Bases, 0),
    def(C::SignalToNoise, "Signal To Noise", Value, 2),
    def(C::MinimumContrast, "Minimum Contrast", Channels, 0),
    def(C::MaximumContrast, "Maximum Contrast", Channels, 0),
    def(C::Surface, "Surface", Id, 0),
    def(C::Swath, "Swath", Id, 0),
    def(C::Section, "Section", Id, 0),
    def(C::TileNumber, "Tile Number", Id, 0),
];

const TILE_COLUMNS: [ImagingColumnId; 8] = [
    C::DensityK,
    C::DensityPfK,
    C::ClusterCountK,
    C::ClusterCountPfK,
    C::PercentPassFilter,
    C::PercentAligned,
    C::PercentPhasing,
    C::PercentPrephasing,
];

/// A column of the table with its position in the row
#[derive(Debug, Clone, PartialEq)]
pub struct ImagingColumn {
    pub id: ImagingColumnId,
    pub offset: usize,
    /// Base or channel labels, empty for single value columns
    pub subcolumns: Vec<String>,
}

impl ImagingColumn {
    pub fn header(&self) -> &'static str {
        IMAGING_COLUMNS[self.id as usize].header
    }

    pub fn width(&self) -> usize {
        self.subcolumns.len().max(1)
    }

    pub fn headers(&self) -> Vec<String> {
        if self.subcolumns.is_empty() {
            return vec![self.header().to_owned()];
        }
        self.subcolumns.iter().map(|label| format!("{}/{}", self.header(), label)).collect()
    }
}

/// Lay out the filled columns. `filled` holds one flag per entry of
/// `IMAGING_COLUMNS`.
pub fn imaging_columns(channels: &[String], filled: &[bool]) -> Result<Vec<ImagingColumn>> {
    if filled.len() != IMAGING_COLUMN_COUNT {
        return Err(TableError::InvalidColumnShape { expected: IMAGING_COLUMN_COUNT, actual: filled.len() });
    }

    let mut offset = 0;
    let mut columns = Vec::new();
    for (def, _) in IMAGING_COLUMNS.iter().zip(filled).filter(|&(_, &f)| f) {
        let subcolumns = match def.kind {
            Id | Value => Vec::new(),
            Bases => BASES.iter().map(|&b| b.to_owned()).collect(),
            Channels => channels.to_vec(),
        };
        let column = ImagingColumn { id: def.id, offset, subcolumns };
        offset += column.width();
        columns.push(column);
    }

    Ok(columns)
}

fn tile_value(tile: &TileMetric, id: ImagingColumnId, read: u16) -> f32 {
    match id {
        C::DensityK => tile.cluster_density / 1000.0,
        C::DensityPfK => tile.cluster_density_pf / 1000.0,
        C::ClusterCountK => tile.cluster_count / 1000.0,
        C::ClusterCountPfK => tile.cluster_count_pf / 1000.0,
        C::PercentPassFilter => tile.percent_pf(),
        C::PercentAligned => tile.percent_aligned_at(read),
        C::PercentPhasing => tile.percent_phasing_at(read),
        C::PercentPrephasing => tile.percent_prephasing_at(read),
        _ => f32::NAN,
    }
}

/// Distinct (lane, tile, cycle) of every per-cycle record, mapped to its row
fn row_offsets(run: &RunMetrics) -> BTreeMap<(u16, u32, u16), usize> {
    let mut keys: BTreeMap<(u16, u32, u16), usize> = BTreeMap::new();
    let mut add = |lane, tile, cycle| {
        keys.insert((lane, tile, cycle), 0);
    };
    run.extraction.iter().for_each(|m| add(m.lane, m.tile, m.cycle));
    run.error.iter().for_each(|m| add(m.lane, m.tile, m.cycle));
    run.image.iter().for_each(|m| add(m.lane, m.tile, m.cycle));
    run.corrected_int.iter().for_each(|m| add(m.lane, m.tile, m.cycle));
    run.q.iter().for_each(|m| add(m.lane, m.tile, m.cycle));

    for (row, offset) in keys.values_mut().enumerate() {
        *offset = row;
    }
    keys
}

/// Which columns the loaded groups can fill
fn filled_columns(run: &RunMetrics, rows: &BTreeMap<(u16, u32, u16), usize>) -> Vec<bool> {
    let mut filled = vec![false; IMAGING_COLUMN_COUNT];
    let mut fill = |ids: &[ImagingColumnId], loaded: bool| {
        for &id in ids {
            filled[id as usize] |= loaded;
        }
    };
    fill(&[C::P90, C::Fwhm], !run.extraction.is_empty());
    fill(&[C::ErrorRate], !run.error.is_empty());
    fill(&[C::MinimumContrast, C::MaximumContrast], !run.image.is_empty());
    fill(
        &[C::PercentNoCalls, C::PercentBase, C::Corrected, C::Called, C::SignalToNoise],
        !run.corrected_int.is_empty(),
    );
    fill(&[C::PercentGtQ20, C::PercentGtQ30], !run.q.is_empty());

    let tiles_with_rows: std::collections::BTreeSet<(u16, u32)> = rows.keys().map(|&(l, t, _)| (l, t)).collect();
    for tile in run.tile.iter().filter(|t| tiles_with_rows.contains(&(t.lane, t.tile))) {
        for read in &run.run_info.reads {
            for &id in TILE_COLUMNS.iter() {
                filled[id as usize] |= tile_value(tile, id, read.number).is_finite();
            }
        }
    }

    if filled.iter().any(|&f| f) {
        for &id in &[C::Lane, C::Tile, C::Cycle, C::Read, C::CycleWithinRead, C::Surface, C::Swath, C::TileNumber] {
            filled[id as usize] = true;
        }
        filled[C::Section as usize] = run.run_info.tile_naming() == TileNaming::FiveDigit;
    }
    filled
}

fn round(value: f32, digits: i32) -> f32 {
    let scale = 10f32.powi(digits);
    (value * scale).round() / scale
}

/// Writes rounded values into the row of a table buffer
struct RowWriter<'a> {
    row: ArrayViewMut1<'a, f32>,
    offsets: &'a [Option<usize>; IMAGING_COLUMN_COUNT],
}

impl<'a> RowWriter<'a> {
    fn set(&mut self, id: ImagingColumnId, value: f32) {
        self.set_all(id, std::iter::once(value));
    }

    fn set_all<I: IntoIterator<Item = f32>>(&mut self, id: ImagingColumnId, values: I) {
        if let Some(offset) = self.offsets[id as usize] {
            let digits = IMAGING_COLUMNS[id as usize].digits;
            for (i, value) in values.into_iter().enumerate() {
                self.row[offset + i] = round(value, digits);
            }
        }
    }
}

struct Populator<'a> {
    data: Array2<f32>,
    rows: &'a BTreeMap<(u16, u32, u16), usize>,
    offsets: [Option<usize>; IMAGING_COLUMN_COUNT],
    run_info: &'a RunInfo,
}

impl<'a> Populator<'a> {
    /// The row of a record with its identity columns filled in
    fn row(&mut self, lane: u16, tile: u32, cycle: u16) -> Result<RowWriter<'_>> {
        let total = self.run_info.total_cycles();
        let (read, within) = self.run_info.read_for_cycle(cycle).ok_or_else(|| {
            TableError::IndexOutOfBounds(format!(
                "Cycle {} exceeds total cycles {} from Reads in the RunInfo.xml",
                cycle, total
            ))
        })?;
        let read = read.number;
        let naming = self.run_info.tile_naming();
        let index = *self.rows.get(&(lane, tile, cycle)).ok_or_else(|| {
            TableError::IndexOutOfBounds(format!("no row for lane {} tile {} cycle {}", lane, tile, cycle))
        })?;

        let mut writer = RowWriter { row: self.data.row_mut(index), offsets: &self.offsets };
        writer.set(C::Lane, lane as f32);
        writer.set(C::Tile, tile as f32);
        writer.set(C::Cycle, cycle as f32);
        writer.set(C::Read, read as f32);
        writer.set(C::CycleWithinRead, within as f32);
        writer.set(C::Surface, naming.surface(tile) as f32);
        writer.set(C::Swath, naming.swath(tile) as f32);
        writer.set(C::Section, naming.section(tile).map_or(f32::NAN, |s| s as f32));
        writer.set(C::TileNumber, naming.number(tile) as f32);

        Ok(writer)
    }
}

/// Build the imaging table. A run without per-cycle metrics gives an empty
/// table.
pub fn imaging_table(run: &RunMetrics) -> Result<Table> {
    let rows = row_offsets(run);
    let filled = filled_columns(run, &rows);
    let columns = imaging_columns(&run.run_info.channels, &filled)?;
    if rows.is_empty() || columns.is_empty() {
        return Ok(Table::empty("Imaging"));
    }

    let mut offsets = [None; IMAGING_COLUMN_COUNT];
    for column in &columns {
        offsets[column.id as usize] = Some(column.offset);
    }
    let headers: Vec<String> = columns.iter().flat_map(ImagingColumn::headers).collect();
    debug!("imaging table with {} rows and {} columns", rows.len(), headers.len());

    let mut p = Populator {
        data: Array2::from_elem((rows.len(), headers.len()), f32::NAN),
        rows: &rows,
        offsets,
        run_info: &run.run_info,
    };

    for m in run.extraction.iter() {
        let mut row = p.row(m.lane, m.tile, m.cycle)?;
        row.set_all(C::P90, m.max_intensity.iter().map(|&v| v as f32));
        row.set_all(C::Fwhm, m.focus.iter().copied());
    }
    for m in run.error.iter() {
        p.row(m.lane, m.tile, m.cycle)?.set(C::ErrorRate, m.error_rate);
    }
    for m in run.image.iter() {
        let mut row = p.row(m.lane, m.tile, m.cycle)?;
        row.set_all(C::MinimumContrast, m.min_contrast.iter().map(|&v| v as f32));
        row.set_all(C::MaximumContrast, m.max_contrast.iter().map(|&v| v as f32));
    }
    for m in run.corrected_int.iter() {
        let mut row = p.row(m.lane, m.tile, m.cycle)?;
        row.set(C::PercentNoCalls, m.percent_nocall());
        row.set_all(C::PercentBase, m.percent_bases().iter().copied());
        row.set_all(C::Corrected, m.corrected_int_all.iter().map(|&v| v as f32));
        row.set_all(C::Called, m.corrected_int_called.iter().map(|&v| v as f32));
        row.set(C::SignalToNoise, m.signal_to_noise);
    }
    for m in run.q.iter() {
        let mut row = p.row(m.lane, m.tile, m.cycle)?;
        row.set(C::PercentGtQ20, m.percent_over_qscore(20));
        row.set(C::PercentGtQ30, m.percent_over_qscore(30));
    }

    let tiles: BTreeMap<(u16, u32), &TileMetric> = run.tile.iter().map(|t| ((t.lane, t.tile), t)).collect();
    for &(lane, tile, cycle) in rows.keys() {
        if let Some(metric) = tiles.get(&(lane, tile)) {
            let read = match run.run_info.read_for_cycle(cycle) {
                Some((read, _)) => read.number,
                None => continue,
            };
            let mut row = p.row(lane, tile, cycle)?;
            for &id in TILE_COLUMNS.iter() {
                row.set(id, tile_value(metric, id, read));
            }
        }
    }

    Table::from_matrix("Imaging", headers, &p.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_decoder::ErrorMetric;
    use crate::metric_set::MetricSet;
    use crate::test_fixtures::{index_metrics_fixture, run_metrics_fixture};
    use crate::tile_decoder::ReadMetric;

    fn close(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4 || (x.is_nan() && y.is_nan()))
    }

    #[test]
    fn headers() {
        let table = imaging_table(&run_metrics_fixture()).unwrap();
        let expected = vec![
            "Lane", "Tile", "Cycle", "Read", "Cycle Within Read", "Error Rate", "P90/green", "P90/blue",
            "% No Calls", "% Base/A", "% Base/C", "% Base/G", "% Base/T", "Fwhm/green", "Fwhm/blue",
            "Corrected/A", "Corrected/C", "Corrected/G", "Corrected/T", "Called/A", "Called/C", "Called/G",
            "Called/T", "Signal To Noise", "Surface", "Swath", "Tile Number",
        ];
        assert_eq!(table.headers(), expected);
    }

    #[test]
    fn rows() {
        let table = imaging_table(&run_metrics_fixture()).unwrap();

        assert_eq!(table.row_count(), 5);
        assert_eq!(table.float_column("Cycle").unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(table.float_column("Read").unwrap(), vec![1.0, 1.0, 1.0, 2.0, 3.0]);
        assert_eq!(table.float_column("Cycle Within Read").unwrap(), vec![1.0, 2.0, 3.0, 1.0, 1.0]);
        assert!(close(&table.float_column("Error Rate").unwrap(), &[0.1, 0.2, 0.3, 0.4, 0.5]));
        assert!(close(&table.float_column("% No Calls").unwrap(), &[25.0, 12.5, 25.0, 25.0, 37.5]));
        assert_eq!(table.float_column("Tile Number").unwrap(), vec![1.0; 5]);
        assert!(table.float_column("Signal To Noise").unwrap().iter().all(|v| v.is_nan()));

        let row = table.row(1);
        let base = table.column_index("% Base/A").unwrap();
        let values: Vec<f32> = row[base..base + 4].iter().filter_map(|c| c.as_f32()).collect();
        assert!(close(&values, &[42.9, 28.6, 28.6, 0.0]));
        assert_eq!(table.cell(1, "P90/blue").and_then(|c| c.as_f32()), Some(15.0));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let sorted = run_metrics_fixture();
        let mut reversed = sorted.clone();
        let records: Vec<ErrorMetric> = sorted.error.iter().rev().cloned().collect();
        reversed.error = MetricSet::new();
        reversed.error.extend(records);
        reversed.error.insert(ErrorMetric { lane: 1, tile: 1101, cycle: 2, error_rate: 0.2 });

        let a = imaging_table(&sorted).unwrap();
        let b = imaging_table(&reversed).unwrap();
        assert_eq!(a.row_count(), b.row_count());
        assert_eq!(a.float_column("Cycle"), b.float_column("Cycle"));
    }

    #[test]
    fn tile_columns_follow_the_read() {
        let mut run = run_metrics_fixture();
        let mut tile = TileMetric::new(1, 1101);
        tile.cluster_density = 250_000.0;
        tile.cluster_count = 1000.0;
        tile.cluster_count_pf = 800.0;
        tile.reads = vec![
            ReadMetric { read: 1, percent_aligned: 90.0, percent_phasing: 0.1234, percent_prephasing: 0.05 },
            ReadMetric { read: 3, percent_aligned: 70.0, percent_phasing: f32::NAN, percent_prephasing: f32::NAN },
        ];
        run.tile.insert(tile);
        run.finalize_after_load();

        let table = imaging_table(&run).unwrap();
        assert_eq!(table.row_count(), 5);
        assert_eq!(table.float_column("Density (k/mm2)").unwrap(), vec![250.0; 5]);
        assert_eq!(table.float_column("% Pass Filter").unwrap(), vec![80.0; 5]);
        assert!(close(
            &table.float_column("% Aligned").unwrap(),
            &[90.0, 90.0, 90.0, f32::NAN, 70.0]
        ));
        assert!(close(&table.float_column("% Phasing").unwrap()[..1], &[0.123]));
        assert_eq!(table.column_index("Density (k/mm2)"), Some(5));
    }

    #[test]
    fn only_tile_metrics() {
        let table = imaging_table(&index_metrics_fixture()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn cycle_past_last_read() {
        let mut run = run_metrics_fixture();
        run.error.insert(ErrorMetric { lane: 1, tile: 1101, cycle: 9, error_rate: 0.1 });
        let err = imaging_table(&run).unwrap_err();
        assert!(err.to_string().contains("Cycle 9 exceeds total cycles 5"), "{}", err);
    }

    #[test]
    fn column_layout() {
        let mut filled = vec![false; IMAGING_COLUMN_COUNT];
        filled[C::Lane as usize] = true;
        filled[C::P90 as usize] = true;
        filled[C::ErrorRate as usize] = true;
        let channels = vec!["red".to_owned(), "green".to_owned()];

        let columns = imaging_columns(&channels, &filled).unwrap();
        let offsets: Vec<usize> = columns.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(columns[2].headers(), vec!["P90/red", "P90/green"]);

        assert!(imaging_columns(&channels, &filled[1..]).is_err());
    }
}
