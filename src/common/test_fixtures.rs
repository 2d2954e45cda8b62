//! Small in-memory runs shared by the unit tests

use crate::corrected_int_decoder::CorrectedIntMetric;
use crate::error_decoder::ErrorMetric;
use crate::extraction_decoder::ExtractionMetric;
use crate::index_decoder::{IndexInfo, IndexMetric};
use crate::run_info_parser::{FlowcellLayout, Read, RunInfo, TileNaming};
use crate::run_metrics::RunMetrics;
use crate::tile_decoder::TileMetric;

/// Reads (1, 3 cycles), (2, 1 cycle, index) and (3, 1 cycle, index)
pub fn run_info_fixture(tiles: &[&str]) -> RunInfo {
    let reads = [(1, 3, false), (2, 1, true), (3, 1, true)]
        .iter()
        .scan(0, |start, &(number, num_cycles, is_indexed_read)| {
            *start += num_cycles;
            Some(Read {
                number,
                num_cycles,
                is_indexed_read,
                start: *start - num_cycles,
                end: *start,
            })
        })
        .collect();

    let surfaces: std::collections::BTreeSet<_> =
        tiles.iter().map(|t| t.split('_').nth(1).unwrap_or("1").chars().next()).collect();

    RunInfo {
        version: 6,
        id: "111111_UNKNOWN_1_XXYT".to_owned(),
        number: 1,
        flowcell: "XXYT".to_owned(),
        instrument: "UNKNOWN".to_owned(),
        date: "111111".to_owned(),
        reads,
        flowcell_layout: FlowcellLayout {
            lane_count: 1,
            surface_count: surfaces.len(),
            swath_count: 1,
            tile_count: tiles.len() as u64,
            tile_naming_convention: TileNaming::FourDigit,
            tiles: tiles.iter().map(|&t| t.to_owned()).collect(),
        },
        channels: vec!["green".to_owned(), "blue".to_owned()],
    }
}

/// Error, corrected intensity and extraction metrics for tile 1101
pub fn run_metrics_fixture() -> RunMetrics {
    let mut metrics = RunMetrics::new(run_info_fixture(&["1_1101"]));

    for (cycle, &error_rate) in [0.1f32, 0.2, 0.3, 0.4, 0.5].iter().enumerate() {
        metrics.error.insert(ErrorMetric { lane: 1, tile: 1101, cycle: cycle as u16 + 1, error_rate });
    }

    let calls = [[10, 10, 10, 10, 0], [5, 15, 10, 10, 0], [10, 10, 15, 5, 0], [10, 5, 15, 10, 0], [15, 5, 10, 10, 0]];
    for (cycle, &counts) in calls.iter().enumerate() {
        metrics.corrected_int.insert(CorrectedIntMetric::from_counts(1, 1101, cycle as u16 + 1, counts));
    }

    let intensities = [[10u16, 10], [5, 15], [10, 10], [10, 5], [15, 5]];
    for (cycle, values) in intensities.iter().enumerate() {
        metrics.extraction.insert(ExtractionMetric {
            lane: 1,
            tile: 1101,
            cycle: cycle as u16 + 1,
            focus: values.iter().map(|&v| v as f32).collect(),
            max_intensity: values.to_vec(),
            date_time: 0,
        });
    }

    metrics.finalize_after_load();
    metrics
}

/// Two samples on tiles 1101 (900 PF clusters) and 1102 (no clusters)
pub fn index_metrics_fixture() -> RunMetrics {
    let mut metrics = RunMetrics::new(run_info_fixture(&["1_1101", "1_1102"]));

    let indices = vec![
        IndexInfo::new("ATCACGAC-AAGGTTCA", "1", "TSCAIndexes", 4570),
        IndexInfo::new("ATCACGAC-GGGGGGGG", "2", "TSCAIndexes", 2343),
    ];

    for &(tile, count, count_pf) in &[(1101u32, 1000.0f32, 900.0f32), (1102, 0.0, 0.0)] {
        for read in 2..=3 {
            metrics.index.insert(IndexMetric::new(1, tile, read, indices.clone()));
        }
        metrics.tile.insert(TileMetric {
            lane: 1,
            tile,
            cluster_density: count,
            cluster_density_pf: count_pf,
            cluster_count: count,
            cluster_count_pf: count_pf,
            reads: Vec::new(),
        });
    }

    metrics.finalize_after_load();
    metrics
}
