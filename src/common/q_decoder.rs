//! Read `QMetricsOut.bin` into per-cycle quality score histograms.

use std::{fs, io::Cursor, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::metric_group::MetricGroup;
use crate::metric_set::{fixed_size_records, Metric, MetricSet};

pub const MAX_Q_BINS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct QMetric {
    pub lane: u16,
    pub tile: u32,
    pub cycle: u16,
    /// Number of clusters at each quality score, bin 0 is Q1
    pub histogram: Vec<u32>,
}

impl Metric for QMetric {
    fn lane(&self) -> u16 {
        self.lane
    }

    fn tile(&self) -> u32 {
        self.tile
    }

    fn cycle_or_read(&self) -> u16 {
        self.cycle
    }
}

impl QMetric {
    pub fn total(&self) -> u64 {
        self.histogram.iter().map(|&c| c as u64).sum()
    }

    /// Number of clusters with a quality score of at least `qscore`
    pub fn total_over_qscore(&self, qscore: usize) -> u64 {
        let start = qscore.saturating_sub(1);
        self.histogram.iter().skip(start).map(|&c| c as u64).sum()
    }

    pub fn percent_over_qscore(&self, qscore: usize) -> f32 {
        let total = self.total();
        if total == 0 {
            return f32::NAN;
        }
        (self.total_over_qscore(qscore) as f64 / total as f64 * 100.0) as f32
    }
}

/// Decode a `QMetricsOut.bin` file
pub fn q_decoder(path: &Path) -> Result<MetricSet<QMetric>> {
    decode_q_metrics(&fs::read(path)?)
}

/// Decode quality metrics from a buffer
///
/// Format of version 4:
///  1. `u8` version and `u8` record size
///  2. per record: `u16` lane, `u16` tile, `u16` cycle, `[u32; 50]` histogram
pub fn decode_q_metrics(bytes: &[u8]) -> Result<MetricSet<QMetric>> {
    let (version, _, records) = fixed_size_records(bytes, MetricGroup::Q, &[4], 0)?;

    let mut set = MetricSet::new();
    set.version = version;
    for record in records {
        let mut rdr = Cursor::new(record);
        let lane = rdr.read_u16::<LittleEndian>()?;
        let tile = rdr.read_u16::<LittleEndian>()? as u32;
        let cycle = rdr.read_u16::<LittleEndian>()?;

        let mut histogram = vec![0u32; MAX_Q_BINS];
        rdr.read_u32_into::<LittleEndian>(&mut histogram)?;

        set.insert(QMetric { lane, tile, cycle, histogram });
    }

    Ok(set)
}
