//! Read `CorrectedIntMetricsOut.bin` into per-cycle intensities and base calls.

use std::{fs, io::Cursor, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::metric_group::MetricGroup;
use crate::metric_set::{fixed_size_records, Metric, MetricSet};

pub const BASES: [&str; 4] = ["A", "C", "G", "T"];

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedIntMetric {
    pub lane: u16,
    pub tile: u32,
    pub cycle: u16,
    pub average_intensity: u16,
    /// Average corrected intensity over all clusters, per base
    pub corrected_int_all: [u16; 4],
    /// Average corrected intensity over clusters called as that base
    pub corrected_int_called: [u16; 4],
    /// Number of calls for no call, A, C, G and T
    pub called_counts: [u32; 5],
    pub signal_to_noise: f32,
}

impl Metric for CorrectedIntMetric {
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

impl CorrectedIntMetric {
    /// A record carrying only base call counts
    pub fn from_counts(lane: u16, tile: u32, cycle: u16, called_counts: [u32; 5]) -> Self {
        CorrectedIntMetric {
            lane,
            tile,
            cycle,
            average_intensity: 0,
            corrected_int_all: [0; 4],
            corrected_int_called: [0; 4],
            called_counts,
            signal_to_noise: f32::NAN,
        }
    }

    pub fn total_calls(&self, include_no_calls: bool) -> u64 {
        let skip = if include_no_calls { 0 } else { 1 };
        self.called_counts.iter().skip(skip).map(|&c| c as u64).sum()
    }

    pub fn percent_nocall(&self) -> f32 {
        let total = self.total_calls(true);
        if total == 0 {
            return f32::NAN;
        }
        self.called_counts[0] as f32 / total as f32 * 100.0
    }

    /// Percent of called bases that are A, C, G and T
    pub fn percent_bases(&self) -> [f32; 4] {
        let total = self.total_calls(false);
        let mut percent = [f32::NAN; 4];
        if total > 0 {
            for (p, &count) in percent.iter_mut().zip(&self.called_counts[1..]) {
                *p = count as f32 / total as f32 * 100.0;
            }
        }
        percent
    }
}

/// Decode a `CorrectedIntMetricsOut.bin` file
pub fn corrected_int_decoder(path: &Path) -> Result<MetricSet<CorrectedIntMetric>> {
    decode_corrected_int_metrics(&fs::read(path)?)
}

/// Decode corrected intensity metrics from a buffer
///
/// Format of version 2:
///  1. `u8` version and `u8` record size
///  2. per record: `u16` lane, `u16` tile, `u16` cycle, `u16` average
///     intensity, `[u16; 4]` corrected intensity over all clusters,
///     `[u16; 4]` corrected intensity over called clusters,
///     `[u32; 5]` call counts (no call, A, C, G, T), `f32` signal to noise
pub fn decode_corrected_int_metrics(bytes: &[u8]) -> Result<MetricSet<CorrectedIntMetric>> {
    let (version, _, records) = fixed_size_records(bytes, MetricGroup::CorrectedInt, &[2], 0)?;

    let mut set = MetricSet::new();
    set.version = version;
    for record in records {
        let mut rdr = Cursor::new(record);
        let lane = rdr.read_u16::<LittleEndian>()?;
        let tile = rdr.read_u16::<LittleEndian>()? as u32;
        let cycle = rdr.read_u16::<LittleEndian>()?;
        let average_intensity = rdr.read_u16::<LittleEndian>()?;

        let mut corrected_int_all = [0u16; 4];
        rdr.read_u16_into::<LittleEndian>(&mut corrected_int_all)?;
        let mut corrected_int_called = [0u16; 4];
        rdr.read_u16_into::<LittleEndian>(&mut corrected_int_called)?;
        let mut called_counts = [0u32; 5];
        rdr.read_u32_into::<LittleEndian>(&mut called_counts)?;
        let signal_to_noise = rdr.read_f32::<LittleEndian>()?;

        set.insert(CorrectedIntMetric {
            lane,
            tile,
            cycle,
            average_intensity,
            corrected_int_all,
            corrected_int_called,
            called_counts,
            signal_to_noise,
        });
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    #[test]
    fn decode() {
        let mut buf = vec![2u8, 48];
        for &x in &[1u16, 1101, 1, 500, 100, 200, 300, 400, 110, 210, 310, 410] {
            buf.write_u16::<LittleEndian>(x).unwrap();
        }
        for &c in &[5u32, 15, 10, 10, 0] {
            buf.write_u32::<LittleEndian>(c).unwrap();
        }
        buf.write_f32::<LittleEndian>(12.5).unwrap();

        let set = decode_corrected_int_metrics(&buf).unwrap();
        let metric = set.at(0).unwrap();
        assert_eq!(metric.average_intensity, 500);
        assert_eq!(metric.corrected_int_all, [100, 200, 300, 400]);
        assert_eq!(metric.corrected_int_called, [110, 210, 310, 410]);
        assert_eq!(metric.called_counts, [5, 15, 10, 10, 0]);
        assert_eq!(metric.signal_to_noise, 12.5);
    }

    #[test]
    fn percentages() {
        let metric = CorrectedIntMetric::from_counts(1, 1101, 2, [5, 15, 10, 10, 0]);
        assert!((metric.percent_nocall() - 12.5).abs() < 1e-4);

        let bases = metric.percent_bases();
        assert!((bases[0] - 42.857143).abs() < 1e-4);
        assert!((bases[1] - 28.571428).abs() < 1e-4);
        assert_eq!(bases[3], 0.0);

        let empty = CorrectedIntMetric::from_counts(1, 1101, 3, [0; 5]);
        assert!(empty.percent_nocall().is_nan());
        assert!(empty.percent_bases()[0].is_nan());
    }
}
