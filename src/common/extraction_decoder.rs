//! Read `ExtractionMetricsOut.bin` into per-cycle focus and intensity values.

use std::{fs, io::Cursor, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::metric_group::MetricGroup;
use crate::metric_set::{fixed_size_records, Metric, MetricSet};

const CHANNEL_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMetric {
    pub lane: u16,
    pub tile: u32,
    pub cycle: u16,
    /// Full width at half maximum per channel
    pub focus: Vec<f32>,
    /// 90th percentile intensity per channel
    pub max_intensity: Vec<u16>,
    pub date_time: u64,
}

impl Metric for ExtractionMetric {
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

impl ExtractionMetric {
    pub fn channel_count(&self) -> usize {
        self.max_intensity.len()
    }

    pub fn trim_channels(&mut self, channels: usize) {
        self.focus.truncate(channels);
        self.max_intensity.truncate(channels);
    }
}

/// Decode an `ExtractionMetricsOut.bin` file
pub fn extraction_decoder(path: &Path) -> Result<MetricSet<ExtractionMetric>> {
    decode_extraction_metrics(&fs::read(path)?)
}

/// Decode extraction metrics from a buffer
///
/// Format of version 2:
///  1. `u8` version and `u8` record size
///  2. per record: `u16` lane, `u16` tile, `u16` cycle, `[f32; 4]` focus,
///     `[u16; 4]` max intensity, `u64` date time
pub fn decode_extraction_metrics(bytes: &[u8]) -> Result<MetricSet<ExtractionMetric>> {
    let (version, _, records) = fixed_size_records(bytes, MetricGroup::Extraction, &[2], 0)?;

    let mut set = MetricSet::new();
    set.version = version;
    for record in records {
        let mut rdr = Cursor::new(record);
        let lane = rdr.read_u16::<LittleEndian>()?;
        let tile = rdr.read_u16::<LittleEndian>()? as u32;
        let cycle = rdr.read_u16::<LittleEndian>()?;

        let mut focus = vec![0f32; CHANNEL_COUNT];
        rdr.read_f32_into::<LittleEndian>(&mut focus)?;
        let mut max_intensity = vec![0u16; CHANNEL_COUNT];
        rdr.read_u16_into::<LittleEndian>(&mut max_intensity)?;
        let date_time = rdr.read_u64::<LittleEndian>()?;

        set.insert(ExtractionMetric { lane, tile, cycle, focus, max_intensity, date_time });
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    #[test]
    fn decode() {
        let mut buf = vec![2u8, 38];
        for &x in &[1u16, 1101, 3] {
            buf.write_u16::<LittleEndian>(x).unwrap();
        }
        for &f in &[2.5f32, 2.75, 0.0, 0.0] {
            buf.write_f32::<LittleEndian>(f).unwrap();
        }
        for &p in &[310u16, 420, 0, 0] {
            buf.write_u16::<LittleEndian>(p).unwrap();
        }
        buf.write_u64::<LittleEndian>(42).unwrap();

        let mut set = decode_extraction_metrics(&buf).unwrap();
        assert_eq!(set.len(), 1);

        let metric = set.at(0).unwrap();
        assert_eq!(metric.cycle, 3);
        assert_eq!(metric.focus, vec![2.5, 2.75, 0.0, 0.0]);
        assert_eq!(metric.max_intensity, vec![310, 420, 0, 0]);
        assert_eq!(metric.date_time, 42);

        set.iter_mut().for_each(|m| m.trim_channels(2));
        assert_eq!(set.at(0).unwrap().channel_count(), 2);
    }

    #[test]
    fn bad_size() {
        let err = decode_extraction_metrics(&[2u8, 38, 1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("Bad format in ExtractionMetricsOut.bin"), "{}", err);
    }
}
