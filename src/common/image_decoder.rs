//! Read `ImageMetricsOut.bin` into per-cycle contrast values.

use std::{fs, io::Cursor, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::metric_group::MetricGroup;
use crate::metric_set::{bad_format, fixed_size_records, Metric, MetricSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetric {
    pub lane: u16,
    pub tile: u32,
    pub cycle: u16,
    pub min_contrast: Vec<u16>,
    pub max_contrast: Vec<u16>,
}

impl Metric for ImageMetric {
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

impl ImageMetric {
    pub fn channel_count(&self) -> usize {
        self.min_contrast.len()
    }

    pub fn trim_channels(&mut self, channels: usize) {
        self.min_contrast.truncate(channels);
        self.max_contrast.truncate(channels);
    }
}

/// Decode an `ImageMetricsOut.bin` file
pub fn image_decoder(path: &Path) -> Result<MetricSet<ImageMetric>> {
    decode_image_metrics(&fs::read(path)?)
}

/// Decode image metrics from a buffer
///
/// Format of version 2:
///  1. `u8` version, `u8` record size and `u8` channel count
///  2. per record: `u16` lane, `u16` tile, `u16` cycle,
///     `[u16; channels]` min contrast, `[u16; channels]` max contrast
pub fn decode_image_metrics(bytes: &[u8]) -> Result<MetricSet<ImageMetric>> {
    let (version, header, records) = fixed_size_records(bytes, MetricGroup::Image, &[2], 1)?;

    let channels = header[0] as usize;
    let record_size = bytes[1] as usize;
    if 6 + 4 * channels > record_size {
        return Err(bad_format(
            MetricGroup::Image,
            format!("record size {} too small for {} channels", bytes[1], channels),
        ));
    }

    let mut set = MetricSet::new();
    set.version = version;
    for record in records {
        let mut rdr = Cursor::new(record);
        let lane = rdr.read_u16::<LittleEndian>()?;
        let tile = rdr.read_u16::<LittleEndian>()? as u32;
        let cycle = rdr.read_u16::<LittleEndian>()?;

        let mut min_contrast = vec![0u16; channels];
        rdr.read_u16_into::<LittleEndian>(&mut min_contrast)?;
        let mut max_contrast = vec![0u16; channels];
        rdr.read_u16_into::<LittleEndian>(&mut max_contrast)?;

        set.insert(ImageMetric { lane, tile, cycle, min_contrast, max_contrast });
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    #[test]
    fn decode() {
        let mut buf = vec![2u8, 14, 2];
        for &x in &[1u16, 1101, 1, 10, 20, 3000, 4000] {
            buf.write_u16::<LittleEndian>(x).unwrap();
        }

        let set = decode_image_metrics(&buf).unwrap();
        let metric = set.at(0).unwrap();
        assert_eq!(metric.channel_count(), 2);
        assert_eq!(metric.min_contrast, vec![10, 20]);
        assert_eq!(metric.max_contrast, vec![3000, 4000]);
    }

    #[test]
    fn too_many_channels() {
        let err = decode_image_metrics(&[2u8, 10, 2]).unwrap_err();
        assert!(err.to_string().contains("record size 10 too small for 2 channels"), "{}", err);
    }
}
