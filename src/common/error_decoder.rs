//! Read `ErrorMetricsOut.bin` into per-cycle error rates.

use std::{fs, io::Cursor, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::metric_group::MetricGroup;
use crate::metric_set::{fixed_size_records, Metric, MetricSet};

/// Percent of PhiX aligned bases called in error for one tile and cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMetric {
    pub lane: u16,
    pub tile: u32,
    pub cycle: u16,
    pub error_rate: f32,
}

impl Metric for ErrorMetric {
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

/// Decode an `ErrorMetricsOut.bin` file
pub fn error_decoder(path: &Path) -> Result<MetricSet<ErrorMetric>> {
    decode_error_metrics(&fs::read(path)?)
}

/// Decode error metrics from a buffer
///
/// Format of version 3:
///  1. `u8` version and `u8` record size
///  2. per record: `u16` lane, `u16` tile, `u16` cycle, `f32` error rate,
///     then five `u32` counts of reads with 0 to 4 errors (ignored)
pub fn decode_error_metrics(bytes: &[u8]) -> Result<MetricSet<ErrorMetric>> {
    let (version, _, records) = fixed_size_records(bytes, MetricGroup::Error, &[3], 0)?;

    let mut set = MetricSet::new();
    set.version = version;
    for record in records {
        let mut rdr = Cursor::new(record);
        set.insert(ErrorMetric {
            lane: rdr.read_u16::<LittleEndian>()?,
            tile: rdr.read_u16::<LittleEndian>()? as u32,
            cycle: rdr.read_u16::<LittleEndian>()?,
            error_rate: rdr.read_f32::<LittleEndian>()?,
        });
    }

    Ok(set)
}
