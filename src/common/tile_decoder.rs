//! Read `TileMetricsOut.bin` into per-tile cluster metrics.

use std::{collections::BTreeMap, fs, io::Cursor, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::error::Result;
use crate::metric_group::MetricGroup;
use crate::metric_set::{fixed_size_records, Metric, MetricSet};

/// Per-read alignment and phasing values for one tile
#[derive(Debug, Clone, PartialEq)]
pub struct ReadMetric {
    pub read: u16,
    pub percent_aligned: f32,
    pub percent_phasing: f32,
    pub percent_prephasing: f32,
}

impl ReadMetric {
    fn new(read: u16) -> ReadMetric {
        ReadMetric {
            read,
            percent_aligned: f32::NAN,
            percent_phasing: f32::NAN,
            percent_prephasing: f32::NAN,
        }
    }
}

/// Cluster density and counts for one tile
#[derive(Debug, Clone, PartialEq)]
pub struct TileMetric {
    pub lane: u16,
    pub tile: u32,
    pub cluster_density: f32,
    pub cluster_density_pf: f32,
    pub cluster_count: f32,
    pub cluster_count_pf: f32,
    pub reads: Vec<ReadMetric>,
}

impl Metric for TileMetric {
    fn lane(&self) -> u16 {
        self.lane
    }

    fn tile(&self) -> u32 {
        self.tile
    }
}

impl TileMetric {
    pub fn new(lane: u16, tile: u32) -> TileMetric {
        TileMetric {
            lane,
            tile,
            cluster_density: f32::NAN,
            cluster_density_pf: f32::NAN,
            cluster_count: f32::NAN,
            cluster_count_pf: f32::NAN,
            reads: Vec::new(),
        }
    }

    pub fn percent_pf(&self) -> f32 {
        if self.cluster_count > 0.0 {
            self.cluster_count_pf / self.cluster_count * 100.0
        } else {
            f32::NAN
        }
    }

    pub fn read(&self, read: u16) -> Option<&ReadMetric> {
        self.reads.iter().find(|r| r.read == read)
    }

    pub fn percent_aligned_at(&self, read: u16) -> f32 {
        self.read(read).map_or(f32::NAN, |r| r.percent_aligned)
    }

    pub fn percent_phasing_at(&self, read: u16) -> f32 {
        self.read(read).map_or(f32::NAN, |r| r.percent_phasing)
    }

    pub fn percent_prephasing_at(&self, read: u16) -> f32 {
        self.read(read).map_or(f32::NAN, |r| r.percent_prephasing)
    }

    fn read_mut(&mut self, read: u16) -> &mut ReadMetric {
        let i = match self.reads.binary_search_by_key(&read, |r| r.read) {
            Ok(i) => i,
            Err(i) => {
                self.reads.insert(i, ReadMetric::new(read));
                i
            }
        };
        &mut self.reads[i]
    }

    fn apply_code(&mut self, code: u16, value: f32) {
        let count = if value.is_nan() { 0.0 } else { value };
        match code {
            100 => self.cluster_density = count,
            101 => self.cluster_density_pf = count,
            102 => self.cluster_count = count,
            103 => self.cluster_count_pf = count,
            200..=299 => {
                let read = (code - 200) / 2 + 1;
                if code % 2 == 0 {
                    self.read_mut(read).percent_phasing = value * 100.0;
                } else {
                    self.read_mut(read).percent_prephasing = value * 100.0;
                }
            }
            300..=399 => self.read_mut(code - 300 + 1).percent_aligned = value,
            _ => debug!("ignoring tile metric code {}", code),
        }
    }
}

/// Decode a `TileMetricsOut.bin` file
pub fn tile_decoder(path: &Path) -> Result<MetricSet<TileMetric>> {
    decode_tile_metrics(&fs::read(path)?)
}

/// Decode tile metrics from a buffer
///
/// Format of version 2:
///  1. `u8` version and `u8` record size
///  2. per record: `u16` lane, `u16` tile, `u16` code, `f32` value
///
/// Codes: 100 density, 101 density PF, 102 cluster count, 103 cluster
/// count PF, `200 + 2 * (read - 1)` phasing, `201 + 2 * (read - 1)`
/// prephasing, `300 + read - 1` percent aligned, 400 control lane.
/// Records for one tile are merged into a single `TileMetric`.
pub fn decode_tile_metrics(bytes: &[u8]) -> Result<MetricSet<TileMetric>> {
    let (version, _, records) = fixed_size_records(bytes, MetricGroup::Tile, &[2], 0)?;

    let mut tiles: BTreeMap<(u16, u32), TileMetric> = BTreeMap::new();
    for record in records {
        let mut rdr = Cursor::new(record);
        let lane = rdr.read_u16::<LittleEndian>()?;
        let tile = rdr.read_u16::<LittleEndian>()? as u32;
        let code = rdr.read_u16::<LittleEndian>()?;
        let value = rdr.read_f32::<LittleEndian>()?;

        tiles
            .entry((lane, tile))
            .or_insert_with(|| TileMetric::new(lane, tile))
            .apply_code(code, value);
    }

    let mut set = MetricSet::new();
    set.version = version;
    set.extend(tiles.into_iter().map(|(_, t)| t));

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn record(buf: &mut Vec<u8>, lane: u16, tile: u16, code: u16, value: f32) {
        buf.write_u16::<LittleEndian>(lane).unwrap();
        buf.write_u16::<LittleEndian>(tile).unwrap();
        buf.write_u16::<LittleEndian>(code).unwrap();
        buf.write_f32::<LittleEndian>(value).unwrap();
    }

    #[test]
    fn decode() {
        let mut buf = vec![2u8, 10];
        record(&mut buf, 1, 1101, 100, 2500.0);
        record(&mut buf, 1, 1101, 102, 1000.0);
        record(&mut buf, 1, 1101, 103, 900.0);
        record(&mut buf, 1, 1101, 200, 0.1);
        record(&mut buf, 1, 1101, 203, 0.05);
        record(&mut buf, 1, 1101, 300, 95.5);
        record(&mut buf, 1, 1102, 102, f32::NAN);
        record(&mut buf, 1, 1101, 400, 0.0);

        let set = decode_tile_metrics(&buf).unwrap();
        assert_eq!(set.len(), 2);

        let tile = set.at(0).unwrap();
        assert_eq!(tile.tile, 1101);
        assert_eq!(tile.cluster_density, 2500.0);
        assert_eq!(tile.cluster_count_pf, 900.0);
        assert!((tile.percent_pf() - 90.0).abs() < 1e-4);
        assert!((tile.percent_phasing_at(1) - 10.0).abs() < 1e-4);
        assert!((tile.percent_prephasing_at(2) - 5.0).abs() < 1e-4);
        assert!(tile.percent_phasing_at(2).is_nan());
        assert_eq!(tile.percent_aligned_at(1), 95.5);
        assert_eq!(tile.reads.iter().map(|r| r.read).collect::<Vec<_>>(), vec![1, 2]);

        let empty = set.at(1).unwrap();
        assert_eq!(empty.cluster_count, 0.0);
        assert!(empty.percent_pf().is_nan());
    }

    #[test]
    fn wrong_version() {
        let err = decode_tile_metrics(&[3u8, 10]).unwrap_err();
        assert!(err.to_string().contains("unsupported version 3"), "{}", err);
    }
}
