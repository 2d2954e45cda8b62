//! Read `IndexMetricsOut.bin` into per-tile demultiplexing counts.

use std::{
    collections::BTreeMap,
    fs,
    io::{self, Cursor, Read},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::metric_group::MetricGroup;
use crate::metric_set::{bad_format, Metric, MetricSet};

/// Cluster count for one sample barcode
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    /// Index sequence, `index1-index2` for dual indexing
    pub index_seq: String,
    pub sample_id: String,
    pub sample_proj: String,
    pub cluster_count: u64,
}

impl IndexInfo {
    pub fn new(index_seq: &str, sample_id: &str, sample_proj: &str, cluster_count: u64) -> Self {
        IndexInfo {
            index_seq: index_seq.to_owned(),
            sample_id: sample_id.to_owned(),
            sample_proj: sample_proj.to_owned(),
            cluster_count,
        }
    }

    /// Split a dual index into its two halves
    pub fn index1_index2(&self) -> (&str, &str) {
        match self.index_seq.find('-') {
            Some(i) => (&self.index_seq[..i], &self.index_seq[i + 1..]),
            None => (&self.index_seq, ""),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetric {
    pub lane: u16,
    pub tile: u32,
    pub read: u16,
    pub indices: Vec<IndexInfo>,
    /// Copied from the tile metrics when the run is finalized
    pub cluster_count: f32,
    pub cluster_count_pf: f32,
}

impl Metric for IndexMetric {
    fn lane(&self) -> u16 {
        self.lane
    }

    fn tile(&self) -> u32 {
        self.tile
    }

    fn cycle_or_read(&self) -> u16 {
        self.read
    }
}

impl IndexMetric {
    pub fn new(lane: u16, tile: u32, read: u16, indices: Vec<IndexInfo>) -> Self {
        IndexMetric { lane, tile, read, indices, cluster_count: 0.0, cluster_count_pf: 0.0 }
    }

    pub fn total_clusters(&self) -> u64 {
        self.indices.iter().map(|i| i.cluster_count).sum()
    }

    /// Percent of PF clusters assigned to any sample
    pub fn percent_demultiplexed(&self) -> f32 {
        (self.total_clusters() as f64 / self.cluster_count_pf as f64 * 100.0) as f32
    }
}

fn read_string(rdr: &mut Cursor<&[u8]>) -> io::Result<String> {
    let len = rdr.read_u16::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    rdr.read_exact(&mut buf)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_record(rdr: &mut Cursor<&[u8]>) -> io::Result<(u16, u32, u16, IndexInfo)> {
    let lane = rdr.read_u16::<LittleEndian>()?;
    let tile = rdr.read_u16::<LittleEndian>()? as u32;
    let read = rdr.read_u16::<LittleEndian>()?;
    let index_seq = read_string(rdr)?;
    let cluster_count = rdr.read_u32::<LittleEndian>()? as u64;
    let sample_id = read_string(rdr)?;
    let sample_proj = read_string(rdr)?;

    Ok((lane, tile, read, IndexInfo { index_seq, sample_id, sample_proj, cluster_count }))
}

/// Decode an `IndexMetricsOut.bin` file
pub fn index_decoder(path: &Path) -> Result<MetricSet<IndexMetric>> {
    decode_index_metrics(&fs::read(path)?)
}

/// Decode index metrics from a buffer
///
/// Format of version 1:
///  1. `u8` version
///  2. per record: `u16` lane, `u16` tile, `u16` read, `u16` length and
///     bytes of the index sequence, `u32` cluster count, then `u16` length
///     and bytes of the sample id and of the project name
///
/// Records for the same lane, tile and read are merged into one metric.
pub fn decode_index_metrics(bytes: &[u8]) -> Result<MetricSet<IndexMetric>> {
    let version = match bytes.first() {
        Some(&v) => v,
        None => return Err(bad_format(MetricGroup::Index, "file too short: 0 bytes".to_owned())),
    };
    if version != 1 {
        return Err(bad_format(MetricGroup::Index, format!("unsupported version {}", version)));
    }

    let mut merged: BTreeMap<(u16, u32, u16), Vec<IndexInfo>> = BTreeMap::new();
    let mut rdr = Cursor::new(&bytes[1..]);
    while (rdr.position() as usize) < bytes.len() - 1 {
        let (lane, tile, read, info) = read_record(&mut rdr).map_err(|e| {
            bad_format(MetricGroup::Index, format!("truncated record: {}", e))
        })?;
        let infos = merged.entry((lane, tile, read)).or_insert_with(Vec::new);
        match infos.iter_mut().find(|i| i.index_seq == info.index_seq) {
            Some(existing) => existing.cluster_count += info.cluster_count,
            None => infos.push(info),
        }
    }

    let mut set = MetricSet::new();
    set.version = version;
    set.extend(
        merged
            .into_iter()
            .map(|((lane, tile, read), indices)| IndexMetric::new(lane, tile, read, indices)),
    );

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn write_string(buf: &mut Vec<u8>, s: &str) {
        buf.write_u16::<LittleEndian>(s.len() as u16).unwrap();
        buf.extend_from_slice(s.as_bytes());
    }

    fn record(buf: &mut Vec<u8>, tile: u16, read: u16, index: &str, count: u32, sample: &str) {
        buf.write_u16::<LittleEndian>(1).unwrap();
        buf.write_u16::<LittleEndian>(tile).unwrap();
        buf.write_u16::<LittleEndian>(read).unwrap();
        write_string(buf, index);
        buf.write_u32::<LittleEndian>(count).unwrap();
        write_string(buf, sample);
        write_string(buf, "TSCAIndexes");
    }

    #[test]
    fn decode_and_merge() {
        let mut buf = vec![1u8];
        record(&mut buf, 1101, 2, "ATCACGAC-AAGGTTCA", 4000, "1");
        record(&mut buf, 1101, 2, "ATCACGAC-GGGGGGGG", 2343, "2");
        record(&mut buf, 1101, 2, "ATCACGAC-AAGGTTCA", 570, "1");
        record(&mut buf, 1102, 2, "ATCACGAC-AAGGTTCA", 10, "1");

        let set = decode_index_metrics(&buf).unwrap();
        assert_eq!(set.len(), 2);

        let metric = set.at(0).unwrap();
        assert_eq!(metric.indices.len(), 2);
        assert_eq!(metric.indices[0].cluster_count, 4570);
        assert_eq!(metric.indices[0].sample_proj, "TSCAIndexes");
        assert_eq!(metric.total_clusters(), 6913);
        assert_eq!(metric.indices[1].index1_index2(), ("ATCACGAC", "GGGGGGGG"));
    }

    #[test]
    fn percent_demultiplexed() {
        let mut metric = IndexMetric::new(1, 1101, 2, vec![
            IndexInfo::new("ATCACGAC-AAGGTTCA", "1", "TSCAIndexes", 4570),
            IndexInfo::new("ATCACGAC-GGGGGGGG", "2", "TSCAIndexes", 2343),
        ]);
        metric.cluster_count_pf = 900.0;
        assert!((metric.percent_demultiplexed() - 768.11115).abs() < 1e-3);
    }

    #[test]
    fn truncated() {
        let mut buf = vec![1u8];
        record(&mut buf, 1101, 2, "ATCACGAC", 4000, "1");
        buf.truncate(buf.len() - 3);
        let err = decode_index_metrics(&buf).unwrap_err();
        assert!(err.to_string().contains("truncated record"), "{}", err);
    }

    #[test]
    fn wrong_version() {
        let err = decode_index_metrics(&[2u8]).unwrap_err();
        assert!(err.to_string().contains("unsupported version 2"), "{}", err);
    }
}
