//! A sorted collection of decoded records for one metric group, plus the
//! header handling shared by every InterOp decoder.

use std::slice::{ChunksExact, Iter};

use crate::error::{Result, TableError};
use crate::metric_group::MetricGroup;

/// Key shared by all records: lane, tile and either the cycle or the read
pub type MetricKey = (u16, u32, u16);

/// A decoded InterOp record
pub trait Metric {
    fn lane(&self) -> u16;
    fn tile(&self) -> u32;
    /// Cycle for per-cycle groups, read for per-read groups, 0 for tile groups
    fn cycle_or_read(&self) -> u16 {
        0
    }

    fn key(&self) -> MetricKey {
        (self.lane(), self.tile(), self.cycle_or_read())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSet<T> {
    /// File format version the records were decoded from
    pub version: u8,
    metrics: Vec<T>,
}

impl<T> Default for MetricSet<T> {
    fn default() -> Self {
        MetricSet { version: 0, metrics: Vec::new() }
    }
}

impl<T: Metric> MetricSet<T> {
    pub fn new() -> Self {
        MetricSet::default()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn at(&self, i: usize) -> Option<&T> {
        self.metrics.get(i)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.metrics.iter()
    }

    pub fn insert(&mut self, metric: T) {
        self.metrics.push(metric);
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, metrics: I) {
        self.metrics.extend(metrics);
    }

    /// Take the records of a freshly decoded set
    pub fn merge(&mut self, other: MetricSet<T>) {
        self.version = other.version;
        self.metrics.extend(other.metrics);
    }

    pub fn sort(&mut self) {
        self.metrics.sort_by_key(|m| m.key());
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.metrics.iter_mut()
    }

    pub fn clear(&mut self) {
        self.metrics.clear();
    }
}

impl<'a, T> IntoIterator for &'a MetricSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.iter()
    }
}

pub(crate) fn bad_format(group: MetricGroup, reason: String) -> TableError {
    TableError::BadFormat { file: group.file_name(), reason }
}

/// Split a fixed record size file into its extra header bytes and records
///
/// Layout shared by these files:
///  1. `u8` version
///  2. `u8` record size in bytes
///  3. `extra_header` bytes specific to the format
///  4. records of `record size` bytes until the end of the file
pub(crate) fn fixed_size_records<'a>(
    bytes: &'a [u8],
    group: MetricGroup,
    versions: &[u8],
    extra_header: usize,
) -> Result<(u8, &'a [u8], ChunksExact<'a, u8>)> {
    if bytes.len() < 2 + extra_header {
        return Err(bad_format(group, format!("file too short: {} bytes", bytes.len())));
    }

    let version = bytes[0];
    if !versions.contains(&version) {
        return Err(bad_format(group, format!("unsupported version {}", version)));
    }

    let record_size = bytes[1] as usize;
    if record_size == 0 {
        return Err(bad_format(group, "record size is 0".to_owned()));
    }

    let header = &bytes[2..2 + extra_header];
    let body = &bytes[2 + extra_header..];
    if body.len() % record_size != 0 {
        return Err(bad_format(
            group,
            format!("{} bytes is not a multiple of record size {}", body.len(), record_size),
        ));
    }

    Ok((version, header, body.chunks_exact(record_size)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy(u16, u32, u16);

    impl Metric for Dummy {
        fn lane(&self) -> u16 {
            self.0
        }

        fn tile(&self) -> u32 {
            self.1
        }

        fn cycle_or_read(&self) -> u16 {
            self.2
        }
    }

    #[test]
    fn sorts_by_key() {
        let mut set = MetricSet::new();
        set.insert(Dummy(2, 1101, 1));
        set.insert(Dummy(1, 1102, 1));
        set.insert(Dummy(1, 1101, 2));
        set.insert(Dummy(1, 1101, 1));
        set.sort();

        let keys: Vec<_> = set.iter().map(|m| m.key()).collect();
        assert_eq!(keys, vec![(1, 1101, 1), (1, 1101, 2), (1, 1102, 1), (2, 1101, 1)]);
        assert_eq!(set.at(0).unwrap().key(), (1, 1101, 1));
        assert!(set.at(4).is_none());
    }

    #[test]
    fn records() {
        let bytes = [3u8, 4, 1, 2, 3, 4, 5, 6, 7, 8];
        let (version, header, records) = fixed_size_records(&bytes, MetricGroup::Error, &[3], 0).unwrap();
        assert_eq!(version, 3);
        assert!(header.is_empty());
        assert_eq!(records.count(), 2);
    }

    #[test]
    fn wrong_version() {
        let err = fixed_size_records(&[2u8, 4], MetricGroup::Error, &[3], 0).unwrap_err();
        assert!(err.to_string().contains("Bad format in ErrorMetricsOut.bin: unsupported version 2"), "{}", err);
    }

    #[test]
    fn truncated() {
        let err = fixed_size_records(&[3u8, 4, 1, 2, 3, 4, 5], MetricGroup::Error, &[3], 0).unwrap_err();
        assert!(err.to_string().contains("5 bytes is not a multiple of record size 4"), "{}", err);
    }

    #[test]
    fn empty() {
        let err = fixed_size_records(&[], MetricGroup::Error, &[3], 0).unwrap_err();
        assert!(err.to_string().contains("file too short: 0 bytes"), "{}", err);
    }
}
