//! Static column tables for the summary types and the resolver that turns
//! them into named table columns.
//!
//! Each summary type lists its accessors next to its definition by
//! implementing `SummaryColumns`. Adding an accessor to that list adds a
//! column to every table built from the type.

use std::collections::BTreeMap;

use crate::corrected_int_decoder::BASES;
use crate::run_info_parser::RunInfo;

/// Accessors that describe where a summary sits rather than what it measures
pub const DENYLIST: [&str; 14] = [
    "lane",
    "surface",
    "size",
    "at",
    "resize",
    "resize_stat",
    "cycle_state",
    "clear",
    "reserve",
    "sort",
    "push_back",
    "set",
    "add",
    "update_fraction_mapped",
];

/// Mean, standard deviation and median of a value over tiles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStat {
    pub mean: f32,
    pub stddev: f32,
    pub median: f32,
}

impl Default for MetricStat {
    fn default() -> Self {
        MetricStat { mean: f32::NAN, stddev: f32::NAN, median: f32::NAN }
    }
}

impl MetricStat {
    /// Statistics over the finite values, NaN when there are none
    pub fn from_values(values: &[f32]) -> MetricStat {
        let mut finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return MetricStat::default();
        }
        finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = finite.len() as f64;
        let mean = finite.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = if finite.len() > 1 {
            finite.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        let mid = finite.len() / 2;
        let median = if finite.len() % 2 == 0 {
            (finite[mid - 1] + finite[mid]) / 2.0
        } else {
            finite[mid]
        };

        MetricStat { mean: mean as f32, stddev: variance.sqrt() as f32, median }
    }
}

/// The value an accessor returns
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Scalar(f32),
    /// Reduced to its mean in tables
    Stat(MetricStat),
    /// One value per base or per channel
    Array(Vec<f32>),
    Text(String),
}

impl ColumnValue {
    /// Numeric values, distribution values reduced to their mean
    pub fn to_floats(&self) -> Vec<f32> {
        match self {
            ColumnValue::Scalar(v) => vec![*v],
            ColumnValue::Stat(s) => vec![s.mean],
            ColumnValue::Array(values) => values.clone(),
            ColumnValue::Text(_) => vec![],
        }
    }

    pub fn any_finite(&self) -> bool {
        match self {
            ColumnValue::Text(_) => true,
            other => other.to_floats().iter().any(|v| v.is_finite()),
        }
    }
}

/// How an accessor expands into several physical columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcolumns {
    None,
    /// A, C, G and T
    Bases,
    /// One column per imaging channel of the run
    Channels,
}

impl Subcolumns {
    pub fn labels(self, run_info: &RunInfo) -> Vec<String> {
        match self {
            Subcolumns::None => Vec::new(),
            Subcolumns::Bases => BASES.iter().map(|&b| b.to_owned()).collect(),
            Subcolumns::Channels => run_info.channels.clone(),
        }
    }
}

pub struct Accessor<T> {
    pub name: &'static str,
    pub get: fn(&T) -> ColumnValue,
    pub subcolumns: Subcolumns,
    /// Stored as text rather than numbers
    pub is_text: bool,
}

impl<T> Accessor<T> {
    pub const fn value(name: &'static str, get: fn(&T) -> ColumnValue) -> Self {
        Accessor { name, get, subcolumns: Subcolumns::None, is_text: false }
    }

    pub const fn text(name: &'static str, get: fn(&T) -> ColumnValue) -> Self {
        Accessor { name, get, subcolumns: Subcolumns::None, is_text: true }
    }

    pub const fn expanded(name: &'static str, get: fn(&T) -> ColumnValue, subcolumns: Subcolumns) -> Self {
        Accessor { name, get, subcolumns, is_text: false }
    }
}

/// Implemented by every summary type that can be flattened into a table
pub trait SummaryColumns: Sized + 'static {
    const ACCESSORS: &'static [Accessor<Self>];
}

/// One resolved column of a summary type
pub struct SchemaEntry<T: 'static> {
    pub name: String,
    pub accessor: &'static Accessor<T>,
}

/// Turn an accessor name into a column name, e.g. `percent_gt_q30` is `% >= Q30`
pub fn to_column_name(accessor: &str) -> String {
    accessor
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            let word = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            };
            word.replace("Percent", "%").replace("Gt", ">=")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Columns of a summary type, ordered by accessor name
pub fn resolve<T: SummaryColumns>() -> Vec<SchemaEntry<T>> {
    let mut accessors: Vec<&'static Accessor<T>> = T::ACCESSORS
        .iter()
        .filter(|a| !DENYLIST.contains(&a.name))
        .collect();
    accessors.sort_by_key(|a| a.name);

    accessors
        .into_iter()
        .map(|accessor| SchemaEntry { name: to_column_name(accessor.name), accessor })
        .collect()
}

/// Column name to accessor lookup for a summary type
pub fn column_map<T: SummaryColumns>() -> BTreeMap<String, &'static Accessor<T>> {
    resolve::<T>().into_iter().map(|e| (e.name, e.accessor)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Example {
        lane: u16,
        percent_gt_q30: f32,
        fwhm: Vec<f32>,
    }

    impl SummaryColumns for Example {
        const ACCESSORS: &'static [Accessor<Self>] = &[
            Accessor::value("lane", |s| ColumnValue::Scalar(s.lane as f32)),
            Accessor::value("percent_gt_q30", |s| ColumnValue::Scalar(s.percent_gt_q30)),
            Accessor::expanded("fwhm", |s| ColumnValue::Array(s.fwhm.clone()), Subcolumns::Channels),
            Accessor::value("error_rate", |_| ColumnValue::Stat(MetricStat::default())),
        ];
    }

    #[test]
    fn column_names() {
        assert_eq!(to_column_name("percent_gt_q30"), "% >= Q30");
        assert_eq!(to_column_name("cluster_count_pf"), "Cluster Count Pf");
        assert_eq!(to_column_name("error_rate_35"), "Error Rate 35");
        assert_eq!(to_column_name("projected_yield_g"), "Projected Yield G");
        assert_eq!(to_column_name("mapped_reads_cv"), "Mapped Reads Cv");
        assert_eq!(to_column_name("index1"), "Index1");
    }

    #[test]
    fn resolve_skips_denylist_and_sorts() {
        let names: Vec<String> = resolve::<Example>().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Error Rate", "Fwhm", "% >= Q30"]);

        let map = column_map::<Example>();
        assert_eq!(map["Fwhm"].subcolumns, Subcolumns::Channels);
        assert!(!map.contains_key("Lane"));

        let example = Example { lane: 1, percent_gt_q30: 95.0, fwhm: vec![2.5, 2.7] };
        assert_eq!((map["% >= Q30"].get)(&example), ColumnValue::Scalar(95.0));
        assert_eq!((map["Fwhm"].get)(&example).to_floats(), vec![2.5, 2.7]);
    }

    #[test]
    fn stat_reduces_to_mean() {
        let stat = MetricStat::from_values(&[1.0, 2.0, 3.0, f32::NAN, 10.0]);
        assert_eq!(stat.mean, 4.0);
        assert_eq!(stat.median, 2.5);
        assert!((stat.stddev - 4.082483).abs() < 1e-4);
        assert_eq!(ColumnValue::Stat(stat).to_floats(), vec![4.0]);

        let empty = ColumnValue::Stat(MetricStat::from_values(&[]));
        assert!(!empty.any_finite());
    }
}
