//! Metric groups and the fixed-size mask that selects which InterOp files
//! are decoded for a run.

use std::{fmt, path::Path, str::FromStr};

use crate::error::{Result, TableError};

/// Number of known metric groups
pub const GROUP_COUNT: usize = 13;

/// Every category of binary InterOp metrics, ordered by identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricGroup {
    CorrectedInt = 0,
    Error,
    Extraction,
    Image,
    Index,
    Q,
    Tile,
    QByLane,
    QCollapsed,
    EmpiricalPhasing,
    DynamicPhasing,
    ExtendedTile,
    SummaryRun,
}

impl MetricGroup {
    pub const ALL: [MetricGroup; GROUP_COUNT] = [
        MetricGroup::CorrectedInt,
        MetricGroup::Error,
        MetricGroup::Extraction,
        MetricGroup::Image,
        MetricGroup::Index,
        MetricGroup::Q,
        MetricGroup::Tile,
        MetricGroup::QByLane,
        MetricGroup::QCollapsed,
        MetricGroup::EmpiricalPhasing,
        MetricGroup::DynamicPhasing,
        MetricGroup::ExtendedTile,
        MetricGroup::SummaryRun,
    ];

    pub fn id(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            MetricGroup::CorrectedInt => "CorrectedInt",
            MetricGroup::Error => "Error",
            MetricGroup::Extraction => "Extraction",
            MetricGroup::Image => "Image",
            MetricGroup::Index => "Index",
            MetricGroup::Q => "Q",
            MetricGroup::Tile => "Tile",
            MetricGroup::QByLane => "QByLane",
            MetricGroup::QCollapsed => "QCollapsed",
            MetricGroup::EmpiricalPhasing => "EmpiricalPhasing",
            MetricGroup::DynamicPhasing => "DynamicPhasing",
            MetricGroup::ExtendedTile => "ExtendedTile",
            MetricGroup::SummaryRun => "SummaryRun",
        }
    }

    /// Groups that store one record per (lane, tile, cycle)
    pub fn is_per_cycle(self) -> bool {
        matches!(
            self,
            MetricGroup::CorrectedInt
                | MetricGroup::Error
                | MetricGroup::Extraction
                | MetricGroup::Image
                | MetricGroup::Q
        )
    }

    /// Name of the binary file, e.g. `ErrorMetricsOut.bin`
    pub fn file_name(self) -> String {
        format!("{}MetricsOut.bin", self.name())
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricGroup {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        MetricGroup::ALL
            .iter()
            .find(|g| g.name() == s)
            .copied()
            .ok_or_else(|| TableError::UnknownGroup(s.to_owned()))
    }
}

/// One flag per metric group. The default mask loads nothing; "load every
/// group" is expressed as an absent mask (`Option::None`) by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadMask([bool; GROUP_COUNT]);

impl LoadMask {
    pub fn new() -> LoadMask {
        LoadMask::default()
    }

    /// A mask with every group enabled
    pub fn all() -> LoadMask {
        LoadMask([true; GROUP_COUNT])
    }

    /// Converts a raw flag buffer, e.g. one read from a config file
    pub fn from_flags(flags: &[u8]) -> Result<LoadMask> {
        if flags.len() != GROUP_COUNT {
            return Err(TableError::TypeMismatch(format!(
                "expected a mask of {} flags, found {}",
                GROUP_COUNT,
                flags.len()
            )));
        }
        let mut mask = LoadMask::new();
        for (bit, &flag) in mask.0.iter_mut().zip(flags) {
            *bit = flag > 0;
        }
        Ok(mask)
    }

    pub fn from_groups(groups: &[MetricGroup]) -> LoadMask {
        let mut mask = LoadMask::new();
        for &group in groups {
            mask.set(group);
        }
        mask
    }

    pub fn set(&mut self, group: MetricGroup) {
        self.0[group.id()] = true;
    }

    pub fn contains(&self, group: MetricGroup) -> bool {
        self.0[group.id()]
    }

    /// Enables each named group, keeping bits that are already set
    pub fn enable<S: AsRef<str>>(&mut self, names: &[S]) -> Result<&mut LoadMask> {
        for name in names {
            let group: MetricGroup = name.as_ref().parse()?;
            self.set(group);
        }
        Ok(self)
    }

    pub fn groups(&self) -> impl Iterator<Item = MetricGroup> + '_ {
        MetricGroup::ALL.iter().copied().filter(move |&g| self.contains(g))
    }

    /// True when every group enabled here is also enabled in `other`
    pub fn is_subset(&self, other: &LoadMask) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(&a, &b)| !a || b)
    }
}

/// Anything that can be turned into an optional load mask
pub trait IntoLoadMask {
    fn into_load_mask(self) -> Result<Option<LoadMask>>;
}

impl IntoLoadMask for LoadMask {
    fn into_load_mask(self) -> Result<Option<LoadMask>> {
        Ok(Some(self))
    }
}

impl IntoLoadMask for Option<LoadMask> {
    fn into_load_mask(self) -> Result<Option<LoadMask>> {
        Ok(self)
    }
}

impl<S: AsRef<str>> IntoLoadMask for &[S] {
    fn into_load_mask(self) -> Result<Option<LoadMask>> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut mask = LoadMask::new();
        mask.enable(self)?;
        Ok(Some(mask))
    }
}

impl<S: AsRef<str>> IntoLoadMask for &Vec<S> {
    fn into_load_mask(self) -> Result<Option<LoadMask>> {
        self.as_slice().into_load_mask()
    }
}

/// Builds a mask from group names. No names means no restriction, which is
/// returned as `None`. A mask passed in is returned unchanged.
pub fn create_mask<M: IntoLoadMask>(names: M) -> Result<Option<LoadMask>> {
    names.into_load_mask()
}

/// Names of the enabled groups in ascending identifier order
pub fn mask_to_names(mask: &LoadMask) -> Vec<&'static str> {
    mask.groups().map(MetricGroup::name).collect()
}

/// Work out the metric group from an InterOp file path,
/// e.g. `InterOp/ExtractionMetricsOut.bin` is `Extraction`
pub fn group_from_filename(path: &Path) -> Result<MetricGroup> {
    let file_name = path.display().to_string();

    if path.extension().and_then(|e| e.to_str()) != Some("bin") {
        return Err(TableError::InvalidExtension(file_name));
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| TableError::UnrecognizedMetricFile(file_name.clone()))?;
    let stem = stem.strip_suffix("Out").unwrap_or(stem);
    let group = match stem.strip_suffix("Metrics") {
        Some(name) => name,
        None => return Err(TableError::UnrecognizedMetricFile(file_name)),
    };

    group.parse()
        .map_err(|_| TableError::UnrecognizedMetricFile(file_name))
}

/// Groups loaded for the summary tables
pub fn summary_metrics_to_load() -> LoadMask {
    LoadMask::from_groups(&[
        MetricGroup::CorrectedInt,
        MetricGroup::Error,
        MetricGroup::Extraction,
        MetricGroup::Q,
        MetricGroup::Tile,
        MetricGroup::QByLane,
        MetricGroup::QCollapsed,
        MetricGroup::EmpiricalPhasing,
        MetricGroup::ExtendedTile,
    ])
}

/// Groups that feed columns of the imaging table
pub fn imaging_metrics_to_load() -> LoadMask {
    LoadMask::from_groups(&[
        MetricGroup::CorrectedInt,
        MetricGroup::Error,
        MetricGroup::Extraction,
        MetricGroup::Image,
        MetricGroup::Q,
        MetricGroup::Tile,
    ])
}

/// Groups needed by the index tables
pub fn index_metrics_to_load() -> LoadMask {
    LoadMask::from_groups(&[MetricGroup::Index, MetricGroup::Tile])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_is_no_restriction() {
        let names: Vec<&str> = vec![];
        assert_eq!(create_mask(&names).unwrap(), None);
    }

    #[test]
    fn existing_mask_passes_through() {
        let mask = LoadMask::from_groups(&[MetricGroup::Q, MetricGroup::Error]);
        assert_eq!(create_mask(mask).unwrap(), Some(mask));
        assert_eq!(create_mask(None).unwrap(), None);
    }

    #[test]
    fn create_from_names() {
        let mask = create_mask(&vec!["Extraction"]).unwrap().unwrap();
        assert_eq!(mask_to_names(&mask), vec!["Extraction"]);
    }

    #[test]
    fn unknown_group() {
        let err = create_mask(&vec!["Error", "Bogus"]).unwrap_err();
        assert!(err.to_string().contains("Unknown metric group: Bogus"), "{}", err);
    }

    #[test]
    fn enable_merges() {
        let mut mask = create_mask(&vec!["Extraction"]).unwrap().unwrap();
        mask.enable(&["Error", "Q"]).unwrap();
        assert_eq!(mask_to_names(&mask), vec!["Error", "Extraction", "Q"]);

        let empty: [&str; 0] = [];
        mask.enable(&empty).unwrap();
        assert_eq!(mask_to_names(&mask), vec!["Error", "Extraction", "Q"]);
    }

    #[test]
    fn all_names_in_id_order() {
        assert_eq!(
            mask_to_names(&LoadMask::all()),
            vec![
                "CorrectedInt", "Error", "Extraction", "Image", "Index", "Q", "Tile",
                "QByLane", "QCollapsed", "EmpiricalPhasing", "DynamicPhasing",
                "ExtendedTile", "SummaryRun",
            ]
        );
        assert!(mask_to_names(&LoadMask::new()).is_empty());
    }

    #[test]
    fn subset_names_are_subset() {
        let small = LoadMask::from_groups(&[MetricGroup::Tile]);
        let large = LoadMask::from_groups(&[MetricGroup::Tile, MetricGroup::Error]);
        assert!(small.is_subset(&large));

        let small_names = mask_to_names(&small);
        let large_names = mask_to_names(&large);
        assert!(small_names.iter().all(|n| large_names.contains(n)));
    }

    #[test]
    fn from_flags() {
        let mut flags = vec![0u8; GROUP_COUNT];
        flags[MetricGroup::Index.id()] = 1;
        let mask = LoadMask::from_flags(&flags).unwrap();
        assert_eq!(mask_to_names(&mask), vec!["Index"]);
    }

    #[test]
    fn from_flags_wrong_length() {
        let err = LoadMask::from_flags(&[1, 0, 1]).unwrap_err();
        assert!(err.to_string().contains("Type mismatch: expected a mask of 13 flags, found 3"), "{}", err);
    }

    #[test]
    fn summary_preset() {
        assert_eq!(
            mask_to_names(&summary_metrics_to_load()),
            vec![
                "CorrectedInt", "Error", "Extraction", "Q", "Tile", "QByLane",
                "QCollapsed", "EmpiricalPhasing", "ExtendedTile",
            ]
        );
    }

    #[test]
    fn group_from_path() {
        let path = Path::new("some/path/run/InterOp/ExtractionMetricsOut.bin");
        assert_eq!(group_from_filename(path).unwrap(), MetricGroup::Extraction);
        assert_eq!(group_from_filename(path).unwrap().id(), 2);

        let path = Path::new("InterOp/TileMetrics.bin");
        assert_eq!(group_from_filename(path).unwrap(), MetricGroup::Tile);
    }

    #[test]
    fn group_from_bad_extension() {
        let err = group_from_filename(Path::new("InterOp/ErrorMetricsOut.txt")).unwrap_err();
        assert!(err.to_string().contains("InterOp file must have `bin` extension"), "{}", err);
    }

    #[test]
    fn group_from_unknown_file() {
        let err = group_from_filename(Path::new("InterOp/FooMetricsOut.bin")).unwrap_err();
        assert!(err.to_string().contains("Unrecognized metric file: InterOp/FooMetricsOut.bin"), "{}", err);
    }

    #[test]
    fn group_needs_metrics_suffix() {
        for name in &["InterOp/Error.bin", "InterOp/ErrorOut.bin"] {
            assert!(group_from_filename(Path::new(name)).is_err(), "{}", name);
        }
        let err = group_from_filename(Path::new("InterOp/ErrorOut.bin")).unwrap_err();
        assert!(matches!(err, TableError::UnrecognizedMetricFile(_)));
        assert_eq!(group_from_filename(Path::new("InterOp/ErrorMetrics.bin")).unwrap(), MetricGroup::Error);
    }
}
