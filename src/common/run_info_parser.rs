//! Deserializes the `RunInfo.xml` file from a sequencing run into a useful struct
//! of information about the run: read structure, flowcell layout and channels.

use std::{fs::File, io::ErrorKind, path::Path, str::FromStr};

use serde::{de, Deserialize};
use serde_xml_rs::from_reader;

use crate::error::{Result, TableError};


/// The top-level struct for the contents of RunInfo.xml
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    /// Version number of this file (depends on the sequencer)
    pub version: u32,
    /// Full run id string (date, instrument, number, flowcell)
    pub id: String,
    /// Number representing how many runs this instrument has performed
    pub number: u64,
    /// Flowcell serial number
    pub flowcell: String,
    /// Instrument serial number/identifier
    pub instrument: String,
    /// The date and time of the run
    pub date: String,
    /// Format of the run: number of reads, read lengths, and which are indexes
    pub reads: Vec<Read>,
    /// Flowcell information: number of lanes, surfaces, and tiles
    pub flowcell_layout: FlowcellLayout,
    /// Names of the imaging channels, empty for older runs
    pub channels: Vec<String>,
}


/// Deserialize RunInfo, including flattening the inner Run struct
/// into the top level
impl<'de> Deserialize<'de> for RunInfo {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>
    {
        #[derive(Deserialize)]
        struct Outer {
            #[serde(rename = "Version")]
            version: u32,
            #[serde(rename = "Run")]
            run: Inner
        }

        #[derive(Deserialize)]
        struct Inner {
            #[serde(rename = "Id")]
            id: String,
            #[serde(rename = "Number")]
            number: u64,
            #[serde(rename = "Flowcell")]
            flowcell: String,
            #[serde(rename = "Instrument")]
            instrument: String,
            #[serde(rename = "Date")]
            date: String,
            #[serde(rename = "Reads", deserialize_with = "reads_to_vec")]
            reads: Vec<Read>,
            #[serde(rename = "FlowcellLayout")]
            flowcell_layout: FlowcellLayout,
            #[serde(rename = "ImageChannels", default, deserialize_with = "channels_to_vec")]
            channels: Vec<String>,
        }

        #[derive(Deserialize)]
        struct Reads {
            #[serde(rename = "Read")]
            pub read: Vec<Read>,
        }

        #[derive(Deserialize)]
        struct Channels {
            #[serde(rename = "Name", default)]
            pub name: Vec<String>,
        }

        fn reads_to_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<Read>, D::Error>
        where
            D: de::Deserializer<'de>,
        {
            let reads = Reads::deserialize(deserializer)?;

            let reads = reads.read.into_iter().scan(0, |i, r| {
                *i += r.num_cycles;
                Some(Read { start: *i - r.num_cycles, end: *i, .. r })
            }).collect();

            Ok(reads)
        }

        fn channels_to_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
        where
            D: de::Deserializer<'de>,
        {
            let channels = Channels::deserialize(deserializer)?;

            Ok(channels.name.into_iter().map(|c| c.trim().to_lowercase()).collect())
        }

        let helper = Outer::deserialize(deserializer)?;

        Ok(RunInfo {
            version: helper.version,
            id: helper.run.id,
            number: helper.run.number,
            flowcell: helper.run.flowcell,
            instrument: helper.run.instrument,
            date: helper.run.date,
            reads: helper.run.reads,
            flowcell_layout: helper.run.flowcell_layout,
            channels: helper.run.channels,
        })
    }
}


impl RunInfo {
    /// Total number of cycles over all reads
    pub fn total_cycles(&self) -> usize {
        self.reads.iter().map(|r| r.num_cycles).sum()
    }

    /// The read a 1-based cycle belongs to, and the cycle within that read
    pub fn read_for_cycle(&self, cycle: u16) -> Option<(&Read, u16)> {
        let cycle = cycle as usize;
        self.reads
            .iter()
            .find(|r| cycle > r.start && cycle <= r.end)
            .map(|r| (r, (cycle - r.start) as u16))
    }

    pub fn read(&self, number: u16) -> Option<&Read> {
        self.reads.iter().find(|r| r.number == number)
    }

    pub fn tile_naming(&self) -> TileNaming {
        self.flowcell_layout.tile_naming_convention
    }
}


/// Information about one of the reads in a run
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Read {
    /// Which read this is
    #[serde(rename = "Number")]
    pub number: u16,
    /// How many cycles (e.g. bases) in the read
    #[serde(rename = "NumCycles")]
    pub num_cycles: usize,
    /// Whether or not it is an index read
    #[serde(rename = "IsIndexedRead", deserialize_with = "bool_from_string")]
    pub is_indexed_read: bool,
    /// Cycles before this read. Not in the XML file but
    /// calculated during deserialization
    #[serde(default)]
    pub start: usize,
    /// Last cycle of this read (1-based, inclusive).
    /// Calculated during deserialization
    #[serde(default)]
    pub end: usize,
}

impl Read {
    pub fn first_cycle(&self) -> u16 {
        (self.start + 1) as u16
    }

    pub fn last_cycle(&self) -> u16 {
        self.end as u16
    }
}


/// Convert from Y or N character to a boolean
fn bool_from_string<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: de::Deserializer<'de>,
{
    match String::deserialize(deserializer)?.as_ref() {
        "Y" => Ok(true),
        "N" => Ok(false),
        other => Err(de::Error::invalid_value(
            de::Unexpected::Str(other),
            &"Y or N",
        )),
    }
}


/// How tile ids encode their position on the flowcell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileNaming {
    FourDigit,
    FiveDigit,
}

impl FromStr for TileNaming {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FourDigit" => Ok(TileNaming::FourDigit),
            "FiveDigit" => Ok(TileNaming::FiveDigit),
            other => Err(format!("unknown tile naming convention {}", other)),
        }
    }
}

impl TileNaming {
    fn divisor(self) -> u32 {
        match self {
            TileNaming::FourDigit => 1000,
            TileNaming::FiveDigit => 10000,
        }
    }

    pub fn surface(self, tile: u32) -> u32 {
        tile / self.divisor()
    }

    pub fn swath(self, tile: u32) -> u32 {
        (tile / (self.divisor() / 10)) % 10
    }

    /// Camera section, only encoded by five digit tile names
    pub fn section(self, tile: u32) -> Option<u32> {
        match self {
            TileNaming::FourDigit => None,
            TileNaming::FiveDigit => Some((tile / 100) % 10),
        }
    }

    pub fn number(self, tile: u32) -> u32 {
        tile % 100
    }
}


/// Information about the flowcell used in the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowcellLayout {
    /// Number of lanes
    pub lane_count: usize,
    /// Number of surfaces per lane
    pub surface_count: usize,
    /// Swathes per lane
    pub swath_count: u64,
    /// Number of tiles per swath
    pub tile_count: u64,
    /// Format for naming tiles
    pub tile_naming_convention: TileNaming,
    /// A Vec of tile names, e.g. `1_1101`
    pub tiles: Vec<String>,
}


/// Deserialize the FlowcellLayout struct including flattening the interior
/// TileSet struct into the top level
impl<'de> Deserialize<'de> for FlowcellLayout {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>
    {
        #[derive(Deserialize)]
        struct Outer {
            #[serde(rename = "LaneCount")]
            lane_count: usize,
            #[serde(rename = "SurfaceCount")]
            surface_count: usize,
            #[serde(rename = "SwathCount")]
            swath_count: u64,
            #[serde(rename = "TileCount")]
            tile_count: u64,
            #[serde(rename = "TileSet", default)]
            tile_set: Option<Inner>,
        }

        #[derive(Deserialize)]
        struct Inner {
            #[serde(rename = "TileNamingConvention", deserialize_with = "naming_from_string")]
            tile_naming_convention: TileNaming,
            #[serde(rename = "Tiles", deserialize_with = "tiles_to_vec")]
            tiles: Vec<String>,
        }

        #[derive(Deserialize)]
        struct Tiles {
            #[serde(rename = "Tile")]
            tile: Vec<String>,
        }

        fn tiles_to_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
        where
            D: de::Deserializer<'de>,
        {
            let tiles = Tiles::deserialize(deserializer)?;

            Ok(tiles.tile)
        }

        fn naming_from_string<'de, D>(deserializer: D) -> std::result::Result<TileNaming, D::Error>
        where
            D: de::Deserializer<'de>,
        {
            String::deserialize(deserializer)?
                .parse()
                .map_err(de::Error::custom)
        }

        let helper = Outer::deserialize(deserializer)?;
        let (tile_naming_convention, tiles) = match helper.tile_set {
            Some(set) => (set.tile_naming_convention, set.tiles),
            None => (TileNaming::FourDigit, Vec::new()),
        };

        Ok(FlowcellLayout {
            lane_count: helper.lane_count,
            surface_count: helper.surface_count,
            swath_count: helper.swath_count,
            tile_count: helper.tile_count,
            tile_naming_convention,
            tiles,
        })
    }
}


/// Parse a `RunInfo.xml` file into a `RunInfo` struct
pub fn parse_run_info(run_info_path: &Path) -> Result<RunInfo> {
    let run_xml = match File::open(run_info_path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(TableError::RunInfoNotFound(run_info_path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    from_reader(run_xml).map_err(|e| TableError::RunInfoParse(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let filename_info = Path::new("test_data/190414_A00111_0296_AHJCWWDSXX/RunInfo.xml");
        let actual_runinfo = parse_run_info(filename_info).unwrap();
        let expected_runinfo =
            RunInfo {
                version: 6,
                id: "190414_A00111_0296_AHJCWWDSXX".to_owned(),
                number: 296,
                flowcell: "HJCWWDSXX".to_owned(),
                instrument: "A00111".to_owned(),
                date: "4/14/2019 1:17:20 PM".to_owned(),
                reads: vec![
                    Read { number: 1, start: 0, end: 4, num_cycles: 4, is_indexed_read: false },
                    Read { number: 2, start: 4, end: 6, num_cycles: 2, is_indexed_read: true },
                    Read { number: 3, start: 6, end: 8, num_cycles: 2, is_indexed_read: true },
                    Read { number: 4, start: 8, end: 12, num_cycles: 4, is_indexed_read: false },
                ],
                flowcell_layout: FlowcellLayout {
                    lane_count: 1,
                    surface_count: 2,
                    swath_count: 1,
                    tile_count: 2,
                    tile_naming_convention: TileNaming::FourDigit,
                    tiles: vec![
                        "1_1101".to_owned(),
                        "1_1102".to_owned(),
                        "1_2101".to_owned(),
                        "1_2102".to_owned(),
                    ]
                },
                channels: vec!["red".to_owned(), "green".to_owned()],
            };
        assert_eq!(actual_runinfo, expected_runinfo)
    }

    #[test]
    fn cycle_lookup() {
        let run_info = parse_run_info(
            Path::new("test_data/190414_A00111_0296_AHJCWWDSXX/RunInfo.xml")
        ).unwrap();

        assert_eq!(run_info.total_cycles(), 12);

        let (read, within) = run_info.read_for_cycle(1).unwrap();
        assert_eq!((read.number, within), (1, 1));
        let (read, within) = run_info.read_for_cycle(6).unwrap();
        assert_eq!((read.number, within), (2, 2));
        let (read, within) = run_info.read_for_cycle(9).unwrap();
        assert_eq!((read.number, within), (4, 1));
        assert!(run_info.read_for_cycle(13).is_none());
        assert!(run_info.read_for_cycle(0).is_none());
    }

    #[test]
    fn tile_naming() {
        let naming = TileNaming::FourDigit;
        assert_eq!(naming.surface(2115), 2);
        assert_eq!(naming.swath(2115), 1);
        assert_eq!(naming.section(2115), None);
        assert_eq!(naming.number(2115), 15);

        let naming = TileNaming::FiveDigit;
        assert_eq!(naming.surface(12345), 1);
        assert_eq!(naming.swath(12345), 2);
        assert_eq!(naming.section(12345), Some(3));
        assert_eq!(naming.number(12345), 45);
    }

    #[test]
    fn no_file() {
        let filename_info = Path::new("test_data/no_RunInfo.xml");
        let err = parse_run_info(filename_info).unwrap_err();
        assert!(err.to_string().contains(r#"cannot open file test_data/no_RunInfo.xml"#), "{}", err);
    }

    #[test]
    fn weird_file() {
        let filename_info = Path::new("test_data/weird_RunInfo.xml");
        let err = parse_run_info(filename_info).unwrap_err();
        assert!(err.to_string().contains(r#"invalid value: string "Q", expected Y or N"#), "{}", err);
    }

    #[test]
    fn no_reads() {
        let filename_info = Path::new("test_data/bad_RunInfo_no_reads.xml");
        let err = parse_run_info(filename_info).unwrap_err();
        assert!(err.to_string().contains(r#"Error parsing RunInfo: custom: 'missing field `Read`'"#), "{}", err);
    }

    #[test]
    fn no_tile_set() {
        let filename_info = Path::new("test_data/RunInfo_no_tile_set.xml");
        let run_info = parse_run_info(filename_info).unwrap();
        assert_eq!(run_info.tile_naming(), TileNaming::FourDigit);
        assert!(run_info.flowcell_layout.tiles.is_empty());
        assert!(run_info.channels.is_empty());
    }

    #[test]
    fn empty_file() {
        let filename_info = Path::new("test_data/empty_file");
        let err = parse_run_info(filename_info).unwrap_err();
        assert!(err.to_string().contains(r#"Unexpected end of stream: no root element found"#), "{}", err);
    }
}
