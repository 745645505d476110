//! Disc image model produced by the cue sheet parser

use crate::media::MediaType;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Audio,
    Mode1,
    Mode1Raw,
    Mode2Form1,
    Mode2Form2,
    Mode2Formless,
    Mode2Raw,
    Cdg,
    Cdi,
    CdiRaw,
}

impl TrackType {
    pub const ALL: [Self; 10] = [
        Self::Audio,
        Self::Mode1,
        Self::Mode1Raw,
        Self::Mode2Form1,
        Self::Mode2Form2,
        Self::Mode2Formless,
        Self::Mode2Raw,
        Self::Cdg,
        Self::Cdi,
        Self::CdiRaw,
    ];

    /// Bytes each sector of this type occupies in the track file.
    #[must_use]
    pub fn bytes_per_sector(self) -> u32 {
        match self {
            Self::Mode1 | Self::Mode2Form1 => 2048,
            Self::Mode2Form2 => 2324,
            Self::Mode2Formless | Self::Cdi => 2336,
            Self::Audio | Self::Mode1Raw | Self::Mode2Raw | Self::CdiRaw => 2352,
            // Main channel followed by 96 bytes of interleaved subchannel
            Self::Cdg => 2448,
        }
    }

    /// Bytes of user data a cooked read returns per sector, for types where that is fixed.
    #[must_use]
    pub fn cooked_bytes_per_sector(self) -> u32 {
        match self {
            Self::Mode1 | Self::Mode1Raw | Self::Mode2Form1 => 2048,
            Self::Mode2Form2 => 2324,
            Self::Mode2Formless | Self::Cdi => 2336,
            Self::Audio | Self::Mode2Raw | Self::CdiRaw | Self::Cdg => 2352,
        }
    }

    /// Audio and CD+G tracks carry no data track flag in the Q subchannel control field.
    #[must_use]
    pub fn is_audio(self) -> bool {
        matches!(self, Self::Audio | Self::Cdg)
    }

    #[must_use]
    pub fn is_mode2(self) -> bool {
        matches!(self, Self::Mode2Form1 | Self::Mode2Form2 | Self::Mode2Formless | Self::Mode2Raw)
    }

    #[must_use]
    pub fn is_cdi(self) -> bool {
        matches!(self, Self::Cdi | Self::CdiRaw)
    }

    #[must_use]
    pub fn cue_name(self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Mode1 => "MODE1/2048",
            Self::Mode1Raw => "MODE1/2352",
            Self::Mode2Form1 => "MODE2/2048",
            Self::Mode2Form2 => "MODE2/2324",
            Self::Mode2Formless => "MODE2/2336",
            Self::Mode2Raw => "MODE2/2352",
            Self::Cdg => "CDG",
            Self::Cdi => "CDI/2336",
            Self::CdiRaw => "CDI/2352",
        }
    }
}

impl FromStr for TrackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|track_type| track_type.cue_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported CD track type: {s}"))
    }
}

impl Display for TrackType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cue_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Little-endian raw sectors, the only layout that can be read
    Binary,
    Motorola,
    Aiff,
    Wave,
    Mp3,
}

impl FileType {
    /// Parses a FILE directive's type marker; `None` if the marker is not known at all.
    #[must_use]
    pub fn from_cue(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BINARY" => Some(Self::Binary),
            "MOTOROLA" => Some(Self::Motorola),
            "AIFF" => Some(Self::Aiff),
            "WAVE" => Some(Self::Wave),
            "MP3" => Some(Self::Mp3),
            _ => None,
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Binary => "BINARY",
            Self::Motorola => "MOTOROLA",
            Self::Aiff => "AIFF",
            Self::Wave => "WAVE",
            Self::Mp3 => "MP3",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackFlags {
    pub digital_copy_permitted: bool,
    pub pre_emphasis: bool,
    pub four_channel: bool,
    pub scms: bool,
}

impl TrackFlags {
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            digital_copy_permitted: self.digital_copy_permitted || other.digital_copy_permitted,
            pre_emphasis: self.pre_emphasis || other.pre_emphasis,
            four_channel: self.four_channel || other.four_channel,
            scms: self.scms || other.scms,
        }
    }
}

/// Index number -> absolute sector, kept sorted by index number.
///
/// Tracks have at most 100 indexes and nearly always only 0 and 1, so a sorted vec beats a map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackIndexes(Vec<(u8, u32)>);

impl TrackIndexes {
    #[must_use]
    pub fn get(&self, index: u8) -> Option<u32> {
        self.0
            .binary_search_by_key(&index, |&(number, _)| number)
            .ok()
            .map(|i| self.0[i].1)
    }

    #[must_use]
    pub fn contains(&self, index: u8) -> bool {
        self.get(index).is_some()
    }

    /// Inserts or replaces the sector for an index number.
    pub fn insert(&mut self, index: u8, sector: u32) {
        match self.0.binary_search_by_key(&index, |&(number, _)| number) {
            Ok(i) => self.0[i].1 = sector,
            Err(i) => self.0.insert(i, (index, sector)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sector of index 0 if present, otherwise index 1.
    #[must_use]
    pub fn first_sector(&self) -> Option<u32> {
        self.get(0).or_else(|| self.get(1))
    }

    /// `index 1 - index 0`; `None` unless both exist and index 1 does not precede index 0.
    #[must_use]
    pub fn pause_len(&self) -> Option<u32> {
        let index0 = self.get(0)?;
        let index1 = self.get(1)?;
        index1.checked_sub(index0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.0.iter().copied()
    }
}

/// CD-TEXT style free-text fields that can appear at disc or track level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CdText {
    pub title: Option<String>,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub songwriter: Option<String>,
    pub genre: Option<String>,
    pub arranger: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFile {
    pub path: PathBuf,
    pub file_type: FileType,
    /// Byte offset of this track's first sector within the file
    pub offset: u64,
    /// Track this file entry serves
    pub sequence: u32,
    /// Length of the whole file in bytes
    pub file_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub sequence: u32,
    pub track_type: TrackType,
    pub bytes_per_sector: u32,
    /// Sectors stored in the track file for this track, including any INDEX 00 pause
    pub sectors: u64,
    pub pregap: u32,
    pub postgap: u32,
    pub indexes: TrackIndexes,
    pub session: u8,
    pub flags: TrackFlags,
    pub isrc: Option<String>,
    pub cd_text: CdText,
    pub file: TrackFile,
}

impl Track {
    /// Sector of INDEX 00 if present, else INDEX 01, as written in the cue sheet.
    #[must_use]
    pub fn start_sector(&self) -> u64 {
        self.indexes.first_sector().map_or(0, u64::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub sequence: u8,
    pub start_track: u32,
    pub end_track: u32,
    pub start_sector: u64,
    pub end_sector: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start: u64,
    pub end: u64,
}

/// A drive and program that dumped some extents of the disc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHardware {
    pub manufacturer: String,
    pub model: String,
    pub firmware: String,
    pub serial: String,
    pub software_name: String,
    pub software_version: String,
    pub software_os: String,
    /// Sorted by start sector
    pub extents: Vec<Extent>,
}

impl DumpHardware {
    fn same_identity(&self, other: &Self) -> bool {
        self.manufacturer == other.manufacturer
            && self.model == other.model
            && self.firmware == other.firmware
            && self.serial == other.serial
            && self.software_name == other.software_name
            && self.software_version == other.software_version
            && self.software_os == other.software_os
    }
}

/// Adds a dump record, merging its extents into an existing record for the same hardware.
pub(crate) fn merge_dump_hardware(list: &mut Vec<DumpHardware>, record: DumpHardware) {
    match list.iter_mut().find(|existing| existing.same_identity(&record)) {
        Some(existing) => {
            existing.extents.extend(record.extents);
            existing.extents.sort_by_key(|extent| extent.start);
        }
        None => list.push(record),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disc {
    pub sessions: Vec<Session>,
    pub tracks: Vec<Track>,
    pub cd_text: CdText,
    pub barcode: Option<String>,
    pub disc_id: Option<String>,
    pub mcn: Option<String>,
    pub cd_text_file: Option<String>,
    pub comment: String,
    /// Lowercase algorithm name (`crc32`, `md5`, `sha1`) -> lowercase hex digest
    pub hashes: BTreeMap<String, String>,
    /// ISOBuster `REM ORIGINAL MEDIA-TYPE` hint
    pub original_media_type: Option<String>,
    /// DiscImageCreator `REM METADATA DIC MEDIA-TYPE` hint
    pub dic_media_type: Option<String>,
    pub media_type: MediaType,
    pub dump_hardware: Vec<DumpHardware>,
    pub application: Option<String>,
    pub application_version: Option<String>,
    /// Set when per-track hash blocks were present
    pub is_trurip: bool,
}

impl Disc {
    #[must_use]
    pub fn track(&self, sequence: u32) -> Option<&Track> {
        self.tracks.iter().find(|track| track.sequence == sequence)
    }

    #[must_use]
    pub fn total_sectors(&self) -> u64 {
        self.tracks.iter().map(|track| track.sectors).sum()
    }
}
