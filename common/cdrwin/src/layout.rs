//! Where each field of a CD sector lives inside the bytes a track file stores per sector

use crate::disc::TrackType;

/// Named sub-fields of a sector, plus per-track values exposed through the same interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SectorTag {
    CdSectorSync,
    CdSectorHeader,
    CdSectorSubHeader,
    /// ECC P and Q together
    CdSectorEcc,
    CdSectorEccP,
    CdSectorEccQ,
    CdSectorEdc,
    CdSectorSubchannel,
    /// Q subchannel control field, synthesized from the cue sheet FLAGS
    CdTrackFlags,
    CdTrackIsrc,
    CdTrackText,
}

/// One field's position within a stored sector: skip `offset` bytes, take `size` bytes, then
/// skip `skip` bytes to reach the start of the next sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorLayout {
    pub offset: u32,
    pub size: u32,
    pub skip: u32,
}

impl SectorLayout {
    const fn new(offset: u32, size: u32, skip: u32) -> Self {
        Self { offset, size, skip }
    }

    /// Distance in the file between the same field of two consecutive sectors.
    #[must_use]
    pub fn stride(self) -> u32 {
        self.offset + self.size + self.skip
    }

    /// Whether a run of sectors can be read with a single contiguous read.
    #[must_use]
    pub fn is_contiguous(self) -> bool {
        self.offset == 0 && self.skip == 0
    }
}

/// How a track's user data is obtained from its stored sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserDataLayout {
    pub layout: SectorLayout,
    /// Sectors still carry a Mode 2 sub-header (and possibly sync/header) that must be stripped
    /// per sector with [`mode2_user_data`]
    pub mode2_extract: bool,
}

/// Where a tag's bytes come from for a given track type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLocation {
    Stored(SectorLayout),
    /// Mode 2 raw EDC, whose position depends on each sector's form
    Mode2RawEdc,
}

const SYNC_LEN: usize = 12;
const HEADER_LEN: usize = 4;
const SUB_HEADER_LEN: usize = 8;
const MODE2_FORM1_DATA_LEN: usize = 2048;
const MODE2_FORM2_DATA_LEN: usize = 2324;

// Sub-header submode byte bit that marks a Form 2 sector
const SUBMODE_FORM2: u8 = 0x20;

pub const SYNC_PATTERN: [u8; SYNC_LEN] =
    [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

/// Layout used by cooked reads.
#[must_use]
pub fn user_data(track_type: TrackType) -> UserDataLayout {
    let (layout, mode2_extract) = match track_type {
        TrackType::Mode1 | TrackType::Mode2Form1 => (SectorLayout::new(0, 2048, 0), false),
        TrackType::Mode2Form2 => (SectorLayout::new(0, 2324, 0), false),
        TrackType::Mode2Formless | TrackType::Cdi => (SectorLayout::new(0, 2336, 0), true),
        TrackType::Audio => (SectorLayout::new(0, 2352, 0), false),
        // Skip sync + header, drop EDC + zero fill + ECC
        TrackType::Mode1Raw => (SectorLayout::new(16, 2048, 288), false),
        TrackType::Mode2Raw | TrackType::CdiRaw => (SectorLayout::new(0, 2352, 0), true),
        TrackType::Cdg => (SectorLayout::new(0, 2352, 96), false),
    };

    UserDataLayout { layout, mode2_extract }
}

/// Layout used by long reads: everything stored per sector except interleaved subchannel.
#[must_use]
pub fn long(track_type: TrackType) -> SectorLayout {
    match track_type {
        TrackType::Mode1 | TrackType::Mode2Form1 => SectorLayout::new(0, 2048, 0),
        TrackType::Mode2Form2 => SectorLayout::new(0, 2324, 0),
        TrackType::Mode2Formless | TrackType::Cdi => SectorLayout::new(0, 2336, 0),
        TrackType::Audio | TrackType::Mode1Raw | TrackType::Mode2Raw | TrackType::CdiRaw => {
            SectorLayout::new(0, 2352, 0)
        }
        TrackType::Cdg => SectorLayout::new(0, 2352, 96),
    }
}

/// Layout of a stored tag, or `None` if the track type does not store that tag.
///
/// The synthesized tags (`CdTrackFlags`, `CdTrackIsrc`, `CdTrackText`) never have a stored
/// location.
#[must_use]
pub fn tag(track_type: TrackType, tag: SectorTag) -> Option<TagLocation> {
    use SectorTag::*;

    let layout = match (track_type, tag) {
        (TrackType::Mode2Formless | TrackType::Cdi, CdSectorSubHeader) => {
            SectorLayout::new(0, 8, 2328)
        }
        (TrackType::Mode2Formless | TrackType::Cdi, CdSectorEdc) => SectorLayout::new(2332, 4, 0),

        (TrackType::Mode1Raw, CdSectorSync) => SectorLayout::new(0, 12, 2340),
        (TrackType::Mode1Raw, CdSectorHeader) => SectorLayout::new(12, 4, 2336),
        (TrackType::Mode1Raw, CdSectorEdc) => SectorLayout::new(2064, 4, 284),
        (TrackType::Mode1Raw, CdSectorEcc) => SectorLayout::new(2076, 276, 0),
        (TrackType::Mode1Raw, CdSectorEccP) => SectorLayout::new(2076, 172, 104),
        (TrackType::Mode1Raw, CdSectorEccQ) => SectorLayout::new(2248, 104, 0),

        (TrackType::Mode2Raw | TrackType::CdiRaw, CdSectorSync) => SectorLayout::new(0, 12, 2340),
        (TrackType::Mode2Raw | TrackType::CdiRaw, CdSectorHeader) => {
            SectorLayout::new(12, 4, 2336)
        }
        (TrackType::Mode2Raw | TrackType::CdiRaw, CdSectorSubHeader) => {
            SectorLayout::new(16, 8, 2328)
        }
        (TrackType::Mode2Raw | TrackType::CdiRaw, CdSectorEdc) => {
            return Some(TagLocation::Mode2RawEdc);
        }

        (TrackType::Cdg, CdSectorSubchannel) => SectorLayout::new(2352, 96, 0),

        _ => return None,
    };

    Some(TagLocation::Stored(layout))
}

/// Tags that can be read from at least one sector of a track of this type.
#[must_use]
pub fn readable_tags(track_type: TrackType) -> &'static [SectorTag] {
    use SectorTag::*;

    match track_type {
        TrackType::Audio => &[CdTrackIsrc],
        TrackType::Cdg => &[CdTrackIsrc, CdSectorSubchannel],
        TrackType::Mode2Formless | TrackType::Cdi => &[CdSectorSubHeader, CdSectorEdc],
        TrackType::Mode2Raw | TrackType::CdiRaw => {
            &[CdSectorSync, CdSectorHeader, CdSectorSubHeader, CdSectorEdc]
        }
        TrackType::Mode1Raw => &[
            CdSectorSync,
            CdSectorHeader,
            CdSectorEcc,
            CdSectorEccP,
            CdSectorEccQ,
            CdSectorEdc,
        ],
        TrackType::Mode1 | TrackType::Mode2Form1 | TrackType::Mode2Form2 => &[],
    }
}

/// Offset of the sub-header within a Mode 2 sector, or `None` if a 2352-byte sector does not
/// carry a valid sync pattern and Mode 2 header.
fn mode2_sub_header_offset(sector: &[u8]) -> Option<usize> {
    match sector.len() {
        2336 => Some(0),
        2352 => {
            let valid = sector[..SYNC_LEN] == SYNC_PATTERN && sector[SYNC_LEN + 3] == 0x02;
            valid.then_some(SYNC_LEN + HEADER_LEN)
        }
        _ => None,
    }
}

fn mode2_data_len(sector: &[u8], sub_header_offset: usize) -> usize {
    if sector[sub_header_offset + 2] & SUBMODE_FORM2 != 0 {
        MODE2_FORM2_DATA_LEN
    } else {
        MODE2_FORM1_DATA_LEN
    }
}

/// Strips sync, header, and sub-header from a 2336- or 2352-byte Mode 2 sector, returning the
/// 2048 (Form 1) or 2324 (Form 2) bytes of user data.
///
/// Sectors that are not recognizably Mode 2 are returned unchanged.
#[must_use]
pub fn mode2_user_data(sector: &[u8]) -> &[u8] {
    let Some(sub_header_offset) = mode2_sub_header_offset(sector) else { return sector };

    let data_start = sub_header_offset + SUB_HEADER_LEN;
    let data_len = mode2_data_len(sector, sub_header_offset);
    &sector[data_start..data_start + data_len]
}

/// EDC bytes of a raw 2352-byte Mode 2 sector: after the user data of Form 1 or Form 2.
#[must_use]
pub fn mode2_raw_edc(sector: &[u8]) -> &[u8] {
    let sub_header_offset = SYNC_LEN + HEADER_LEN;
    let data_len = mode2_data_len(sector, sub_header_offset);
    let edc_start = sub_header_offset + SUB_HEADER_LEN + data_len;
    &sector[edc_start..edc_start + 4]
}
