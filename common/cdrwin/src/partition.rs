//! Per-track sector and byte extents, and the sector -> track offset map

use crate::disc::{Track, TrackType};
use crate::{CdrWinError, CdrWinResult};
use std::collections::BTreeMap;

/// Sector and byte extent of one track within the concatenated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub sequence: u32,
    /// First absolute sector
    pub start: u64,
    /// Length in sectors
    pub length: u64,
    /// Length in bytes
    pub size: u64,
    /// Byte offset within the concatenated image
    pub offset: u64,
    pub track_type: TrackType,
    pub name: Option<String>,
    pub description: String,
}

impl Partition {
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    #[must_use]
    pub fn contains(&self, sector: u64) -> bool {
        (self.start..self.end()).contains(&sector)
    }
}

/// Track sequence -> first absolute sector of that track.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OffsetMap(BTreeMap<u32, u64>);

impl OffsetMap {
    #[must_use]
    pub fn start_of(&self, sequence: u32) -> Option<u64> {
        self.0.get(&sequence).copied()
    }

    fn record(&mut self, sequence: u32, start: u64) {
        self.0
            .entry(sequence)
            .and_modify(|existing| *existing = (*existing).min(start))
            .or_insert(start);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.0.iter().map(|(&sequence, &start)| (sequence, start))
    }
}

/// Lays the committed tracks end to end.
///
/// # Errors
///
/// Fails with [`CdrWinError::UnorderedTracks`] if the first track is not track 1, and with
/// [`CdrWinError::MissingIndex1`] if any track lacks INDEX 01.
pub fn build(tracks: &[Track]) -> CdrWinResult<(Vec<Partition>, OffsetMap)> {
    let mut partitions = Vec::with_capacity(tracks.len());
    let mut offset_map = OffsetMap::default();

    let mut sector = 0;
    let mut byte_offset = 0;
    for (i, track) in tracks.iter().enumerate() {
        if i == 0 && track.sequence != 1 {
            return Err(CdrWinError::UnorderedTracks { track: track.sequence });
        }

        if !track.indexes.contains(1) {
            return Err(CdrWinError::MissingIndex1 { track: track.sequence });
        }

        let size = track.sectors * u64::from(track.bytes_per_sector);
        partitions.push(Partition {
            sequence: track.sequence,
            start: sector,
            length: track.sectors,
            size,
            offset: byte_offset,
            track_type: track.track_type,
            name: track.cd_text.title.clone(),
            description: format!("Track {}.", track.sequence),
        });
        offset_map.record(track.sequence, sector);

        sector += track.sectors;
        byte_offset += size;
    }

    Ok((partitions, offset_map))
}
