//! Sector reads against the track files of a parsed cue sheet


use crate::config::{CdrWinConfig, FileHandleMode};
use crate::disc::{Disc, FileType, Track, TrackFile, TrackIndexes, TrackType};
use crate::layout::{SectorLayout, SectorTag, TagLocation, UserDataLayout};
use crate::media::MediaType;
use crate::partition::{OffsetMap, Partition};
use crate::{CdrWinError, CdrWinResult, cue, layout, partition};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::{fs, io};

/// Disc-level tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum MediaTag {
    /// Media catalog number from CATALOG
    CdMcn,
    /// Contents of the CDTEXTFILE
    CdText,
}

/// Coarse sector format of a track, independent of how the track file stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackDataType {
    Audio,
    CdMode1,
    CdMode2Formless,
    CdMode2Form1,
    CdMode2Form2,
}

impl TrackDataType {
    fn from_track_type(track_type: TrackType) -> Self {
        match track_type {
            TrackType::Audio | TrackType::Cdg => Self::Audio,
            TrackType::Mode1 | TrackType::Mode1Raw => Self::CdMode1,
            TrackType::Mode2Form1 => Self::CdMode2Form1,
            TrackType::Mode2Form2 => Self::CdMode2Form2,
            TrackType::Mode2Formless | TrackType::Mode2Raw | TrackType::Cdi | TrackType::CdiRaw => {
                Self::CdMode2Formless
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubchannelType {
    None,
    /// 96 bytes of subchannel stored after each 2352-byte sector
    RawInterleaved,
}

/// One track as seen by consumers of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub sequence: u32,
    pub session: u8,
    pub data_type: TrackDataType,
    pub track_type: TrackType,
    /// Bytes stored per sector in the track file
    pub raw_bytes_per_sector: u32,
    /// Bytes of user data per sector
    pub bytes_per_sector: u32,
    /// INDEX 00 if the track has one, else INDEX 01, as written in the cue sheet
    pub start_sector: u64,
    /// `start_sector + sectors - 1`
    pub end_sector: u64,
    pub pregap: u32,
    pub file_path: PathBuf,
    pub file_offset: u64,
    pub file_type: FileType,
    pub subchannel: SubchannelType,
    pub indexes: TrackIndexes,
    pub description: Option<String>,
}

/// Summary of an opened image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub sectors: u64,
    /// Bytes of track data across all track files
    pub image_size: u64,
    /// Nominal sector size: 2048 for pure data media, otherwise 2352
    pub sector_size: u32,
    pub media_type: MediaType,
    pub application: String,
    pub application_version: Option<String>,
    pub comments: Option<String>,
    pub media_serial_number: Option<String>,
    pub media_barcode: Option<String>,
    pub media_title: Option<String>,
    pub readable_media_tags: Vec<MediaTag>,
    pub readable_sector_tags: Vec<SectorTag>,
}

impl ImageInfo {
    fn new(disc: &Disc) -> Self {
        let image_size = disc
            .tracks
            .iter()
            .map(|track| track.sectors * u64::from(track.bytes_per_sector))
            .sum();

        let sector_size = if disc.media_type.is_data_only() {
            crate::COOKED_BYTES_PER_SECTOR
        } else {
            crate::RAW_BYTES_PER_SECTOR
        };

        let application = match &disc.application {
            Some(application) => application.clone(),
            None if disc.is_trurip => "trurip".into(),
            None if disc.original_media_type.is_some()
                || disc.comment.to_ascii_lowercase().contains("isobuster")
                || disc.sessions.len() > 1 =>
            {
                "ISOBuster".into()
            }
            None => "CDRWin".into(),
        };

        let mut readable_media_tags = Vec::new();
        if disc.mcn.is_some() {
            readable_media_tags.push(MediaTag::CdMcn);
        }
        if disc.cd_text_file.is_some() {
            readable_media_tags.push(MediaTag::CdText);
        }

        let mut readable_sector_tags = vec![SectorTag::CdTrackFlags];
        for track in &disc.tracks {
            for &tag in layout::readable_tags(track.track_type) {
                if !readable_sector_tags.contains(&tag) {
                    readable_sector_tags.push(tag);
                }
            }
        }

        Self {
            sectors: disc.total_sectors(),
            image_size,
            sector_size,
            media_type: disc.media_type,
            application,
            application_version: disc.application_version.clone(),
            comments: (!disc.comment.is_empty()).then(|| disc.comment.clone()),
            media_serial_number: disc.mcn.clone(),
            media_barcode: disc.barcode.clone(),
            media_title: disc.cd_text.title.clone(),
            readable_media_tags,
            readable_sector_tags,
        }
    }
}

const CD_FLAG_PRE_EMPHASIS: u8 = 0x01;
const CD_FLAG_COPY_PERMITTED: u8 = 0x02;
const CD_FLAG_DATA_TRACK: u8 = 0x04;
const CD_FLAG_FOUR_CHANNEL: u8 = 0x08;

fn control_flags(track: &Track) -> u8 {
    let mut flags = 0;
    if track.flags.pre_emphasis {
        flags |= CD_FLAG_PRE_EMPHASIS;
    }
    if track.flags.digital_copy_permitted {
        flags |= CD_FLAG_COPY_PERMITTED;
    }
    if !track.track_type.is_audio() {
        flags |= CD_FLAG_DATA_TRACK;
    }
    if track.flags.four_channel {
        flags |= CD_FLAG_FOUR_CHANNEL;
    }
    flags
}

#[derive(Debug)]
struct BinFile {
    file: BufReader<File>,
    /// `None` after a failed read, when the file position is unknown
    position: Option<u64>,
}

impl BinFile {
    fn open(path: &Path, buffer_capacity: usize) -> CdrWinResult<Self> {
        let file = File::open(path).map_err(|source| CdrWinError::BinOpen {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { file: BufReader::with_capacity(buffer_capacity, file), position: Some(0) })
    }

    fn read_layout(&mut self, start: u64, layout: SectorLayout, out: &mut [u8]) -> io::Result<()> {
        let result = if layout.is_contiguous() {
            self.read_at(start, out)
        } else {
            let stride = u64::from(layout.stride());
            out.chunks_exact_mut(layout.size as usize).enumerate().try_for_each(|(i, field)| {
                self.read_at(start + i as u64 * stride + u64::from(layout.offset), field)
            })
        };

        if result.is_err() {
            self.position = None;
        }
        result
    }

    fn read_at(&mut self, position: u64, out: &mut [u8]) -> io::Result<()> {
        // Only seek if the file is not already at the desired position; relative seeks keep
        // the read buffer when the target is inside it
        match self.position {
            Some(current) if current == position => {}
            Some(current) => self.file.seek_relative(position as i64 - current as i64)?,
            None => {
                self.file.seek(SeekFrom::Start(position))?;
            }
        }

        self.file.read_exact(out)?;
        self.position = Some(position + out.len() as u64);

        Ok(())
    }
}

#[derive(Debug)]
struct BinFiles {
    mode: FileHandleMode,
    buffer_capacity: usize,
    open: HashMap<PathBuf, BinFile>,
}

impl BinFiles {
    fn new(config: &CdrWinConfig) -> Self {
        Self {
            mode: config.file_handles,
            buffer_capacity: config.buffer_capacity.max(1),
            open: HashMap::new(),
        }
    }

    fn read(
        &mut self,
        file: &TrackFile,
        address: u64,
        count: u32,
        layout: SectorLayout,
    ) -> CdrWinResult<Vec<u8>> {
        let start = file.offset + address * u64::from(layout.stride());
        let mut buffer = vec![0; count as usize * layout.size as usize];

        match self.mode {
            FileHandleMode::Cached => {
                let bin_file = match self.open.entry(file.path.clone()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        entry.insert(BinFile::open(&file.path, self.buffer_capacity)?)
                    }
                };
                bin_file.read_layout(start, layout, &mut buffer)
            }
            FileHandleMode::PerRead => BinFile::open(&file.path, self.buffer_capacity)?
                .read_layout(start, layout, &mut buffer),
        }
        .map_err(CdrWinError::DiscReadIo)?;

        Ok(buffer)
    }
}

/// Looks up a track and checks that `count` sectors starting at track-relative `address` lie
/// inside it.
fn checked_track(disc: &Disc, track: u32, address: u64, count: u32) -> CdrWinResult<&Track> {
    let cd_track = disc.track(track).ok_or(CdrWinError::TrackNotFound { track })?;

    let fits = address
        .checked_add(count.into())
        .is_some_and(|end| u64::from(count) <= cd_track.sectors && end <= cd_track.sectors);
    if !fits {
        return Err(CdrWinError::RequestTooLong {
            track,
            address,
            count,
            sectors: cd_track.sectors,
        });
    }

    Ok(cd_track)
}

/// An opened CDRWin image: the parsed disc plus handles onto its track files.
#[derive(Debug)]
pub struct CdrWinImage {
    cue_dir: PathBuf,
    disc: Disc,
    partitions: Vec<Partition>,
    offset_map: OffsetMap,
    info: ImageInfo,
    files: BinFiles,
}

impl CdrWinImage {
    /// Opens the image described by the cue sheet at `cue_path` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the cue sheet cannot be read or parsed, or if its tracks do not form a
    /// valid layout.
    pub fn open<P: AsRef<Path>>(cue_path: P) -> CdrWinResult<Self> {
        Self::open_with_config(cue_path, &CdrWinConfig::default())
    }

    /// # Errors
    ///
    /// See [`Self::open`].
    pub fn open_with_config<P: AsRef<Path>>(
        cue_path: P,
        config: &CdrWinConfig,
    ) -> CdrWinResult<Self> {
        let cue_path = cue_path.as_ref();

        let disc = cue::parse_file(cue_path, config)?;
        let (partitions, offset_map) = partition::build(&disc.tracks)?;
        log::trace!("Partitions:\n{partitions:#?}");

        let info = ImageInfo::new(&disc);

        log::info!(
            "Opened '{}': {} with {} track(s) in {} session(s), {} sectors",
            cue_path.display(),
            disc.media_type,
            disc.tracks.len(),
            disc.sessions.len(),
            info.sectors
        );

        Ok(Self {
            cue_dir: cue_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            disc,
            partitions,
            offset_map,
            info,
            files: BinFiles::new(config),
        })
    }

    #[must_use]
    pub fn disc(&self) -> &Disc {
        &self.disc
    }

    #[must_use]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    #[must_use]
    pub fn offset_map(&self) -> &OffsetMap {
        &self.offset_map
    }

    #[must_use]
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Resolves an absolute sector to `(track, sector within track)`.
    ///
    /// # Errors
    ///
    /// Returns [`CdrWinError::AddressOutOfRange`] if no track contains the sector.
    pub fn locate(&self, address: u64) -> CdrWinResult<(u32, u64)> {
        self.disc
            .tracks
            .iter()
            .find_map(|track| {
                let start = self.offset_map.start_of(track.sequence)?;
                (start..start + track.sectors)
                    .contains(&address)
                    .then(|| (track.sequence, address - start))
            })
            .ok_or(CdrWinError::AddressOutOfRange { address })
    }

    /// Reads the user data of `count` sectors starting at absolute sector `address`.
    ///
    /// # Errors
    ///
    /// Fails if the address is outside every track, if the read would cross the end of the
    /// track, or on I/O errors.
    pub fn read_sectors(&mut self, address: u64, count: u32) -> CdrWinResult<Vec<u8>> {
        let (track, local) = self.locate(address)?;
        self.read_sectors_in_track(local, count, track)
    }

    /// Reads the user data of `count` sectors starting at sector `address` of `track`.
    ///
    /// # Errors
    ///
    /// Fails if the track does not exist, if the read would cross the end of the track, or on
    /// I/O errors.
    pub fn read_sectors_in_track(
        &mut self,
        address: u64,
        count: u32,
        track: u32,
    ) -> CdrWinResult<Vec<u8>> {
        let track = checked_track(&self.disc, track, address, count)?;
        let UserDataLayout { layout: user_data, mode2_extract } =
            layout::user_data(track.track_type);

        let data = self.files.read(&track.file, address, count, user_data)?;
        if !mode2_extract {
            return Ok(data);
        }

        Ok(data
            .chunks_exact(user_data.size as usize)
            .flat_map(layout::mode2_user_data)
            .copied()
            .collect())
    }

    /// Reads one tag of `count` sectors starting at absolute sector `address`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_sectors_tagged_in_track`], plus
    /// [`CdrWinError::AddressOutOfRange`].
    pub fn read_sectors_tagged(
        &mut self,
        address: u64,
        count: u32,
        tag: SectorTag,
    ) -> CdrWinResult<Vec<u8>> {
        let (track, local) = self.locate(address)?;
        self.read_sectors_tagged_in_track(local, count, track, tag)
    }

    /// Reads one tag of `count` sectors starting at sector `address` of `track`.
    ///
    /// `CdTrackFlags` produces a single control byte and `CdTrackIsrc` the track's ISRC (empty if
    /// unset), regardless of `count`.
    ///
    /// # Errors
    ///
    /// Fails with [`CdrWinError::UnsupportedTag`] if tracks of this type do not carry the tag,
    /// [`CdrWinError::NotImplemented`] for `CdTrackText`, and otherwise as
    /// [`Self::read_sectors_in_track`].
    pub fn read_sectors_tagged_in_track(
        &mut self,
        address: u64,
        count: u32,
        track: u32,
        tag: SectorTag,
    ) -> CdrWinResult<Vec<u8>> {
        let track = checked_track(&self.disc, track, address, count)?;

        match tag {
            SectorTag::CdTrackFlags => return Ok(vec![control_flags(track)]),
            SectorTag::CdTrackIsrc => {
                return Ok(track.isrc.clone().map(String::into_bytes).unwrap_or_default());
            }
            SectorTag::CdTrackText => {
                return Err(CdrWinError::NotImplemented { feature: "CD-TEXT track tags".into() });
            }
            _ => {}
        }

        match layout::tag(track.track_type, tag) {
            Some(TagLocation::Stored(stored)) => {
                self.files.read(&track.file, address, count, stored)
            }
            Some(TagLocation::Mode2RawEdc) => {
                let long_layout = layout::long(track.track_type);
                let sectors = self.files.read(&track.file, address, count, long_layout)?;
                Ok(sectors
                    .chunks_exact(long_layout.size as usize)
                    .flat_map(layout::mode2_raw_edc)
                    .copied()
                    .collect())
            }
            None => Err(CdrWinError::UnsupportedTag { track: track.sequence, tag }),
        }
    }

    /// Reads `count` full stored sectors starting at absolute sector `address`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_sectors`].
    pub fn read_sectors_long(&mut self, address: u64, count: u32) -> CdrWinResult<Vec<u8>> {
        let (track, local) = self.locate(address)?;
        self.read_sectors_long_in_track(local, count, track)
    }

    /// Reads `count` full stored sectors starting at sector `address` of `track`. Interleaved
    /// subchannel data is not included.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_sectors_in_track`].
    pub fn read_sectors_long_in_track(
        &mut self,
        address: u64,
        count: u32,
        track: u32,
    ) -> CdrWinResult<Vec<u8>> {
        let track = checked_track(&self.disc, track, address, count)?;
        self.files.read(&track.file, address, count, layout::long(track.track_type))
    }

    /// Reads a disc-level tag.
    ///
    /// # Errors
    ///
    /// Returns [`CdrWinError::TagNotPresent`] if the cue sheet does not declare the tag, or
    /// [`CdrWinError::CdTextRead`] if the CD-TEXT file cannot be read.
    pub fn read_disk_tag(&self, tag: MediaTag) -> CdrWinResult<Vec<u8>> {
        match tag {
            MediaTag::CdMcn => self
                .disc
                .mcn
                .as_ref()
                .map(|mcn| mcn.as_bytes().to_vec())
                .ok_or(CdrWinError::TagNotPresent { tag }),
            MediaTag::CdText => {
                let file_name =
                    self.disc.cd_text_file.as_ref().ok_or(CdrWinError::TagNotPresent { tag })?;
                let path = cue::resolve_file_path(&self.cue_dir, file_name)
                    .unwrap_or_else(|| self.cue_dir.join(file_name));
                fs::read(&path).map_err(|source| CdrWinError::CdTextRead {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
    }

    #[must_use]
    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.disc.tracks.iter().map(|track| self.track_info(track)).collect()
    }

    #[must_use]
    pub fn session_tracks(&self, session: u8) -> Vec<TrackInfo> {
        self.disc
            .tracks
            .iter()
            .filter(|track| track.session == session)
            .map(|track| self.track_info(track))
            .collect()
    }

    fn track_info(&self, track: &Track) -> TrackInfo {
        let start_sector = track.start_sector();
        let subchannel = if track.track_type == TrackType::Cdg {
            SubchannelType::RawInterleaved
        } else {
            SubchannelType::None
        };

        TrackInfo {
            sequence: track.sequence,
            session: track.session,
            data_type: TrackDataType::from_track_type(track.track_type),
            track_type: track.track_type,
            raw_bytes_per_sector: track.bytes_per_sector,
            bytes_per_sector: track.track_type.cooked_bytes_per_sector(),
            start_sector,
            end_sector: (start_sector + track.sectors).saturating_sub(1),
            pregap: track.pregap,
            file_path: track.file.path.clone(),
            file_offset: track.file.offset,
            file_type: track.file.file_type,
            subchannel,
            indexes: track.indexes.clone(),
            description: track.cd_text.title.clone(),
        }
    }
}
