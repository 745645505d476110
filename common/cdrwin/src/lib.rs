//! Reader for CDRWin cue sheets (`.cue` + one or more `.bin` files)
//!
//! [`CdrWinImage::open`] parses the cue sheet into an immutable [`Disc`] and then serves sector
//! reads against the underlying binary files, either cooked (user data only), long (the full
//! stored sector), or tagged (a single sub-field of each sector).

pub mod cdtime;
pub mod config;
pub mod cue;
pub mod disc;
pub mod layout;
pub mod media;
pub mod partition;
pub mod reader;

pub use config::{CdrWinConfig, FileHandleMode};
pub use disc::{Disc, Session, Track, TrackFile, TrackType};
pub use layout::SectorTag;
pub use media::MediaType;
pub use reader::{CdrWinImage, ImageInfo, MediaTag, TrackInfo};

use std::io;
use thiserror::Error;

// 12 sync bytes + 4 header bytes + 2048 data bytes + 288 error detection/correction bytes, or
// 588 stereo 16-bit PCM samples for audio
pub const RAW_BYTES_PER_SECTOR: u32 = 2352;

pub const COOKED_BYTES_PER_SECTOR: u32 = 2048;

#[derive(Debug, Error)]
pub enum CdrWinError {
    #[error("Error opening CUE file '{path}': {source}")]
    CueOpen {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Malformed CUE file at line {line}: {message}")]
    FormatViolation { line: usize, message: String },
    #[error("Unsupported directive at line {line}: '{text}'")]
    UnsupportedDirective { line: usize, text: String },
    #[error("Unsupported file type '{file_type}' at line {line}")]
    UnsupportedFileType { line: usize, file_type: String },
    #[error("File '{path}' referenced at line {line} was not found")]
    FileNotFound { line: usize, path: String },
    #[error("Unable to get file metadata for file '{path}': {source}")]
    FsMetadata {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Track {track} appears before track 1")]
    UnorderedTracks { track: u32 },
    #[error("Track {track} lacks INDEX 01")]
    MissingIndex1 { track: u32 },
    #[error("Sector address {address} is not inside any track")]
    AddressOutOfRange { address: u64 },
    #[error("Track {track} does not exist in disc image")]
    TrackNotFound { track: u32 },
    #[error(
        "Requested {count} sectors at {address} from track {track} which has {sectors} sectors; reads never cross tracks"
    )]
    RequestTooLong { track: u32, address: u64, count: u32, sectors: u64 },
    #[error("Tag {tag:?} is not supported for track {track}")]
    UnsupportedTag { track: u32, tag: SectorTag },
    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String },
    #[error("Image does not contain {tag:?}")]
    TagNotPresent { tag: MediaTag },
    #[error("Error opening BIN file '{path}': {source}")]
    BinOpen {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Error reading CD-TEXT file '{path}': {source}")]
    CdTextRead {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error reading from disc image: {0}")]
    DiscReadIo(#[source] io::Error),
}

pub type CdrWinResult<T> = Result<T, CdrWinError>;
