use std::fmt::{Display, Formatter};

/// How the reader manages handles onto the track files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum FileHandleMode {
    /// Open each track file once, on first use, and reposition it on every read
    #[default]
    Cached,
    /// Open a fresh handle for every read call and drop it afterwards
    PerRead,
}

impl Display for FileHandleMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached => write!(f, "Cached"),
            Self::PerRead => write!(f, "PerRead"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CdrWinConfig {
    pub file_handles: FileHandleMode,
    /// Capacity of the read buffer wrapped around each track file handle
    pub buffer_capacity: usize,
    /// Refine a media-type hint that only says "CD" using the track layout
    pub classify_generic_hint: bool,
}

impl CdrWinConfig {
    pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;
}

impl Default for CdrWinConfig {
    fn default() -> Self {
        Self {
            file_handles: FileHandleMode::default(),
            buffer_capacity: Self::DEFAULT_BUFFER_CAPACITY,
            classify_generic_hint: true,
        }
    }
}
