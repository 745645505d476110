//! Disc media types and the heuristic that infers one from a track layout

use crate::disc::{Track, TrackType};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaType {
    #[default]
    Unknown,
    /// Generic compact disc of unspecified type
    Cd,
    Cdda,
    Cdg,
    Cdeg,
    Cdi,
    CdMidi,
    CdPlus,
    CdRom,
    CdRomXa,
    CdR,
    CdRw,
    CdMrw,
    DvdRom,
    DvdR,
    DvdRw,
    DvdRDl,
    DvdRwDl,
    DvdRam,
    DvdPr,
    DvdPrw,
    DvdPrDl,
    DvdPrwDl,
    BdRom,
    BdR,
    BdRe,
    BdRDl,
    BdReDl,
    HdDvdRom,
    HdDvdR,
    HdDvdRw,
    HdDvdRam,
}

impl MediaType {
    const NAMES: &[(Self, &str)] = &[
        (Self::Unknown, "Unknown"),
        (Self::Cd, "CD"),
        (Self::Cdda, "CDDA"),
        (Self::Cdg, "CDG"),
        (Self::Cdeg, "CDEG"),
        (Self::Cdi, "CDI"),
        (Self::CdMidi, "CDMIDI"),
        (Self::CdPlus, "CDPLUS"),
        (Self::CdRom, "CDROM"),
        (Self::CdRomXa, "CDROMXA"),
        (Self::CdR, "CDR"),
        (Self::CdRw, "CDRW"),
        (Self::CdMrw, "CDMRW"),
        (Self::DvdRom, "DVDROM"),
        (Self::DvdR, "DVDR"),
        (Self::DvdRw, "DVDRW"),
        (Self::DvdRDl, "DVDRDL"),
        (Self::DvdRwDl, "DVDRWDL"),
        (Self::DvdRam, "DVDRAM"),
        (Self::DvdPr, "DVDPR"),
        (Self::DvdPrw, "DVDPRW"),
        (Self::DvdPrDl, "DVDPRDL"),
        (Self::DvdPrwDl, "DVDPRWDL"),
        (Self::BdRom, "BDROM"),
        (Self::BdR, "BDR"),
        (Self::BdRe, "BDRE"),
        (Self::BdRDl, "BDRXL"),
        (Self::BdReDl, "BDREXL"),
        (Self::HdDvdRom, "HDDVDROM"),
        (Self::HdDvdR, "HDDVDR"),
        (Self::HdDvdRw, "HDDVDRW"),
        (Self::HdDvdRam, "HDDVDRAM"),
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find_map(|&(media_type, name)| (media_type == self).then_some(name))
            .unwrap_or("Unknown")
    }

    /// Case-insensitive lookup by name, as written in `REM METADATA DIC MEDIA-TYPE`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::NAMES
            .iter()
            .find_map(|&(media_type, known)| known.eq_ignore_ascii_case(name).then_some(media_type))
    }

    /// Decodes an ISOBuster `REM ORIGINAL MEDIA-TYPE` value. Unrecognized values are `Unknown`.
    #[must_use]
    pub fn from_isobuster(disc_type: &str) -> Self {
        match disc_type.trim() {
            "CD" => Self::Cd,
            "CD-R" => Self::CdR,
            "CD-RW" => Self::CdRw,
            "CD-MRW" | "CD-(MRW)" => Self::CdMrw,
            "DVD" => Self::DvdRom,
            "DVD+MRW" | "DVD+(MRW)" | "DVD+RW" => Self::DvdPrw,
            "DVD+MRW DL" | "DVD+(MRW) DL" | "DVD+RW DL" => Self::DvdPrwDl,
            "DVD+R" | "DVD+VR" => Self::DvdPr,
            "DVD+R DL" => Self::DvdPrDl,
            "DVD-R" | "DVD-VR" => Self::DvdR,
            "DVD-R DL" => Self::DvdRDl,
            "DVD-RW" => Self::DvdRw,
            "DVD-RW DL" => Self::DvdRwDl,
            "DVD-RAM" => Self::DvdRam,
            "BD" => Self::BdRom,
            "BD-R" => Self::BdR,
            "BD-RE" => Self::BdRe,
            "BD-R DL" => Self::BdRDl,
            "BD-RE DL" => Self::BdReDl,
            "HD DVD" => Self::HdDvdRom,
            "HD DVD-R" => Self::HdDvdR,
            "HD DVD-RW" => Self::HdDvdRw,
            "HD DVD-RAM" => Self::HdDvdRam,
            _ => Self::Unknown,
        }
    }

    /// Types whose sectors are all plain 2048-byte data sectors.
    #[must_use]
    pub fn is_data_only(self) -> bool {
        !matches!(
            self,
            Self::CdRomXa
                | Self::Cdda
                | Self::Cdi
                | Self::CdPlus
                | Self::Cdg
                | Self::Cdeg
                | Self::CdMidi
        )
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves the disc media type from the two vendor hints, falling back to [`classify`].
///
/// The DiscImageCreator hint wins over the ISOBuster hint. A hint that only resolves to the
/// generic [`MediaType::Cd`] is refined by the classifier when `refine_generic` is set.
#[must_use]
pub fn resolve(
    dic_hint: Option<&str>,
    isobuster_hint: Option<&str>,
    tracks: &[Track],
    session_count: usize,
    refine_generic: bool,
) -> MediaType {
    let hinted = dic_hint
        .filter(|hint| !hint.trim().is_empty())
        .and_then(|hint| {
            let decoded = MediaType::from_name(hint);
            if decoded.is_none() {
                log::warn!("Ignoring unrecognized DIC media type '{hint}'");
            }
            decoded
        })
        .unwrap_or_else(|| isobuster_hint.map_or(MediaType::Unknown, MediaType::from_isobuster));

    match hinted {
        MediaType::Unknown => classify(tracks, session_count),
        MediaType::Cd if refine_generic => classify(tracks, session_count),
        media_type => media_type,
    }
}

/// Infers the media type from which kinds of tracks a disc contains.
#[must_use]
pub fn classify(tracks: &[Track], session_count: usize) -> MediaType {
    let mut first_audio = false;
    let mut first_data = false;
    let mut data = false;
    let mut audio = false;
    let mut cdg = false;
    let mut cdi = false;
    let mut mode2 = false;

    for (i, track) in tracks.iter().enumerate() {
        let is_audio = track.track_type == TrackType::Audio;
        if i == 0 {
            first_audio = is_audio;
            first_data = !is_audio;
        } else {
            data |= !is_audio;
            audio |= is_audio;
        }

        cdg |= track.track_type == TrackType::Cdg;
        cdi |= track.track_type.is_cdi();
        mode2 |= track.track_type.is_mode2();
    }

    if !data && !first_data {
        MediaType::Cdda
    } else if cdg {
        MediaType::Cdg
    } else if cdi {
        MediaType::Cdi
    } else if first_audio && data && session_count > 1 && mode2 {
        MediaType::CdPlus
    } else if (first_data && audio) || mode2 {
        MediaType::CdRomXa
    } else if !audio {
        MediaType::CdRom
    } else {
        MediaType::Cd
    }
}
