//! Cue sheet parser
//!
//! Parsing runs in two passes. The first pass tokenizes every line and checks that TRACK numbers
//! run 1..N in order; the second walks the directives through a small state machine and builds
//! the [`Disc`].

mod directive;
#[cfg(test)]
mod tests;

use crate::cdtime::CdTime;
use crate::config::CdrWinConfig;
use crate::cue::directive::{Directive, DirectiveError, Remark, TextField};
use crate::disc::{
    CdText, Disc, FileType, Session, Track, TrackFile, TrackFlags, TrackIndexes, TrackType,
};
use crate::{CdrWinError, CdrWinResult, disc, media};
use std::path::{Path, PathBuf};
use std::{fs, mem};

/// Reads and parses the cue sheet at `cue_path`. FILE paths resolve relative to its directory.
///
/// # Errors
///
/// Returns an error if the cue sheet cannot be read, does not parse, or references track files
/// that do not exist.
pub fn parse_file(cue_path: &Path, config: &CdrWinConfig) -> CdrWinResult<Disc> {
    let bytes = fs::read(cue_path).map_err(|source| CdrWinError::CueOpen {
        path: cue_path.display().to_string(),
        source,
    })?;
    let cue = String::from_utf8_lossy(&bytes);

    let cue_dir = cue_path.parent().unwrap_or(Path::new("."));
    parse(&cue, cue_dir, config)
}

/// Parses cue sheet text. FILE paths resolve relative to `cue_dir`.
///
/// # Errors
///
/// Same as [`parse_file`], minus errors opening the cue sheet itself.
pub fn parse(cue: &str, cue_dir: &Path, config: &CdrWinConfig) -> CdrWinResult<Disc> {
    let cue = cue.strip_prefix('\u{feff}').unwrap_or(cue);
    let lines: Vec<&str> = cue.lines().collect();

    let track_count = validate_track_order(&lines)?;

    let mut parser = CueParser::new(cue_dir, track_count);
    for (i, line) in lines.iter().enumerate() {
        let line_number = i + 1;
        let Some(directive) =
            Directive::parse(line).map_err(|err| directive_error(line_number, line, err))?
        else {
            continue;
        };
        parser.handle(line_number, directive)?;
    }

    parser.finish(lines.len(), config)
}

fn directive_error(line: usize, text: &str, err: DirectiveError) -> CdrWinError {
    match err {
        DirectiveError::Unsupported => {
            CdrWinError::UnsupportedDirective { line, text: text.trim().into() }
        }
        DirectiveError::Malformed(message) => CdrWinError::FormatViolation { line, message },
    }
}

fn format_violation(line: usize, message: impl Into<String>) -> CdrWinError {
    CdrWinError::FormatViolation { line, message: message.into() }
}

/// First pass: every line must tokenize and TRACK numbers must be exactly 1, 2, ..., N.
fn validate_track_order(lines: &[&str]) -> CdrWinResult<u32> {
    let mut last_track = 0;
    for (i, line) in lines.iter().enumerate() {
        let line_number = i + 1;
        match Directive::parse(line) {
            Ok(Some(Directive::Track { number, .. })) => {
                if number != last_track + 1 {
                    return Err(format_violation(
                        line_number,
                        format!(
                            "track out of order: expected track {}, found {number}",
                            last_track + 1
                        ),
                    ));
                }
                last_track = number;
            }
            Ok(_) => {}
            Err(err) => return Err(directive_error(line_number, line, err)),
        }
    }

    if last_track == 0 {
        return Err(format_violation(lines.len(), "CUE file has no tracks"));
    }

    Ok(last_track)
}

/// Track accumulated from TRACK until the next TRACK, FILE, or end of sheet.
#[derive(Debug)]
struct OpenTrack {
    sequence: u32,
    track_type: TrackType,
    pregap: Option<u32>,
    postgap: u32,
    indexes: TrackIndexes,
    session: u8,
    flags: TrackFlags,
    isrc: Option<String>,
    cd_text: CdText,
}

#[derive(Debug)]
struct OpenFile {
    path: PathBuf,
    file_type: FileType,
    len: u64,
    /// Byte offset where the next track committed from this file begins
    offset: u64,
    /// Tracks committed from this file so far
    tracks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashBlock {
    /// `REM DISC HASHES`, followed by `REM <ALG> : <digest>` lines
    Disc,
    /// `REM Gap Append Method: ... HASHES`, followed by `REM Trk|Gap NN : <digest>` lines
    Track,
}

#[derive(Debug, Default)]
enum ParserState {
    #[default]
    OutsideTrack,
    InTrackBody(OpenTrack),
    InVendorHashBlock { kind: HashBlock, track: Option<OpenTrack> },
}

impl ParserState {
    fn open_track_mut(&mut self) -> Option<&mut OpenTrack> {
        match self {
            Self::InTrackBody(track) => Some(track),
            Self::InVendorHashBlock { track, .. } => track.as_mut(),
            Self::OutsideTrack => None,
        }
    }

    fn take_track(&mut self) -> Option<OpenTrack> {
        match mem::take(self) {
            Self::InTrackBody(track) => Some(track),
            Self::InVendorHashBlock { track, .. } => track,
            Self::OutsideTrack => None,
        }
    }
}

#[derive(Debug)]
struct CueParser<'a> {
    cue_dir: &'a Path,
    state: ParserState,
    file: Option<OpenFile>,
    session: u8,
    session_tracks: u32,
    session_line: usize,
    tracks: Vec<Track>,
    disc: Disc,
}

impl<'a> CueParser<'a> {
    fn new(cue_dir: &'a Path, track_count: u32) -> Self {
        Self {
            cue_dir,
            state: ParserState::default(),
            file: None,
            session: 1,
            session_tracks: 0,
            session_line: 1,
            tracks: Vec::with_capacity(track_count as usize),
            disc: Disc::default(),
        }
    }

    fn handle(&mut self, line: usize, directive: Directive<'_>) -> CdrWinResult<()> {
        log::debug!("Line {line}: {}", directive.name());

        if let ParserState::InVendorHashBlock { kind, track } = &mut self.state {
            if record_hash_line(*kind, &directive, &mut self.disc) {
                return Ok(());
            }

            let next = match track.take() {
                Some(track) => ParserState::InTrackBody(track),
                None => ParserState::OutsideTrack,
            };
            self.state = next;
        }

        match directive {
            Directive::Session(sequence) => self.start_session(line, sequence)?,
            Directive::File { path, file_type } => self.open_file(line, &path, file_type)?,
            Directive::Track { number, track_type } => self.open_track(line, number, track_type)?,
            Directive::Index { number, time } => self.add_index(line, number, time)?,
            Directive::Pregap(time) => {
                self.track_mut(line, "PREGAP")?.pregap = Some(time.to_sector_number());
            }
            Directive::Postgap(time) => {
                self.track_mut(line, "POSTGAP")?.postgap = time.to_sector_number();
            }
            Directive::Flags(flags) => {
                let track = self.track_mut(line, "FLAGS")?;
                track.flags = track.flags.union(flags);
            }
            Directive::Isrc(isrc) => self.track_mut(line, "ISRC")?.isrc = Some(isrc.into()),
            Directive::Catalog(mcn) => {
                self.disc_only(line, "CATALOG")?;
                self.disc.mcn = Some(mcn.into());
            }
            Directive::CdTextFile(path) => {
                self.disc_only(line, "CDTEXTFILE")?;
                self.disc.cd_text_file = Some(path);
            }
            Directive::DiscId(disc_id) => {
                self.disc_only(line, "DISC_ID")?;
                self.disc.disc_id = Some(disc_id.into());
            }
            Directive::Barcode(barcode) => {
                self.disc_only(line, "UPC_EAN")?;
                self.disc.barcode = Some(barcode.into());
            }
            Directive::Text(field, value) => {
                let cd_text = match self.state.open_track_mut() {
                    Some(track) => &mut track.cd_text,
                    None => &mut self.disc.cd_text,
                };
                let slot = match field {
                    TextField::Title => &mut cd_text.title,
                    TextField::Performer => &mut cd_text.performer,
                    TextField::Songwriter => &mut cd_text.songwriter,
                    TextField::Composer => &mut cd_text.composer,
                    TextField::Genre => &mut cd_text.genre,
                    TextField::Arranger => &mut cd_text.arranger,
                };
                *slot = Some(value);
            }
            Directive::Remark { remark, text } => self.handle_remark(remark, text),
        }

        Ok(())
    }

    fn track_mut(&mut self, line: usize, directive: &str) -> CdrWinResult<&mut OpenTrack> {
        self.state
            .open_track_mut()
            .ok_or_else(|| format_violation(line, format!("{directive} outside of a TRACK")))
    }

    fn disc_only(&mut self, line: usize, directive: &str) -> CdrWinResult<()> {
        match self.state.open_track_mut() {
            Some(track) => Err(format_violation(
                line,
                format!(
                    "{directive} is only valid at disc level, found inside track {}",
                    track.sequence
                ),
            )),
            None => Ok(()),
        }
    }

    fn start_session(&mut self, line: usize, sequence: u8) -> CdrWinResult<()> {
        if sequence == self.session {
            return Ok(());
        }

        if Some(sequence) != self.session.checked_add(1) {
            return Err(format_violation(
                line,
                format!("SESSION {sequence} follows SESSION {}", self.session),
            ));
        }

        if self.session_tracks == 0 {
            return Err(format_violation(line, format!("SESSION {} has no tracks", self.session)));
        }

        log::debug!("Session {sequence} starts at line {line}");

        self.session = sequence;
        self.session_tracks = 0;
        self.session_line = line;

        Ok(())
    }

    fn open_file(&mut self, line: usize, path: &str, file_type: &str) -> CdrWinResult<()> {
        let file_type = FileType::from_cue(file_type)
            .ok_or_else(|| CdrWinError::UnsupportedFileType { line, file_type: file_type.into() })?;
        if file_type != FileType::Binary {
            return Err(CdrWinError::UnsupportedFileType { line, file_type: file_type.to_string() });
        }

        let resolved = resolve_file_path(self.cue_dir, path)
            .ok_or_else(|| CdrWinError::FileNotFound { line, path: path.into() })?;
        let len = fs::metadata(&resolved)
            .map_err(|source| CdrWinError::FsMetadata {
                path: resolved.display().to_string(),
                source,
            })?
            .len();

        if let Some(track) = self.state.take_track() {
            self.commit_track(line, track, true)?;
        }

        if let Some(file) = self.file.as_ref().filter(|file| file.tracks == 0) {
            return Err(format_violation(
                line,
                format!("No tracks listed for file '{}'", file.path.display()),
            ));
        }

        log::debug!("FILE '{path}' resolved to '{}' ({len} bytes)", resolved.display());

        self.file = Some(OpenFile { path: resolved, file_type, len, offset: 0, tracks: 0 });

        Ok(())
    }

    fn open_track(&mut self, line: usize, number: u32, track_type: &str) -> CdrWinResult<()> {
        let track_type: TrackType =
            track_type.parse().map_err(|message| format_violation(line, message))?;

        if self.file.is_none() {
            return Err(format_violation(line, format!("TRACK {number} appears before any FILE")));
        }

        if let Some(track) = self.state.take_track() {
            self.commit_track(line, track, false)?;
        }

        self.state = ParserState::InTrackBody(OpenTrack {
            sequence: number,
            track_type,
            pregap: None,
            postgap: 0,
            indexes: TrackIndexes::default(),
            session: self.session,
            flags: TrackFlags::default(),
            isrc: None,
            cd_text: CdText::default(),
        });
        self.session_tracks += 1;

        Ok(())
    }

    fn add_index(&mut self, line: usize, number: u8, time: CdTime) -> CdrWinResult<()> {
        let Self { state, file, tracks, .. } = self;

        let track = state
            .open_track_mut()
            .ok_or_else(|| format_violation(line, format!("INDEX {number:02} outside a TRACK")))?;
        let sector = time.to_sector_number();

        if number == 0 && track.indexes.contains(1) {
            return Err(format_violation(line, "INDEX 00 after INDEX 01"));
        }

        if number > 1 && !track.indexes.contains(0) && !track.indexes.contains(1) {
            return Err(format_violation(
                line,
                format!("INDEX {number:02} before INDEX 00 or INDEX 01"),
            ));
        }

        if let Some((last_number, last_sector)) = track.indexes.iter().last() {
            if number <= last_number {
                return Err(format_violation(
                    line,
                    format!("INDEX {number:02} follows INDEX {last_number:02}"),
                ));
            }

            if sector < last_sector {
                return Err(format_violation(
                    line,
                    format!(
                        "INDEX {number:02} at {time} precedes INDEX {last_number:02} of track {}",
                        track.sequence
                    ),
                ));
            }
        }

        if track.indexes.is_empty() {
            let file = file
                .as_mut()
                .ok_or_else(|| format_violation(line, "INDEX appears before any FILE"))?;

            if track.sequence == 1 {
                file.offset = u64::from(sector) * u64::from(track.track_type.bytes_per_sector());
            } else if file.tracks > 0 {
                // The previous track shares this file, so this index is where it ends
                let Some(previous) = tracks.last_mut() else {
                    return Err(format_violation(line, "no previous track in file"));
                };
                let previous_start = previous.indexes.first_sector().ok_or_else(|| {
                    format_violation(
                        line,
                        format!("track {} has neither INDEX 00 nor INDEX 01", previous.sequence),
                    )
                })?;
                let sectors = sector.checked_sub(previous_start).ok_or_else(|| {
                    format_violation(
                        line,
                        format!(
                            "track {} starts at {time}, before track {} which starts at {}",
                            track.sequence,
                            previous.sequence,
                            CdTime::from_sector_number(previous_start).unwrap_or_default()
                        ),
                    )
                })?;

                previous.sectors = sectors.into();
                file.offset += previous.sectors * u64::from(previous.bytes_per_sector);
            }
        }

        track.indexes.insert(number, sector);

        Ok(())
    }

    fn handle_remark(&mut self, remark: Remark<'_>, text: &str) {
        let in_track = self.state.open_track_mut().is_some();

        match remark {
            Remark::OriginalMediaType(media_type) if !in_track => {
                self.disc.original_media_type = Some(media_type.into());
            }
            Remark::DicMediaType(media_type) if !in_track => {
                self.disc.dic_media_type = Some(media_type.into());
            }
            Remark::DumpExtent(dump) if !in_track => {
                disc::merge_dump_hardware(&mut self.disc.dump_hardware, dump);
            }
            Remark::ApplicationVersion(version) if !in_track => {
                self.disc.application_version = Some(version.into());
            }
            Remark::Application(application) => {
                self.disc.application = Some(application.into());
            }
            Remark::DiscHashes => {
                let track = self.state.take_track();
                self.state = ParserState::InVendorHashBlock { kind: HashBlock::Disc, track };
            }
            Remark::TrackHashMethod { method, version } => {
                log::debug!("Per-track hashes follow, gap append method {method} [{version}]");

                self.disc.is_trurip = true;
                let track = self.state.take_track();
                self.state = ParserState::InVendorHashBlock { kind: HashBlock::Track, track };
            }
            Remark::LeadOut(time) => log::debug!("Lead-out at {time} (LBA {})", time.to_lba()),
            Remark::MsfLba { time, lba } => log::debug!("MSF {time} = LBA {lba}"),
            _ => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }

                if !self.disc.comment.is_empty() {
                    self.disc.comment.push('\n');
                }
                self.disc.comment.push_str(text);
            }
        }
    }

    fn commit_track(
        &mut self,
        line: usize,
        track: OpenTrack,
        to_file_end: bool,
    ) -> CdrWinResult<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            format_violation(line, format!("track {} has no FILE", track.sequence))
        })?;

        let bytes_per_sector = track.track_type.bytes_per_sector();
        let sectors = if to_file_end {
            let remaining = file.len.checked_sub(file.offset).ok_or_else(|| {
                format_violation(
                    line,
                    format!(
                        "track {} starts at byte {}, past the end of '{}'",
                        track.sequence,
                        file.offset,
                        file.path.display()
                    ),
                )
            })?;
            remaining / u64::from(bytes_per_sector)
        } else {
            // Filled in once the next track's first INDEX is known
            0
        };

        let pregap = track.pregap.or_else(|| track.indexes.pause_len()).unwrap_or(0);

        log::debug!(
            "Committing track {} ({}) at byte {} of '{}'",
            track.sequence,
            track.track_type,
            file.offset,
            file.path.display()
        );

        file.tracks += 1;
        self.tracks.push(Track {
            sequence: track.sequence,
            track_type: track.track_type,
            bytes_per_sector,
            sectors,
            pregap,
            postgap: track.postgap,
            indexes: track.indexes,
            session: track.session,
            flags: track.flags,
            isrc: track.isrc,
            cd_text: track.cd_text,
            file: TrackFile {
                path: file.path.clone(),
                file_type: file.file_type,
                offset: file.offset,
                sequence: track.sequence,
                file_len: file.len,
            },
        });

        Ok(())
    }

    fn finish(mut self, last_line: usize, config: &CdrWinConfig) -> CdrWinResult<Disc> {
        if let Some(track) = self.state.take_track() {
            self.commit_track(last_line, track, true)?;
        }

        if let Some(file) = self.file.as_ref().filter(|file| file.tracks == 0) {
            return Err(format_violation(
                last_line,
                format!("No tracks listed for file '{}'", file.path.display()),
            ));
        }

        if self.session_tracks == 0 {
            return Err(format_violation(
                self.session_line,
                format!("SESSION {} has no tracks", self.session),
            ));
        }

        for track in &mut self.tracks {
            if let Some(pause_len) = track.indexes.pause_len() {
                track.pregap = pause_len;
            }
        }

        let sessions = build_sessions(&self.tracks, self.session);

        let mut disc = self.disc;
        disc.media_type = media::resolve(
            disc.dic_media_type.as_deref(),
            disc.original_media_type.as_deref(),
            &self.tracks,
            sessions.len(),
            config.classify_generic_hint,
        );
        disc.sessions = sessions;
        disc.tracks = self.tracks;

        log::debug!(
            "Parsed {} tracks in {} sessions, {} sectors",
            disc.tracks.len(),
            disc.sessions.len(),
            disc.total_sectors()
        );
        log::trace!("Parsed cue sheet:\n{disc:#?}");

        Ok(disc)
    }
}

/// Consumes a line belonging to the current vendor hash block. Returns false if the line ends
/// the block.
fn record_hash_line(kind: HashBlock, directive: &Directive<'_>, disc: &mut Disc) -> bool {
    let Directive::Remark { remark, .. } = directive else {
        return false;
    };

    match (kind, remark) {
        (HashBlock::Disc, &Remark::DiscHash { algorithm, digest }) => {
            log::debug!("Disc {} hash: {digest}", algorithm.key());
            disc.hashes.insert(algorithm.key().into(), digest.to_ascii_lowercase());
            true
        }
        (HashBlock::Track, &Remark::TrackHash { target, number, algorithm, digest }) => {
            match algorithm {
                Some(algorithm) => {
                    log::debug!("{target:?} {number:02} {} hash: {digest}", algorithm.key());
                }
                None => log::warn!("Unknown hash algorithm for {target:?} {number:02}: {digest}"),
            }
            true
        }
        _ => false,
    }
}

fn build_sessions(tracks: &[Track], last_session: u8) -> Vec<Session> {
    let mut sessions = Vec::with_capacity(last_session.into());
    let mut start_sector = 0;
    for sequence in 1..=last_session {
        let session_tracks: Vec<&Track> =
            tracks.iter().filter(|track| track.session == sequence).collect();
        let (Some(first), Some(last)) = (session_tracks.first(), session_tracks.last()) else {
            continue;
        };
        let sectors: u64 = session_tracks.iter().map(|track| track.sectors).sum();

        // Sessions are laid end to end, so the end is relative to this session's start
        let end_sector = start_sector + sectors.saturating_sub(1);
        sessions.push(Session {
            sequence,
            start_track: first.sequence,
            end_track: last.sequence,
            start_sector,
            end_sector,
        });
        start_sector = end_sector + 1;
    }

    sessions
}

/// Looks for a FILE's target as written (relative paths against the cue directory), then for
/// just its final component inside the cue directory.
pub(crate) fn resolve_file_path(cue_dir: &Path, name: &str) -> Option<PathBuf> {
    let file_name = name.rsplit(['/', '\\']).next().filter(|file_name| !file_name.is_empty());

    [Some(cue_dir.join(name)), file_name.map(|file_name| cue_dir.join(file_name))]
        .into_iter()
        .flatten()
        .find(|path| path.is_file())
}
