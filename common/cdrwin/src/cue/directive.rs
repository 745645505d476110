//! Tokenizer that turns one cue sheet line into a [`Directive`]

use crate::cdtime::CdTime;
use crate::disc::{DumpHardware, Extent, TrackFlags};
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Title,
    Performer,
    Songwriter,
    Composer,
    Genre,
    Arranger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Crc32,
    Md5,
    Sha1,
}

impl HashAlgorithm {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "CRC32" => Some(Self::Crc32),
            "MD5" => Some(Self::Md5),
            "SHA1" => Some(Self::Sha1),
            _ => None,
        }
    }

    fn from_digest_len(len: usize) -> Option<Self> {
        match len {
            8 => Some(Self::Crc32),
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            _ => None,
        }
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Crc32 => "crc32",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashTarget {
    Track,
    Gap,
}

/// Everything that can follow `REM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remark<'a> {
    OriginalMediaType(&'a str),
    DicMediaType(&'a str),
    DumpExtent(DumpHardware),
    DiscHashes,
    DiscHash { algorithm: HashAlgorithm, digest: &'a str },
    TrackHashMethod { method: &'a str, version: &'a str },
    TrackHash { target: HashTarget, number: u8, algorithm: Option<HashAlgorithm>, digest: &'a str },
    LeadOut(CdTime),
    MsfLba { time: CdTime, lba: u32 },
    Application(&'a str),
    ApplicationVersion(&'a str),
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    Session(u8),
    File { path: String, file_type: &'a str },
    Track { number: u32, track_type: &'a str },
    Index { number: u8, time: CdTime },
    Pregap(CdTime),
    Postgap(CdTime),
    Flags(TrackFlags),
    Isrc(&'a str),
    Catalog(&'a str),
    CdTextFile(String),
    DiscId(&'a str),
    Barcode(&'a str),
    Text(TextField, String),
    /// `text` is everything after `REM`
    Remark { remark: Remark<'a>, text: &'a str },
}

impl Directive<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session(_) => "SESSION",
            Self::File { .. } => "FILE",
            Self::Track { .. } => "TRACK",
            Self::Index { .. } => "INDEX",
            Self::Pregap(_) => "PREGAP",
            Self::Postgap(_) => "POSTGAP",
            Self::Flags(_) => "FLAGS",
            Self::Isrc(_) => "ISRC",
            Self::Catalog(_) => "CATALOG",
            Self::CdTextFile(_) => "CDTEXTFILE",
            Self::DiscId(_) => "DISC_ID",
            Self::Barcode(_) => "UPC_EAN",
            Self::Text(field, _) => match field {
                TextField::Title => "TITLE",
                TextField::Performer => "PERFORMER",
                TextField::Songwriter => "SONGWRITER",
                TextField::Composer => "COMPOSER",
                TextField::Genre => "GENRE",
                TextField::Arranger => "ARRANGER",
            },
            Self::Remark { .. } => "REM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// Unknown keyword, or arguments that do not fit the keyword's grammar
    Unsupported,
    /// Arguments that fit the grammar but carry invalid values
    Malformed(String),
}

impl Display for DirectiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported directive"),
            Self::Malformed(message) => write!(f, "{message}"),
        }
    }
}

type DirectiveResult<T> = Result<T, DirectiveError>;

/// Splits `s` at the first run of whitespace.
fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn words(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn parse_time(s: &str) -> DirectiveResult<CdTime> {
    s.parse().map_err(DirectiveError::Malformed)
}

fn parse_number<T: std::str::FromStr>(s: &str) -> DirectiveResult<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DirectiveError::Unsupported);
    }
    s.parse().map_err(|_| DirectiveError::Malformed(format!("number out of range: {s}")))
}

fn single_arg(args: &str) -> DirectiveResult<&str> {
    match words(args).as_slice() {
        [arg] => Ok(arg),
        _ => Err(DirectiveError::Unsupported),
    }
}

fn non_empty(args: &str) -> DirectiveResult<&str> {
    if args.is_empty() { Err(DirectiveError::Unsupported) } else { Ok(args) }
}

impl<'a> Directive<'a> {
    /// Parses one line. Blank lines produce `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyword is not recognized or its arguments do not parse.
    pub fn parse(line: &'a str) -> DirectiveResult<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (keyword, args) = split_word(line);
        let directive = match keyword.to_ascii_uppercase().as_str() {
            "REM" => parse_remark(args)?,
            "SESSION" => Self::Session(parse_session(single_arg(args)?)?),
            "FILE" => parse_file(args)?,
            "TRACK" => match words(args).as_slice() {
                [number, track_type] => Self::Track { number: parse_number(number)?, track_type },
                _ => return Err(DirectiveError::Unsupported),
            },
            "INDEX" => match words(args).as_slice() {
                [number, time] => {
                    let number: u8 = parse_number(number)?;
                    if number > 99 {
                        return Err(DirectiveError::Malformed(format!(
                            "index number out of range: {number}"
                        )));
                    }
                    Self::Index { number, time: parse_time(time)? }
                }
                _ => return Err(DirectiveError::Unsupported),
            },
            "PREGAP" => Self::Pregap(parse_time(single_arg(args)?)?),
            "POSTGAP" => Self::Postgap(parse_time(single_arg(args)?)?),
            "FLAGS" => Self::Flags(parse_flags(args)?),
            "ISRC" => {
                let isrc = single_arg(args)?;
                if isrc.len() != 12 || !isrc.bytes().all(|b| b.is_ascii_alphanumeric()) {
                    return Err(DirectiveError::Malformed(format!("invalid ISRC: {isrc}")));
                }
                Self::Isrc(isrc)
            }
            "CATALOG" => {
                let mcn = single_arg(args)?;
                if mcn.len() != 13 || !mcn.bytes().all(|b| b.is_ascii_graphic()) {
                    return Err(DirectiveError::Malformed(format!("invalid catalog number: {mcn}")));
                }
                Self::Catalog(mcn)
            }
            "CDTEXTFILE" => Self::CdTextFile(unquote(non_empty(args)?).into()),
            "DISC_ID" => Self::DiscId(single_arg(args)?),
            "UPC_EAN" => {
                let barcode = single_arg(args)?;
                let digits = barcode.bytes().all(|b| b.is_ascii_digit());
                if !(12..=13).contains(&barcode.len()) || !digits {
                    return Err(DirectiveError::Malformed(format!("invalid barcode: {barcode}")));
                }
                Self::Barcode(barcode)
            }
            "TITLE" => Self::Text(TextField::Title, unquote(non_empty(args)?).into()),
            "PERFORMER" => Self::Text(TextField::Performer, unquote(non_empty(args)?).into()),
            "SONGWRITER" => Self::Text(TextField::Songwriter, unquote(non_empty(args)?).into()),
            "COMPOSER" => Self::Text(TextField::Composer, unquote(non_empty(args)?).into()),
            "GENRE" => Self::Text(TextField::Genre, unquote(non_empty(args)?).into()),
            "ARRANGER" => Self::Text(TextField::Arranger, unquote(non_empty(args)?).into()),
            _ => return Err(DirectiveError::Unsupported),
        };

        Ok(Some(directive))
    }
}

fn parse_session(number: &str) -> DirectiveResult<u8> {
    let number: u8 = parse_number(number)?;
    if number == 0 {
        return Err(DirectiveError::Malformed("session numbers start at 1".into()));
    }
    Ok(number)
}

fn parse_file(args: &str) -> DirectiveResult<Directive<'_>> {
    let (path, file_type) = if let Some(quoted) = args.strip_prefix('"') {
        let (path, rest) = quoted.split_once('"').ok_or(DirectiveError::Unsupported)?;
        (path, rest.trim())
    } else {
        args.rsplit_once(char::is_whitespace)
            .map(|(path, file_type)| (path.trim(), file_type))
            .ok_or(DirectiveError::Unsupported)?
    };

    if path.is_empty() || file_type.is_empty() || file_type.contains(char::is_whitespace) {
        return Err(DirectiveError::Unsupported);
    }

    Ok(Directive::File { path: path.into(), file_type })
}

fn parse_flags(args: &str) -> DirectiveResult<TrackFlags> {
    let flags = words(args);
    if flags.is_empty() {
        return Err(DirectiveError::Unsupported);
    }

    let mut parsed = TrackFlags::default();
    for flag in flags {
        match flag {
            "DCP" => parsed.digital_copy_permitted = true,
            "4CH" => parsed.four_channel = true,
            "PRE" => parsed.pre_emphasis = true,
            "SCMS" => parsed.scms = true,
            _ => return Err(DirectiveError::Unsupported),
        }
    }

    Ok(parsed)
}

#[allow(clippy::items_after_statements)]
fn parse_remark(text: &str) -> DirectiveResult<Directive<'_>> {
    static SESSION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^SESSION\s+(\d+)$").unwrap());
    static ORIGINAL_MEDIA_TYPE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^ORIGINAL MEDIA-TYPE:\s*(.+)$").unwrap());
    static DIC_MEDIA_TYPE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^METADATA DIC MEDIA-TYPE:\s*(.+)$").unwrap());
    static DUMP_EXTENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^METADATA DUMP EXTENT:\s*(.+)$").unwrap());
    static DISC_HASHES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^DISC\s+HASHES$").unwrap());
    static DISC_HASH_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(CRC32|MD5|SHA1)\s*:\s*([0-9A-Fa-f]+)$").unwrap());
    static TRACK_HASH_METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^Gap\s+Append\s+Method:\s*(\S+)\s+\[(.+)\]\s+HASHES$").unwrap()
    });
    static TRACK_HASH_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(Trk|Gap)\s+(\d{2})\s*:\s*([0-9A-Fa-f]+)$").unwrap());
    static LEAD_OUT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^LEAD-OUT\s+(\d+:\d+:\d+)$").unwrap());
    static MSF_LBA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^MSF:\s*(\d+:\d+:\d+)\s*=\s*LBA:\s*(\d+)$").unwrap());
    static APPLICATION_VERSION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^Ripping Tool Version:\s*(.+)$").unwrap());
    static APPLICATION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^Ripping Tool:\s*(.+)$").unwrap());

    let capture = |re: &Regex| -> Option<Vec<&str>> {
        re.captures(text).map(|captures| {
            captures.iter().skip(1).map(|group| group.map_or("", |m| m.as_str())).collect()
        })
    };

    if let Some(groups) = capture(&SESSION_RE) {
        return Ok(Directive::Session(parse_session(groups[0])?));
    }

    let remark = if let Some(groups) = capture(&ORIGINAL_MEDIA_TYPE_RE) {
        Remark::OriginalMediaType(groups[0].trim())
    } else if let Some(groups) = capture(&DIC_MEDIA_TYPE_RE) {
        Remark::DicMediaType(groups[0].trim())
    } else if let Some(groups) = capture(&DUMP_EXTENT_RE) {
        Remark::DumpExtent(parse_dump_extent(groups[0])?)
    } else if DISC_HASHES_RE.is_match(text) {
        Remark::DiscHashes
    } else if let Some(groups) = capture(&DISC_HASH_RE) {
        let algorithm = HashAlgorithm::from_name(groups[0]).ok_or(DirectiveError::Unsupported)?;
        if HashAlgorithm::from_digest_len(groups[1].len()) == Some(algorithm) {
            Remark::DiscHash { algorithm, digest: groups[1] }
        } else {
            // Wrong digest length for the algorithm; keep the line as a plain comment
            Remark::Comment
        }
    } else if let Some(groups) = capture(&TRACK_HASH_METHOD_RE) {
        Remark::TrackHashMethod { method: groups[0], version: groups[1] }
    } else if let Some(groups) = capture(&TRACK_HASH_RE) {
        let target = if groups[0] == "Trk" { HashTarget::Track } else { HashTarget::Gap };
        Remark::TrackHash {
            target,
            number: parse_number(groups[1])?,
            algorithm: HashAlgorithm::from_digest_len(groups[2].len()),
            digest: groups[2],
        }
    } else if let Some(groups) = capture(&LEAD_OUT_RE) {
        Remark::LeadOut(parse_time(groups[0])?)
    } else if let Some(groups) = capture(&MSF_LBA_RE) {
        Remark::MsfLba { time: parse_time(groups[0])?, lba: parse_number(groups[1])? }
    } else if let Some(groups) = capture(&APPLICATION_VERSION_RE) {
        Remark::ApplicationVersion(groups[0].trim())
    } else if let Some(groups) = capture(&APPLICATION_RE) {
        Remark::Application(groups[0].trim())
    } else {
        Remark::Comment
    };

    Ok(Directive::Remark { remark, text })
}

/// `application | version | os | manufacturer | model | firmware | serial | start:end`
fn parse_dump_extent(fields: &str) -> DirectiveResult<DumpHardware> {
    let fields: Vec<&str> = fields.split('|').map(str::trim).collect();
    let [application, version, os, manufacturer, model, firmware, serial, extent] =
        fields.as_slice()
    else {
        return Err(DirectiveError::Malformed(format!(
            "expected 8 '|'-separated dump extent fields, found {}",
            fields.len()
        )));
    };

    let (start, end) = extent
        .split_once(':')
        .ok_or_else(|| DirectiveError::Malformed(format!("invalid dump extent: {extent}")))?;
    let start: u64 = parse_number(start)?;
    let end: u64 = parse_number(end)?;
    if end < start {
        return Err(DirectiveError::Malformed(format!(
            "dump extent ends before it starts: {extent}"
        )));
    }

    Ok(DumpHardware {
        manufacturer: (*manufacturer).into(),
        model: (*model).into(),
        firmware: (*firmware).into(),
        serial: (*serial).into(),
        software_name: (*application).into(),
        software_version: (*version).into(),
        software_os: (*os).into(),
        extents: vec![Extent { start, end }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_lines() {
        assert_eq!(
            Directive::parse("FILE \"Some Game (Track 01).bin\" BINARY"),
            Ok(Some(Directive::File {
                path: "Some Game (Track 01).bin".into(),
                file_type: "BINARY"
            }))
        );
        assert_eq!(
            Directive::parse("  FILE game.bin MOTOROLA"),
            Ok(Some(Directive::File { path: "game.bin".into(), file_type: "MOTOROLA" }))
        );
        assert_eq!(Directive::parse("FILE \"game.bin\""), Err(DirectiveError::Unsupported));
    }

    #[test]
    fn track_and_index_lines() {
        assert_eq!(
            Directive::parse("  TRACK 01 MODE1/2352"),
            Ok(Some(Directive::Track { number: 1, track_type: "MODE1/2352" }))
        );
        assert_eq!(
            Directive::parse("    INDEX 01 13:10:11"),
            Ok(Some(Directive::Index { number: 1, time: CdTime::new(13, 10, 11) }))
        );
        assert_eq!(Directive::parse("TRACK 01"), Err(DirectiveError::Unsupported));
        for line in ["INDEX 01 00:61:00", "INDEX 100 00:00:00"] {
            assert!(matches!(Directive::parse(line), Err(DirectiveError::Malformed(_))), "{line}");
        }
    }

    #[test]
    fn flags() {
        assert_eq!(
            Directive::parse("FLAGS DCP PRE"),
            Ok(Some(Directive::Flags(TrackFlags {
                digital_copy_permitted: true,
                pre_emphasis: true,
                four_channel: false,
                scms: false,
            })))
        );
        assert!(matches!(Directive::parse("FLAGS DATA"), Err(DirectiveError::Unsupported)));
        assert!(matches!(Directive::parse("FLAGS DCP DATA"), Err(DirectiveError::Unsupported)));
    }

    #[test]
    fn text_fields_are_unquoted() {
        assert_eq!(
            Directive::parse("TITLE \"Standard Space\""),
            Ok(Some(Directive::Text(TextField::Title, "Standard Space".into())))
        );
        assert_eq!(
            Directive::parse("PERFORMER Somebody Else"),
            Ok(Some(Directive::Text(TextField::Performer, "Somebody Else".into())))
        );
    }

    #[test]
    fn remarks() {
        let remark = |line| match Directive::parse(line) {
            Ok(Some(Directive::Remark { remark, .. })) => remark,
            other => panic!("expected remark, got {other:?}"),
        };

        assert_eq!(remark("REM ORIGINAL MEDIA-TYPE: CD"), Remark::OriginalMediaType("CD"));
        assert_eq!(remark("REM METADATA DIC MEDIA-TYPE: CDROMXA"), Remark::DicMediaType("CDROMXA"));
        assert_eq!(remark("REM DISC HASHES"), Remark::DiscHashes);
        assert_eq!(
            remark("REM CRC32 : DEADBEEF"),
            Remark::DiscHash { algorithm: HashAlgorithm::Crc32, digest: "DEADBEEF" }
        );
        assert_eq!(remark("REM CRC32 : DEADBEEF00"), Remark::Comment);
        assert_eq!(
            remark("REM Gap Append Method: Track [v1.0] HASHES"),
            Remark::TrackHashMethod { method: "Track", version: "v1.0" }
        );
        assert_eq!(
            remark("REM Trk 02 : 0123abcd"),
            Remark::TrackHash {
                target: HashTarget::Track,
                number: 2,
                algorithm: Some(HashAlgorithm::Crc32),
                digest: "0123abcd"
            }
        );
        assert_eq!(remark("REM LEAD-OUT 70:00:00"), Remark::LeadOut(CdTime::new(70, 0, 0)));
        assert_eq!(remark("REM Ripping Tool: EAC"), Remark::Application("EAC"));
        assert_eq!(remark("REM Ripping Tool Version: 1.6"), Remark::ApplicationVersion("1.6"));
        assert_eq!(remark("REM just a note"), Remark::Comment);
        assert_eq!(Directive::parse("REM SESSION 02"), Ok(Some(Directive::Session(2))));
    }

    #[test]
    fn dump_extent() {
        let line = "REM METADATA DUMP EXTENT: \
                    Aaru | 5.0 | Linux | PLEXTOR | DVDR PX-716A | 1.11 | 1234 | 0:3999";
        let Ok(Some(Directive::Remark { remark: Remark::DumpExtent(dump), .. })) =
            Directive::parse(line)
        else {
            panic!("dump extent did not parse");
        };

        assert_eq!(dump.manufacturer, "PLEXTOR");
        assert_eq!(dump.model, "DVDR PX-716A");
        assert_eq!(dump.software_name, "Aaru");
        assert_eq!(dump.software_os, "Linux");
        assert_eq!(dump.extents, vec![Extent { start: 0, end: 3999 }]);

        assert!(matches!(
            Directive::parse("REM METADATA DUMP EXTENT: Aaru | 5.0 | 0:10"),
            Err(DirectiveError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_keywords() {
        assert_eq!(Directive::parse(""), Ok(None));
        assert_eq!(Directive::parse("   "), Ok(None));
        assert_eq!(Directive::parse("BOGUS 1 2 3"), Err(DirectiveError::Unsupported));
    }
}
