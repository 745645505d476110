use super::*;
use crate::disc::{DumpHardware, Extent};
use crate::media::MediaType;
use tempfile::TempDir;
use test_log::test;

const RAW: u64 = 2352;

fn setup(files: &[(&str, u64)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for &(name, len) in files {
        let file = fs::File::create(dir.path().join(name)).unwrap();
        file.set_len(len).unwrap();
    }
    dir
}

fn parse_in(dir: &TempDir, cue: &str) -> CdrWinResult<Disc> {
    parse(cue, dir.path(), &CdrWinConfig::default())
}

const SINGLE_AUDIO_CUE: &str = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
"#;

#[test]
fn single_audio_track() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let disc = parse_in(&dir, SINGLE_AUDIO_CUE).unwrap();

    assert_eq!(disc.tracks.len(), 1);
    let track = &disc.tracks[0];
    assert_eq!(track.sequence, 1);
    assert_eq!(track.track_type, TrackType::Audio);
    assert_eq!(track.sectors, 100);
    assert_eq!(track.pregap, 0);
    assert_eq!(track.file.offset, 0);
    assert_eq!(track.file.path, dir.path().join("audio.bin"));
    assert_eq!(track.file.file_len, 100 * RAW);

    assert_eq!(
        disc.sessions,
        vec![Session { sequence: 1, start_track: 1, end_track: 1, start_sector: 0, end_sector: 99 }]
    );
    assert_eq!(disc.media_type, MediaType::Cdda);
}

const MIXED_MODE_CUE: &str = r#"FILE "game.bin" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 00 00:10:00
    INDEX 01 00:12:00
"#;

#[test]
fn tracks_sharing_one_file() {
    let dir = setup(&[("game.bin", 1200 * RAW)]);
    let disc = parse_in(&dir, MIXED_MODE_CUE).unwrap();

    let [data, audio] = disc.tracks.as_slice() else {
        panic!("expected 2 tracks, got {:?}", disc.tracks);
    };

    assert_eq!(data.sectors, 750);
    assert_eq!(data.file.offset, 0);

    assert_eq!(audio.start_sector(), data.sectors);
    assert_eq!(audio.file.offset, 750 * RAW);
    assert_eq!(audio.sectors, 450);
    assert_eq!(audio.pregap, 150);
    assert_eq!(audio.indexes.get(0), Some(750));
    assert_eq!(audio.indexes.get(1), Some(900));

    assert_eq!(disc.sessions[0].end_sector, 1199);
    assert_eq!(disc.media_type, MediaType::CdRomXa);
}

const MULTI_FILE_CUE: &str = r#"FILE "track1.bin" BINARY
  TRACK 01 MODE2/2352
    INDEX 01 00:00:00
FILE "track2.bin" BINARY
  TRACK 02 AUDIO
    INDEX 00 00:00:00
    INDEX 01 00:02:00
"#;

#[test]
fn one_file_per_track() {
    let dir = setup(&[("track1.bin", 300 * RAW), ("track2.bin", 500 * RAW)]);
    let disc = parse_in(&dir, MULTI_FILE_CUE).unwrap();

    assert_eq!(disc.tracks.len(), 2);
    assert_eq!(disc.tracks[0].sectors, 300);
    assert_eq!(disc.tracks[0].file.path, dir.path().join("track1.bin"));
    assert_eq!(disc.tracks[1].sectors, 500);
    assert_eq!(disc.tracks[1].pregap, 150);
    assert_eq!(disc.tracks[1].file.offset, 0);
    assert_eq!(disc.tracks[1].file.path, dir.path().join("track2.bin"));
    assert_eq!(disc.total_sectors(), 800);
}

#[test]
fn first_track_offset_follows_first_index() {
    let dir = setup(&[("data.bin", 300 * 2048)]);
    let cue = r#"FILE "data.bin" BINARY
  TRACK 01 MODE1/2048
    INDEX 01 00:02:00
"#;
    let disc = parse_in(&dir, cue).unwrap();

    assert_eq!(disc.tracks[0].file.offset, 150 * 2048);
    assert_eq!(disc.tracks[0].sectors, 150);
    assert_eq!(disc.media_type, MediaType::CdRom);
}

#[test]
fn tracks_out_of_order() {
    let cue = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
  TRACK 03 AUDIO
    INDEX 01 00:10:00
"#;
    let dir = setup(&[]);
    let err = parse_in(&dir, cue).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 4, .. }), "{err}");

    let cue = "FILE \"audio.bin\" BINARY\n  TRACK 02 AUDIO\n    INDEX 01 00:00:00\n";
    let err = parse_in(&dir, cue).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 2, .. }), "{err}");
}

#[test]
fn no_tracks() {
    let dir = setup(&[("audio.bin", RAW)]);
    let err = parse_in(&dir, "REM nothing here\nFILE \"audio.bin\" BINARY\n").unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { .. }), "{err}");
}

#[test]
fn unsupported_file_types() {
    let dir = setup(&[("audio.wav", RAW)]);

    let err = parse_in(&dir, "FILE \"audio.wav\" WAVE\nTRACK 01 AUDIO\nINDEX 01 00:00:00\n")
        .unwrap_err();
    assert!(
        matches!(
            &err,
            CdrWinError::UnsupportedFileType { line: 1, file_type } if file_type == "WAVE"
        ),
        "{err}"
    );

    let err = parse_in(&dir, "FILE \"audio.wav\" FLAC\nTRACK 01 AUDIO\nINDEX 01 00:00:00\n")
        .unwrap_err();
    assert!(matches!(err, CdrWinError::UnsupportedFileType { line: 1, .. }), "{err}");
}

#[test]
fn missing_track_file() {
    let dir = setup(&[]);
    let err = parse_in(&dir, SINGLE_AUDIO_CUE).unwrap_err();
    assert!(
        matches!(&err, CdrWinError::FileNotFound { line: 1, path } if path == "audio.bin"),
        "{err}"
    );
}

#[test]
fn file_name_fallback() {
    let dir = setup(&[("game.bin", 10 * RAW)]);
    let cue = r#"FILE "C:\rips\game.bin" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
"#;
    let disc = parse_in(&dir, cue).unwrap();
    assert_eq!(disc.tracks[0].file.path, dir.path().join("game.bin"));
}

#[test]
fn index_ordering() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);

    let index1_before_index0 = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 00 00:00:10
    INDEX 01 00:00:05
"#;
    let err = parse_in(&dir, index1_before_index0).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 4, .. }), "{err}");

    let index0_after_index1 = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
    INDEX 00 00:00:00
"#;
    let err = parse_in(&dir, index0_after_index1).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 4, .. }), "{err}");

    let index2_first = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 02 00:00:00
"#;
    let err = parse_in(&dir, index2_first).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 3, .. }), "{err}");

    let extra_indexes = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
    INDEX 02 00:00:30
    INDEX 03 00:01:00
"#;
    let disc = parse_in(&dir, extra_indexes).unwrap();
    assert_eq!(disc.tracks[0].indexes.len(), 3);
    assert_eq!(disc.tracks[0].indexes.get(3), Some(75));
}

#[test]
fn track_starting_before_previous_track() {
    let dir = setup(&[("audio.bin", 1000 * RAW)]);
    let cue = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:05:00
  TRACK 02 AUDIO
    INDEX 01 00:04:00
"#;
    let err = parse_in(&dir, cue).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 5, .. }), "{err}");
}

#[test]
fn track_fields() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = r#"TITLE "Disc Title"
PERFORMER "Disc Performer"
CATALOG 0724384260125
UPC_EAN 724384260125
DISC_ID 8A0B6C0D
FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    TITLE "Track Title"
    SONGWRITER Someone
    FLAGS DCP
    FLAGS PRE
    ISRC USRC17607839
    PREGAP 00:02:00
    POSTGAP 00:01:00
    INDEX 01 00:00:00
"#;
    let disc = parse_in(&dir, cue).unwrap();

    assert_eq!(disc.cd_text.title.as_deref(), Some("Disc Title"));
    assert_eq!(disc.cd_text.performer.as_deref(), Some("Disc Performer"));
    assert_eq!(disc.mcn.as_deref(), Some("0724384260125"));
    assert_eq!(disc.barcode.as_deref(), Some("724384260125"));
    assert_eq!(disc.disc_id.as_deref(), Some("8A0B6C0D"));

    let track = &disc.tracks[0];
    assert_eq!(track.cd_text.title.as_deref(), Some("Track Title"));
    assert_eq!(track.cd_text.songwriter.as_deref(), Some("Someone"));
    assert_eq!(track.cd_text.performer, None);
    assert!(track.flags.digital_copy_permitted);
    assert!(track.flags.pre_emphasis);
    assert!(!track.flags.four_channel);
    assert_eq!(track.isrc.as_deref(), Some("USRC17607839"));
    assert_eq!(track.pregap, 150);
    assert_eq!(track.postgap, 75);
}

#[test]
fn scope_violations() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);

    let catalog_in_track = r#"FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    CATALOG 0724384260125
    INDEX 01 00:00:00
"#;
    let err = parse_in(&dir, catalog_in_track).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 3, .. }), "{err}");

    let isrc_outside_track = r#"ISRC USRC17607839
FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
"#;
    let err = parse_in(&dir, isrc_outside_track).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 1, .. }), "{err}");

    let track_before_file = "TRACK 01 AUDIO\nINDEX 01 00:00:00\n";
    let err = parse_in(&dir, track_before_file).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 1, .. }), "{err}");
}

#[test]
fn unknown_directive() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = format!("{SINGLE_AUDIO_CUE}\n\nWHATEVER 1 2\n");
    let err = parse_in(&dir, &cue).unwrap_err();
    assert!(
        matches!(
            &err,
            CdrWinError::UnsupportedDirective { line: 6, text } if text == "WHATEVER 1 2"
        ),
        "{err}"
    );
}

#[test]
fn unknown_track_flag() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = "FILE \"audio.bin\" BINARY\n  TRACK 01 AUDIO\n    FLAGS DCP DATA\n";
    let err = parse_in(&dir, cue).unwrap_err();
    assert!(
        matches!(
            &err,
            CdrWinError::UnsupportedDirective { line: 3, text } if text == "FLAGS DCP DATA"
        ),
        "{err}"
    );
}

#[test]
fn trailing_file_without_tracks() {
    let dir = setup(&[("audio.bin", 100 * RAW), ("extra.bin", RAW)]);
    let cue = format!("{SINGLE_AUDIO_CUE}FILE \"extra.bin\" BINARY\n");
    let err = parse_in(&dir, &cue).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 4, .. }), "{err}");
}

#[test]
fn disc_hash_block() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = format!(
        "REM DISC HASHES\n\
         REM CRC32 : DEADBEEF\n\
         REM MD5 : 0123456789ABCDEF0123456789ABCDEF\n\
         REM dumped on a rainy day\n\
         {SINGLE_AUDIO_CUE}"
    );
    let disc = parse_in(&dir, &cue).unwrap();

    assert_eq!(disc.hashes.get("crc32").map(String::as_str), Some("deadbeef"));
    assert_eq!(
        disc.hashes.get("md5").map(String::as_str),
        Some("0123456789abcdef0123456789abcdef")
    );
    assert_eq!(disc.hashes.get("sha1"), None);
    assert_eq!(disc.comment, "dumped on a rainy day");
}

#[test]
fn hash_lines_outside_block_are_comments() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = format!("REM CRC32 : DEADBEEF\nREM second comment\n{SINGLE_AUDIO_CUE}");
    let disc = parse_in(&dir, &cue).unwrap();

    assert!(disc.hashes.is_empty());
    assert_eq!(disc.comment, "CRC32 : DEADBEEF\nsecond comment");
}

#[test]
fn track_hash_block() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = format!(
        "REM Gap Append Method: Track [v1.0] HASHES\n\
         REM Trk 01 : 0123abcd\n\
         REM Gap 01 : 0123456789abcdef0123456789abcdef01234567\n\
         REM Trk 01 : 0123\n\
         {SINGLE_AUDIO_CUE}"
    );
    let disc = parse_in(&dir, &cue).unwrap();

    assert!(disc.is_trurip);
    assert!(disc.comment.is_empty());
}

#[test]
fn dump_extents_merge() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = format!(
        "REM METADATA DUMP EXTENT: Aaru | 5.3 | Linux | PLEXTOR | PX-760A | 1.07 | 123 | 1000:1999\n\
         REM METADATA DUMP EXTENT: Aaru | 5.3 | Linux | PLEXTOR | PX-760A | 1.07 | 123 | 0:999\n\
         REM METADATA DUMP EXTENT: Aaru | 5.3 | Linux | ASUS | BW-16D1HT | 3.10 | 456 | 2000:2999\n\
         {SINGLE_AUDIO_CUE}"
    );
    let disc = parse_in(&dir, &cue).unwrap();

    assert_eq!(
        disc.dump_hardware,
        vec![
            DumpHardware {
                manufacturer: "PLEXTOR".into(),
                model: "PX-760A".into(),
                firmware: "1.07".into(),
                serial: "123".into(),
                software_name: "Aaru".into(),
                software_version: "5.3".into(),
                software_os: "Linux".into(),
                extents: vec![Extent { start: 0, end: 999 }, Extent { start: 1000, end: 1999 }],
            },
            DumpHardware {
                manufacturer: "ASUS".into(),
                model: "BW-16D1HT".into(),
                firmware: "3.10".into(),
                serial: "456".into(),
                software_name: "Aaru".into(),
                software_version: "5.3".into(),
                software_os: "Linux".into(),
                extents: vec![Extent { start: 2000, end: 2999 }],
            },
        ]
    );
}

#[test]
fn media_type_hints() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);

    let dic_hint = format!("REM METADATA DIC MEDIA-TYPE: CDROM\n{SINGLE_AUDIO_CUE}");
    assert_eq!(parse_in(&dir, &dic_hint).unwrap().media_type, MediaType::CdRom);

    let both_hints = format!(
        "REM ORIGINAL MEDIA-TYPE: DVD\nREM METADATA DIC MEDIA-TYPE: CDROM\n{SINGLE_AUDIO_CUE}"
    );
    assert_eq!(parse_in(&dir, &both_hints).unwrap().media_type, MediaType::CdRom);

    let isobuster_hint = format!("REM ORIGINAL MEDIA-TYPE: CD-RW\n{SINGLE_AUDIO_CUE}");
    let disc = parse_in(&dir, &isobuster_hint).unwrap();
    assert_eq!(disc.media_type, MediaType::CdRw);
    assert_eq!(disc.original_media_type.as_deref(), Some("CD-RW"));

    let generic_hint = format!("REM ORIGINAL MEDIA-TYPE: CD\n{SINGLE_AUDIO_CUE}");
    assert_eq!(parse_in(&dir, &generic_hint).unwrap().media_type, MediaType::Cdda);

    let config = CdrWinConfig { classify_generic_hint: false, ..CdrWinConfig::default() };
    assert_eq!(parse(&generic_hint, dir.path(), &config).unwrap().media_type, MediaType::Cd);

    let unknown_dic_hint = format!("REM METADATA DIC MEDIA-TYPE: FLOPPY\n{SINGLE_AUDIO_CUE}");
    assert_eq!(parse_in(&dir, &unknown_dic_hint).unwrap().media_type, MediaType::Cdda);
}

const MULTI_SESSION_CUE: &str = r#"REM SESSION 01
FILE "audio.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
REM SESSION 02
FILE "data.bin" BINARY
  TRACK 02 MODE2/2352
    INDEX 01 00:00:00
"#;

#[test]
fn multiple_sessions() {
    let dir = setup(&[("audio.bin", 100 * RAW), ("data.bin", 50 * RAW)]);
    let disc = parse_in(&dir, MULTI_SESSION_CUE).unwrap();

    assert_eq!(
        disc.sessions,
        vec![
            Session { sequence: 1, start_track: 1, end_track: 1, start_sector: 0, end_sector: 99 },
            Session {
                sequence: 2,
                start_track: 2,
                end_track: 2,
                start_sector: 100,
                end_sector: 149
            },
        ]
    );
    assert_eq!(disc.tracks[0].session, 1);
    assert_eq!(disc.tracks[1].session, 2);
    assert_eq!(disc.media_type, MediaType::CdPlus);
}

#[test]
fn session_numbering() {
    let dir = setup(&[("audio.bin", 100 * RAW), ("data.bin", 50 * RAW)]);

    let skipped = MULTI_SESSION_CUE.replace("REM SESSION 02", "REM SESSION 03");
    let err = parse_in(&dir, &skipped).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 5, .. }), "{err}");

    let empty = format!("REM SESSION 01\nREM SESSION 02\n{SINGLE_AUDIO_CUE}");
    let err = parse_in(&dir, &empty).unwrap_err();
    assert!(matches!(err, CdrWinError::FormatViolation { line: 2, .. }), "{err}");
}

#[test]
fn ripping_tool_remarks() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue = format!(
        "REM Ripping Tool: Exact Audio Copy\n\
         REM Ripping Tool Version: 1.6\n\
         REM LEAD-OUT 00:01:25\n\
         {SINGLE_AUDIO_CUE}"
    );
    let disc = parse_in(&dir, &cue).unwrap();

    assert_eq!(disc.application.as_deref(), Some("Exact Audio Copy"));
    assert_eq!(disc.application_version.as_deref(), Some("1.6"));
    assert!(disc.comment.is_empty());
}

#[test]
fn parse_from_path() {
    let dir = setup(&[("audio.bin", 100 * RAW)]);
    let cue_path = dir.path().join("audio.cue");
    fs::write(&cue_path, format!("\u{feff}{SINGLE_AUDIO_CUE}")).unwrap();

    let disc = parse_file(&cue_path, &CdrWinConfig::default()).unwrap();
    assert_eq!(disc.tracks[0].sectors, 100);

    let err = parse_file(&dir.path().join("missing.cue"), &CdrWinConfig::default()).unwrap_err();
    assert!(matches!(err, CdrWinError::CueOpen { .. }), "{err}");
}
