use anyhow::{Context, anyhow};
use cdrwin::{CdrWinConfig, CdrWinImage, FileHandleMode, MediaTag, SectorTag};
use clap::{Parser, Subcommand};
use crc::Crc;
use env_logger::Env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

const HASH_CHUNK_SECTORS: u64 = 1024;

#[derive(Parser)]
struct Args {
    /// Open a fresh handle on the track file for every read instead of caching one per file
    #[arg(long, global = true, default_value_t)]
    per_read_handles: bool,

    /// Read buffer capacity in bytes for each track file handle
    #[arg(long, global = true, default_value_t = CdrWinConfig::DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print disc metadata, sessions, and track geometry
    Info {
        /// Cue sheet path
        cue_path: PathBuf,
    },
    /// Read sectors and hex dump them or write them to a file
    Read {
        /// Cue sheet path
        cue_path: PathBuf,

        /// First sector; absolute unless --track is set, in which case it is relative to the track
        #[arg(long)]
        sector: u64,

        /// Number of sectors to read
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Read relative to the start of this track
        #[arg(long)]
        track: Option<u32>,

        /// Read whole stored sectors instead of user data
        #[arg(long, default_value_t, conflicts_with = "tag")]
        long: bool,

        /// Read a single sector tag instead of user data
        #[arg(long)]
        tag: Option<SectorTag>,

        /// Read a disc-level tag; all sector options are ignored
        #[arg(long, conflicts_with_all = ["long", "tag"])]
        disk_tag: Option<MediaTag>,

        /// Write the bytes to this file instead of hex dumping them
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Compute CRC-32 checksums over the long sectors of every track
    Hash {
        /// Cue sheet path
        cue_path: PathBuf,
    },
}

impl Args {
    fn config(&self) -> CdrWinConfig {
        CdrWinConfig {
            file_handles: if self.per_read_handles {
                FileHandleMode::PerRead
            } else {
                FileHandleMode::Cached
            },
            buffer_capacity: self.buffer_capacity,
            ..CdrWinConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config();

    match args.command {
        Command::Info { cue_path } => {
            print_info(&open_image(&cue_path, &config)?);
            Ok(())
        }
        Command::Read { cue_path, sector, count, track, long, tag, disk_tag, output } => {
            let mut image = open_image(&cue_path, &config)?;
            let bytes = match (disk_tag, track) {
                (Some(disk_tag), _) => image.read_disk_tag(disk_tag)?,
                (None, Some(track)) => match tag {
                    Some(tag) => image.read_sectors_tagged_in_track(sector, count, track, tag)?,
                    None if long => image.read_sectors_long_in_track(sector, count, track)?,
                    None => image.read_sectors_in_track(sector, count, track)?,
                },
                (None, None) => match tag {
                    Some(tag) => image.read_sectors_tagged(sector, count, tag)?,
                    None if long => image.read_sectors_long(sector, count)?,
                    None => image.read_sectors(sector, count)?,
                },
            };

            match output {
                Some(output) => fs::write(&output, &bytes)
                    .with_context(|| format!("Error writing to '{}'", output.display()))?,
                None => hex_dump(&bytes)?,
            }

            Ok(())
        }
        Command::Hash { cue_path } => hash_tracks(&mut open_image(&cue_path, &config)?),
    }
}

fn open_image(cue_path: &Path, config: &CdrWinConfig) -> anyhow::Result<CdrWinImage> {
    CdrWinImage::open_with_config(cue_path, config)
        .with_context(|| format!("Error opening cue sheet '{}'", cue_path.display()))
}

fn print_info(image: &CdrWinImage) {
    let info = image.info();
    let disc = image.disc();

    println!("Media type: {}", info.media_type);
    println!("Sectors: {}", info.sectors);
    println!("Image size: {} bytes", info.image_size);
    println!("Sector size: {}", info.sector_size);
    match &info.application_version {
        Some(version) => println!("Application: {} {version}", info.application),
        None => println!("Application: {}", info.application),
    }
    if let Some(title) = &info.media_title {
        println!("Title: {title}");
    }
    if let Some(mcn) = &info.media_serial_number {
        println!("MCN: {mcn}");
    }
    if let Some(barcode) = &info.media_barcode {
        println!("Barcode: {barcode}");
    }
    for (algorithm, digest) in &disc.hashes {
        println!("{algorithm}: {digest}");
    }
    for dump_hardware in &disc.dump_hardware {
        println!(
            "Dumped with {} {} ({} {}), {} extent(s)",
            dump_hardware.software_name,
            dump_hardware.software_version,
            dump_hardware.manufacturer,
            dump_hardware.model,
            dump_hardware.extents.len()
        );
    }
    if let Some(comments) = &info.comments {
        println!("Comments:\n{comments}");
    }

    for session in &disc.sessions {
        println!(
            "Session {}: tracks {}-{}, sectors {}-{}",
            session.sequence,
            session.start_track,
            session.end_track,
            session.start_sector,
            session.end_sector
        );
    }

    for track in image.tracks() {
        println!(
            "  Track {:02} {:<12} sectors {}-{} pregap {} ({} bytes/sector) in '{}' at offset {}",
            track.sequence,
            track.track_type.to_string(),
            track.start_sector,
            track.end_sector,
            track.pregap,
            track.raw_bytes_per_sector,
            track.file_path.display(),
            track.file_offset
        );
    }
}

fn hex_dump(bytes: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for (i, row) in bytes.chunks(16).enumerate() {
        write!(stdout, "{:08X} ", i * 16)?;
        for byte in row {
            write!(stdout, " {byte:02X}")?;
        }
        for _ in row.len()..16 {
            write!(stdout, "   ")?;
        }

        let ascii: String = row
            .iter()
            .map(|&byte| if byte.is_ascii_graphic() || byte == b' ' { byte as char } else { '.' })
            .collect();
        writeln!(stdout, "  |{ascii}|")?;
    }

    Ok(())
}

fn hash_tracks(image: &mut CdrWinImage) -> anyhow::Result<()> {
    let tracks: Vec<_> =
        image.disc().tracks.iter().map(|track| (track.sequence, track.sectors)).collect();

    let mut image_digest = CRC.digest();
    for (sequence, sectors) in tracks {
        let mut track_digest = CRC.digest();

        let mut address = 0;
        while address < sectors {
            let count = (sectors - address).min(HASH_CHUNK_SECTORS) as u32;
            let bytes = image.read_sectors_long_in_track(address, count, sequence)?;
            track_digest.update(&bytes);
            image_digest.update(&bytes);
            address += u64::from(count);
        }

        println!("Track {sequence:02}: {:08x}", track_digest.finalize());
    }

    let image_crc = format!("{:08x}", image_digest.finalize());
    println!("Image: {image_crc}");

    let Some(expected) = image.disc().hashes.get("crc32") else {
        log::info!("Cue sheet declares no CRC-32 for the image");
        return Ok(());
    };

    if *expected != image_crc {
        return Err(anyhow!("Image CRC-32 {image_crc} does not match cue sheet value {expected}"));
    }

    log::info!("Image CRC-32 matches cue sheet");
    Ok(())
}
