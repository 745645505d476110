//! Minutes:seconds:frames disc time, as written in cue sheets

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CdTime {
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

impl CdTime {
    pub const ZERO: Self = Self { minutes: 0, seconds: 0, frames: 0 };

    // Cue sheets write minutes with two digits
    pub const MAX_MINUTES: u8 = 100;
    pub const SECONDS_PER_MINUTE: u8 = 60;
    pub const FRAMES_PER_SECOND: u8 = 75;

    /// Sectors between the start of the program area (LBA 0) and MSF 00:00:00.
    pub const LEAD_IN_SECTORS: i32 = 150;

    /// # Panics
    ///
    /// Panics if any component is out of range.
    #[must_use]
    pub fn new(minutes: u8, seconds: u8, frames: u8) -> Self {
        Self::new_checked(minutes, seconds, frames)
            .unwrap_or_else(|| panic!("Invalid CD time: {minutes}:{seconds}:{frames}"))
    }

    #[must_use]
    pub fn new_checked(minutes: u8, seconds: u8, frames: u8) -> Option<Self> {
        (minutes < Self::MAX_MINUTES
            && seconds < Self::SECONDS_PER_MINUTE
            && frames < Self::FRAMES_PER_SECOND)
            .then_some(Self { minutes, seconds, frames })
    }

    /// Linear sector count represented by this time, `(MM*60+SS)*75+FF`. No lead-in offset is
    /// applied; this is the value cue sheet INDEX/PREGAP/POSTGAP entries are measured in.
    #[must_use]
    pub fn to_sector_number(self) -> u32 {
        (u32::from(Self::SECONDS_PER_MINUTE) * u32::from(self.minutes) + u32::from(self.seconds))
            * u32::from(Self::FRAMES_PER_SECOND)
            + u32::from(self.frames)
    }

    #[must_use]
    pub fn from_sector_number(sector_number: u32) -> Option<Self> {
        let frames = sector_number % u32::from(Self::FRAMES_PER_SECOND);
        let seconds = (sector_number / u32::from(Self::FRAMES_PER_SECOND))
            % u32::from(Self::SECONDS_PER_MINUTE);
        let minutes = sector_number
            / (u32::from(Self::FRAMES_PER_SECOND) * u32::from(Self::SECONDS_PER_MINUTE));

        let minutes = u8::try_from(minutes).ok()?;
        Self::new_checked(minutes, seconds as u8, frames as u8)
    }

    /// Absolute logical block address; MSF 00:02:00 is LBA 0 and MSF 00:00:00 is LBA -150.
    #[must_use]
    pub fn to_lba(self) -> i32 {
        self.to_sector_number() as i32 - Self::LEAD_IN_SECTORS
    }

    /// Inverse of [`Self::to_lba`]. Returns `None` for addresses before MSF 00:00:00 or past
    /// 99:59:74.
    #[must_use]
    pub fn from_lba(lba: i32) -> Option<Self> {
        let sector_number = u32::try_from(lba.checked_add(Self::LEAD_IN_SECTORS)?).ok()?;
        Self::from_sector_number(sector_number)
    }
}

impl PartialOrd for CdTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CdTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.minutes
            .cmp(&other.minutes)
            .then(self.seconds.cmp(&other.seconds))
            .then(self.frames.cmp(&other.frames))
    }
}

impl FromStr for CdTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components = s.split(':');
        let (Some(minutes), Some(seconds), Some(frames), None) =
            (components.next(), components.next(), components.next(), components.next())
        else {
            return Err(format!("Unexpected time format: {s}"));
        };

        let parse_component = |component: &str| {
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("Invalid time string: {s}"));
            }
            component.parse::<u8>().map_err(|_| format!("Invalid time string: {s}"))
        };

        let minutes = parse_component(minutes)?;
        let seconds = parse_component(seconds)?;
        let frames = parse_component(frames)?;

        Self::new_checked(minutes, seconds, frames).ok_or_else(|| format!("Time out of range: {s}"))
    }
}

impl Display for CdTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.minutes, self.seconds, self.frames)
    }
}
