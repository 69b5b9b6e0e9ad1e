//! D64 disk image parser.
//!
//! A standard D64 image contains 35 tracks with variable sectors per track:
//!   Tracks  1-17: 21 sectors (zone 0)
//!   Tracks 18-24: 19 sectors (zone 1)
//!   Tracks 25-30: 18 sectors (zone 2)
//!   Tracks 31-35: 17 sectors (zone 3)
//!
//! Total: 683 sectors x 256 bytes = 174,848 bytes.
//!
//! Some images extend the disk to 40 tracks (zone 3's 17-sectors/track
//! rate continues for tracks 36-40), for a total of 768 sectors. Both
//! sizes may additionally carry one error-info byte per sector appended
//! after the sector data.
//!
//! D64 sector-packed images occupy only the even half-tracks (1, 3, 5,
//! ... in half-track numbering); `halftrack_for_track` converts between
//! the two numbering schemes for callers that index by half-track.

#![allow(clippy::cast_possible_truncation)]

/// Highest whole track number in a standard 35-track image.
pub const STANDARD_TRACKS: u8 = 35;
/// Highest whole track number in an extended 40-track image.
pub const EXTENDED_TRACKS: u8 = 40;
/// Bytes per sector.
const SECTOR_SIZE: usize = 256;

/// Sectors per track, indexed by track number (1-based, so index 0 is unused).
/// Extended tracks 36-40 continue zone 3's 17-sectors/track rate.
const SECTORS_PER_TRACK: [u8; 41] = [
    0, // track 0 doesn't exist
    21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, // 1-17
    19, 19, 19, 19, 19, 19, 19, // 18-24
    18, 18, 18, 18, 18, 18, // 25-30
    17, 17, 17, 17, 17, // 31-35
    17, 17, 17, 17, 17, // 36-40 (extended)
];

/// Byte offset of the first sector of each track (1-indexed).
const TRACK_OFFSETS: [usize; 41] = {
    let mut offsets = [0usize; 41];
    let mut track = 1;
    let mut offset = 0;
    while track < 41 {
        offsets[track] = offset;
        offset += SECTORS_PER_TRACK[track] as usize * SECTOR_SIZE;
        track += 1;
    }
    offsets
};

const STANDARD_SECTORS: usize = TRACK_OFFSETS[35] / SECTOR_SIZE; // 683
const EXTENDED_SECTORS: usize = TRACK_OFFSETS[40] / SECTOR_SIZE; // 768

const STANDARD_SIZE: usize = STANDARD_SECTORS * SECTOR_SIZE;
const STANDARD_SIZE_WITH_ERRORS: usize = STANDARD_SIZE + STANDARD_SECTORS;
const EXTENDED_SIZE: usize = EXTENDED_SECTORS * SECTOR_SIZE;
const EXTENDED_SIZE_WITH_ERRORS: usize = EXTENDED_SIZE + EXTENDED_SECTORS;

/// A parsed D64 disk image.
pub struct D64 {
    data: Vec<u8>,
    tracks: u8,
    has_error_info: bool,
}

impl D64 {
    /// Parse a D64 image from raw bytes.
    ///
    /// Accepts the standard 35-track size (174,848 bytes), the extended
    /// 40-track size (196,608 bytes), and both with one trailing error-info
    /// byte per sector.
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        let (tracks, has_error_info) = match data.len() {
            STANDARD_SIZE => (STANDARD_TRACKS, false),
            STANDARD_SIZE_WITH_ERRORS => (STANDARD_TRACKS, true),
            EXTENDED_SIZE => (EXTENDED_TRACKS, false),
            EXTENDED_SIZE_WITH_ERRORS => (EXTENDED_TRACKS, true),
            n => {
                return Err(format!(
                    "invalid D64 size: {n} bytes (expected {STANDARD_SIZE}, {STANDARD_SIZE_WITH_ERRORS}, {EXTENDED_SIZE}, or {EXTENDED_SIZE_WITH_ERRORS})"
                ));
            }
        };
        Ok(Self {
            data: data.to_vec(),
            tracks,
            has_error_info,
        })
    }

    /// Highest track number present in this image (35 or 40).
    #[must_use]
    pub fn track_count(&self) -> u8 {
        self.tracks
    }

    /// Whether this image carries a trailing error-info byte per sector.
    #[must_use]
    pub fn has_error_info(&self) -> bool {
        self.has_error_info
    }

    /// Number of sectors on a given track (1 up to `track_count()`).
    ///
    /// Returns 0 for invalid track numbers.
    #[must_use]
    pub fn sectors_per_track(track: u8) -> u8 {
        if (1..=EXTENDED_TRACKS).contains(&track) {
            SECTORS_PER_TRACK[track as usize]
        } else {
            0
        }
    }

    /// Byte offset of a given sector within the image.
    ///
    /// Returns `None` for invalid track/sector numbers.
    #[must_use]
    pub fn sector_offset(track: u8, sector: u8) -> Option<usize> {
        if !(1..=EXTENDED_TRACKS).contains(&track) {
            return None;
        }
        if sector >= SECTORS_PER_TRACK[track as usize] {
            return None;
        }
        Some(TRACK_OFFSETS[track as usize] + sector as usize * SECTOR_SIZE)
    }

    /// Convert a whole track number (1-based) to its half-track index (0-83)
    /// as addressed by the mechanism model. D64 images only ever occupy
    /// even half-tracks.
    #[must_use]
    pub fn halftrack_for_track(track: u8) -> u8 {
        (track - 1) * 2
    }

    /// Read a 256-byte sector.
    ///
    /// Returns `None` for invalid track/sector, or a track beyond this
    /// image's `track_count()`.
    #[must_use]
    pub fn read_sector(&self, track: u8, sector: u8) -> Option<&[u8]> {
        if track > self.tracks {
            return None;
        }
        let offset = Self::sector_offset(track, sector)?;
        Some(&self.data[offset..offset + SECTOR_SIZE])
    }

    /// Write 256 bytes to a sector.
    ///
    /// Returns `false` for invalid track/sector, or a track beyond this
    /// image's `track_count()`.
    pub fn write_sector(&mut self, track: u8, sector: u8, data: &[u8]) -> bool {
        if data.len() != SECTOR_SIZE || track > self.tracks {
            return false;
        }
        let Some(offset) = Self::sector_offset(track, sector) else {
            return false;
        };
        self.data[offset..offset + SECTOR_SIZE].copy_from_slice(data);
        true
    }

    /// Read the error-info byte for a sector (read error code, 1 = OK).
    /// Returns `None` if this image has no error-info block or the
    /// track/sector is invalid.
    #[must_use]
    pub fn error_info(&self, track: u8, sector: u8) -> Option<u8> {
        if !self.has_error_info || track > self.tracks {
            return None;
        }
        let sector_data_len = TRACK_OFFSETS[self.tracks as usize] / SECTOR_SIZE * SECTOR_SIZE;
        let sector_count = TRACK_OFFSETS[self.tracks as usize] / SECTOR_SIZE;
        let index = TRACK_OFFSETS[track as usize] / SECTOR_SIZE + sector as usize;
        if index >= sector_count {
            return None;
        }
        self.data.get(sector_data_len + index).copied()
    }

    /// Get the disk ID from the BAM (track 18, sector 0, bytes $A2-$A3).
    #[must_use]
    pub fn disk_id(&self) -> [u8; 2] {
        let bam = self
            .read_sector(18, 0)
            .expect("track 18 sector 0 always valid");
        [bam[0xA2], bam[0xA3]]
    }

    /// Raw image data (sector payload only, excludes any error-info block).
    #[must_use]
    pub fn data(&self) -> &[u8] {
        let payload_len = TRACK_OFFSETS[self.tracks as usize];
        &self.data[..payload_len]
    }

    /// Serialize the image back to bytes in its original layout, for
    /// write-back to the image's on-disk format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }
}
