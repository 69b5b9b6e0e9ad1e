//! G64 raw-GCR disk image parser.
//!
//! Layout (all multi-byte fields little-endian):
//!   - 8-byte magic `"GCR-1541"`
//!   - 1-byte version
//!   - 1-byte track count (up to 84 half-tracks)
//!   - 2-byte max track length
//!   - `track_count` x 4-byte track-data offsets (0 = half-track absent)
//!   - `track_count` x 4-byte density-zone indices
//!   - for each present half-track, at its offset: `<2-byte length><bytes
//!     padded to max track length>`
//!
//! Unlike D64, a G64 image is indexed by half-track directly (index 0 is
//! track 1, index 1 is track 1.5, index 2 is track 2, ...), so copy
//! protections that rely on odd half-track alignment round-trip correctly.

#![allow(clippy::cast_possible_truncation)]

const MAGIC: &[u8; 8] = b"GCR-1541";
const HEADER_LEN: usize = 12;
/// Maximum half-tracks a G64 image may describe.
pub const MAX_HALFTRACKS: usize = 84;

/// One half-track's raw GCR payload as stored in a G64 image.
#[derive(Debug, Clone)]
pub struct G64Track {
    /// Raw GCR bytes (bit length in bits is `data.len() * 8`, unless the
    /// track is not a whole number of bytes, which the original format
    /// does not represent — sub-byte lengths are truncated).
    pub data: Vec<u8>,
    /// Density zone 0-3 for this half-track.
    pub density: u8,
}

/// A parsed G64 disk image.
pub struct G64 {
    version: u8,
    max_track_len: u16,
    tracks: Vec<Option<G64Track>>,
}

impl G64 {
    /// An empty image with no half-tracks present, ready to be filled with
    /// `set_track` before the first `to_bytes`.
    #[must_use]
    pub fn new(version: u8) -> Self {
        Self {
            version,
            max_track_len: 0,
            tracks: Vec::new(),
        }
    }

    /// Parse a G64 image from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        if data.len() < HEADER_LEN {
            return Err("G64 image too short for header".to_string());
        }
        if &data[0..8] != MAGIC {
            return Err("missing GCR-1541 magic".to_string());
        }
        let version = data[8];
        let track_count = data[9] as usize;
        if track_count == 0 || track_count > MAX_HALFTRACKS {
            return Err(format!("invalid G64 track count: {track_count}"));
        }
        let max_track_len = u16::from_le_bytes([data[10], data[11]]);

        let offsets_start = HEADER_LEN;
        let offsets_end = offsets_start + track_count * 4;
        let densities_end = offsets_end + track_count * 4;
        if data.len() < densities_end {
            return Err("G64 image truncated before offset/density tables".to_string());
        }

        let mut tracks = Vec::with_capacity(track_count);
        for i in 0..track_count {
            let off_bytes = &data[offsets_start + i * 4..offsets_start + i * 4 + 4];
            let offset = u32::from_le_bytes(off_bytes.try_into().expect("4 bytes")) as usize;
            let density_bytes = &data[offsets_end + i * 4..offsets_end + i * 4 + 4];
            let density = u32::from_le_bytes(density_bytes.try_into().expect("4 bytes")) as u8;

            if offset == 0 {
                tracks.push(None);
                continue;
            }
            if offset + 2 > data.len() {
                return Err(format!("G64 track {i} offset out of bounds"));
            }
            let len = u16::from_le_bytes([data[offset], data[offset + 1]]) as usize;
            let track_start = offset + 2;
            if track_start + len > data.len() {
                return Err(format!("G64 track {i} data out of bounds"));
            }
            tracks.push(Some(G64Track {
                data: data[track_start..track_start + len].to_vec(),
                density: density & 0x03,
            }));
        }

        Ok(Self {
            version,
            max_track_len,
            tracks,
        })
    }

    /// Format version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Number of half-tracks this image describes (not all present).
    #[must_use]
    pub fn halftrack_count(&self) -> usize {
        self.tracks.len()
    }

    /// Longest track-data span any half-track may occupy.
    #[must_use]
    pub fn max_track_len(&self) -> u16 {
        self.max_track_len
    }

    /// Raw GCR data and density for a half-track, or `None` if absent.
    #[must_use]
    pub fn track(&self, halftrack: u8) -> Option<&G64Track> {
        self.tracks.get(halftrack as usize)?.as_ref()
    }

    /// Set (or replace) a half-track's raw GCR data, marking it present.
    /// Grows the image's track table if `halftrack` is beyond the current
    /// count (up to `MAX_HALFTRACKS`).
    pub fn set_track(&mut self, halftrack: u8, data: Vec<u8>, density: u8) -> Result<(), String> {
        let idx = halftrack as usize;
        if idx >= MAX_HALFTRACKS {
            return Err(format!("half-track {idx} exceeds MAX_HALFTRACKS"));
        }
        if data.len() > u16::MAX as usize {
            return Err("track data exceeds 65535 bytes".to_string());
        }
        if idx >= self.tracks.len() {
            self.tracks.resize(idx + 1, None);
        }
        self.max_track_len = self.max_track_len.max(data.len() as u16);
        self.tracks[idx] = Some(G64Track {
            data,
            density: density & 0x03,
        });
        Ok(())
    }

    /// Serialize the image back to G64 byte layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let track_count = self.tracks.len();
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        out.push(track_count as u8);
        out.extend_from_slice(&self.max_track_len.to_le_bytes());

        let offsets_table_at = out.len();
        out.resize(offsets_table_at + track_count * 4, 0);
        let densities_table_at = out.len();
        out.resize(densities_table_at + track_count * 4, 0);

        for (i, track) in self.tracks.iter().enumerate() {
            let density = track.as_ref().map_or(0, |t| u32::from(t.density));
            out[densities_table_at + i * 4..densities_table_at + i * 4 + 4]
                .copy_from_slice(&density.to_le_bytes());

            let Some(track) = track else { continue };
            let offset = out.len() as u32;
            out[offsets_table_at + i * 4..offsets_table_at + i * 4 + 4]
                .copy_from_slice(&offset.to_le_bytes());

            out.extend_from_slice(&(track.data.len() as u16).to_le_bytes());
            out.extend_from_slice(&track.data);
        }

        out
    }
}
