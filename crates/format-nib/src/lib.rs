//! NIB and NBZ raw-nibble disk image parsers.
//!
//! NIB layout:
//!   - 13-byte magic `"MNIB-1541-RAW"` plus 3 pad bytes
//!   - up to 84 x 2-byte entries `<halftrack+2><density>`, terminated by
//!     a zero half-track byte
//!   - each present track stored as exactly `NIB_TRACK_LENGTH` bytes
//!
//! The `halftrack+2` encoding matches the original tool's convention
//! (half-track 0 is stored as entry value 2, so 0 is free to serve as the
//! terminator). On load each raw track is aligned to its longest GCR run
//! (the byte offset of the longest span without a gap byte), since NIB
//! stores a fixed-size window into a revolution that may start mid-track.
//!
//! NBZ is an NIB payload LZ-compressed with zlib's deflate; decompressing
//! it yields a byte stream parseable exactly like NIB.

use std::io::Read;

use flate2::read::ZlibDecoder;

const MAGIC: &[u8; 13] = b"MNIB-1541-RAW";
const HEADER_LEN: usize = 16; // 13-byte magic + 3 pad
/// Fixed per-track window size NIB stores, regardless of the track's
/// actual GCR bit length.
pub const NIB_TRACK_LENGTH: usize = 0x2000;
/// Maximum half-tracks a NIB image may describe.
pub const MAX_HALFTRACKS: usize = 84;

/// One half-track's raw GCR payload as stored in a NIB image.
#[derive(Debug, Clone)]
pub struct NibTrack {
    /// Raw GCR bytes, always exactly `NIB_TRACK_LENGTH` long as read from
    /// the file, then re-aligned to start at its longest gap-free run.
    pub data: Vec<u8>,
    /// Density zone 0-3 for this half-track.
    pub density: u8,
}

/// A parsed NIB disk image.
pub struct Nib {
    tracks: Vec<Option<NibTrack>>,
}

impl Nib {
    /// An empty image with no half-tracks present, ready to be filled with
    /// `set_track` before the first `to_bytes`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracks: vec![None; MAX_HALFTRACKS],
        }
    }

    /// Parse a NIB image from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        if data.len() < HEADER_LEN {
            return Err("NIB image too short for header".to_string());
        }
        if &data[0..13] != MAGIC {
            return Err("missing MNIB-1541-RAW magic".to_string());
        }

        let mut tracks: Vec<Option<NibTrack>> = vec![None; MAX_HALFTRACKS];
        let mut entry_pos = HEADER_LEN;
        // The table comes first in full, then each track's NIB_TRACK_LENGTH
        // bytes follow in order.
        let mut entries = Vec::new();
        loop {
            if entry_pos + 2 > data.len() {
                return Err("NIB image truncated in entry table".to_string());
            }
            let halftrack_plus_2 = data[entry_pos];
            let density = data[entry_pos + 1];
            entry_pos += 2;
            if halftrack_plus_2 == 0 {
                break;
            }
            entries.push((halftrack_plus_2 - 2, density & 0x03));
        }
        let mut track_pos = entry_pos;

        for (halftrack, density) in entries {
            if track_pos + NIB_TRACK_LENGTH > data.len() {
                return Err(format!("NIB image truncated at half-track {halftrack}"));
            }
            let raw = &data[track_pos..track_pos + NIB_TRACK_LENGTH];
            track_pos += NIB_TRACK_LENGTH;
            tracks[halftrack as usize] = Some(NibTrack {
                data: align_to_longest_run(raw),
                density,
            });
        }

        Ok(Self { tracks })
    }

    /// Raw GCR data and density for a half-track, or `None` if absent.
    #[must_use]
    pub fn track(&self, halftrack: u8) -> Option<&NibTrack> {
        self.tracks.get(halftrack as usize)?.as_ref()
    }

    /// Set (or replace) a half-track's raw GCR data, marking it present.
    /// `data` is padded with gap bytes (`0x55`) or truncated to exactly
    /// `NIB_TRACK_LENGTH`.
    pub fn set_track(&mut self, halftrack: u8, mut data: Vec<u8>, density: u8) -> Result<(), String> {
        let idx = halftrack as usize;
        if idx >= MAX_HALFTRACKS {
            return Err(format!("half-track {idx} exceeds MAX_HALFTRACKS"));
        }
        data.resize(NIB_TRACK_LENGTH, 0x55);
        self.tracks[idx] = Some(NibTrack {
            data,
            density: density & 0x03,
        });
        Ok(())
    }

    /// Serialize the image back to NIB byte layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[0u8; 3]);

        for (halftrack, track) in self.tracks.iter().enumerate() {
            if let Some(track) = track {
                out.push(halftrack as u8 + 2);
                out.push(track.density);
            }
        }
        out.push(0); // terminator

        for track in self.tracks.iter().flatten() {
            let mut bytes = track.data.clone();
            bytes.resize(NIB_TRACK_LENGTH, 0x55);
            out.extend_from_slice(&bytes);
        }

        out
    }
}

impl Default for Nib {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotate `raw` so it starts at the byte after the longest run of
/// consecutive `0x55` gap bytes (a good proxy for "the longest GCR run",
/// since gap bytes between sectors are the only place a NIB capture's
/// arbitrary start point can safely cut without splitting a sync mark).
fn align_to_longest_run(raw: &[u8]) -> Vec<u8> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut best_start = 0usize;
    let mut best_len = 0usize;
    let mut i = 0usize;
    while i < raw.len() {
        if raw[i] == 0x55 {
            let mut j = i;
            while j < raw.len() && raw[j] == 0x55 {
                j += 1;
            }
            let len = j - i;
            if len > best_len {
                best_len = len;
                best_start = j % raw.len();
            }
            i = j;
        } else {
            i += 1;
        }
    }
    let mut rotated = Vec::with_capacity(raw.len());
    rotated.extend_from_slice(&raw[best_start..]);
    rotated.extend_from_slice(&raw[..best_start]);
    rotated
}

/// A parsed NBZ (compressed NIB) disk image. Decompresses into a `Nib` on
/// load; `to_bytes` re-serializes and recompresses.
pub struct Nbz {
    inner: Nib,
}

impl Nbz {
    /// Wrap an already-built `Nib` so it can be compressed with `to_bytes`.
    #[must_use]
    pub fn from_nib(inner: Nib) -> Self {
        Self { inner }
    }

    /// Decompress and parse an NBZ image.
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| format!("NBZ decompression failed: {e}"))?;
        let inner = Nib::from_bytes(&decompressed)?;
        Ok(Self { inner })
    }

    /// The decompressed NIB image.
    #[must_use]
    pub fn inner(&self) -> &Nib {
        &self.inner
    }

    /// Mutable access to the decompressed NIB image, for in-place edits
    /// before saving.
    pub fn inner_mut(&mut self) -> &mut Nib {
        &mut self.inner
    }

    /// Re-serialize the NIB payload and recompress it.
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        use std::io::Write;
        let nib_bytes = self.inner.to_bytes();
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&nib_bytes)
            .map_err(|e| format!("NBZ compression failed: {e}"))?;
        encoder
            .finish()
            .map_err(|e| format!("NBZ compression failed: {e}"))
    }
}
