//! Mounted disk image store: an 84-half-track array of raw GCR bit cells,
//! normalized out of whichever on-disk format it was loaded from so the
//! flux decoder never has to know which one it came from.

use format_d64::D64;
use format_g64::G64;
use format_gcr as gcr;
use format_nib::{Nbz, Nib};

pub const MAX_HALFTRACKS: usize = 84;

#[derive(Debug, Clone)]
pub struct Halftrack {
    pub data: Vec<u8>,
    pub bit_length: u32,
    pub density: u8,
    pub dirty: bool,
    pub used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageFormat {
    D64,
    G64,
    Nib,
    Nbz,
}

impl ImageFormat {
    fn from_filename(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".d64") {
            Some(Self::D64)
        } else if lower.ends_with(".g64") {
            Some(Self::G64)
        } else if lower.ends_with(".nib") {
            Some(Self::Nib)
        } else if lower.ends_with(".nbz") {
            Some(Self::Nbz)
        } else {
            None
        }
    }
}

/// A mounted disk image, normalized to an 84-half-track raw-GCR array.
pub struct DiskImage {
    halftracks: Vec<Option<Halftrack>>,
    format: ImageFormat,
    /// Kept in sync for D64-format images only, so `save` can decode dirty
    /// half-tracks back into sector form.
    d64_backing: Option<D64>,
}

impl DiskImage {
    /// Load an image, picking the format by `name`'s suffix.
    pub fn load(name: &str, bytes: &[u8]) -> Result<Self, String> {
        let format = ImageFormat::from_filename(name)
            .ok_or_else(|| format!("unrecognized disk image suffix: {name}"))?;
        match format {
            ImageFormat::D64 => {
                let d64 = D64::from_bytes(bytes)?;
                let halftracks = Self::halftracks_from_d64(&d64);
                Ok(Self {
                    halftracks,
                    format,
                    d64_backing: Some(d64),
                })
            }
            ImageFormat::G64 => {
                let g64 = G64::from_bytes(bytes)?;
                Ok(Self {
                    halftracks: Self::halftracks_from_g64(&g64),
                    format,
                    d64_backing: None,
                })
            }
            ImageFormat::Nib => {
                let nib = Nib::from_bytes(bytes)?;
                Ok(Self {
                    halftracks: Self::halftracks_from_nib(&nib),
                    format,
                    d64_backing: None,
                })
            }
            ImageFormat::Nbz => {
                let nbz = Nbz::from_bytes(bytes)?;
                Ok(Self {
                    halftracks: Self::halftracks_from_nib(nbz.inner()),
                    format,
                    d64_backing: None,
                })
            }
        }
    }

    fn halftracks_from_d64(d64: &D64) -> Vec<Option<Halftrack>> {
        let mut out: Vec<Option<Halftrack>> = vec![None; MAX_HALFTRACKS];
        for track in 1..=d64.track_count() {
            let data = gcr::encode_track(d64, track);
            let bit_length = data.len() as u32 * 8;
            let density = gcr::speed_zone(track);
            let idx = D64::halftrack_for_track(track) as usize;
            out[idx] = Some(Halftrack {
                data,
                bit_length,
                density,
                dirty: false,
                used: true,
            });
        }
        out
    }

    fn halftracks_from_g64(g64: &G64) -> Vec<Option<Halftrack>> {
        let mut out: Vec<Option<Halftrack>> = vec![None; MAX_HALFTRACKS];
        for halftrack in 0..g64.halftrack_count().min(MAX_HALFTRACKS) {
            if let Some(track) = g64.track(halftrack as u8) {
                out[halftrack] = Some(Halftrack {
                    data: track.data.clone(),
                    bit_length: track.data.len() as u32 * 8,
                    density: track.density,
                    dirty: false,
                    used: true,
                });
            }
        }
        out
    }

    fn halftracks_from_nib(nib: &Nib) -> Vec<Option<Halftrack>> {
        let mut out: Vec<Option<Halftrack>> = vec![None; MAX_HALFTRACKS];
        for halftrack in 0..MAX_HALFTRACKS {
            if let Some(track) = nib.track(halftrack as u8) {
                out[halftrack] = Some(Halftrack {
                    data: track.data.clone(),
                    bit_length: track.data.len() as u32 * 8,
                    density: track.density,
                    dirty: false,
                    used: true,
                });
            }
        }
        out
    }

    /// Half-track data and metadata, or `None` if this image never
    /// populated that half-track.
    #[must_use]
    pub fn track(&self, halftrack: u8) -> Option<&Halftrack> {
        self.halftracks.get(halftrack as usize)?.as_ref()
    }

    /// Read one bit at `bit_offset` (wrapped to the track's bit length).
    /// `None` if the half-track has no data.
    #[must_use]
    pub fn bit(&self, halftrack: u8, bit_offset: u32) -> Option<bool> {
        let track = self.track(halftrack)?;
        if track.bit_length == 0 {
            return Some(false);
        }
        let offset = bit_offset % track.bit_length;
        let byte = track.data[(offset / 8) as usize];
        Some(byte & (1 << (7 - offset % 8)) != 0)
    }

    /// Write one bit at `bit_offset`, marking the half-track dirty. Returns
    /// `false` (no-op) if the half-track has no data to write into.
    pub fn set_bit(&mut self, halftrack: u8, bit_offset: u32, value: bool) -> bool {
        let Some(track) = self
            .halftracks
            .get_mut(halftrack as usize)
            .and_then(Option::as_mut)
        else {
            return false;
        };
        if track.bit_length == 0 {
            return false;
        }
        let offset = bit_offset % track.bit_length;
        let byte_idx = (offset / 8) as usize;
        let bit_mask = 1 << (7 - offset % 8);
        if value {
            track.data[byte_idx] |= bit_mask;
        } else {
            track.data[byte_idx] &= !bit_mask;
        }
        track.dirty = true;
        track.used = true;
        true
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.halftracks.iter().flatten().any(|t| t.dirty)
    }

    /// Re-encode the image back to its original on-disk byte layout,
    /// clearing dirty flags on success.
    pub fn save(&mut self) -> Result<Vec<u8>, String> {
        let bytes = match self.format {
            ImageFormat::D64 => self.save_d64()?,
            ImageFormat::G64 => self.save_g64(),
            ImageFormat::Nib => self.save_nib(),
            ImageFormat::Nbz => self.save_nbz()?,
        };
        for track in self.halftracks.iter_mut().flatten() {
            track.dirty = false;
        }
        Ok(bytes)
    }

    fn save_d64(&mut self) -> Result<Vec<u8>, String> {
        let d64 = self
            .d64_backing
            .as_mut()
            .ok_or("image has no D64 backing store")?;
        for (halftrack, track) in self.halftracks.iter().enumerate() {
            let Some(track) = track else { continue };
            if !track.dirty || halftrack % 2 != 0 {
                continue;
            }
            let whole_track = (halftrack / 2 + 1) as u8;
            gcr::decode_track(d64, whole_track, &track.data)
                .map_err(|e| format!("decoding dirty track {whole_track}: {e:?}"))?;
        }
        Ok(d64.to_bytes())
    }

    fn save_g64(&self) -> Vec<u8> {
        let mut g64 = G64::new(0);
        for (halftrack, track) in self.halftracks.iter().enumerate() {
            if let Some(track) = track {
                g64.set_track(halftrack as u8, track.data.clone(), track.density)
                    .expect("half-track index within MAX_HALFTRACKS");
            }
        }
        g64.to_bytes()
    }

    fn save_nib(&self) -> Vec<u8> {
        let mut nib = Nib::new();
        for (halftrack, track) in self.halftracks.iter().enumerate() {
            if let Some(track) = track {
                nib.set_track(halftrack as u8, track.data.clone(), track.density)
                    .expect("half-track index within MAX_HALFTRACKS");
            }
        }
        nib.to_bytes()
    }

    fn save_nbz(&self) -> Result<Vec<u8>, String> {
        let nib_bytes = self.save_nib();
        let nib = Nib::from_bytes(&nib_bytes)?;
        Nbz::from_nib(nib).to_bytes()
    }
}
