//! GCR (Group Code Recording) encoding for 1541 disk tracks.
//!
//! The 1541 drive stores data on disk using GCR encoding: every 4 bits
//! are mapped to a unique 5-bit pattern that guarantees no more than
//! two consecutive zeros (essential for reliable clock recovery).
//!
//! Each sector on disk consists of:
//!   - Header sync: 5 bytes of $FF (40 one-bits)
//!   - Header block: 10 GCR bytes (8 raw -> 10 GCR)
//!   - Header gap: 9 bytes of $55
//!   - Data sync: 5 bytes of $FF
//!   - Data block: 325 GCR bytes (260 raw -> 325 GCR)
//!   - Inter-sector gap: 7 bytes of $55
//!
//! `GCR_BLOCK_HEADER_LEN` (24 = 5 sync + 10 header + 9 gap) and
//! `GCR_BLOCK_DATA_LEN` (337 = 5 sync + 325 data + 7 gap) name these two
//! spans as they appear back to back on the track.
//!
//! Zone-dependent byte rate (at ~1 MHz drive CPU clock):
//!   Zone 0 (tracks  1-17): 26 cycles/bit -> 208 cycles/byte
//!   Zone 1 (tracks 18-24): 28 cycles/bit -> 224 cycles/byte
//!   Zone 2 (tracks 25-30): 30 cycles/bit -> 240 cycles/byte
//!   Zone 3 (tracks 31-40): 32 cycles/bit -> 256 cycles/byte

#![allow(clippy::cast_possible_truncation)]

use format_d64::D64;

/// Header sync + header block + header gap, in GCR bytes.
pub const GCR_BLOCK_HEADER_LEN: usize = 24;
/// Data sync + data block + inter-sector gap, in GCR bytes.
pub const GCR_BLOCK_DATA_LEN: usize = 337;
/// Total GCR bytes written to the track per sector.
pub const GCR_SECTOR_LEN: usize = GCR_BLOCK_HEADER_LEN + GCR_BLOCK_DATA_LEN;

const HEADER_SYNC_LEN: usize = 5;
const HEADER_RAW_LEN: usize = 8;
const HEADER_GCR_LEN: usize = 10;
const HEADER_GAP_LEN: usize = 9;
const DATA_SYNC_LEN: usize = 5;
const DATA_RAW_LEN: usize = 260;
const DATA_GCR_LEN: usize = 325;
const DATA_GAP_LEN: usize = 7;

/// Host-visible disk-controller error codes (from the original firmware's
/// `gcr.h` error enum), exposed so a host-side status-channel formatter can
/// map them to the PETSCII `"nn,MESSAGE,tt,ss"` strings without re-deriving
/// the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveErrorCode {
    /// No error.
    SectorOk,
    /// Sector header never found (timeout searching for it).
    HeaderNotFound,
    /// No sync mark found on track.
    SyncNotFound,
    /// Data block marker never found after a valid header.
    DataNotFound,
    /// Header checksum mismatch (reported to the host as error 27).
    ChecksumErrorHeader,
    /// Data checksum mismatch (reported to the host as error 23).
    ChecksumErrorData,
    /// Write-verify failed after writing a sector (error 25).
    WriteVerifyError,
    /// Disk ID in a sector header does not match the BAM's (error 29).
    DiskIdMismatch,
    /// No disk in the drive (error 74).
    DiskNotInserted,
}

impl DriveErrorCode {
    /// The numeric status-channel error code a 1541 reports for this condition.
    #[must_use]
    pub fn host_error_number(self) -> u8 {
        match self {
            Self::SectorOk => 0,
            Self::HeaderNotFound => 20,
            Self::SyncNotFound => 21,
            Self::DataNotFound => 22,
            Self::ChecksumErrorData => 23,
            Self::ChecksumErrorHeader => 27,
            Self::WriteVerifyError => 25,
            Self::DiskIdMismatch => 29,
            Self::DiskNotInserted => 74,
        }
    }
}

/// 4-bit to 5-bit GCR encoding table.
const GCR_ENCODE: [u8; 16] = [
    0x0A, 0x0B, 0x12, 0x13, 0x0E, 0x0F, 0x16, 0x17, 0x09, 0x19, 0x1A, 0x1B, 0x0D, 0x1D, 0x1E, 0x15,
];

/// 5-bit to 4-bit GCR decoding table (inverse of `GCR_ENCODE`). Invalid
/// codes map to `0xFF`.
const GCR_DECODE: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // 00-07: invalid
    0xFF, 0x08, 0x00, 0x01, 0xFF, 0x0C, 0x04, 0x05, // 08-0F
    0xFF, 0xFF, 0x02, 0x03, 0xFF, 0x0F, 0x06, 0x07, // 10-17
    0xFF, 0x09, 0x0A, 0x0B, 0xFF, 0x0D, 0x0E, 0xFF, // 18-1F
];

/// Speed zone for a given track number (1-based, up to 40).
#[must_use]
pub fn speed_zone(track: u8) -> u8 {
    match track {
        1..=17 => 0,
        18..=24 => 1,
        25..=30 => 2,
        _ => 3,
    }
}

/// Bit-cell width in microseconds for a given density zone (0-3).
#[must_use]
pub fn cell_width_us(zone: u8) -> f64 {
    match zone {
        0 => 4.00,
        1 => 3.75,
        2 => 3.50,
        _ => 3.25,
    }
}

/// Cycles per GCR byte for a given track (at ~1 MHz drive CPU clock).
#[must_use]
pub fn cycles_per_byte(track: u8) -> u32 {
    match speed_zone(track) {
        0 => 208,
        1 => 224,
        2 => 240,
        _ => 256,
    }
}

/// Decode 5 GCR bytes into 4 raw bytes.
///
/// Returns `None` if any GCR nybble is invalid.
#[must_use]
pub fn decode_gcr_group(input: &[u8; 5]) -> Option<[u8; 4]> {
    let g0 = (input[0] >> 3) & 0x1F;
    let g1 = ((input[0] << 2) | (input[1] >> 6)) & 0x1F;
    let g2 = (input[1] >> 1) & 0x1F;
    let g3 = ((input[1] << 4) | (input[2] >> 4)) & 0x1F;
    let g4 = ((input[2] << 1) | (input[3] >> 7)) & 0x1F;
    let g5 = (input[3] >> 2) & 0x1F;
    let g6 = ((input[3] << 3) | (input[4] >> 5)) & 0x1F;
    let g7 = input[4] & 0x1F;

    let d = [
        GCR_DECODE[g0 as usize],
        GCR_DECODE[g1 as usize],
        GCR_DECODE[g2 as usize],
        GCR_DECODE[g3 as usize],
        GCR_DECODE[g4 as usize],
        GCR_DECODE[g5 as usize],
        GCR_DECODE[g6 as usize],
        GCR_DECODE[g7 as usize],
    ];

    if d.iter().any(|&b| b == 0xFF) {
        return None;
    }

    Some([
        (d[0] << 4) | d[1],
        (d[2] << 4) | d[3],
        (d[4] << 4) | d[5],
        (d[6] << 4) | d[7],
    ])
}

/// Encode 4 raw bytes into 5 GCR bytes.
fn encode_gcr_group(input: &[u8; 4]) -> [u8; 5] {
    let n: [u8; 8] = [
        GCR_ENCODE[(input[0] >> 4) as usize],
        GCR_ENCODE[(input[0] & 0x0F) as usize],
        GCR_ENCODE[(input[1] >> 4) as usize],
        GCR_ENCODE[(input[1] & 0x0F) as usize],
        GCR_ENCODE[(input[2] >> 4) as usize],
        GCR_ENCODE[(input[2] & 0x0F) as usize],
        GCR_ENCODE[(input[3] >> 4) as usize],
        GCR_ENCODE[(input[3] & 0x0F) as usize],
    ];
    [
        (n[0] << 3) | (n[1] >> 2),
        (n[1] << 6) | (n[2] << 1) | (n[3] >> 4),
        (n[3] << 4) | (n[4] >> 1),
        (n[4] << 7) | (n[5] << 2) | (n[6] >> 3),
        (n[6] << 5) | n[7],
    ]
}

/// Decode a header block (10 GCR bytes -> track/sector/disk-id), verifying
/// its checksum.
///
/// Returns `(track, sector, disk_id)` or a `DriveErrorCode` on mismatch.
pub fn decode_header(gcr: &[u8; HEADER_GCR_LEN]) -> Result<(u8, u8, [u8; 2]), DriveErrorCode> {
    let g0: [u8; 5] = gcr[0..5].try_into().expect("5 bytes");
    let g1: [u8; 5] = gcr[5..10].try_into().expect("5 bytes");
    let raw0 = decode_gcr_group(&g0).ok_or(DriveErrorCode::HeaderNotFound)?;
    let raw1 = decode_gcr_group(&g1).ok_or(DriveErrorCode::HeaderNotFound)?;
    let (marker, checksum, sector, track) = (raw0[0], raw0[1], raw0[2], raw0[3]);
    let (id2, id1) = (raw1[0], raw1[1]);
    if marker != 0x08 {
        return Err(DriveErrorCode::HeaderNotFound);
    }
    if checksum != (sector ^ track ^ id1 ^ id2) {
        return Err(DriveErrorCode::ChecksumErrorHeader);
    }
    Ok((track, sector, [id1, id2]))
}

/// Decode a data block (325 GCR bytes -> 256 raw bytes), verifying its
/// checksum.
pub fn decode_data_block(gcr: &[u8]) -> Result<[u8; 256], DriveErrorCode> {
    if gcr.len() < DATA_GCR_LEN {
        return Err(DriveErrorCode::DataNotFound);
    }

    let mut raw = Vec::with_capacity(DATA_RAW_LEN);
    for chunk in gcr[..DATA_GCR_LEN].chunks_exact(5) {
        let group_bytes: [u8; 5] = chunk.try_into().expect("5 bytes");
        let group = decode_gcr_group(&group_bytes).ok_or(DriveErrorCode::DataNotFound)?;
        raw.extend_from_slice(&group);
    }

    if raw[0] != 0x07 {
        return Err(DriveErrorCode::DataNotFound);
    }
    let data = &raw[1..257];
    let expected_checksum = raw[257];
    let checksum = data.iter().fold(0u8, |acc, &b| acc ^ b);
    if checksum != expected_checksum {
        return Err(DriveErrorCode::ChecksumErrorData);
    }

    let mut out = [0u8; 256];
    out.copy_from_slice(data);
    Ok(out)
}

/// Encode a complete sector's header block (8 raw bytes -> 10 GCR bytes).
fn encode_header(track: u8, sector: u8, disk_id: [u8; 2]) -> [u8; HEADER_GCR_LEN] {
    let checksum = sector ^ track ^ disk_id[0] ^ disk_id[1];
    let raw: [u8; HEADER_RAW_LEN] = [
        0x08, checksum, sector, track, disk_id[1], disk_id[0], 0x0F, 0x0F,
    ];
    let g0 = encode_gcr_group(&[raw[0], raw[1], raw[2], raw[3]]);
    let g1 = encode_gcr_group(&[raw[4], raw[5], raw[6], raw[7]]);
    [
        g0[0], g0[1], g0[2], g0[3], g0[4], g1[0], g1[1], g1[2], g1[3], g1[4],
    ]
}

/// Encode a complete sector's data block (260 raw bytes -> 325 GCR bytes).
fn encode_data_block(sector_data: &[u8; 256]) -> Vec<u8> {
    let checksum = sector_data.iter().fold(0u8, |acc, &b| acc ^ b);

    let mut raw = Vec::with_capacity(DATA_RAW_LEN);
    raw.push(0x07);
    raw.extend_from_slice(sector_data);
    raw.push(checksum);
    raw.push(0x00);
    raw.push(0x00);

    let mut gcr = Vec::with_capacity(DATA_GCR_LEN);
    for chunk in raw.chunks_exact(4) {
        let group: [u8; 4] = chunk.try_into().expect("4 bytes");
        gcr.extend_from_slice(&encode_gcr_group(&group));
    }
    gcr
}

/// Encode a complete sector (header span + data span) as it appears on the
/// track.
fn encode_sector(track: u8, sector: u8, data: &[u8; 256], disk_id: [u8; 2]) -> Vec<u8> {
    let mut out = Vec::with_capacity(GCR_SECTOR_LEN);

    out.extend_from_slice(&[0xFF; HEADER_SYNC_LEN]);
    out.extend_from_slice(&encode_header(track, sector, disk_id));
    out.extend_from_slice(&[0x55; HEADER_GAP_LEN]);
    out.extend_from_slice(&[0xFF; DATA_SYNC_LEN]);
    out.extend_from_slice(&encode_data_block(data));
    out.extend_from_slice(&[0x55; DATA_GAP_LEN]);

    out
}

/// Encode a complete track's sectors from a D64 image into the raw GCR byte
/// stream the drive head reads continuously in a loop.
///
/// `track` is a whole track number (1-based); the image's `halftrack_for_track`
/// locates where to place it in a half-track-indexed buffer.
#[must_use]
pub fn encode_track(d64: &D64, track: u8) -> Vec<u8> {
    let num_sectors = D64::sectors_per_track(track);
    let disk_id = d64.disk_id();

    let mut gcr_track = Vec::with_capacity(num_sectors as usize * GCR_SECTOR_LEN);
    for sector in 0..num_sectors {
        let data: [u8; 256] = d64
            .read_sector(track, sector)
            .expect("valid track/sector within D64")
            .try_into()
            .expect("sector is always 256 bytes");
        gcr_track.extend_from_slice(&encode_sector(track, sector, &data, disk_id));
    }
    gcr_track
}

/// Decode a GCR-encoded track back into its sectors, writing each into
/// `d64`. Stops (without error) at the first region that doesn't decode as
/// a valid sector header, since gaps and gap noise are expected between
/// sectors and at the end of the track.
pub fn decode_track(d64: &mut D64, track: u8, gcr_track: &[u8]) -> Result<u32, DriveErrorCode> {
    let mut decoded = 0u32;
    let mut pos = find_sync(gcr_track, 0);
    while let Some(header_start) = pos {
        if header_start + HEADER_GCR_LEN > gcr_track.len() {
            break;
        }
        let header_bytes: [u8; HEADER_GCR_LEN] = gcr_track
            [header_start..header_start + HEADER_GCR_LEN]
            .try_into()
            .expect("slice sized to HEADER_GCR_LEN");
        let Ok((hdr_track, sector, _disk_id)) = decode_header(&header_bytes) else {
            pos = find_sync(gcr_track, header_start + 1);
            continue;
        };
        if hdr_track != track {
            pos = find_sync(gcr_track, header_start + 1);
            continue;
        }
        let data_search_start = header_start + HEADER_GCR_LEN;
        let Some(data_start) = find_sync(gcr_track, data_search_start) else {
            break;
        };
        if data_start + DATA_GCR_LEN > gcr_track.len() {
            break;
        }
        let data = decode_data_block(&gcr_track[data_start..data_start + DATA_GCR_LEN])
            .map_err(|_| DriveErrorCode::ChecksumErrorData)?;
        d64.write_sector(track, sector, &data);
        decoded += 1;
        pos = find_sync(gcr_track, data_start + DATA_GCR_LEN);
    }
    Ok(decoded)
}

/// Find the next run of 5 consecutive `0xFF` bytes (a sync mark) at or
/// after `from`, returning the offset just past the sync (where the GCR
/// payload begins).
fn find_sync(track: &[u8], from: usize) -> Option<usize> {
    let mut run = 0usize;
    let mut i = from;
    while i < track.len() {
        if track[i] == 0xFF {
            run += 1;
            if run >= 5 {
                return Some(i + 1);
            }
        } else {
            run = 0;
        }
        i += 1;
    }
    None
}
