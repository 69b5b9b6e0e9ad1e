//! Head positioning, rotation, and write-protect sensing.
//!
//! Half-tracks are numbered 0-83; even positions are whole tracks, matching
//! `format_d64::D64::halftrack_for_track`. Half-track 34 (track 18, the
//! directory track) is the drive's parking position.

const EJECT_CYCLES: u32 = 400_000;
const NO_DISK_CYCLES: u32 = 200_000;
const INSERTING_CYCLES: u32 = 400_000;

/// Fallback bit-length for a half-track with no image data (no disk
/// mounted, or an odd half-track a D64-sourced image never populated):
/// a plausible whole-track length at the standard rotation rate, so a
/// synthetic unformatted track still times out realistically.
pub const SYNTHETIC_TRACK_BITS: u32 = 7692 * 8;

pub const PARK_HALFTRACK: u8 = 34;
pub const MAX_HALFTRACK: u8 = 83;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaChangePhase {
    Ejecting(u32),
    NoDisk(u32),
    Inserting(u32),
}

/// Drive mechanism: stepper position, rotation angle, motor/LED state, and
/// the write-protect sensor's media-change timing.
pub struct Mechanism {
    half_track: u8,
    prev_stepper_phase: u8,
    angle_bits: u32,
    density: u8,
    motor_on: bool,
    led_on: bool,
    media_change: Option<MediaChangePhase>,
}

impl Mechanism {
    #[must_use]
    pub fn new() -> Self {
        Self {
            half_track: PARK_HALFTRACK,
            prev_stepper_phase: 0,
            angle_bits: 0,
            density: 0,
            motor_on: false,
            led_on: false,
            media_change: None,
        }
    }

    #[must_use]
    pub fn half_track(&self) -> u8 {
        self.half_track
    }

    #[must_use]
    pub fn angle_bits(&self) -> u32 {
        self.angle_bits
    }

    #[must_use]
    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    #[must_use]
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    #[must_use]
    pub fn density(&self) -> u8 {
        self.density
    }

    pub fn set_motor(&mut self, on: bool) {
        self.motor_on = on;
    }

    pub fn set_led(&mut self, on: bool) {
        self.led_on = on;
    }

    pub fn set_density(&mut self, zone: u8) {
        self.density = zone & 0x03;
    }

    /// Apply a new stepper phase (VIA-B port B bits 0-1), moving the head
    /// by one half-track if the phase advanced or retreated by exactly one
    /// step. Clamped at the mechanical limits.
    pub fn step(&mut self, new_phase: u8) {
        let delta = (new_phase as i8 - self.prev_stepper_phase as i8 + 4) % 4;
        match delta {
            1 => {
                if self.half_track < MAX_HALFTRACK {
                    self.half_track += 1;
                }
            }
            3 => {
                if self.half_track > 0 {
                    self.half_track -= 1;
                }
            }
            _ => {}
        }
        self.prev_stepper_phase = new_phase;
    }

    /// Advance rotation by one bit cell, wrapping at `track_bits`.
    pub fn advance_angle(&mut self, track_bits: u32) {
        self.angle_bits = (self.angle_bits + 1) % track_bits.max(1);
    }

    /// Begin the write-protect sensor's media-change cycle sequence: low
    /// (ejecting) for 400,000 cycles, high (no disk present) for 200,000,
    /// then low (inserting) for 400,000 before settling back to whatever
    /// the newly current disk's real protect state is. Used for both
    /// eject and insert, since a single combined sequence models the
    /// mechanical settling time of a disk swap either way.
    pub fn begin_disk_swap(&mut self) {
        self.media_change = Some(MediaChangePhase::Ejecting(EJECT_CYCLES));
    }

    /// Advance the media-change sequence by one cycle, if one is in flight.
    pub fn tick_write_protect(&mut self) {
        let Some(phase) = self.media_change else {
            return;
        };
        self.media_change = match phase {
            MediaChangePhase::Ejecting(1) => Some(MediaChangePhase::NoDisk(NO_DISK_CYCLES)),
            MediaChangePhase::Ejecting(n) => Some(MediaChangePhase::Ejecting(n - 1)),
            MediaChangePhase::NoDisk(1) => Some(MediaChangePhase::Inserting(INSERTING_CYCLES)),
            MediaChangePhase::NoDisk(n) => Some(MediaChangePhase::NoDisk(n - 1)),
            MediaChangePhase::Inserting(1) => None,
            MediaChangePhase::Inserting(n) => Some(MediaChangePhase::Inserting(n - 1)),
        };
    }

    /// Current write-protect sensor level: `true` means the line is
    /// asserted low (protected). Overrides `steady_state` while a
    /// media-change sequence is in flight.
    #[must_use]
    pub fn write_protect_sensor(&self, steady_state: bool) -> bool {
        match self.media_change {
            Some(MediaChangePhase::Ejecting(_) | MediaChangePhase::Inserting(_)) => true,
            Some(MediaChangePhase::NoDisk(_)) => false,
            None => steady_state,
        }
    }
}

impl Default for Mechanism {
    fn default() -> Self {
        Self::new()
    }
}
