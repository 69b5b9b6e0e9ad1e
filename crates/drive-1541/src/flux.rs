//! Flux decoder: the analog read/write channel between the disk surface
//! and VIA-B's shift register.
//!
//! Models, at one sub-tick per 1/16 us, the hardware's bit-cell timing
//! (density-dependent cell width), the 10-bit sync detector, the mod-8
//! byte-phase-lock counter, and a noise process that occasionally forces
//! a flux reversal where the track has none — the "weak bit" effect real
//! drives exhibit on marginal media and that some copy protections rely
//! on reading inconsistently.

use crate::rng::Xorshift32;
use format_gcr::cell_width_us;

/// Maximum run of zero bit-cells the encoding scheme guarantees; a fourth
/// zero in a row never occurs on a real disk, so forcing a reversal here
/// is a hardware safety net rather than normal decoding.
const MAX_CONSECUTIVE_ZERO_CELLS: u8 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct FluxTick {
    /// A bit was actually shifted this sub-tick (a bit-cell boundary was
    /// reached). `byte_ready`/`sync`/`byte` are only meaningful when this
    /// is set.
    pub shifted: bool,
    pub byte_ready: bool,
    pub sync: bool,
    pub byte: u8,
    /// In write mode, the bit just committed to the disk image.
    pub write_bit: Option<bool>,
}

/// Decodes (or encodes) one track's worth of GCR flux transitions.
pub struct FluxDecoder {
    shift_register: u16,
    byte_bit_count: u8,
    write_shift_register: u8,
    sub_accum: u32,
    threshold_sub_ticks: u32,
    consecutive_zero_cells: u8,
    noise_countdown_16th_us: u32,
    noise_fired_this_cell: bool,
    rng: Xorshift32,
}

impl FluxDecoder {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        let mut rng = Xorshift32::new(seed);
        let noise_countdown_16th_us = rng.range_16th_us(18, 20);
        Self {
            shift_register: 0,
            byte_bit_count: 0,
            write_shift_register: 0,
            sub_accum: 0,
            threshold_sub_ticks: (cell_width_us(0) * 16.0).round() as u32,
            consecutive_zero_cells: 0,
            noise_countdown_16th_us,
            noise_fired_this_cell: false,
            rng,
        }
    }

    /// Reseed and clear all decoder state, as happens on an IEC RESET.
    pub fn reset(&mut self, seed: u32) {
        *self = Self::new(seed);
    }

    /// Select the density zone (0-3) that determines the bit-cell width.
    pub fn set_density(&mut self, zone: u8) {
        self.threshold_sub_ticks = (cell_width_us(zone & 0x03) * 16.0).round() as u32;
    }

    /// Advance one 1/16-cycle sub-tick.
    ///
    /// `read_bit` is the disk bit currently under the head (ignored in
    /// write mode). `write_mode` selects whether the decoder commits bits
    /// to the disk instead of reading them. `port_a` is VIA-B's live port
    /// A output, sampled into the write-shift register at each byte
    /// boundary while writing.
    pub fn tick_subcycle(&mut self, read_bit: bool, write_mode: bool, port_a: u8) -> FluxTick {
        if self.noise_countdown_16th_us > 0 {
            self.noise_countdown_16th_us -= 1;
        }
        if self.noise_countdown_16th_us == 0 {
            self.noise_fired_this_cell = true;
            self.noise_countdown_16th_us = self.rng.range_16th_us(2, 25);
        }

        self.sub_accum += 1;
        if self.sub_accum < self.threshold_sub_ticks {
            return FluxTick::default();
        }
        self.sub_accum = 0;

        if write_mode {
            self.commit_write(port_a)
        } else {
            self.commit_read(read_bit)
        }
    }

    fn commit_read(&mut self, read_bit: bool) -> FluxTick {
        let bit = if read_bit {
            self.noise_countdown_16th_us = self.rng.range_16th_us(18, 20);
            self.noise_fired_this_cell = false;
            self.consecutive_zero_cells = 0;
            true
        } else if self.noise_fired_this_cell {
            self.noise_fired_this_cell = false;
            self.consecutive_zero_cells = 0;
            true
        } else {
            self.consecutive_zero_cells += 1;
            if self.consecutive_zero_cells >= MAX_CONSECUTIVE_ZERO_CELLS {
                self.consecutive_zero_cells = 0;
                true
            } else {
                false
            }
        };
        self.shift_in(bit)
    }

    fn commit_write(&mut self, port_a: u8) -> FluxTick {
        if self.byte_bit_count == 0 {
            self.write_shift_register = port_a;
        }
        let bit = self.write_shift_register & 0x80 != 0;
        self.write_shift_register <<= 1;
        let mut event = self.shift_in(bit);
        event.write_bit = Some(bit);
        event
    }

    fn shift_in(&mut self, bit: bool) -> FluxTick {
        self.shift_register = (self.shift_register << 1 | u16::from(bit)) & 0x3FF;
        if self.shift_register == 0x3FF {
            self.byte_bit_count = 0;
            FluxTick {
                shifted: true,
                sync: true,
                ..FluxTick::default()
            }
        } else {
            self.byte_bit_count += 1;
            if self.byte_bit_count >= 8 {
                self.byte_bit_count = 0;
                FluxTick {
                    shifted: true,
                    byte_ready: true,
                    byte: (self.shift_register & 0xFF) as u8,
                    ..FluxTick::default()
                }
            } else {
                FluxTick {
                    shifted: true,
                    ..FluxTick::default()
                }
            }
        }
    }
}
