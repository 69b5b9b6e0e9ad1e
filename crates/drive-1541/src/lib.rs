//! Cycle-accurate Commodore 1541 floppy disk drive emulator.
//!
//! A [`Drive1541`] owns its own MOS 6502, its two MOS 6522 VIAs (by way of
//! [`bus::Drive1541Bus`]), its mechanism (head position, rotation, motor),
//! and its flux decoder. [`Drive1541::step_cycle`] is the single entry
//! point: it runs exactly one CPU cycle and publishes the drive's half of
//! the IEC serial bus, in the same order real hardware would settle it:
//!
//!   1. Sample the host-driven serial lines into VIA-A's input port.
//!   2. Run one 6502 cycle against the internal bus.
//!   3. Tick both VIAs once.
//!   4. Sample VIA-B's mechanism outputs (stepper, motor, LED, density).
//!   5. Run 16 flux-decoder sub-ticks (the 16 MHz/1 MHz ratio).
//!   6. Compute and publish the drive's outgoing serial line levels.
//!   7. Deliver the VIAs' OR'd IRQ state to the CPU, and advance the
//!      write-protect sensor's media-change sequencing.
//!
//! No step here reaches for global state or wall-clock time: a `Drive1541`
//! is a pure function of its previous state and the lines it's handed,
//! which is what makes it safe to resume from a saved snapshot or to run
//! deterministically under test.

pub mod bus;
pub mod flux;
pub mod iec;
pub mod image;
pub mod mechanism;
mod rng;

use bus::Drive1541Bus;
use emu_core::Cpu;
use flux::FluxDecoder;
use iec::IecBus;
use image::DiskImage;
use mechanism::Mechanism;
use mos_6502::Mos6502;

/// A complete 1541 drive: CPU, VIAs, mechanism, flux decoder, and an
/// optionally-mounted disk image.
pub struct Drive1541 {
    cpu: Mos6502,
    bus: Drive1541Bus,
    mechanism: Mechanism,
    flux: FluxDecoder,
    image: Option<DiskImage>,
    write_protected_disk: bool,
    rng_seed: u32,
    prev_atn_line: bool,
    prev_byte_ready: bool,
}

impl Drive1541 {
    /// Build a drive around its 16 KiB ROM image, deterministically seeded
    /// for the flux decoder's weak-bit noise model. The CPU is left
    /// un-reset; call [`Drive1541::reset`] (or drive it with the IEC
    /// RESET line low) before the first `step_cycle`.
    pub fn new(rom: Vec<u8>, rng_seed: u32) -> Result<Self, String> {
        Ok(Self {
            cpu: Mos6502::new(),
            bus: Drive1541Bus::new(rom)?,
            mechanism: Mechanism::new(),
            flux: FluxDecoder::new(rng_seed),
            image: None,
            write_protected_disk: false,
            rng_seed,
            prev_atn_line: true,
            prev_byte_ready: false,
        })
    }

    pub fn enable_ram_expansion(&mut self) {
        self.bus.enable_ram_expansion();
    }

    /// Coordinate a reset: both VIAs, the flux decoder, and the CPU (whose
    /// own 7-cycle power-on sequence plays out over the next few
    /// `step_cycle` calls), and drive VIA-A's serial-bus inputs back to
    /// their released (high) default. The mechanism is untouched, since
    /// real hardware does not recalibrate head position on reset.
    pub fn reset(&mut self) {
        self.bus.via_a = mos_via_6522::Via6522::new();
        self.bus.via_b = mos_via_6522::Via6522::new();
        self.bus.via_a.external_b = 0xFF;
        self.flux.reset(self.rng_seed);
        self.cpu.reset();
        self.prev_atn_line = true;
        self.prev_byte_ready = false;
    }

    /// Mount a disk image, picking the format by `name`'s suffix
    /// (`.d64`/`.g64`/`.nib`/`.nbz`). Triggers the write-protect sensor's
    /// media-change sequence.
    pub fn insert_disk(&mut self, name: &str, bytes: &[u8], write_protected: bool) -> Result<(), String> {
        self.image = Some(DiskImage::load(name, bytes)?);
        self.write_protected_disk = write_protected;
        self.mechanism.begin_disk_swap();
        Ok(())
    }

    /// Remove the mounted disk, if any. Triggers the write-protect
    /// sensor's media-change sequence.
    pub fn eject_disk(&mut self) {
        self.image = None;
        self.mechanism.begin_disk_swap();
    }

    /// Re-encode the mounted image back to its on-disk byte layout.
    pub fn save_disk(&mut self) -> Result<Vec<u8>, String> {
        self.image.as_mut().ok_or("no disk inserted")?.save()
    }

    #[must_use]
    pub fn has_disk(&self) -> bool {
        self.image.is_some()
    }

    #[must_use]
    pub fn half_track(&self) -> u8 {
        self.mechanism.half_track()
    }

    #[must_use]
    pub fn motor_on(&self) -> bool {
        self.mechanism.motor_on()
    }

    #[must_use]
    pub fn led_on(&self) -> bool {
        self.mechanism.led_on()
    }

    #[must_use]
    pub fn cpu_pc(&self) -> u32 {
        self.cpu.pc()
    }

    /// Run exactly one CPU cycle, sampling `iec`'s host-driven lines on
    /// entry and publishing the drive's outgoing lines on exit.
    pub fn step_cycle(&mut self, iec: &mut IecBus) {
        self.sample_iec_inputs(iec);

        self.cpu.tick(&mut self.bus);

        self.bus.via_a.tick();
        self.bus.via_b.tick();

        self.apply_mechanics();
        self.run_flux_subticks();

        self.publish_iec_outputs(iec);

        self.cpu
            .set_irq(self.bus.via_a.irq_active() || self.bus.via_b.irq_active());

        self.mechanism.tick_write_protect();
    }

    /// VIA-A port B bit layout: bit0 DATA IN, bit2 CLOCK IN, bit7 ATN IN
    /// (1 = released). CA1 is wired to the raw ATN line for edge-detected
    /// ATN service interrupts.
    fn sample_iec_inputs(&mut self, iec: &IecBus) {
        let mut ext = self.bus.via_a.external_b;
        ext = (ext & !0x01) | u8::from(!iec.data());
        ext = (ext & !0x04) | (u8::from(!iec.clock()) << 2);
        ext = (ext & !0x80) | (u8::from(iec.atn()) << 7);
        self.bus.via_a.external_b = ext;

        let atn_level = iec.atn();
        if atn_level != self.prev_atn_line {
            self.bus.via_a.set_ca1(atn_level);
            self.prev_atn_line = atn_level;
        }
    }

    /// VIA-A port B bit layout (outputs): bit1 DATA OUT, bit3 CLOCK OUT,
    /// bit4 ATN ACK. DATA is additionally pulled low whenever the
    /// ATN-acknowledge XOR fires, independent of PB1.
    fn publish_iec_outputs(&mut self, iec: &mut IecBus) {
        let pb = self.bus.via_a.port_b_output();
        let data_out = pb & 0x02 != 0;
        let clock_out = pb & 0x08 != 0;
        let atn_ack = pb & 0x10 != 0;
        let ack_pulls_data = iec::atn_ack_pulls_data(iec.atn(), atn_ack);

        iec.set_drive_data(data_out || ack_pulls_data);
        iec.set_drive_clock(clock_out);
    }

    /// VIA-B port B bit layout: bits0-1 stepper phase, bit2 motor, bit3
    /// LED, bit4 write-protect sense (active-low), bits5-6 density select.
    fn apply_mechanics(&mut self) {
        let pb = self.bus.via_b.port_b_output();
        self.mechanism.set_motor(pb & 0x04 != 0);
        self.mechanism.set_led(pb & 0x08 != 0);
        self.mechanism.set_density((pb >> 5) & 0x03);
        self.mechanism.step(pb & 0x03);

        let disk_write_protected = self.image.is_some() && self.write_protected_disk;
        let protected_now = self.mechanism.write_protect_sensor(disk_write_protected);
        self.bus.via_b.external_b =
            (self.bus.via_b.external_b & !0x10) | if protected_now { 0 } else { 0x10 };
    }

    /// VIA-B port A carries the GCR data byte; CB1 pulses on byte-ready;
    /// CB2 low selects write mode; PB7 (active-low) reflects SYNC.
    fn run_flux_subticks(&mut self) {
        let write_mode = !self.bus.via_b.cb2_output();
        self.flux.set_density(self.mechanism.density());

        if self.prev_byte_ready {
            self.bus.via_b.set_cb1(false);
            self.prev_byte_ready = false;
        }

        for _ in 0..16 {
            let half_track = self.mechanism.half_track();
            let angle = self.mechanism.angle_bits();
            let track_bits = self
                .image
                .as_ref()
                .and_then(|img| img.track(half_track))
                .map_or(mechanism::SYNTHETIC_TRACK_BITS, |t| t.bit_length.max(1));
            let read_bit = self
                .image
                .as_ref()
                .and_then(|img| img.bit(half_track, angle))
                .unwrap_or(true);
            let port_a = self.bus.via_b.port_a_output();

            let event = self.flux.tick_subcycle(read_bit, write_mode, port_a);
            if !event.shifted {
                continue;
            }

            if let Some(bit) = event.write_bit {
                if let Some(image) = &mut self.image {
                    image.set_bit(half_track, angle, bit);
                }
            }
            self.mechanism.advance_angle(track_bits);

            if event.byte_ready {
                self.bus.via_b.external_a = event.byte;
                self.bus.via_b.set_cb1(true);
                self.prev_byte_ready = true;
            }
            self.bus.via_b.external_b =
                (self.bus.via_b.external_b & !0x80) | if event.sync { 0 } else { 0x80 };
        }
    }
}
