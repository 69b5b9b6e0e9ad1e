//! IEC serial bus: five open-collector lines shared between the host
//! computer and the drive. Each line reads high only when neither side
//! pulls it low, the same wired-OR real hardware's pull-up resistor and
//! two open-collector drivers implement.

#[derive(Debug, Clone, Copy, Default)]
struct Line {
    host_pull: bool,
    drive_pull: bool,
}

impl Line {
    fn level(self) -> bool {
        !self.host_pull && !self.drive_pull
    }
}

/// Five-line IEC bus connecting the host computer to the drive.
pub struct IecBus {
    atn: Line,
    clock: Line,
    data: Line,
    srq: Line,
    reset: Line,
}

impl IecBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            atn: Line::default(),
            clock: Line::default(),
            data: Line::default(),
            srq: Line::default(),
            reset: Line::default(),
        }
    }

    // --- host side ---
    pub fn set_host_atn(&mut self, pull_low: bool) {
        self.atn.host_pull = pull_low;
    }
    pub fn set_host_clock(&mut self, pull_low: bool) {
        self.clock.host_pull = pull_low;
    }
    pub fn set_host_data(&mut self, pull_low: bool) {
        self.data.host_pull = pull_low;
    }
    pub fn set_host_srq(&mut self, pull_low: bool) {
        self.srq.host_pull = pull_low;
    }
    pub fn set_host_reset(&mut self, pull_low: bool) {
        self.reset.host_pull = pull_low;
    }

    // --- drive side (the drive never drives ATN, SRQ, or RESET) ---
    pub fn set_drive_clock(&mut self, pull_low: bool) {
        self.clock.drive_pull = pull_low;
    }
    pub fn set_drive_data(&mut self, pull_low: bool) {
        self.data.drive_pull = pull_low;
    }

    // --- line levels (true = high / released) ---
    #[must_use]
    pub fn atn(&self) -> bool {
        self.atn.level()
    }
    #[must_use]
    pub fn clock(&self) -> bool {
        self.clock.level()
    }
    #[must_use]
    pub fn data(&self) -> bool {
        self.data.level()
    }
    #[must_use]
    pub fn srq(&self) -> bool {
        self.srq.level()
    }
    #[must_use]
    pub fn reset(&self) -> bool {
        self.reset.level()
    }
}

impl Default for IecBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure function implementing the drive's ATN-acknowledge side channel:
/// hardware XORs the host's ATN line with VIA-A PB4 (the ATN-ACK output
/// latch) and pulls DATA low whenever the XOR is high. Recomputed on every
/// publish rather than cached, since either input can change independently
/// from one cycle to the next.
#[must_use]
pub fn atn_ack_pulls_data(atn_line_high: bool, via_a_pb4_ack: bool) -> bool {
    atn_line_high != via_a_pb4_ack
}
