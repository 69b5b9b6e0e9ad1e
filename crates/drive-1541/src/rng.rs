//! Seeded xorshift generator for the flux decoder's weak-bit noise model.
//!
//! Never draws from a global RNG: each `FluxDecoder` owns one of these,
//! reseeded to the same value on every reset, so repeated emulation runs
//! starting from the same seed are reproducible.

#[derive(Debug, Clone, Copy)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Construct with the given seed. A seed of zero would make the
    /// generator output zero forever, so it is replaced with a fixed
    /// non-zero fallback.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0xACE1_u32 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform draw over `[low_us, high_us)`, expressed in 1/16 us units
    /// (the flux decoder's sub-tick granularity).
    pub fn range_16th_us(&mut self, low_us: u32, high_us: u32) -> u32 {
        let span_16th = (high_us - low_us).max(1) * 16;
        low_us * 16 + self.next_u32() % span_16th
    }
}
