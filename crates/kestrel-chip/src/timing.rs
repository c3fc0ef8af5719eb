//! Clock and tick constants.

/// Accelerator core clock in Hz (400 MHz).
pub const CORE_CLOCK_HZ: u64 = 400_000_000;

/// System tick rate in Hz (32.768 kHz RTC-derived tick).
pub const TICK_RATE_HZ: u64 = 32_768;

/// Core cycles elapsed per system tick.
pub const CYCLES_PER_TICK: u64 = CORE_CLOCK_HZ / TICK_RATE_HZ;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_per_tick_sane() {
        // 400 MHz / 32.768 kHz ≈ 12207
        assert_eq!(CYCLES_PER_TICK, 12_207);
    }
}
