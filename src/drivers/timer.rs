//! Busy-wait delays.
//!
//! Drivers never sleep; they spin on a free-running counter between polls.
//! The [`Delay`] trait is what drivers are generic over, so the same driver
//! code runs against the Arm generic timer on hardware and against a scripted
//! delay in host tests.
//!
//! ## Arm Generic Timer
//!
//! | Register     | Purpose                                  |
//! |--------------|------------------------------------------|
//! | CNTPCT_EL0   | 64-bit physical count, free running      |
//! | CNTFRQ_EL0   | Counter frequency in Hz, set by firmware |
//!
//! The counter cannot be stopped or reset from EL3 code that does not own
//! the system counter, and at typical frequencies (tens of MHz) a 64-bit
//! count does not wrap within the lifetime of the platform.
//!
//! ## References
//!
//! - Arm ARM (DDI 0487), chapter D11 "The Generic Timer"

/// Busy-wait delay source.
pub trait Delay {
    /// Block the caller for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Convert a microsecond duration to counter ticks at `freq_hz`.
///
/// Rounds up so that a nonzero duration is never shortened to zero ticks.
pub const fn ticks_for_us(freq_hz: u64, us: u64) -> u64 {
    let ticks = (freq_hz as u128 * us as u128).div_ceil(1_000_000);
    if ticks > u64::MAX as u128 {
        u64::MAX
    } else {
        ticks as u64
    }
}

/// Arm generic timer, read through the EL0-visible system registers.
#[cfg(target_arch = "aarch64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericTimer;

#[cfg(target_arch = "aarch64")]
impl GenericTimer {
    /// Read the physical counter.
    #[inline]
    pub fn read_counter() -> u64 {
        let cnt: u64;
        // SAFETY: CNTPCT_EL0 is readable at every exception level this
        // firmware runs at and reading it has no side effects. The ISB keeps
        // the read from being hoisted above earlier instructions.
        unsafe {
            core::arch::asm!("isb", "mrs {}, cntpct_el0", out(reg) cnt, options(nomem, nostack));
        }
        cnt
    }

    /// Counter frequency in Hz, as programmed by the boot ROM.
    #[inline]
    pub fn frequency() -> u64 {
        let freq: u64;
        // SAFETY: CNTFRQ_EL0 is a read-only view of the configured frequency.
        unsafe {
            core::arch::asm!("mrs {}, cntfrq_el0", out(reg) freq, options(nomem, nostack));
        }
        freq
    }

    /// Spin for at least `us` microseconds.
    pub fn delay_us(us: u64) {
        let start = Self::read_counter();
        let ticks = ticks_for_us(Self::frequency(), us);

        while Self::read_counter().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}

#[cfg(target_arch = "aarch64")]
impl Delay for GenericTimer {
    fn delay_ms(&mut self, ms: u32) {
        Self::delay_us(u64::from(ms) * 1000);
    }
}
