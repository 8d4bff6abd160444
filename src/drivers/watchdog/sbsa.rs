//! SBSA generic watchdog, control frame only.
//!
//! The watchdog counts against the system counter. Once enabled it raises
//! WS0 when the offset elapses and resets the system on WS1, one offset
//! later, unless it is refreshed or disabled in between. Boot code arms it
//! around work that may wait on a peer indefinitely.
//!
//! | Offset | Register | Purpose                                 |
//! |--------|----------|-----------------------------------------|
//! | 0x000  | WCS      | Control and status, bit 0 enables       |
//! | 0x008  | WOR      | Offset, 48 bits split over two words    |
//! | 0x010  | WCV      | Compare value, loaded on enable/refresh |
//! | 0xFCC  | W_IIDR   | Implementation identification           |
//!
//! Reference: Arm Server Base System Architecture, "Generic Watchdog"

use core::mem::offset_of;
use volatile::{ReadOnly, Volatile};

use crate::drivers::timer::ticks_for_us;

mod wdog_flags {
    // Control and Status (WCS)
    pub const WCS_EN: u32 = 1 << 0; // Watchdog enable
    pub const WCS_WS0: u32 = 1 << 1; // First stage signal
    pub const WCS_WS1: u32 = 1 << 2; // Second stage signal
}

/// Width of the offset register in bits.
pub const WOR_WIDTH: u32 = 48;
/// Largest offset the watchdog accepts.
pub const WOR_MAX: u64 = (1 << WOR_WIDTH) - 1;

#[repr(C)]
struct SbsaWdogRegisters {
    wcs: Volatile<u32>, // 0x000 - Control and Status
    _rsv0: u32,
    wor_low: Volatile<u32>,  // 0x008 - Offset [31:0]
    wor_high: Volatile<u32>, // 0x00C - Offset [47:32]
    _rsv1: [u32; 1007],
    w_iidr: ReadOnly<u32>, // 0xFCC - Interface Identification
}

const _: () = {
    assert!(offset_of!(SbsaWdogRegisters, wor_low) == 0x008);
    assert!(offset_of!(SbsaWdogRegisters, wor_high) == 0x00C);
    assert!(offset_of!(SbsaWdogRegisters, w_iidr) == 0xFCC);
};

/// Watchdog offset for `timeout_ms` at a `counter_hz` system counter,
/// saturated to the 48-bit register.
pub const fn offset_ticks(counter_hz: u64, timeout_ms: u64) -> u64 {
    let ticks = ticks_for_us(counter_hz, timeout_ms.saturating_mul(1000));
    if ticks > WOR_MAX { WOR_MAX } else { ticks }
}

/// One SBSA generic watchdog control frame.
pub struct SbsaWatchdog {
    base: usize,
}

impl SbsaWatchdog {
    /// Watchdog whose control frame is at `base`.
    ///
    /// # Safety
    ///
    /// `base` must map an SBSA watchdog control frame that nothing else
    /// drives.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn registers(&mut self) -> &mut SbsaWdogRegisters {
        // SAFETY: new()'s caller guarantees base maps an exclusively owned
        // control frame; &mut self keeps the borrow unique
        unsafe { &mut *(self.base as *mut SbsaWdogRegisters) }
    }

    /// Arm the watchdog to signal after `timeout_ms`.
    ///
    /// The offset is programmed before the enable bit, since enabling loads
    /// the compare value from it.
    pub fn start(&mut self, counter_hz: u64, timeout_ms: u64) {
        let offset = offset_ticks(counter_hz, timeout_ms);
        let regs = self.registers();

        regs.wor_low.write(offset as u32);
        regs.wor_high.write((offset >> 32) as u32);
        regs.wcs.write(wdog_flags::WCS_EN);

        #[cfg(target_arch = "aarch64")]
        // SAFETY: a barrier has no effect beyond ordering memory accesses
        unsafe {
            core::arch::asm!("dsb sy", options(nostack));
        }
        log::info!("Watchdog armed: {} ms ({:#x} ticks)", timeout_ms, offset);
    }

    /// Disarm the watchdog.
    pub fn stop(&mut self) {
        self.registers().wcs.write(0);
    }

    pub fn is_enabled(&mut self) -> bool {
        self.registers().wcs.read() & wdog_flags::WCS_EN != 0
    }

    /// Has the first-stage signal fired since the last refresh?
    pub fn has_signalled(&mut self) -> bool {
        self.registers().wcs.read() & (wdog_flags::WCS_WS0 | wdog_flags::WCS_WS1) != 0
    }

    /// Product and revision from W_IIDR.
    pub fn iidr(&mut self) -> u32 {
        self.registers().w_iidr.read()
    }
}
