//! PL011 UART driver for the boot console.
//!
//! Polling-only, transmit-only. The UART is programmed for 8N1 with FIFOs
//! enabled and every interrupt masked; firmware never takes UART IRQs.

use core::fmt;
use core::mem::offset_of;
use volatile::Volatile;

/// PL011 UART register bit definitions.
///
/// Reference: [ARM PL011 TRM](https://developer.arm.com/documentation/ddi0183/latest/)
mod pl011_flags {
    // Flag Register (FR) bits - Section 3.3.6
    pub const FR_TXFF: u32 = 1 << 5; // Transmit FIFO full

    // Line Control Register (LCRH) bits - Section 3.3.7
    pub const LCRH_FEN: u32 = 1 << 4; // FIFO enable
    pub const LCRH_WLEN_8BIT: u32 = 0b11 << 5; // 8-bit word length

    // Control Register (CR) bits - Section 3.3.8
    pub const CR_UARTEN: u32 = 1 << 0; // UART enable
    pub const CR_TXE: u32 = 1 << 8; // Transmit enable

    // Interrupt Clear Register (ICR) - Section 3.3.13
    pub const ICR_ALL: u32 = 0x7FF; // Clear all interrupts
}

/// PL011 UART register offsets
#[repr(C)]
struct Pl011Registers {
    dr: Volatile<u32>, // 0x00 - Data Register
    _rsv0: [u32; 5],
    fr: Volatile<u32>, // 0x18 - Flag Register
    _rsv1: [u32; 2],
    ibrd: Volatile<u32>, // 0x24 - Integer Baud Rate Divisor
    fbrd: Volatile<u32>, // 0x28 - Fractional Baud Rate Divisor
    lcrh: Volatile<u32>, // 0x2C - Line Control Register
    cr: Volatile<u32>,   // 0x30 - Control Register
    _rsv2: [u32; 1],
    imsc: Volatile<u32>, // 0x38 - Interrupt Mask Set/Clear
    _rsv3: [u32; 2],
    icr: Volatile<u32>, // 0x44 - Interrupt Clear Register
}

const _: () = {
    assert!(offset_of!(Pl011Registers, fr) == 0x18);
    assert!(offset_of!(Pl011Registers, ibrd) == 0x24);
    assert!(offset_of!(Pl011Registers, cr) == 0x30);
    assert!(offset_of!(Pl011Registers, imsc) == 0x38);
    assert!(offset_of!(Pl011Registers, icr) == 0x44);
};

/// Integer and fractional baud rate divisors for `baud` at `clock_hz`.
///
/// Divisor = clock / (16 * baud), with the fraction in 1/64ths rounded to
/// nearest.
pub const fn baud_divisors(clock_hz: u32, baud: u32) -> (u32, u32) {
    let div = ((clock_hz as u64 * 8 / baud as u64) + 1) / 2;
    ((div >> 6) as u32, (div & 0x3F) as u32)
}

/// One PL011 UART.
pub struct Pl011 {
    base: usize,
}

impl Pl011 {
    /// UART at `base`.
    ///
    /// # Safety
    ///
    /// `base` must map a PL011 register block that nothing else drives.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn registers(&mut self) -> &mut Pl011Registers {
        // SAFETY: new()'s caller guarantees base maps an exclusively owned
        // PL011 block; &mut self keeps the borrow unique
        unsafe { &mut *(self.base as *mut Pl011Registers) }
    }

    /// Program the UART for `baud` 8N1 with FIFOs on, from a `clock_hz`
    /// reference clock.
    pub fn init(&mut self, clock_hz: u32, baud: u32) {
        let (ibrd, fbrd) = baud_divisors(clock_hz, baud);
        let regs = self.registers();

        // Disable UART during configuration
        regs.cr.write(0);

        regs.imsc.write(0);
        regs.icr.write(pl011_flags::ICR_ALL);

        regs.ibrd.write(ibrd);
        regs.fbrd.write(fbrd);

        // LCRH write latches the divisors
        regs.lcrh
            .write(pl011_flags::LCRH_FEN | pl011_flags::LCRH_WLEN_8BIT);

        regs.cr.write(pl011_flags::CR_UARTEN | pl011_flags::CR_TXE);
    }

    /// Write a single byte to the UART
    pub fn write_byte(&mut self, byte: u8) {
        let regs = self.registers();

        // Wait until transmit FIFO is not full
        while (regs.fr.read() & pl011_flags::FR_TXFF) != 0 {
            core::hint::spin_loop();
        }

        regs.dr.write(byte as u32);
    }

    /// Write a string to the UART
    pub fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            // Convert newline to carriage return + newline
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

impl fmt::Write for Pl011 {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}
