//! Kronos BL2 firmware
//!
//! Drivers and platform support for the RD-Kronos second-stage boot loader:
//! the Arm MHUv3 doorbell driver used to signal the SCP and RSS, firmware
//! configuration loading, and the boot console.

#![cfg_attr(not(test), no_std)]

pub mod drivers;
pub mod fconf;
pub mod platform;

/// Print macro for console output
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::drivers::tty::console::_print(format_args!($($arg)*)));
}

/// Println macro for console output
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
