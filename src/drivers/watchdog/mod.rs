//! Watchdog drivers

pub mod sbsa;
