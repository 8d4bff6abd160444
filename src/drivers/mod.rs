//! Device drivers subsystem
//!
//! Organized by device class:
//! - `mhu`: Arm Message Handling Unit v3 (doorbell extension)
//! - `timer`: Busy-wait delays on the Arm generic timer
//! - `tty`: Serial console and `log` backend
//! - `watchdog`: SBSA generic watchdog

pub mod mhu;
pub mod timer;
pub mod tty;
pub mod watchdog;
