//! Terminal and serial drivers
//!
//! - `serial`: UART hardware drivers
//! - `console`: the boot console and its `log` backend

pub mod console;
pub mod serial;
