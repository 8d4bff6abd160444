//! Serial port drivers

pub mod amba_pl011;
