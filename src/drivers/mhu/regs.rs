//! MHUv3 register layouts.
//!
//! Each frame (postbox or mailbox) is a run of 4 KiB pages. Page 0 is the
//! control page; the doorbell channel windows start at +0x1000, one
//! 0x20-byte window per channel.
//!
//! | Offset   | Postbox (PBX)     | Mailbox (MBX)     |
//! |----------|-------------------|-------------------|
//! | +0x0000  | PBX_CTRL page     | MBX_CTRL page     |
//! | +0x1000  | PDBCW windows     | MDBCW windows     |
//! | +0x2000  | PFFCW windows     | MFFCW windows     |
//! | +0x3000  | PFCW windows      | MFCW windows      |
//! | +0xF000  | IMPL_DEF page     | IMPL_DEF page     |
//!
//! Layouts are checked at compile time against the architectural offsets,
//! so a misplaced padding array fails the build instead of the hardware.
//!
//! # References
//!
//! - Arm MHUv3 Architecture Specification (DEN0136), chapter 6
//! - TF-A: include/drivers/arm/mhuv3.h

use core::mem::{offset_of, size_of};
use volatile::{ReadOnly, Volatile, WriteOnly};

/// Control page offset within a frame.
pub const CTRL_PAGE_OFFSET: usize = 0x0000;
/// Doorbell channel window page offset within a frame.
pub const DBCW_PAGE_OFFSET: usize = 0x1000;
/// FIFO channel window page offset within a frame (unused).
pub const FFCW_PAGE_OFFSET: usize = 0x2000;

/// Number of flags carried by one doorbell channel.
pub const NUM_DB_FLAGS: u32 = 32;
/// Mask covering every flag of a doorbell channel.
pub const ALL_FLAGS_MASK: u32 = genmask(NUM_DB_FLAGS - 1, 0);

/// Build a contiguous mask covering bits `msb..=lsb`.
pub const fn genmask(msb: u32, lsb: u32) -> u32 {
    (u32::MAX >> (31 - msb)) & (u32::MAX << lsb)
}

/// Extract bits `msb..=lsb` of `value`, shifted down to bit 0.
pub const fn field(value: u32, msb: u32, lsb: u32) -> u32 {
    (value & genmask(msb, lsb)) >> lsb
}

/// Bit definitions shared by both control pages.
pub mod ctrl {
    /// BLK_ID[3:0]: frame type tag.
    pub const BLK_ID_MSB: u32 = 3;
    pub const BLK_ID_LSB: u32 = 0;

    /// CTRL bit 0: request the frame to become operational.
    pub const OP_REQ: u32 = 1 << 0;
    /// CTRL bit 1: channel operational-request mask. Set means "ignore".
    pub const CH_OP_MSK: u32 = 1 << 1;

    /// DBCH_CFG0[7:0]: number of doorbell channels minus one.
    pub const NUM_DBCH_MSB: u32 = 7;
    pub const NUM_DBCH_LSB: u32 = 0;

    // IIDR fields
    pub const IIDR_IMPLEMENTER_MSB: u32 = 11;
    pub const IIDR_IMPLEMENTER_LSB: u32 = 0;
    pub const IIDR_REVISION_MSB: u32 = 15;
    pub const IIDR_REVISION_LSB: u32 = 12;
    pub const IIDR_VARIANT_MSB: u32 = 19;
    pub const IIDR_VARIANT_LSB: u32 = 16;
    pub const IIDR_PRODUCT_ID_MSB: u32 = 31;
    pub const IIDR_PRODUCT_ID_LSB: u32 = 20;

    // AIDR fields
    pub const AIDR_MINOR_MSB: u32 = 3;
    pub const AIDR_MINOR_LSB: u32 = 0;
    pub const AIDR_MAJOR_MSB: u32 = 7;
    pub const AIDR_MAJOR_LSB: u32 = 4;
}

/// Postbox doorbell channel window bits.
pub mod pdbcw {
    /// INT_ST / INT_CLR / INT_EN bit 0: transfer acknowledge.
    pub const TFR_ACK: u32 = 1 << 0;
    /// CTRL bit 0: channel contributes to the PBX combined interrupt.
    pub const PBX_COMB_EN: u32 = 1 << 0;
}

/// Mailbox doorbell channel window bits.
pub mod mdbcw {
    /// CTRL bit 0: channel contributes to the MBX combined interrupt.
    pub const MBX_COMB_EN: u32 = 1 << 0;
}

/// Postbox control page (PBX_CTRL_page).
#[repr(C)]
pub struct PbxCtrlPage {
    pub blk_id: ReadOnly<u32>, // 0x000
    _reserved0: [u32; 3],
    pub feat_spt0: ReadOnly<u32>, // 0x010
    pub feat_spt1: ReadOnly<u32>, // 0x014
    _reserved1: [u32; 2],
    pub dbch_cfg0: ReadOnly<u32>, // 0x020
    _reserved2: [u32; 3],
    pub ffch_cfg0: ReadOnly<u32>, // 0x030
    _reserved3: [u32; 3],
    pub fch_cfg0: ReadOnly<u32>, // 0x040
    _reserved4: [u32; 3],
    pub dch_cfg0: ReadOnly<u32>, // 0x050
    _reserved5: [u32; 43],
    pub ctrl: Volatile<u32>, // 0x100
    _reserved6: [u32; 19],
    pub dma_ctrl: Volatile<u32>,     // 0x150
    pub dma_st: ReadOnly<u32>,       // 0x154
    pub dma_cdl_base: Volatile<u64>, // 0x158
    pub dma_cdl_prop: Volatile<u32>, // 0x160
    _reserved7: [u32; 167],
    pub dbch_int_st: [ReadOnly<u32>; 4], // 0x400
    pub ffch_int_st: [ReadOnly<u32>; 8], // 0x410
    pub dch_int_st: ReadOnly<u32>,       // 0x430
    _reserved8: [u32; 741],
    pub iidr: ReadOnly<u32>,             // 0xFC8
    pub aidr: ReadOnly<u32>,             // 0xFCC
    pub impl_def_id: [ReadOnly<u32>; 12], // 0xFD0
}

/// Mailbox control page (MBX_CTRL_page).
#[repr(C)]
pub struct MbxCtrlPage {
    pub blk_id: ReadOnly<u32>, // 0x000
    _reserved0: [u32; 3],
    pub feat_spt0: ReadOnly<u32>, // 0x010
    pub feat_spt1: ReadOnly<u32>, // 0x014
    _reserved1: [u32; 2],
    pub dbch_cfg0: ReadOnly<u32>, // 0x020
    _reserved2: [u32; 3],
    pub ffch_cfg0: ReadOnly<u32>, // 0x030
    _reserved3: [u32; 3],
    pub fch_cfg0: ReadOnly<u32>, // 0x040
    _reserved4: [u32; 3],
    pub dch_cfg0: ReadOnly<u32>, // 0x050
    _reserved5: [u32; 43],
    pub ctrl: Volatile<u32>, // 0x100
    _reserved6: [u32; 15],
    pub fch_ctrl: Volatile<u32>,   // 0x140
    pub fcg_int_en: Volatile<u32>, // 0x144
    _reserved7: [u32; 2],
    pub dma_ctrl: Volatile<u32>,     // 0x150
    pub dma_st: ReadOnly<u32>,       // 0x154
    pub dma_cdl_base: Volatile<u64>, // 0x158
    pub dma_cdl_prop: Volatile<u32>, // 0x160
    _reserved8: [u32; 167],
    pub dbch_int_st: [ReadOnly<u32>; 4],     // 0x400
    pub ffch_int_st: [ReadOnly<u32>; 4],     // 0x410
    pub fcg_int_st: ReadOnly<u32>,           // 0x420
    _reserved9: [u32; 3],
    pub fch_grp_int_st: [ReadOnly<u32>; 32], // 0x430
    pub dch_int_st: ReadOnly<u32>,           // 0x4B0
    _reserved10: [u32; 709],
    pub iidr: ReadOnly<u32>,             // 0xFC8
    pub aidr: ReadOnly<u32>,             // 0xFCC
    pub impl_def_id: [ReadOnly<u32>; 12], // 0xFD0
}

/// Postbox doorbell channel window (PDBCW), one per channel.
#[repr(C)]
pub struct PdbcwPage {
    pub st: ReadOnly<u32>, // 0x00
    _reserved0: [u32; 2],
    pub set: WriteOnly<u32>,     // 0x0C
    pub int_st: ReadOnly<u32>,   // 0x10
    pub int_clr: WriteOnly<u32>, // 0x14
    pub int_en: Volatile<u32>,   // 0x18
    pub ctrl: Volatile<u32>,     // 0x1C
}

/// Mailbox doorbell channel window (MDBCW), one per channel.
#[repr(C)]
pub struct MdbcwPage {
    pub st: ReadOnly<u32>,     // 0x00
    pub st_msk: ReadOnly<u32>, // 0x04
    pub clr: WriteOnly<u32>,   // 0x08
    _reserved0: u32,
    pub msk_st: ReadOnly<u32>,   // 0x10
    pub msk_set: WriteOnly<u32>, // 0x14
    pub msk_clr: WriteOnly<u32>, // 0x18
    pub ctrl: Volatile<u32>,     // 0x1C
}

/// Distance between consecutive doorbell channel windows.
pub const DBCW_STRIDE: usize = size_of::<PdbcwPage>();

const _: () = {
    assert!(offset_of!(PbxCtrlPage, feat_spt0) == 0x010);
    assert!(offset_of!(PbxCtrlPage, dbch_cfg0) == 0x020);
    assert!(offset_of!(PbxCtrlPage, dch_cfg0) == 0x050);
    assert!(offset_of!(PbxCtrlPage, ctrl) == 0x100);
    assert!(offset_of!(PbxCtrlPage, dma_ctrl) == 0x150);
    assert!(offset_of!(PbxCtrlPage, dma_cdl_base) == 0x158);
    assert!(offset_of!(PbxCtrlPage, dbch_int_st) == 0x400);
    assert!(offset_of!(PbxCtrlPage, dch_int_st) == 0x430);
    assert!(offset_of!(PbxCtrlPage, iidr) == 0xFC8);
    assert!(offset_of!(PbxCtrlPage, aidr) == 0xFCC);
    assert!(size_of::<PbxCtrlPage>() == 0x1000);

    assert!(offset_of!(MbxCtrlPage, feat_spt1) == 0x014);
    assert!(offset_of!(MbxCtrlPage, ctrl) == 0x100);
    assert!(offset_of!(MbxCtrlPage, fch_ctrl) == 0x140);
    assert!(offset_of!(MbxCtrlPage, dma_ctrl) == 0x150);
    assert!(offset_of!(MbxCtrlPage, fcg_int_st) == 0x420);
    assert!(offset_of!(MbxCtrlPage, fch_grp_int_st) == 0x430);
    assert!(offset_of!(MbxCtrlPage, dch_int_st) == 0x4B0);
    assert!(offset_of!(MbxCtrlPage, iidr) == 0xFC8);
    assert!(size_of::<MbxCtrlPage>() == 0x1000);

    assert!(offset_of!(PdbcwPage, set) == 0x0C);
    assert!(offset_of!(PdbcwPage, int_clr) == 0x14);
    assert!(offset_of!(PdbcwPage, ctrl) == 0x1C);
    assert!(size_of::<PdbcwPage>() == 0x20);

    assert!(offset_of!(MdbcwPage, clr) == 0x08);
    assert!(offset_of!(MdbcwPage, msk_st) == 0x10);
    assert!(offset_of!(MdbcwPage, msk_set) == 0x14);
    assert!(offset_of!(MdbcwPage, ctrl) == 0x1C);
    assert!(size_of::<MdbcwPage>() == DBCW_STRIDE);
};
