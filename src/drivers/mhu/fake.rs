//! RAM-backed MHU frames for host tests.
//!
//! A [`FakeFrame`] is a zeroed, 8-byte aligned buffer large enough for a
//! control page and 128 doorbell channel windows. Tests program the
//! read-only registers directly and inspect what the driver wrote.
//! [`ScriptedDelay`] stands in for the timer and can run a hook on every
//! delay to play the peer (clearing or raising flags mid-poll).

use std::boxed::Box;
use std::vec;

use core::mem::offset_of;
use core::ptr::{read_volatile, write_volatile};

use super::regs::{DBCW_PAGE_OFFSET, DBCW_STRIDE, MbxCtrlPage, MdbcwPage, PbxCtrlPage, PdbcwPage};
use super::{Frame, MAX_DOORBELL_CHANNELS};
use crate::drivers::timer::Delay;

const FRAME_BYTES: usize = DBCW_PAGE_OFFSET + MAX_DOORBELL_CHANNELS * DBCW_STRIDE;

/// Raw view of a fake frame. Copyable so delay hooks can capture it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Regs {
    base: *mut u32,
}

impl Regs {
    pub fn read(&self, offset: usize) -> u32 {
        assert!(offset % 4 == 0 && offset < FRAME_BYTES);
        // SAFETY: offset is in bounds of the owning FakeFrame allocation
        unsafe { read_volatile(self.base.add(offset / 4)) }
    }

    pub fn write(&self, offset: usize, value: u32) {
        assert!(offset % 4 == 0 && offset < FRAME_BYTES);
        // SAFETY: offset is in bounds of the owning FakeFrame allocation
        unsafe { write_volatile(self.base.add(offset / 4), value) }
    }

    /// Byte offset of a register inside channel `ch`'s window.
    pub fn channel(ch: u32, reg: usize) -> usize {
        DBCW_PAGE_OFFSET + ch as usize * DBCW_STRIDE + reg
    }
}

/// Register offsets the tests poke at.
pub(crate) mod off {
    use super::*;

    pub const PBX_BLK_ID: usize = offset_of!(PbxCtrlPage, blk_id);
    pub const PBX_FEAT_SPT0: usize = offset_of!(PbxCtrlPage, feat_spt0);
    pub const PBX_FEAT_SPT1: usize = offset_of!(PbxCtrlPage, feat_spt1);
    pub const PBX_DBCH_CFG0: usize = offset_of!(PbxCtrlPage, dbch_cfg0);
    pub const PBX_CTRL: usize = offset_of!(PbxCtrlPage, ctrl);
    pub const PBX_IIDR: usize = offset_of!(PbxCtrlPage, iidr);
    pub const PBX_AIDR: usize = offset_of!(PbxCtrlPage, aidr);

    pub const MBX_FEAT_SPT0: usize = offset_of!(MbxCtrlPage, feat_spt0);
    pub const MBX_DBCH_CFG0: usize = offset_of!(MbxCtrlPage, dbch_cfg0);
    pub const MBX_CTRL: usize = offset_of!(MbxCtrlPage, ctrl);
    pub const MBX_IIDR: usize = offset_of!(MbxCtrlPage, iidr);
    pub const MBX_AIDR: usize = offset_of!(MbxCtrlPage, aidr);

    pub const PDBCW_ST: usize = offset_of!(PdbcwPage, st);
    pub const PDBCW_SET: usize = offset_of!(PdbcwPage, set);
    pub const PDBCW_INT_CLR: usize = offset_of!(PdbcwPage, int_clr);
    pub const PDBCW_INT_EN: usize = offset_of!(PdbcwPage, int_en);
    pub const PDBCW_CTRL: usize = offset_of!(PdbcwPage, ctrl);

    pub const MDBCW_ST: usize = offset_of!(MdbcwPage, st);
    pub const MDBCW_CLR: usize = offset_of!(MdbcwPage, clr);
    pub const MDBCW_MSK_SET: usize = offset_of!(MdbcwPage, msk_set);
    pub const MDBCW_CTRL: usize = offset_of!(MdbcwPage, ctrl);
}

/// One fake postbox or mailbox frame.
pub(crate) struct FakeFrame {
    _mem: Box<[u64]>,
    regs: Regs,
}

impl FakeFrame {
    /// Zeroed frame with only the block identifier programmed.
    pub fn blank(block_id: u32) -> Self {
        let mut mem = vec![0u64; FRAME_BYTES / 8].into_boxed_slice();
        let regs = Regs {
            base: mem.as_mut_ptr().cast::<u32>(),
        };
        // BLK_ID sits at the same offset in both control pages
        regs.write(off::PBX_BLK_ID, block_id);
        Self { _mem: mem, regs }
    }

    /// Postbox with `num_dbch` channels and the given FEAT_SPT0.
    pub fn sender(num_dbch: u32, spt0: u32) -> Self {
        let frame = Self::blank(Frame::Sender.block_id());
        let r = frame.regs;
        r.write(off::PBX_FEAT_SPT0, spt0);
        r.write(off::PBX_DBCH_CFG0, num_dbch - 1);
        // Arm, product 0x0BA, variant 1, revision 0; architecture v3.0
        r.write(off::PBX_IIDR, (0x0BA << 20) | (0x1 << 16) | 0x43B);
        r.write(off::PBX_AIDR, 0x30);
        frame
    }

    /// Mailbox with `num_dbch` channels and the given FEAT_SPT0.
    pub fn receiver(num_dbch: u32, spt0: u32) -> Self {
        let frame = Self::blank(Frame::Receiver.block_id());
        let r = frame.regs;
        r.write(off::MBX_FEAT_SPT0, spt0);
        r.write(off::MBX_DBCH_CFG0, num_dbch - 1);
        r.write(off::MBX_IIDR, (0x0BB << 20) | (0x2 << 16) | (0x1 << 12) | 0x43B);
        r.write(off::MBX_AIDR, 0x31);
        frame
    }

    pub fn base(&self) -> usize {
        self.regs.base as usize
    }

    pub fn regs(&self) -> Regs {
        self.regs
    }
}

/// Delay that records calls and optionally runs a hook after each one.
///
/// The hook receives the 1-based call number.
#[derive(Default)]
pub(crate) struct ScriptedDelay {
    pub calls: u32,
    pub total_ms: u64,
    hook: Option<Box<dyn FnMut(u32)>>,
}

impl ScriptedDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl FnMut(u32) + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::default()
        }
    }
}

impl Delay for ScriptedDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += u64::from(ms);
        if let Some(hook) = self.hook.as_mut() {
            hook(self.calls);
        }
    }
}
