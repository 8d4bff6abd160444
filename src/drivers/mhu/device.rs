//! MHUv3 device: one postbox/mailbox pair.
//!
//! Holds both frames' base addresses and identification, the capability
//! table, the sender doorbell pool and the owner-token counter. Frames are
//! initialized independently and never torn down.

use super::doorbell::{DoorbellData, DoorbellPool, OwnerId, Reservation};
use super::feature::{self, CAPABILITY_COUNT, CapabilityId, Feature};
use super::regs::{
    ALL_FLAGS_MASK, CTRL_PAGE_OFFSET, DBCW_PAGE_OFFSET, DBCW_STRIDE, MbxCtrlPage, MdbcwPage,
    PbxCtrlPage, PdbcwPage, ctrl, field, mdbcw, pdbcw,
};
use super::{Frame, MAX_DOORBELL_CHANNELS, MhuError, POLL_DELAY_MS, PerFrame, RETRY_BUDGET};
use crate::drivers::timer::Delay;

/// Architecture revision from AIDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

/// Identification captured from a frame's IIDR/AIDR at init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameId {
    pub implementer: u16,
    pub revision: u8,
    pub variant: u8,
    pub product_id: u16,
    pub version: Version,
}

impl FrameId {
    fn decode(iidr: u32, aidr: u32) -> Self {
        Self {
            implementer: field(iidr, ctrl::IIDR_IMPLEMENTER_MSB, ctrl::IIDR_IMPLEMENTER_LSB) as u16,
            revision: field(iidr, ctrl::IIDR_REVISION_MSB, ctrl::IIDR_REVISION_LSB) as u8,
            variant: field(iidr, ctrl::IIDR_VARIANT_MSB, ctrl::IIDR_VARIANT_LSB) as u8,
            product_id: field(iidr, ctrl::IIDR_PRODUCT_ID_MSB, ctrl::IIDR_PRODUCT_ID_LSB) as u16,
            version: Version {
                major: field(aidr, ctrl::AIDR_MAJOR_MSB, ctrl::AIDR_MAJOR_LSB) as u8,
                minor: field(aidr, ctrl::AIDR_MINOR_MSB, ctrl::AIDR_MINOR_LSB) as u8,
            },
        }
    }
}

/// One logical MHUv3 instance.
pub struct MhuDevice<D: Delay> {
    pbx: usize,
    mbx: usize,
    initialized: PerFrame<bool>,
    id: PerFrame<FrameId>,
    features: [Feature; CAPABILITY_COUNT],
    pbx_db: DoorbellPool,
    mbx_num_dbch: u32,
    /// Last owner token handed out. Reset with the sender pool on every
    /// sender-frame init, so tokens are unique only within one init.
    owner_counter: u64,
    delay: D,
}

impl<D: Delay> MhuDevice<D> {
    /// Uninitialized device using `features` as its capability table.
    pub const fn new(features: [Feature; CAPABILITY_COUNT], delay: D) -> Self {
        Self {
            pbx: 0,
            mbx: 0,
            initialized: PerFrame::splat(false),
            id: PerFrame::splat(FrameId {
                implementer: 0,
                revision: 0,
                variant: 0,
                product_id: 0,
                version: Version { major: 0, minor: 0 },
            }),
            features,
            pbx_db: DoorbellPool::new(),
            mbx_num_dbch: 0,
            owner_counter: 0,
            delay,
        }
    }


    fn pbx_ctrl(&mut self) -> &mut PbxCtrlPage {
        // SAFETY: pbx was validated in init_sender_frame, whose caller
        // guarantees it maps a postbox frame owned by this device. Taking
        // &mut self keeps the borrow exclusive.
        unsafe { &mut *((self.pbx + CTRL_PAGE_OFFSET) as *mut PbxCtrlPage) }
    }

    fn mbx_ctrl(&mut self) -> &mut MbxCtrlPage {
        // SAFETY: see pbx_ctrl; mbx was validated in init_receiver_frame
        unsafe { &mut *((self.mbx + CTRL_PAGE_OFFSET) as *mut MbxCtrlPage) }
    }

    fn pdbcw(&mut self, ch: u32) -> &mut PdbcwPage {
        debug_assert!((ch as usize) < MAX_DOORBELL_CHANNELS);
        let addr = self.pbx + DBCW_PAGE_OFFSET + ch as usize * DBCW_STRIDE;
        // SAFETY: ch is below the discovered channel count, so the window
        // lies inside the postbox frame
        unsafe { &mut *(addr as *mut PdbcwPage) }
    }

    fn mdbcw(&mut self, ch: u32) -> &mut MdbcwPage {
        debug_assert!((ch as usize) < MAX_DOORBELL_CHANNELS);
        let addr = self.mbx + DBCW_PAGE_OFFSET + ch as usize * DBCW_STRIDE;
        // SAFETY: ch is below the discovered channel count, so the window
        // lies inside the mailbox frame
        unsafe { &mut *(addr as *mut MdbcwPage) }
    }


    /// Bring up the postbox frame at `base`.
    ///
    /// Requests operational mode, records identification, discovers
    /// features and, if the doorbell extension is present, resets every
    /// doorbell channel to free with its interrupts disabled. Resets the
    /// owner-token counter.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `base` is null
    /// - `ConfigurationMismatch` if the block does not identify as a postbox
    ///
    /// # Safety
    ///
    /// `base` must be the address of a mapped MHUv3 postbox frame that is
    /// not accessed through any other path while this device exists.
    pub unsafe fn init_sender_frame(&mut self, base: usize) -> Result<(), MhuError> {
        if base == 0 {
            log::error!("MHUv3: null Postbox base address");
            return Err(MhuError::InvalidArgument);
        }
        // SAFETY: forwarded from the caller
        if unsafe { block_tag(base) } != Some(Frame::Sender) {
            log::error!("MHUv3: {:#x} is not a Sender Frame, check the IO base address", base);
            return Err(MhuError::ConfigurationMismatch);
        }
        self.pbx = base;

        let page = self.pbx_ctrl();
        page.ctrl.update(|v| *v = (*v | ctrl::OP_REQ) & !ctrl::CH_OP_MSK);
        let id = FrameId::decode(page.iidr.read(), page.aidr.read());
        let (spt0, spt1) = (page.feat_spt0.read(), page.feat_spt1.read());

        self.id[Frame::Sender] = id;
        self.initialized[Frame::Sender] = true;
        log_identity(Frame::Sender, &id);

        self.discover_features(Frame::Sender, spt0, spt1);
        if self.feature_valid(CapabilityId::Doorbell, Frame::Sender) {
            self.init_sender_doorbells();
        }

        self.owner_counter = 0;
        Ok(())
    }

    /// Bring up the mailbox frame at `base`.
    ///
    /// Mirrors [`init_sender_frame`](Self::init_sender_frame); the doorbell
    /// setup masks every flag of every channel instead of building a pool.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `base` is null
    /// - `ConfigurationMismatch` if the block does not identify as a mailbox
    ///
    /// # Safety
    ///
    /// `base` must be the address of a mapped MHUv3 mailbox frame that is
    /// not accessed through any other path while this device exists.
    pub unsafe fn init_receiver_frame(&mut self, base: usize) -> Result<(), MhuError> {
        if base == 0 {
            log::error!("MHUv3: null Mailbox base address");
            return Err(MhuError::InvalidArgument);
        }
        // SAFETY: forwarded from the caller
        if unsafe { block_tag(base) } != Some(Frame::Receiver) {
            log::error!("MHUv3: {:#x} is not a Receiver Frame, check the IO base address", base);
            return Err(MhuError::ConfigurationMismatch);
        }
        self.mbx = base;

        let page = self.mbx_ctrl();
        page.ctrl.update(|v| *v = (*v | ctrl::OP_REQ) & !ctrl::CH_OP_MSK);
        let id = FrameId::decode(page.iidr.read(), page.aidr.read());
        let (spt0, spt1) = (page.feat_spt0.read(), page.feat_spt1.read());

        self.id[Frame::Receiver] = id;
        self.initialized[Frame::Receiver] = true;
        log_identity(Frame::Receiver, &id);

        self.discover_features(Frame::Receiver, spt0, spt1);
        if self.feature_valid(CapabilityId::Doorbell, Frame::Receiver) {
            self.init_receiver_doorbells();
        }

        Ok(())
    }

    /// Classify the capability table for `frame`; no-op before that frame
    /// is initialized.
    fn discover_features(&mut self, frame: Frame, spt0: u32, spt1: u32) {
        if !self.initialized[frame] {
            return;
        }
        feature::discover(&mut self.features, frame, spt0, spt1);
    }

    /// Number of doorbell channels a frame reports, clamped to the
    /// architectural maximum.
    fn channel_count(frame: Frame, cfg0: u32) -> u32 {
        let num = field(cfg0, ctrl::NUM_DBCH_MSB, ctrl::NUM_DBCH_LSB) + 1;
        if num as usize > MAX_DOORBELL_CHANNELS {
            log::warn!(
                "MHUv3-{}: {} doorbell channels reported, using {}",
                frame.name(),
                num,
                MAX_DOORBELL_CHANNELS
            );
            return MAX_DOORBELL_CHANNELS as u32;
        }
        num
    }

    fn init_sender_doorbells(&mut self) {
        let cfg0 = self.pbx_ctrl().dbch_cfg0.read();
        let num = Self::channel_count(Frame::Sender, cfg0);

        for ch in 0..num {
            let win = self.pdbcw(ch);
            win.int_clr.write(pdbcw::TFR_ACK);
            win.int_en.update(|v| *v &= !pdbcw::TFR_ACK);
            win.ctrl.update(|v| *v &= !pdbcw::PBX_COMB_EN);
        }
        self.pbx_db.reset(num);
    }

    fn init_receiver_doorbells(&mut self) {
        let cfg0 = self.mbx_ctrl().dbch_cfg0.read();
        let num = Self::channel_count(Frame::Receiver, cfg0);

        for ch in 0..num {
            let win = self.mdbcw(ch);
            win.msk_set.write(ALL_FLAGS_MASK);
            win.ctrl.update(|v| *v &= !mdbcw::MBX_COMB_EN);
        }
        self.mbx_num_dbch = num;
    }


    /// Reserve `count` free doorbell channels under a new owner token.
    ///
    /// Channels are taken in ascending index order.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `count` is zero
    /// - `ResourceExhausted` if fewer than `count` channels are free; the
    ///   pool and the owner counter are left unchanged
    pub fn reserve_doorbell_channels(&mut self, count: usize) -> Result<Reservation, MhuError> {
        if count == 0 {
            log::error!("MHUv3: invalid number of sender doorbell channels requested");
            return Err(MhuError::InvalidArgument);
        }
        if count > self.pbx_db.num_free() as usize {
            log::error!(
                "MHUv3: not enough free sender doorbell channels ({} requested, {} free)",
                count,
                self.pbx_db.num_free()
            );
            return Err(MhuError::ResourceExhausted);
        }

        self.owner_counter += 1;
        self.pbx_db.claim(OwnerId::new(self.owner_counter), count)
    }

    /// Return every channel held by `owner`. Safe to call more than once.
    pub fn release_doorbell_channels(&mut self, owner: OwnerId) {
        self.pbx_db.release(owner);
    }


    fn check_owner(&self, owner: OwnerId, channel: u32) -> Result<(), MhuError> {
        if self.pbx_db.is_owned_by(channel, owner) {
            Ok(())
        } else {
            log::error!(
                "MHUv3: owner {} may not use doorbell channel {}",
                owner.get(),
                channel
            );
            Err(MhuError::PermissionDenied)
        }
    }

    /// Raise the requested flags on each channel, in order.
    ///
    /// Before each write the channel's status is polled until the targeted
    /// flags are idle, for at most [`RETRY_BUDGET`] attempts.
    ///
    /// Entries before a failing entry stay written; there is no rollback.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if `owner` does not hold an entry's channel
    /// - `Timeout` if an entry's flags never went idle; that entry is not
    ///   written
    pub fn write_doorbell_channels(
        &mut self,
        owner: OwnerId,
        data: &[DoorbellData],
    ) -> Result<(), MhuError> {
        for entry in data {
            self.check_owner(owner, entry.channel)?;

            let mask = entry.mask();
            let mut retries = RETRY_BUDGET;
            while self.pdbcw(entry.channel).st.read() & mask != 0 {
                if retries == 0 {
                    log::error!(
                        "MHUv3:{:#x} sender timeout waiting for DBCH:{}",
                        self.pbx,
                        entry.channel
                    );
                    return Err(MhuError::Timeout);
                }
                self.delay.delay_ms(POLL_DELAY_MS);
                retries -= 1;
            }

            self.pdbcw(entry.channel).set.write(mask);
        }

        Ok(())
    }

    /// Wait until the peer has cleared every targeted flag.
    ///
    /// Ownership of every entry is checked before any waiting. The wait
    /// itself has no bound: a peer that never acknowledges keeps the caller
    /// here indefinitely.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if `owner` does not hold an entry's channel
    pub fn await_doorbell_acks(
        &mut self,
        owner: OwnerId,
        data: &[DoorbellData],
    ) -> Result<(), MhuError> {
        for entry in data {
            self.check_owner(owner, entry.channel)?;
        }

        loop {
            let pending = data
                .iter()
                .any(|entry| self.pdbcw(entry.channel).st.read() & entry.mask() != 0);
            if !pending {
                return Ok(());
            }
            self.delay.delay_ms(POLL_DELAY_MS);
        }
    }


    /// Read and clear the flags pending on receiver channel `channel`.
    ///
    /// Polls for at most [`RETRY_BUDGET`] attempts and returns the first
    /// nonzero status, after writing it back to the clear register.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `channel` is beyond the receiver's channel
    ///   count (including an uninitialized receiver frame)
    /// - `Io` if the channel stayed empty for the whole budget
    pub fn read_receiver_channel(&mut self, channel: u32) -> Result<u32, MhuError> {
        if channel >= self.mbx_num_dbch {
            log::error!("MHUv3: receiver doorbell channel {} out of range", channel);
            return Err(MhuError::InvalidArgument);
        }

        for _ in 0..RETRY_BUDGET {
            let value = self.mdbcw(channel).st.read();
            if value != 0 {
                self.mdbcw(channel).clr.write(value);
                return Ok(value);
            }
            self.delay.delay_ms(POLL_DELAY_MS);
        }

        log::error!("MHUv3: unable to find data on DB ch:{}", channel);
        Err(MhuError::Io)
    }


    pub fn is_initialized(&self, frame: Frame) -> bool {
        self.initialized[frame]
    }

    /// Identification captured when `frame` was initialized.
    pub fn frame_id(&self, frame: Frame) -> Option<FrameId> {
        self.initialized[frame].then(|| self.id[frame])
    }

    pub fn base(&self, frame: Frame) -> usize {
        match frame {
            Frame::Sender => self.pbx,
            Frame::Receiver => self.mbx,
        }
    }

    pub fn feature(&self, id: CapabilityId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn feature_valid(&self, id: CapabilityId, frame: Frame) -> bool {
        self.feature(id).is_some_and(|f| f.is_valid(frame))
    }

    /// Sender doorbell pool.
    pub fn doorbells(&self) -> &DoorbellPool {
        &self.pbx_db
    }

    /// Number of doorbell channels on the receiver frame.
    pub fn receiver_channels(&self) -> u32 {
        self.mbx_num_dbch
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}

/// Frame type a block identifies as, read before the device adopts `base`.
///
/// # Safety
///
/// `base` must map an MHUv3 frame.
unsafe fn block_tag(base: usize) -> Option<Frame> {
    // BLK_ID sits at the same offset on both control pages
    // SAFETY: forwarded from the caller; the page is only read
    let page = unsafe { &*((base + CTRL_PAGE_OFFSET) as *const PbxCtrlPage) };
    Frame::from_block_id(field(page.blk_id.read(), ctrl::BLK_ID_MSB, ctrl::BLK_ID_LSB))
}

fn log_identity(frame: Frame, id: &FrameId) {
    log::info!(
        "MHUv3-{}: Product:{:x} Variant:{:x} Version:[{}:{}]",
        frame.name(),
        id.product_id,
        id.variant,
        id.version.major,
        id.version.minor
    );
}
