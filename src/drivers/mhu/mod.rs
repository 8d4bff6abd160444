//! Arm Message Handling Unit v3 (MHUv3)
//!
//! An MHU instance connects two processing elements on the SoC. The sending
//! side programs a postbox (PBX) frame; the receiving side observes a mailbox
//! (MBX) frame. This driver uses the doorbell extension only: each doorbell
//! channel carries 32 flags that the sender sets and the receiver clears.
//!
//! # Protocol
//!
//! 1. Reserve doorbell channels under a fresh owner token
//! 2. Wait for the target flags to be idle, then set them
//! 3. The peer observes the flags and clears them
//! 4. Optionally wait until every targeted flag has been cleared
//! 5. Release the channels
//!
//! All waiting is busy-wait polling through a [`Delay`](crate::drivers::timer::Delay).
//! Writes and receiver reads poll for a bounded number of attempts; waiting
//! for acknowledgement does not time out.
//!
//! # Concurrency
//!
//! A [`MhuDevice`] owns its channel pool and owner counter, and every
//! mutating operation takes `&mut self`. Platform code keeps devices behind a
//! `spin::Mutex`, so the lock guard is the only way to reach the allocator.
//!
//! # References
//!
//! - Arm MHUv3 Architecture Specification (DEN0136)
//! - TF-A: drivers/arm/mhu/mhu_v3_x.c

pub mod device;
pub mod doorbell;
pub mod feature;
pub mod regs;
pub mod registry;

#[cfg(test)]
pub(crate) mod fake;

use core::fmt;
use core::ops::{Index, IndexMut};

pub use device::{FrameId, MhuDevice, Version};
pub use doorbell::{ChannelState, DoorbellData, DoorbellPool, OwnerId, Reservation};
pub use feature::{CapabilityId, Feature, FeatureRegister};
pub use registry::{DeviceEntry, find_device};

/// Architectural maximum number of doorbell channels per frame.
pub const MAX_DOORBELL_CHANNELS: usize = 128;

/// Poll attempts before a bounded wait gives up.
pub const RETRY_BUDGET: u32 = 30;

/// Delay between two polls of a channel status register.
pub const POLL_DELAY_MS: u32 = 20;

/// One half of an MHU instance.
///
/// The discriminant is the tag the frame reports in its BLK_ID register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Frame {
    /// Postbox (PBX), the sending side
    Sender = 0,
    /// Mailbox (MBX), the receiving side
    Receiver = 1,
}

impl Frame {
    /// Decode a BLK_ID tag.
    pub const fn from_block_id(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Frame::Sender),
            1 => Some(Frame::Receiver),
            _ => None,
        }
    }

    /// Tag expected in the BLK_ID register of this frame.
    pub const fn block_id(self) -> u32 {
        self as u32
    }

    /// Name of the register block, for log output.
    pub const fn name(self) -> &'static str {
        match self {
            Frame::Sender => "Postbox",
            Frame::Receiver => "Mailbox",
        }
    }
}

/// One value per frame, indexed by [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerFrame<T>([T; 2]);

impl<T: Copy> PerFrame<T> {
    /// Same value for both frames.
    pub const fn splat(value: T) -> Self {
        Self([value, value])
    }

    /// Separate sender and receiver values.
    pub const fn new(sender: T, receiver: T) -> Self {
        Self([sender, receiver])
    }
}

impl<T> Index<Frame> for PerFrame<T> {
    type Output = T;

    fn index(&self, frame: Frame) -> &T {
        &self.0[frame as usize]
    }
}

impl<T> IndexMut<Frame> for PerFrame<T> {
    fn index_mut(&mut self, frame: Frame) -> &mut T {
        &mut self.0[frame as usize]
    }
}

/// MHU driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MhuError {
    /// Null base address, zero-sized request or channel out of range
    InvalidArgument,
    /// Register block identifies as the other frame type
    ConfigurationMismatch,
    /// Not enough free doorbell channels
    ResourceExhausted,
    /// Channel is not owned by the caller
    PermissionDenied,
    /// Channel flags stayed busy for the whole retry budget
    Timeout,
    /// Receiver channel carried no data for the whole retry budget
    Io,
}

impl MhuError {
    /// Negative errno value handed to the platform error handler.
    ///
    /// `InvalidArgument` covers both a null frame base and a zero-sized or
    /// out-of-range request. It reports `-EFAULT` because only the null base
    /// is fatal and reaches the handler; callers that see the other cases
    /// recover without the errno.
    pub const fn errno(self) -> i32 {
        match self {
            MhuError::InvalidArgument => -14,      // EFAULT
            MhuError::ConfigurationMismatch => -22, // EINVAL
            MhuError::ResourceExhausted => -28,     // ENOSPC
            MhuError::PermissionDenied => -1,       // EPERM
            MhuError::Timeout => -110,              // ETIMEDOUT
            MhuError::Io => -5,                     // EIO
        }
    }
}

impl fmt::Display for MhuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MhuError::InvalidArgument => "invalid argument",
            MhuError::ConfigurationMismatch => "register block is not the expected frame",
            MhuError::ResourceExhausted => "not enough free doorbell channels",
            MhuError::PermissionDenied => "doorbell channel not owned by caller",
            MhuError::Timeout => "timed out waiting for doorbell channel",
            MhuError::Io => "no data on doorbell channel",
        };
        f.write_str(msg)
    }
}
