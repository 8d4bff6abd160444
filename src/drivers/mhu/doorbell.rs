//! Sender-side doorbell channel pool.
//!
//! Doorbell channels are shared by every software client talking through one
//! postbox. Clients reserve a set of channels and receive an owner token; the
//! token must accompany every later write or acknowledgement wait on those
//! channels and is what releases them.
//!
//! ## Invariants
//!
//! - `num_free` equals the number of channels in [`ChannelState::Free`]
//! - Every [`ChannelState::InUse`] channel records a nonzero owner
//! - Channels at or beyond `num_dbch` stay [`ChannelState::Invalid`]
//!
//! Storage is fixed at [`MAX_DOORBELL_CHANNELS`] so the pool lives inside the
//! device with no allocation.

use super::{MAX_DOORBELL_CHANNELS, MhuError};

/// Owner token returned by a reservation.
///
/// Tokens come from a per-device counter starting at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Token value 0 is never handed out.
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw token value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Allocation state of one doorbell channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Not backed by hardware (or frame not initialized)
    #[default]
    Invalid,
    Free,
    InUse,
}

/// Target of a doorbell write: a channel and the flags to raise on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorbellData {
    pub channel: u32,
    pub flags: u8,
}

impl DoorbellData {
    pub const fn new(channel: u32, flags: u8) -> Self {
        Self { channel, flags }
    }

    /// Flags as a channel register mask.
    #[inline]
    pub const fn mask(&self) -> u32 {
        self.flags as u32
    }
}

/// Channels granted by one reservation, in ascending index order.
#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    owner: OwnerId,
    channels: [u32; MAX_DOORBELL_CHANNELS],
    len: usize,
}

impl Reservation {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn channels(&self) -> &[u32] {
        &self.channels[..self.len]
    }
}

/// Doorbell channel bookkeeping for one postbox frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorbellPool {
    num_dbch: u32,
    num_free: u32,
    state: [ChannelState; MAX_DOORBELL_CHANNELS],
    owner: [u64; MAX_DOORBELL_CHANNELS],
}

impl DoorbellPool {
    /// Empty pool; every channel is invalid until [`reset`](Self::reset).
    pub const fn new() -> Self {
        Self {
            num_dbch: 0,
            num_free: 0,
            state: [ChannelState::Invalid; MAX_DOORBELL_CHANNELS],
            owner: [0; MAX_DOORBELL_CHANNELS],
        }
    }

    /// Make the first `num_dbch` channels free and invalidate the rest.
    ///
    /// # Panics
    ///
    /// Panics if `num_dbch` exceeds [`MAX_DOORBELL_CHANNELS`].
    pub fn reset(&mut self, num_dbch: u32) {
        assert!(
            num_dbch as usize <= MAX_DOORBELL_CHANNELS,
            "Doorbell channel count {} exceeds architectural maximum",
            num_dbch
        );

        let num = num_dbch as usize;
        self.state[..num].fill(ChannelState::Free);
        self.state[num..].fill(ChannelState::Invalid);
        self.owner.fill(0);
        self.num_dbch = num_dbch;
        self.num_free = num_dbch;
    }

    /// Number of channels backed by hardware.
    pub fn num_channels(&self) -> u32 {
        self.num_dbch
    }

    /// Number of channels currently free.
    pub fn num_free(&self) -> u32 {
        self.num_free
    }

    /// State of `channel`; out-of-range channels are [`ChannelState::Invalid`].
    pub fn state(&self, channel: u32) -> ChannelState {
        self.state
            .get(channel as usize)
            .copied()
            .unwrap_or(ChannelState::Invalid)
    }

    /// Owner of `channel`, if it is in use.
    pub fn owner(&self, channel: u32) -> Option<OwnerId> {
        match self.state(channel) {
            ChannelState::InUse => Some(OwnerId(self.owner[channel as usize])),
            _ => None,
        }
    }

    /// Does `owner` currently hold `channel`?
    pub fn is_owned_by(&self, channel: u32, owner: OwnerId) -> bool {
        self.owner(channel) == Some(owner)
    }

    /// Claim the first `count` free channels for `owner`.
    ///
    /// Fails with `InvalidArgument` for a zero count and with
    /// `ResourceExhausted` when fewer than `count` channels are free; the pool
    /// is untouched on failure.
    pub fn claim(&mut self, owner: OwnerId, count: usize) -> Result<Reservation, MhuError> {
        if count == 0 {
            return Err(MhuError::InvalidArgument);
        }
        if count > self.num_free as usize {
            return Err(MhuError::ResourceExhausted);
        }

        let mut reservation = Reservation {
            owner,
            channels: [0; MAX_DOORBELL_CHANNELS],
            len: 0,
        };

        for ch in 0..self.num_dbch as usize {
            if reservation.len == count {
                break;
            }
            if self.state[ch] == ChannelState::Free {
                self.state[ch] = ChannelState::InUse;
                self.owner[ch] = owner.0;
                self.num_free -= 1;
                reservation.channels[reservation.len] = ch as u32;
                reservation.len += 1;
            }
        }

        Ok(reservation)
    }

    /// Return every channel held by `owner` to the pool.
    ///
    /// Returns the number of channels released; zero if `owner` held none.
    pub fn release(&mut self, owner: OwnerId) -> u32 {
        let mut released = 0;

        for ch in 0..self.num_dbch as usize {
            if self.state[ch] == ChannelState::InUse && self.owner[ch] == owner.0 {
                self.state[ch] = ChannelState::Free;
                self.owner[ch] = 0;
                self.num_free += 1;
                released += 1;
            }
        }

        released
    }
}

impl Default for DoorbellPool {
    fn default() -> Self {
        Self::new()
    }
}
