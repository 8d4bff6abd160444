//! Lookup over the platform's table of MHU frames.

use super::Frame;

/// One frame known to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Frame base address as seen by the driver
    pub base: usize,
    /// Base of the memory region backing the frame
    pub mem_base: usize,
    pub frame: Frame,
}

impl DeviceEntry {
    pub const fn new(base: usize, mem_base: usize, frame: Frame) -> Self {
        Self {
            base,
            mem_base,
            frame,
        }
    }
}

/// Index of the entry matching `base` and `frame`.
///
/// When several entries match, the last one wins.
pub fn find_device(base: usize, frame: Frame, devices: &[DeviceEntry]) -> Option<usize> {
    devices
        .iter()
        .rposition(|dev| dev.base == base && dev.frame == frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: [DeviceEntry; 4] = [
        DeviceEntry::new(0x1000, 0x8000, Frame::Sender),
        DeviceEntry::new(0x2000, 0x9000, Frame::Receiver),
        DeviceEntry::new(0x1000, 0xA000, Frame::Receiver),
        DeviceEntry::new(0x3000, 0xB000, Frame::Sender),
    ];

    #[test]
    fn test_find_matches_base_and_frame() {
        assert_eq!(find_device(0x1000, Frame::Sender, &TABLE), Some(0));
        assert_eq!(find_device(0x1000, Frame::Receiver, &TABLE), Some(2));
        assert_eq!(find_device(0x3000, Frame::Sender, &TABLE), Some(3));
    }

    #[test]
    fn test_find_missing() {
        assert_eq!(find_device(0x2000, Frame::Sender, &TABLE), None);
        assert_eq!(find_device(0x4000, Frame::Receiver, &TABLE), None);
        assert_eq!(find_device(0x1000, Frame::Sender, &[]), None);
    }

    #[test]
    fn test_find_duplicate_returns_last() {
        let table = [
            DeviceEntry::new(0x5000, 0x1, Frame::Sender),
            DeviceEntry::new(0x6000, 0x2, Frame::Sender),
            DeviceEntry::new(0x5000, 0x3, Frame::Sender),
        ];
        assert_eq!(find_device(0x5000, Frame::Sender, &table), Some(2));
    }
}
