//! RD-Kronos platform definitions
//!
//! Memory map constants the boot image needs, the MHUv3 instances that link
//! the application processor to the SCP and RSS, and the platform fatal
//! error handler.
//!
//! # MHUv3 instances
//!
//! | Link         | Postbox      | Mailbox      |
//! |--------------|--------------|--------------|
//! | AP-SCP NS    | 0x2A90_0000  | 0x2A91_0000  |
//! | AP-SCP S     | 0x2A92_0000  | 0x2A93_0000  |
//! | AP-SCP Root  | 0x2A94_0000  | 0x2A95_0000  |
//! | AP-RSS NS    | 0x2AB0_0000  | 0x2AB1_0000  |
//! | AP-RSS S     | 0x2AB2_0000  | 0x2AB3_0000  |
//! | AP-RSS Realm | 0x2AB6_0000  | 0x2AB7_0000  |
//! | AP-RSS Root  | 0x2AB4_0000  | 0x2AB5_0000  |

use crate::drivers::mhu::{DeviceEntry, Frame, MhuDevice, MhuError, find_device};
use crate::drivers::timer::Delay;
use crate::drivers::watchdog::sbsa::SbsaWatchdog;

pub const AP2SCP_NS_PBX: usize = 0x2A90_0000;
pub const AP2SCP_NS_MBX: usize = 0x2A91_0000;
pub const AP2SCP_S_PBX: usize = 0x2A92_0000;
pub const AP2SCP_S_MBX: usize = 0x2A93_0000;
pub const AP2SCP_ROOT_PBX: usize = 0x2A94_0000;
pub const AP2SCP_ROOT_MBX: usize = 0x2A95_0000;
pub const AP2RSS_NS_PBX: usize = 0x2AB0_0000;
pub const AP2RSS_NS_MBX: usize = 0x2AB1_0000;
pub const AP2RSS_S_PBX: usize = 0x2AB2_0000;
pub const AP2RSS_S_MBX: usize = 0x2AB3_0000;
pub const AP2RSS_REALM_PBX: usize = 0x2AB6_0000;
pub const AP2RSS_REALM_MBX: usize = 0x2AB7_0000;
pub const AP2RSS_ROOT_PBX: usize = 0x2AB4_0000;
pub const AP2RSS_ROOT_MBX: usize = 0x2AB5_0000;

/// Boot console PL011
pub const BOOT_UART_BASE: usize = 0x2A40_0000;
pub const BOOT_UART_CLK_IN_HZ: u32 = 7_372_800;
pub const CONSOLE_BAUDRATE: u32 = 115_200;

/// Secure SBSA generic watchdog, control frame
pub const SBSA_SECURE_WDOG_BASE: usize = 0x2A48_0000;
/// First-stage timeout; the reset follows one more timeout later
pub const SBSA_SECURE_WDOG_TIMEOUT_MS: u64 = 100;

/// Trusted SRAM handed over by BL1; the first bytes hold the meminfo block
pub const BL_RAM_BASE: usize = 0x0400_1000;
const MEMINFO_SIZE: usize = 16;
const PAGE_SIZE: usize = 0x1000;

/// FW_CONFIG sits after the meminfo block and may not cross half a page
/// past the first page.
pub const FW_CONFIG_BASE: usize = BL_RAM_BASE + MEMINFO_SIZE;
pub const FW_CONFIG_LIMIT: usize = BL_RAM_BASE + PAGE_SIZE + PAGE_SIZE / 2;

/// A postbox/mailbox pair linking the AP to one peer in one security state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MhuLink {
    pub name: &'static str,
    pub pbx: usize,
    pub mbx: usize,
}

pub const MHU_LINK_COUNT: usize = 7;

pub const MHU_LINKS: [MhuLink; MHU_LINK_COUNT] = [
    MhuLink { name: "ap2scp-ns", pbx: AP2SCP_NS_PBX, mbx: AP2SCP_NS_MBX },
    MhuLink { name: "ap2scp-s", pbx: AP2SCP_S_PBX, mbx: AP2SCP_S_MBX },
    MhuLink { name: "ap2scp-root", pbx: AP2SCP_ROOT_PBX, mbx: AP2SCP_ROOT_MBX },
    MhuLink { name: "ap2rss-ns", pbx: AP2RSS_NS_PBX, mbx: AP2RSS_NS_MBX },
    MhuLink { name: "ap2rss-s", pbx: AP2RSS_S_PBX, mbx: AP2RSS_S_MBX },
    MhuLink { name: "ap2rss-realm", pbx: AP2RSS_REALM_PBX, mbx: AP2RSS_REALM_MBX },
    MhuLink { name: "ap2rss-root", pbx: AP2RSS_ROOT_PBX, mbx: AP2RSS_ROOT_MBX },
];

/// Every MHU frame on the platform, postbox then mailbox for each link.
pub const MHU_DEVICES: [DeviceEntry; 2 * MHU_LINK_COUNT] = {
    let mut table = [DeviceEntry::new(0, 0, Frame::Sender); 2 * MHU_LINK_COUNT];
    let mut i = 0;
    while i < MHU_LINK_COUNT {
        let link = MHU_LINKS[i];
        table[2 * i] = DeviceEntry::new(link.pbx, link.pbx, Frame::Sender);
        table[2 * i + 1] = DeviceEntry::new(link.mbx, link.mbx, Frame::Receiver);
        i += 1;
    }
    table
};

/// Index into [`MHU_LINKS`] of the link whose postbox is at `pbx`.
pub fn link_index(pbx: usize) -> Option<usize> {
    find_device(pbx, Frame::Sender, &MHU_DEVICES).map(|i| i / 2)
}

/// Bring up both frames of one MHU instance, sender first.
///
/// # Safety
///
/// `pbx` and `mbx` must map the postbox and mailbox frames of one MHUv3
/// instance, each reachable only through `device`.
pub unsafe fn init_mhu<D: Delay>(
    device: &mut MhuDevice<D>,
    pbx: usize,
    mbx: usize,
) -> Result<(), MhuError> {
    // SAFETY: forwarded from the caller
    unsafe {
        device.init_sender_frame(pbx)?;
        device.init_receiver_frame(mbx)
    }
}

/// Arm the secure watchdog at a `counter_hz` system counter.
///
/// # Safety
///
/// Nothing else may drive the watchdog at [`SBSA_SECURE_WDOG_BASE`].
pub unsafe fn secure_wdt_start(counter_hz: u64) {
    // SAFETY: forwarded from the caller
    let mut wdog = unsafe { SbsaWatchdog::new(SBSA_SECURE_WDOG_BASE) };
    wdog.start(counter_hz, SBSA_SECURE_WDOG_TIMEOUT_MS);
}

/// Disarm the secure watchdog.
///
/// # Safety
///
/// As for [`secure_wdt_start`].
pub unsafe fn secure_wdt_stop() {
    // SAFETY: forwarded from the caller
    unsafe { SbsaWatchdog::new(SBSA_SECURE_WDOG_BASE) }.stop();
}

/// Report an unrecoverable error and park the core.
pub fn plat_error_handler(errno: i32) -> ! {
    log::error!("Platform error: {}", errno);
    loop {
        #[cfg(target_arch = "aarch64")]
        // SAFETY: wfe only idles the core until the next event
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
        #[cfg(not(target_arch = "aarch64"))]
        core::hint::spin_loop();
    }
}
