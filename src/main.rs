#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use core::fmt::Write;
    use core::panic::PanicInfo;

    use kronos::drivers::mhu::MhuDevice;
    use kronos::drivers::mhu::feature::default_features;
    use kronos::drivers::timer::GenericTimer;
    use kronos::drivers::tty::console;
    use kronos::fconf::{DtbRegistry, load_boot_configs};
    use kronos::platform::{self, MHU_LINK_COUNT, MHU_LINKS, plat_error_handler};
    use kronos::println;
    use spin::Mutex;

    /// One device per AP link, indexed like `MHU_LINKS`
    static MHU: [Mutex<MhuDevice<GenericTimer>>; MHU_LINK_COUNT] =
        [const { Mutex::new(MhuDevice::new(default_features(), GenericTimer)) }; MHU_LINK_COUNT];

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        // The panic may have fired with the console held
        if let Some(mut writer) = console::WRITER.try_lock() {
            if let Some(uart) = writer.as_mut() {
                let _ = writeln!(uart, "PANIC: {}", info);
            }
        }
        plat_error_handler(-1)
    }

    /// Rust entry point called from boot.s
    #[unsafe(no_mangle)]
    pub extern "C" fn _start_rust(fw_config: usize) -> ! {
        // SAFETY: the boot UART is only driven through the console
        unsafe {
            console::init(
                platform::BOOT_UART_BASE,
                platform::BOOT_UART_CLK_IN_HZ,
                platform::CONSOLE_BAUDRATE,
            );
        }
        println!("Kronos BL2");

        // x0 overrides the default FW_CONFIG location
        let base = match fw_config {
            0 => platform::FW_CONFIG_BASE,
            addr => addr,
        };
        let limit = base + (platform::FW_CONFIG_LIMIT - platform::FW_CONFIG_BASE);

        // SAFETY: every configuration the registry learns about was placed
        // in trusted SRAM by BL1 and stays there
        let mut registry = unsafe { DtbRegistry::new() };
        if let Err(err) = load_boot_configs(&mut registry, base, limit) {
            plat_error_handler(err.errno());
        }

        // A peer that never answers leaves bring-up to the watchdog reset
        // SAFETY: the secure watchdog is only driven from here
        unsafe { platform::secure_wdt_start(GenericTimer::frequency()) };

        for link in MHU_LINKS.iter() {
            let Some(index) = platform::link_index(link.pbx) else {
                log::error!("MHUv3: {} missing from device table", link.name);
                plat_error_handler(-22);
            };

            let mut device = MHU[index].lock();
            // SAFETY: MHU_LINKS lists each frame once and the device behind
            // this lock is its only user
            if let Err(err) = unsafe { platform::init_mhu(&mut *device, link.pbx, link.mbx) } {
                log::error!("MHUv3: {} init failed: {}", link.name, err);
                plat_error_handler(err.errno());
            }
            log::info!(
                "MHUv3: {} ready, {} doorbell channels",
                link.name,
                device.doorbells().num_channels()
            );
        }

        // SAFETY: as for secure_wdt_start above
        unsafe { platform::secure_wdt_stop() };

        loop {
            // SAFETY: wfe only idles the core until the next event
            unsafe { core::arch::asm!("wfe", options(nomem, nostack)) };
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    println!("kronos is a bare-metal image; build it for aarch64-unknown-none");
}
