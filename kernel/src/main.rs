// =============================================================================
// C5BOOT - Program Entry Point
// =============================================================================
// Rust side of the two entry stubs in boot.S:
//
//   reset_handler  - cold boot; runs the full bring-up sequence and branches
//                    to `kernel_main` in SYS mode
//   handoff_main   - started by U-Boot `go`; keeps U-Boot's environment,
//                    runs the program and returns its exit code to U-Boot
//
// Built for the host, the binary prints the boot plan and memory map of the
// selected configuration instead.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

mod config;

#[cfg(target_arch = "arm")]
mod logger;

#[cfg(target_arch = "arm")]
mod firmware {
    use crate::{config, logger};
    use arch::cpu::{self, CortexA9};
    use arch::exception::{VectorBase, VECTORS};
    use arch::handoff::{self, BootContext};
    use arch::mmu::TranslationTable;
    use arch::reset::{self, BootConfig};
    use arch::{println, uart};
    use core::ffi::c_char;
    use core::panic::PanicInfo;
    use core::ptr::addr_of_mut;

    /// First-level table, in its own 16 KiB aligned section.
    #[link_section = ".mmu_ttb"]
    static mut TRANSLATION_TABLE: TranslationTable = TranslationTable::new();

    fn boot_config() -> BootConfig<'static> {
        BootConfig {
            stages: config::STAGES,
            caches: config::CACHES,
            fpu: config::FPU,
            stacks: config::stack_layout(),
            vectors: VectorBase::Table(&VECTORS),
            regions: &config::REGIONS,
        }
    }

    /// Console and logger come up only once bring-up is over: until then no
    /// logger is installed and the core's `log` calls are no-ops.
    fn console_init() {
        uart::init();
        logger::init(config::LOG_LEVEL);
        log::info!("C5BOOT v{} on Cyclone V SoC", config::VERSION);
    }

    /// Standalone entry, called by `_reset` on the SVC stack.
    #[no_mangle]
    pub extern "C" fn reset_handler() -> ! {
        // SAFETY: reached once, from _reset; the table is only touched here
        unsafe { arch::init(&boot_config(), &mut *addr_of_mut!(TRANSLATION_TABLE), kernel_main) }
    }

    /// Bootloader entry, called by `_handoff_start` on U-Boot's stack.
    ///
    /// # Safety
    /// Only `_handoff_start` may call this, exactly once.
    #[no_mangle]
    pub unsafe extern "C" fn handoff_main(argc: i32, argv: *const *const c_char) -> ! {
        let ctx = BootContext::capture(argc, argv);

        let mut platform = CortexA9::cyclone_v();
        reset::run(&mut platform, &boot_config(), &mut *addr_of_mut!(TRANSLATION_TABLE));
        console_init();

        handoff::enter(ctx, program)
    }

    /// Runtime entry after a cold boot. Nothing to return to.
    extern "C" fn kernel_main() -> ! {
        console_init();
        hello();
        log::debug!("entering idle loop");
        cpu::halt()
    }

    /// The program run under U-Boot; its result is `go`'s exit code.
    fn program(ctx: &BootContext) -> i32 {
        hello();
        // SAFETY: U-Boot passes argc valid C strings in argv
        for (i, arg) in unsafe { ctx.args() }.enumerate() {
            println!("argv[{}] = {}", i, arg.to_str().unwrap_or("<non-utf8>"));
        }
        0
    }

    fn hello() {
        println!("Hello, World!");
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!();
        println!("!! PANIC !!");

        if let Some(location) = info.location() {
            println!("Location: {}:{}:{}", location.file(), location.line(), location.column());
        }
        println!("Message: {}", info.message());
        println!("System halted.");

        cpu::halt();
    }
}

/// Host build: describe what the firmware would do.
#[cfg(not(target_arch = "arm"))]
fn main() {
    use arch::mmu::TranslationTable;
    use arch::reset;

    let mode = if config::EXIT_TO_UBOOT { "handoff" } else { "standalone" };
    println!("C5BOOT v{} ({} build)", config::VERSION, mode);

    println!();
    println!("Bring-up sequence:");
    for (i, stage) in reset::plan(config::STAGES).enumerate() {
        println!("  {:>2}. {}", i + 1, stage);
    }
    println!("  caches: L1 {:?}, L2 {:?}; fpu: {}", config::CACHES.l1, config::CACHES.l2, config::FPU);
    println!("  log level: {}", config::LOG_LEVEL);

    println!();
    println!("Memory map:");
    for region in &config::REGIONS {
        println!(
            "  {:#010x}..{:#010x} -> {:#010x}  {:?}, {:?}{}",
            region.virt,
            region.virt as u64 + region.size as u64,
            region.phys,
            region.attributes,
            region.access,
            if region.executable { "" } else { ", XN" },
        );
    }

    let mut table = Box::new(TranslationTable::new());
    table.populate(&config::REGIONS);
    println!("  {} of 4096 sections mapped", table.mapped_sections());
}
