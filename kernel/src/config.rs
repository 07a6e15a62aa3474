// =============================================================================
// C5BOOT - Board Configuration
// =============================================================================
// Cyclone V SoC settings, selected by Cargo features:
//
//   exit-to-uboot  started by U-Boot `go`, returns to it when done
//   debug          standalone, but with MMU and caches left off
//   neon           enable VFP/NEON (default)
// =============================================================================

use arch::cache::CachePolicy;
use arch::mmu::{
    check_regions, AccessPermission, MemoryAttribute, MemoryRegion, SecurityState, Shareability,
};
use arch::reset::Stages;
use log::LevelFilter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const EXIT_TO_UBOOT: bool = cfg!(feature = "exit-to-uboot");

/// Bring-up stages for this build.
pub const STAGES: Stages = if EXIT_TO_UBOOT {
    Stages::HANDOFF
} else if cfg!(feature = "debug") {
    Stages::STANDALONE_DEBUG
} else {
    Stages::STANDALONE
};

/// In handoff mode U-Boot owns the caches; a debug build keeps them off.
pub const CACHES: CachePolicy = if EXIT_TO_UBOOT {
    CachePolicy::UNTOUCHED
} else if cfg!(feature = "debug") {
    CachePolicy::DISABLED
} else {
    CachePolicy::ENABLED
};

pub const FPU: bool = cfg!(feature = "neon");

pub const LOG_LEVEL: LevelFilter = if cfg!(feature = "debug") {
    LevelFilter::Debug
} else {
    LevelFilter::Info
};

/// Flat map of the HPS address space: SDRAM and on-chip RAM below 3 GiB,
/// peripherals and the FPGA bridges above.
pub const REGIONS: [MemoryRegion; 2] = [
    MemoryRegion {
        virt: 0x0000_0000,
        phys: 0x0000_0000,
        size: 0xC000_0000,
        access: AccessPermission::PrivOnly,
        attributes: MemoryAttribute::WriteBackAllocate,
        shareable: Shareability::Shareable,
        executable: true,
        security: SecurityState::Secure,
    },
    MemoryRegion {
        virt: 0xC000_0000,
        phys: 0xC000_0000,
        size: 0x4000_0000,
        access: AccessPermission::PrivOnly,
        attributes: MemoryAttribute::Device,
        shareable: Shareability::Shareable,
        executable: false,
        security: SecurityState::Secure,
    },
];

const _: () = assert!(check_regions(&REGIONS).is_ok(), "invalid memory map");

#[cfg(target_arch = "arm")]
pub use self::layout::stack_layout;

#[cfg(target_arch = "arm")]
mod layout {
    use arch::mode::{StackLayout, StackRegion};

    extern "C" {
        static _FIQ_STACK_BASE: u8;
        static _FIQ_STACK_LIMIT: u8;
        static _IRQ_STACK_BASE: u8;
        static _IRQ_STACK_LIMIT: u8;
        static _SVC_STACK_BASE: u8;
        static _SVC_STACK_LIMIT: u8;
        static _ABT_STACK_BASE: u8;
        static _ABT_STACK_LIMIT: u8;
        static _UND_STACK_BASE: u8;
        static _UND_STACK_LIMIT: u8;
        static _SYS_STACK_BASE: u8;
        static _SYS_STACK_LIMIT: u8;
    }

    macro_rules! region {
        ($base:ident, $limit:ident) => {
            // SAFETY: linker symbols; only their addresses are used
            unsafe {
                StackRegion::new(
                    core::ptr::addr_of!($base) as usize,
                    core::ptr::addr_of!($limit) as usize,
                )
            }
        };
    }

    /// Stack placement from link.ld.
    pub fn stack_layout() -> StackLayout {
        StackLayout::new(
            region!(_FIQ_STACK_BASE, _FIQ_STACK_LIMIT),
            region!(_IRQ_STACK_BASE, _IRQ_STACK_LIMIT),
            region!(_SVC_STACK_BASE, _SVC_STACK_LIMIT),
            region!(_ABT_STACK_BASE, _ABT_STACK_LIMIT),
            region!(_UND_STACK_BASE, _UND_STACK_LIMIT),
            region!(_SYS_STACK_BASE, _SYS_STACK_LIMIT),
        )
    }
}
