// =============================================================================
// C5BOOT - ARMv7-A Architecture Module
// =============================================================================
// Cortex-A9 bring-up for the Cyclone V SoC:
// - Reset handler stage sequence
// - Cache control (L1 via CP15, L2 via the PL310)
// - MMU section table
// - Exception vector table
// - Processor modes and their stacks
// - Bootloader handoff
// - UART console
//
// Hardware access goes through the traits gathered in `Platform`, so the
// sequence itself builds and is tested on the host. The Cortex-A9
// implementations only exist for ARM targets.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]

pub mod cache;
pub mod cpu;
pub mod exception;
pub mod handoff;
pub mod l2c;
pub mod mmu;
pub mod mode;
pub mod registers;
pub mod reset;
pub mod scu;
pub mod uart;

use cache::CacheController;
use cpu::Cpu;
use mmu::TranslationControl;
use scu::SnoopControl;

/// Everything the reset handler drives.
pub trait Platform: Cpu + CacheController + TranslationControl + SnoopControl {}

impl<T: Cpu + CacheController + TranslationControl + SnoopControl + ?Sized> Platform for T {}

/// Bring up core 0 of the Cyclone V HPS and branch to `entry`.
///
/// # Safety
/// Must be called exactly once, from the reset path, with `table` placed in
/// memory that the new mapping keeps reachable.
#[cfg(target_arch = "arm")]
pub unsafe fn init(
    config: &reset::BootConfig<'_>,
    table: &'static mut mmu::TranslationTable,
    entry: cpu::RuntimeEntry,
) -> ! {
    let mut platform = cpu::CortexA9::cyclone_v();
    reset::boot(&mut platform, config, table, entry)
}
