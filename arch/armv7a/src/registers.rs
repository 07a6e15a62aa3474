// =============================================================================
// C5BOOT - System Control Registers
// =============================================================================
// Bit definitions for the CP15 registers touched during bring-up, and raw
// MRC/MCR accessors for them (ARM targets only).
//
// Reference: ARM Architecture Reference Manual ARMv7-A and ARMv7-R edition,
//            Cortex-A9 Technical Reference Manual
// =============================================================================

use bitflags::bitflags;

bitflags! {
    /// SCTLR (System Control Register), the bits bring-up cares about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sctlr: u32 {
        /// MMU enable
        const M = 1 << 0;
        /// Alignment check
        const A = 1 << 1;
        /// Data and unified caches
        const C = 1 << 2;
        /// Branch prediction
        const Z = 1 << 11;
        /// Instruction cache
        const I = 1 << 12;
        /// High exception vectors (0xFFFF0000); must be clear for VBAR
        const V = 1 << 13;
        /// Thumb exception entry
        const TE = 1 << 30;
    }
}

bitflags! {
    /// ACTLR (Auxiliary Control Register) on the Cortex-A9.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Actlr: u32 {
        /// Cache and TLB maintenance broadcast
        const FW = 1 << 0;
        /// Take part in SMP coherency
        const SMP = 1 << 6;
    }
}

/// CPACR: full access to cp10 and cp11 (VFP / Advanced SIMD).
pub const CPACR_CP10_CP11_FULL: u32 = 0xF << 20;

/// NSACR access bits set by the vendor startup code.
pub const NSACR_ACCESS: u32 = 0x3 << 20;

/// FPEXC.EN: turn on the floating-point unit.
pub const FPEXC_EN: u32 = 1 << 30;

/// DACR value with every domain set to "client" (permission bits checked).
pub const DACR_ALL_CLIENT: u32 = 0x5555_5555;

/// TTBR0 walk attributes: shareable, inner and outer write-back
/// write-allocate (multiprocessing extensions IRGN encoding).
pub const TTBR0_WALK_WBWA_SHARED: u32 = (1 << 6) | (1 << 3) | (1 << 1);

/// CPSR interrupt mask bits.
pub const CPSR_F: u32 = 1 << 6;
pub const CPSR_I: u32 = 1 << 7;
pub const CPSR_MODE_MASK: u32 = 0x1F;

#[cfg(target_arch = "arm")]
pub use cp15::*;

#[cfg(target_arch = "arm")]
mod cp15 {
    use core::arch::asm;

    macro_rules! cp15_read {
        ($name:ident, $insn:literal) => {
            #[inline(always)]
            pub fn $name() -> u32 {
                let value: u32;
                unsafe { asm!($insn, out(reg) value, options(nomem, nostack, preserves_flags)) };
                value
            }
        };
    }

    macro_rules! cp15_write {
        ($name:ident, $insn:literal) => {
            /// # Safety
            /// Changes processor state; bring-up ordering rules apply.
            #[inline(always)]
            pub unsafe fn $name(value: u32) {
                asm!($insn, in(reg) value, options(nostack, preserves_flags));
            }
        };
    }

    cp15_read!(read_sctlr, "mrc p15, 0, {}, c1, c0, 0");
    cp15_write!(write_sctlr, "mcr p15, 0, {}, c1, c0, 0");
    cp15_read!(read_actlr, "mrc p15, 0, {}, c1, c0, 1");
    cp15_write!(write_actlr, "mcr p15, 0, {}, c1, c0, 1");
    cp15_read!(read_cpacr, "mrc p15, 0, {}, c1, c0, 2");
    cp15_write!(write_cpacr, "mcr p15, 0, {}, c1, c0, 2");
    cp15_read!(read_nsacr, "mrc p15, 0, {}, c1, c1, 2");
    cp15_write!(write_nsacr, "mcr p15, 0, {}, c1, c1, 2");
    cp15_write!(write_ttbr0, "mcr p15, 0, {}, c2, c0, 0");
    cp15_write!(write_ttbcr, "mcr p15, 0, {}, c2, c0, 2");
    cp15_write!(write_dacr, "mcr p15, 0, {}, c3, c0, 0");
    cp15_write!(write_vbar, "mcr p15, 0, {}, c12, c0, 0");
    cp15_read!(read_ccsidr, "mrc p15, 1, {}, c0, c0, 0");
    cp15_write!(write_csselr, "mcr p15, 2, {}, c0, c0, 0");
    cp15_write!(dcisw, "mcr p15, 0, {}, c7, c6, 2");
    cp15_write!(dccisw, "mcr p15, 0, {}, c7, c14, 2");

    /// Invalidate the entire unified TLB.
    #[inline(always)]
    pub unsafe fn tlbiall() {
        asm!("mcr p15, 0, {}, c8, c7, 0", in(reg) 0u32, options(nostack, preserves_flags));
    }

    /// Invalidate all branch predictors.
    #[inline(always)]
    pub unsafe fn bpiall() {
        asm!("mcr p15, 0, {}, c7, c5, 6", in(reg) 0u32, options(nostack, preserves_flags));
    }

    /// Invalidate the instruction cache to the point of unification.
    #[inline(always)]
    pub unsafe fn iciallu() {
        asm!("mcr p15, 0, {}, c7, c5, 0", in(reg) 0u32, options(nostack, preserves_flags));
    }

    #[inline(always)]
    pub fn dsb() {
        unsafe { asm!("dsb", options(nostack, preserves_flags)) };
    }

    #[inline(always)]
    pub fn isb() {
        unsafe { asm!("isb", options(nostack, preserves_flags)) };
    }

    #[inline(always)]
    pub fn read_cpsr() -> u32 {
        let value: u32;
        unsafe { asm!("mrs {}, cpsr", out(reg) value, options(nomem, nostack, preserves_flags)) };
        value
    }

    /// # Safety
    /// FPEXC is only accessible once CPACR grants cp10/cp11 access.
    #[inline(always)]
    pub unsafe fn write_fpexc(value: u32) {
        asm!("vmsr fpexc, {}", in(reg) value, options(nostack, preserves_flags));
    }
}
