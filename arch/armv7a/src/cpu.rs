// =============================================================================
// C5BOOT - CPU Control
// =============================================================================
// Core-level privileged operations used by the reset handler, behind the
// `Cpu` trait so the bring-up sequence can be driven without hardware.
// =============================================================================

use crate::l2c::L2Cache;
use crate::mode::ProcessorMode;
use crate::scu::Scu;

/// Runtime entry point the reset handler branches to.
pub type RuntimeEntry = extern "C" fn() -> !;

/// Privileged CPU operations of the bring-up sequence.
///
/// Every method is an unconditional register write; none of them can fail.
pub trait Cpu {
    /// Mask IRQ and FIQ (`CPSID if`).
    fn mask_interrupts(&mut self);

    /// Unmask IRQ and FIQ (`CPSIE if`).
    fn unmask_interrupts(&mut self);

    /// Mode the CPU is executing in, if it is one that owns a stack.
    fn current_mode(&self) -> Option<ProcessorMode>;

    /// Load the banked stack pointer of `mode` and come back.
    fn set_stack_pointer(&mut self, mode: ProcessorMode, sp: usize);

    /// Non-secure access to the coprocessors (NSACR).
    fn enable_coprocessor_access(&mut self);

    /// Grant cp10/cp11 access and switch on NEON/VFP.
    fn enable_fpu(&mut self);

    /// Program VBAR and select low vectors.
    fn set_vector_base(&mut self, base: usize);

    /// Join SMP coherency and enable maintenance broadcast (ACTLR).
    fn enable_smp_coherency(&mut self);

    /// Branch to `entry` in SYS mode on the SYS stack.
    fn enter_runtime(&mut self, entry: RuntimeEntry) -> !;

    /// Park the CPU forever.
    fn idle(&mut self) -> !;
}

// Cyclone V HPS peripheral base addresses
const SCU_BASE: usize = 0xFFFE_C000;
const L2C_BASE: usize = 0xFFFE_F000;

/// Cortex-A9 MPCore core 0 of the Cyclone V HPS.
pub struct CortexA9 {
    pub(crate) l2: L2Cache,
    pub(crate) scu: Scu,
}

impl CortexA9 {
    /// # Safety
    /// Only one instance may exist; it drives the SCU and L2 controller.
    pub const unsafe fn cyclone_v() -> Self {
        Self {
            l2: L2Cache::new(L2C_BASE),
            scu: Scu::new(SCU_BASE),
        }
    }
}

/// Halt the CPU in a low-power state.
///
/// Used when there is nothing left to run or a fatal error occurred.
#[inline(always)]
pub fn halt() -> ! {
    loop {
        #[cfg(target_arch = "arm")]
        unsafe {
            core::arch::asm!("wfe");
        }
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }
}

#[cfg(target_arch = "arm")]
mod imp {
    use super::{CortexA9, Cpu, RuntimeEntry};
    use crate::mode::{transition, ProcessorMode};
    use crate::registers::*;
    use core::arch::asm;

    impl Cpu for CortexA9 {
        fn mask_interrupts(&mut self) {
            unsafe { asm!("cpsid if", options(nomem, nostack)) };
        }

        fn unmask_interrupts(&mut self) {
            unsafe { asm!("cpsie if", options(nomem, nostack)) };
        }

        fn current_mode(&self) -> Option<ProcessorMode> {
            ProcessorMode::from_cpsr(read_cpsr())
        }

        fn set_stack_pointer(&mut self, mode: ProcessorMode, sp: usize) {
            // Fixed low registers: FIQ mode banks r8-r12.
            unsafe {
                asm!(
                    "mrs {saved}, cpsr",
                    "msr cpsr_c, r0",
                    "mov sp, r1",
                    "msr cpsr_c, {saved}",
                    saved = out("r2") _,
                    in("r0") transition(mode),
                    in("r1") sp,
                    options(nomem),
                );
            }
        }

        fn enable_coprocessor_access(&mut self) {
            unsafe { write_nsacr(read_nsacr() | NSACR_ACCESS) };
        }

        fn enable_fpu(&mut self) {
            unsafe {
                write_cpacr(read_cpacr() | CPACR_CP10_CP11_FULL);
                isb();
                write_fpexc(FPEXC_EN);
            }
        }

        fn set_vector_base(&mut self, base: usize) {
            unsafe {
                write_sctlr(read_sctlr() & !Sctlr::V.bits());
                write_vbar(base as u32);
            }
            isb();
        }

        fn enable_smp_coherency(&mut self) {
            unsafe { write_actlr(read_actlr() | (Actlr::SMP | Actlr::FW).bits()) };
        }

        fn enter_runtime(&mut self, entry: RuntimeEntry) -> ! {
            // SYS shares its stack with USR and got it during stack-init.
            // The interrupt mask is carried over as the sequence left it.
            unsafe {
                asm!(
                    "mrs r1, cpsr",
                    "bic r1, r1, #0x1F",
                    "orr r1, r1, #0x1F",
                    "msr cpsr_c, r1",
                    "blx r0",
                    "1: wfe",
                    "b 1b",
                    in("r0") entry,
                    in("r1") 0u32,
                    options(noreturn),
                )
            }
        }

        fn idle(&mut self) -> ! {
            super::halt()
        }
    }
}
