// =============================================================================
// C5BOOT - Reset Handler
// =============================================================================
// The bring-up sequence, as a fixed list of stages. Each stage can be turned
// off, but the enabled ones always run in this order:
//
//   mask-interrupts -> stack-init -> cache-disable -> permission-enable ->
//   vector-install -> mmu-init -> coherency-enable -> cache-enable ->
//   scu-init -> unmask-interrupts -> enter-runtime
//
// Nothing here can fail: every stage is a handful of register writes.
// =============================================================================

use crate::cache::{CacheController, CachePolicy};
use crate::cpu::{Cpu, RuntimeEntry};
use crate::exception::VectorBase;
use crate::mmu::{self, MemoryRegion, TranslationTable};
use crate::mode::{self, StackLayout};
use crate::scu::SnoopControl;
use crate::Platform;
use bitflags::bitflags;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MaskInterrupts,
    StackInit,
    CacheDisable,
    PermissionEnable,
    VectorInstall,
    MmuInit,
    CoherencyEnable,
    CacheEnable,
    ScuInit,
    UnmaskInterrupts,
    EnterRuntime,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 11] = [
        Stage::MaskInterrupts,
        Stage::StackInit,
        Stage::CacheDisable,
        Stage::PermissionEnable,
        Stage::VectorInstall,
        Stage::MmuInit,
        Stage::CoherencyEnable,
        Stage::CacheEnable,
        Stage::ScuInit,
        Stage::UnmaskInterrupts,
        Stage::EnterRuntime,
    ];

    pub const fn flag(self) -> Stages {
        match self {
            Stage::MaskInterrupts => Stages::MASK_INTERRUPTS,
            Stage::StackInit => Stages::STACK_INIT,
            Stage::CacheDisable => Stages::CACHE_DISABLE,
            Stage::PermissionEnable => Stages::PERMISSION_ENABLE,
            Stage::VectorInstall => Stages::VECTOR_INSTALL,
            Stage::MmuInit => Stages::MMU_INIT,
            Stage::CoherencyEnable => Stages::COHERENCY_ENABLE,
            Stage::CacheEnable => Stages::CACHE_ENABLE,
            Stage::ScuInit => Stages::SCU_INIT,
            Stage::UnmaskInterrupts => Stages::UNMASK_INTERRUPTS,
            Stage::EnterRuntime => Stages::ENTER_RUNTIME,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Stage::MaskInterrupts => "mask-interrupts",
            Stage::StackInit => "stack-init",
            Stage::CacheDisable => "cache-disable",
            Stage::PermissionEnable => "permission-enable",
            Stage::VectorInstall => "vector-install",
            Stage::MmuInit => "mmu-init",
            Stage::CoherencyEnable => "coherency-enable",
            Stage::CacheEnable => "cache-enable",
            Stage::ScuInit => "scu-init",
            Stage::UnmaskInterrupts => "unmask-interrupts",
            Stage::EnterRuntime => "enter-runtime",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of enabled stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Stages: u16 {
        const MASK_INTERRUPTS = 1 << 0;
        const STACK_INIT = 1 << 1;
        const CACHE_DISABLE = 1 << 2;
        const PERMISSION_ENABLE = 1 << 3;
        const VECTOR_INSTALL = 1 << 4;
        const MMU_INIT = 1 << 5;
        const COHERENCY_ENABLE = 1 << 6;
        const CACHE_ENABLE = 1 << 7;
        const SCU_INIT = 1 << 8;
        const UNMASK_INTERRUPTS = 1 << 9;
        const ENTER_RUNTIME = 1 << 10;

        /// Cold boot from reset or the preloader.
        const STANDALONE = Self::MASK_INTERRUPTS.bits()
            | Self::STACK_INIT.bits()
            | Self::CACHE_DISABLE.bits()
            | Self::PERMISSION_ENABLE.bits()
            | Self::VECTOR_INSTALL.bits()
            | Self::MMU_INIT.bits()
            | Self::COHERENCY_ENABLE.bits()
            | Self::CACHE_ENABLE.bits()
            | Self::SCU_INIT.bits()
            | Self::UNMASK_INTERRUPTS.bits()
            | Self::ENTER_RUNTIME.bits();

        /// Cold boot with caches and translation left off, for debugging.
        const STANDALONE_DEBUG = Self::MASK_INTERRUPTS.bits()
            | Self::STACK_INIT.bits()
            | Self::CACHE_DISABLE.bits()
            | Self::PERMISSION_ENABLE.bits()
            | Self::VECTOR_INSTALL.bits()
            | Self::UNMASK_INTERRUPTS.bits()
            | Self::ENTER_RUNTIME.bits();

        /// Started by a bootloader: its stacks, vectors, MMU and caches stay.
        /// Control goes back to the bootloader, never through `finish`.
        const HANDOFF = Self::MASK_INTERRUPTS.bits()
            | Self::PERMISSION_ENABLE.bits()
            | Self::UNMASK_INTERRUPTS.bits();
    }
}

/// Enabled stages in execution order.
pub fn plan(stages: Stages) -> impl Iterator<Item = Stage> {
    Stage::ALL.into_iter().filter(move |stage| stages.contains(stage.flag()))
}

/// Inputs of the bring-up sequence.
#[derive(Clone, Copy)]
pub struct BootConfig<'a> {
    pub stages: Stages,
    pub caches: CachePolicy,
    /// Turn on VFP/NEON during permission-enable.
    pub fpu: bool,
    pub stacks: StackLayout,
    pub vectors: VectorBase,
    pub regions: &'a [MemoryRegion],
}

/// Run every enabled stage up to and including unmask-interrupts.
///
/// `table` is only written when mmu-init is enabled. It must stay alive (and
/// unmodified) for as long as translation is on, which in practice means
/// a static.
pub fn run<P: Platform + ?Sized>(platform: &mut P, config: &BootConfig<'_>, table: &mut TranslationTable) {
    for stage in plan(config.stages).filter(|stage| *stage != Stage::EnterRuntime) {
        log::trace!("[reset] {}", stage);

        match stage {
            Stage::MaskInterrupts => platform.mask_interrupts(),
            Stage::StackInit => mode::install_stacks(platform, &config.stacks),
            Stage::CacheDisable => {
                for level in config.caches.to_disable() {
                    platform.disable_cache(level);
                }
            }
            Stage::PermissionEnable => {
                platform.enable_coprocessor_access();
                if config.fpu {
                    platform.enable_fpu();
                }
            }
            Stage::VectorInstall => platform.set_vector_base(config.vectors.address()),
            Stage::MmuInit => mmu::init(platform, table, config.regions),
            Stage::CoherencyEnable => platform.enable_smp_coherency(),
            Stage::CacheEnable => {
                for level in config.caches.to_enable() {
                    platform.invalidate_cache(level);
                    platform.enable_cache(level);
                }
            }
            Stage::ScuInit => {
                platform.invalidate_tags();
                platform.enable_snooping();
            }
            Stage::UnmaskInterrupts => platform.unmask_interrupts(),
            Stage::EnterRuntime => {}
        }
    }
}

/// Terminal step: branch into `entry`, or idle forever when enter-runtime is
/// disabled.
pub fn finish<P: Platform + ?Sized>(platform: &mut P, config: &BootConfig<'_>, entry: RuntimeEntry) -> ! {
    if config.stages.contains(Stages::ENTER_RUNTIME) {
        log::trace!("[reset] {}", Stage::EnterRuntime);
        platform.enter_runtime(entry)
    } else {
        log::trace!("[reset] idle");
        platform.idle()
    }
}

/// The whole sequence.
pub fn boot<P: Platform + ?Sized>(
    platform: &mut P,
    config: &BootConfig<'_>,
    table: &mut TranslationTable,
    entry: RuntimeEntry,
) -> ! {
    run(platform, config, table);
    finish(platform, config, entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_has_its_own_flag() {
        let all = Stage::ALL.iter().fold(Stages::empty(), |acc, s| acc | s.flag());

        assert_eq!(all, Stages::all());
        assert_eq!(Stages::STANDALONE, Stages::all());
    }

    #[test]
    fn stage_names() {
        let names: Vec<String> = plan(Stages::HANDOFF).map(|s| s.to_string()).collect();

        assert_eq!(names, ["mask-interrupts", "permission-enable", "unmask-interrupts"]);
    }

    #[test]
    fn plan_keeps_the_fixed_order() {
        let stages = Stages::ENTER_RUNTIME | Stages::MMU_INIT | Stages::MASK_INTERRUPTS;

        assert_eq!(
            plan(stages).collect::<Vec<_>>(),
            [Stage::MaskInterrupts, Stage::MmuInit, Stage::EnterRuntime]
        );
        assert_eq!(plan(Stages::STANDALONE).collect::<Vec<_>>(), Stage::ALL);
        assert_eq!(plan(Stages::empty()).count(), 0);
    }

    #[test]
    fn debug_preset_leaves_translation_and_caches_off() {
        let stages = Stages::STANDALONE_DEBUG;

        assert!(stages.contains(Stages::CACHE_DISABLE));
        assert!(!stages.intersects(
            Stages::MMU_INIT | Stages::CACHE_ENABLE | Stages::COHERENCY_ENABLE | Stages::SCU_INIT
        ));
    }

    #[test]
    fn handoff_preset_keeps_the_bootloader_environment() {
        assert!(!Stages::HANDOFF.intersects(
            Stages::STACK_INIT | Stages::CACHE_DISABLE | Stages::VECTOR_INSTALL | Stages::MMU_INIT
        ));
    }

    #[test]
    fn handoff_preset_has_no_terminal_stage() {
        assert!(!Stages::HANDOFF.contains(Stages::ENTER_RUNTIME));
        assert_eq!(plan(Stages::HANDOFF).last(), Some(Stage::UnmaskInterrupts));
    }
}
