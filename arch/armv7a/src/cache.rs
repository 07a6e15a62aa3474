// =============================================================================
// C5BOOT - Cache Controller Interface
// =============================================================================
// Disable / invalidate / enable, per cache level. L1 lives in the core and
// is driven through CP15; L2 is the PL310 outer cache (see l2c.rs).
//
// Ordering contract, enforced by the reset handler:
// - disable completes before any translation table is installed or modified
// - invalidate-all runs between disable and enable
// - enable is the last cache operation before normal execution
// =============================================================================

/// Cache levels present on the Cortex-A9 MPCore of the HPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLevel {
    L1,
    L2,
}

/// What bring-up does with one cache level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Disable and leave disabled.
    Disable,
    /// Disable, invalidate and enable.
    Enable,
    /// Do not touch; whoever ran before owns the state.
    Keep,
}

/// Per-level cache actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub l1: CacheAction,
    pub l2: CacheAction,
}

impl CachePolicy {
    pub const ENABLED: Self = Self { l1: CacheAction::Enable, l2: CacheAction::Enable };
    pub const DISABLED: Self = Self { l1: CacheAction::Disable, l2: CacheAction::Disable };
    pub const UNTOUCHED: Self = Self { l1: CacheAction::Keep, l2: CacheAction::Keep };

    pub const fn action(&self, level: CacheLevel) -> CacheAction {
        match level {
            CacheLevel::L1 => self.l1,
            CacheLevel::L2 => self.l2,
        }
    }

    /// Levels switched off by the cache-disable stage, outermost first.
    pub fn to_disable(&self) -> impl Iterator<Item = CacheLevel> + '_ {
        [CacheLevel::L2, CacheLevel::L1]
            .into_iter()
            .filter(move |level| self.action(*level) != CacheAction::Keep)
    }

    /// Levels switched on by the cache-enable stage, innermost first.
    pub fn to_enable(&self) -> impl Iterator<Item = CacheLevel> + '_ {
        [CacheLevel::L1, CacheLevel::L2]
            .into_iter()
            .filter(move |level| self.action(*level) == CacheAction::Enable)
    }
}

/// Cache maintenance primitives. Unconditional hardware writes; no errors.
pub trait CacheController {
    fn disable_cache(&mut self, level: CacheLevel);
    fn invalidate_cache(&mut self, level: CacheLevel);
    fn enable_cache(&mut self, level: CacheLevel);
}

/// Set/way geometry of a data cache, decoded from CCSIDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeometry {
    pub sets: u32,
    pub ways: u32,
    /// log2 of the line length in bytes
    pub line_shift: u32,
}

impl CacheGeometry {
    pub const fn from_ccsidr(ccsidr: u32) -> Self {
        Self {
            sets: ((ccsidr >> 13) & 0x7FFF) + 1,
            ways: ((ccsidr >> 3) & 0x3FF) + 1,
            line_shift: (ccsidr & 0x7) + 4,
        }
    }

    /// Position of the way number in a set/way operand.
    pub const fn way_shift(&self) -> u32 {
        if self.ways > 1 {
            (self.ways - 1).leading_zeros()
        } else {
            0
        }
    }

    /// Operand for DCISW / DCCISW. `level` counts from 0 for L1.
    pub const fn set_way(&self, level: u32, set: u32, way: u32) -> u32 {
        (way << self.way_shift()) | (set << self.line_shift) | (level << 1)
    }

    pub const fn size(&self) -> u32 {
        (self.sets * self.ways) << self.line_shift
    }
}

#[cfg(target_arch = "arm")]
mod imp {
    use super::{CacheController, CacheGeometry, CacheLevel};
    use crate::cpu::CortexA9;
    use crate::registers::*;

    /// Run a set/way operation over the whole L1 data cache.
    unsafe fn l1_dcache_by_set_way(op: unsafe fn(u32)) {
        write_csselr(0);
        isb();
        let geometry = CacheGeometry::from_ccsidr(read_ccsidr());

        for way in 0..geometry.ways {
            for set in 0..geometry.sets {
                op(geometry.set_way(0, set, way));
            }
        }
        dsb();
    }

    impl CacheController for CortexA9 {
        fn disable_cache(&mut self, level: CacheLevel) {
            match level {
                CacheLevel::L1 => unsafe {
                    let sctlr = Sctlr::from_bits_retain(read_sctlr());
                    // Dirty lines only exist if someone ran with the cache on
                    if sctlr.contains(Sctlr::C) {
                        l1_dcache_by_set_way(dccisw);
                    }
                    write_sctlr((sctlr - (Sctlr::C | Sctlr::I | Sctlr::Z)).bits());
                    isb();
                },
                CacheLevel::L2 => {
                    self.l2.disable();
                    self.l2.set_parity(false);
                    self.l2.set_prefetch(false);
                    self.l2.uninit();
                }
            }
        }

        fn invalidate_cache(&mut self, level: CacheLevel) {
            match level {
                CacheLevel::L1 => unsafe {
                    l1_dcache_by_set_way(dcisw);
                    iciallu();
                    bpiall();
                    dsb();
                    isb();
                },
                CacheLevel::L2 => self.l2.invalidate_all(),
            }
        }

        fn enable_cache(&mut self, level: CacheLevel) {
            match level {
                CacheLevel::L1 => unsafe {
                    write_sctlr(read_sctlr() | (Sctlr::C | Sctlr::I | Sctlr::Z).bits());
                    isb();
                },
                CacheLevel::L2 => {
                    self.l2.init();
                    self.l2.set_prefetch(true);
                    self.l2.set_parity(true);
                    self.l2.enable();
                }
            }
        }
    }
}
