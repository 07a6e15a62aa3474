// =============================================================================
// C5BOOT - Snoop Control Unit (SCU)
// =============================================================================
// The SCU keeps the L1 data caches of the two Cortex-A9 cores coherent.
// It is brought up once per boot: invalidate its duplicate tag RAMs, then
// switch it on.
// =============================================================================

use core::ptr;

// SCU Register Offsets
const SCU_CONTROL: usize = 0x00;
const SCU_INVALIDATE_ALL_SECURE: usize = 0x0C;

const SCU_ENABLE: u32 = 1 << 0;

/// Invalidate all four ways for all four CPU slots.
const SCU_INVALIDATE_ALL_WAYS: u32 = 0xFFFF;

/// Snoop-unit operations of the bring-up sequence.
pub trait SnoopControl {
    /// Invalidate the SCU duplicate tags of every CPU.
    fn invalidate_tags(&mut self);

    /// Start snooping.
    fn enable_snooping(&mut self);
}

pub struct Scu {
    base: usize,
}

impl Scu {
    /// # Safety
    /// `base` must point to the SCU register block (or a stand-in of the
    /// same size) for as long as the driver is used.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub fn invalidate_all(&self) {
        // SAFETY: `new` requires base to cover the register block
        unsafe {
            ptr::write_volatile((self.base + SCU_INVALIDATE_ALL_SECURE) as *mut u32, SCU_INVALIDATE_ALL_WAYS);
        }
    }

    pub fn enable(&self) {
        let control = (self.base + SCU_CONTROL) as *mut u32;
        // SAFETY: `new` requires base to cover the register block
        unsafe {
            let value = ptr::read_volatile(control);
            ptr::write_volatile(control, value | SCU_ENABLE);
        }
    }
}

#[cfg(target_arch = "arm")]
impl SnoopControl for crate::cpu::CortexA9 {
    fn invalidate_tags(&mut self) {
        self.scu.invalidate_all();
    }

    fn enable_snooping(&mut self) {
        self.scu.enable();
    }
}
