// =============================================================================
// C5BOOT - L2 Cache Controller (PL310)
// =============================================================================
// Driver for the ARM CoreLink L2C-310 outer cache of the Cyclone V HPS:
// 512 KiB, 8-way. Auxiliary and latency settings may only be written while
// the controller is disabled.
//
// Reference: CoreLink Level 2 Cache Controller L2C-310 TRM
// =============================================================================

use core::ptr;

/// Register offsets from the controller base
mod regs {
    pub const CONTROL: usize = 0x100;
    pub const AUX_CONTROL: usize = 0x104;
    pub const TAG_RAM_CONTROL: usize = 0x108;
    pub const DATA_RAM_CONTROL: usize = 0x10C;
    pub const CACHE_SYNC: usize = 0x730;
    pub const INV_WAY: usize = 0x77C;
    pub const CLEAN_INV_WAY: usize = 0x7FC;
    pub const PREFETCH_CONTROL: usize = 0xF60;
}

/// Auxiliary control bits
mod aux {
    pub const PARITY_ENABLE: u32 = 1 << 21;
    pub const SHARED_OVERRIDE: u32 = 1 << 22;
}

/// Prefetch control bits
mod prefetch {
    pub const DATA: u32 = 1 << 28;
    pub const INSTRUCTION: u32 = 1 << 29;
}

const CONTROL_ENABLE: u32 = 1 << 0;

/// All eight ways.
const WAY_MASK: u32 = 0xFF;

/// RAM latencies for the HPS: tag 1/1/1 cycles, data 2/1/1 (read/write/setup).
const TAG_LATENCY: u32 = 0x000;
const DATA_LATENCY: u32 = 0x010;

pub struct L2Cache {
    base: usize,
}

impl L2Cache {
    /// # Safety
    /// `base` must point to the PL310 register block (or a stand-in of the
    /// same size) for as long as the driver is used.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn read_reg(&self, offset: usize) -> u32 {
        // SAFETY: `new` requires base to cover the register block
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        // SAFETY: `new` requires base to cover the register block
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    fn modify_reg(&self, offset: usize, set: u32, clear: u32) {
        let value = self.read_reg(offset);
        self.write_reg(offset, (value & !clear) | set);
    }

    pub fn is_enabled(&self) -> bool {
        self.read_reg(regs::CONTROL) & CONTROL_ENABLE != 0
    }

    /// Program RAM latencies and shared-attribute override. Controller must
    /// be disabled.
    pub fn init(&self) {
        self.write_reg(regs::TAG_RAM_CONTROL, TAG_LATENCY);
        self.write_reg(regs::DATA_RAM_CONTROL, DATA_LATENCY);
        self.modify_reg(regs::AUX_CONTROL, aux::SHARED_OVERRIDE, 0);
    }

    /// Restore auxiliary control to its reset state.
    pub fn uninit(&self) {
        self.modify_reg(regs::AUX_CONTROL, 0, aux::SHARED_OVERRIDE);
    }

    pub fn set_parity(&self, enable: bool) {
        if enable {
            self.modify_reg(regs::AUX_CONTROL, aux::PARITY_ENABLE, 0);
        } else {
            self.modify_reg(regs::AUX_CONTROL, 0, aux::PARITY_ENABLE);
        }
    }

    pub fn set_prefetch(&self, enable: bool) {
        let bits = prefetch::DATA | prefetch::INSTRUCTION;
        if enable {
            self.modify_reg(regs::PREFETCH_CONTROL, bits, 0);
        } else {
            self.modify_reg(regs::PREFETCH_CONTROL, 0, bits);
        }
    }

    /// Invalidate every way and wait for the background operation.
    pub fn invalidate_all(&self) {
        self.way_operation(regs::INV_WAY);
    }

    /// Write back and invalidate every way.
    pub fn clean_invalidate_all(&self) {
        self.way_operation(regs::CLEAN_INV_WAY);
    }

    pub fn enable(&self) {
        self.write_reg(regs::CONTROL, CONTROL_ENABLE);
        self.sync();
    }

    /// Flush dirty lines and switch the controller off.
    pub fn disable(&self) {
        if self.is_enabled() {
            self.clean_invalidate_all();
        }
        self.write_reg(regs::CONTROL, 0);
        self.sync();
    }

    /// Drain the controller's buffers.
    pub fn sync(&self) {
        self.write_reg(regs::CACHE_SYNC, 0);
        while self.read_reg(regs::CACHE_SYNC) & 1 != 0 {
            core::hint::spin_loop();
        }
    }

    fn way_operation(&self, offset: usize) {
        self.write_reg(offset, WAY_MASK);
        // The controller clears each way bit once that way is done
        while self.read_reg(offset) & WAY_MASK != 0 {
            core::hint::spin_loop();
        }
        self.sync();
    }
}
