// =============================================================================
// C5BOOT - Exception Vector Table
// =============================================================================
// ARMv7-A vectors are instructions, not addresses. Each of the eight slots
// holds `ldr pc, [pc, #24]`, which loads the matching entry of the literal
// pool placed right after the slots. The whole table is therefore a plain
// value: eight fixed instructions and eight function pointers.
//
// Slots without a handler go to `default_handler`, which never returns.
// =============================================================================

/// Signature of an exception entry point. Entered directly by the hardware
/// in the exception's mode, so it never returns through a normal call path.
pub type ExceptionEntry = unsafe extern "C" fn() -> !;

/// `ldr pc, [pc, #24]`: slot N loads literal N.
pub const LDR_PC_LITERAL: u32 = 0xE59F_F018;

/// Exception classes in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Reset,
    Undefined,
    SupervisorCall,
    PrefetchAbort,
    DataAbort,
    /// Unused slot (hypervisor trap on cores with virtualization extensions)
    Reserved,
    Irq,
    Fiq,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 8] = [
        ExceptionKind::Reset,
        ExceptionKind::Undefined,
        ExceptionKind::SupervisorCall,
        ExceptionKind::PrefetchAbort,
        ExceptionKind::DataAbort,
        ExceptionKind::Reserved,
        ExceptionKind::Irq,
        ExceptionKind::Fiq,
    ];

    /// Byte offset of the slot from the vector base.
    pub const fn offset(self) -> usize {
        self as usize * 4
    }
}

/// Fail-stop handler for exceptions nobody claimed.
pub unsafe extern "C" fn default_handler() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[repr(C, align(32))]
pub struct VectorTable {
    slots: [u32; 8],
    targets: [ExceptionEntry; 8],
}

impl VectorTable {
    /// Table with `reset` in the reset slot and the fail-stop handler
    /// everywhere else.
    pub const fn new(reset: ExceptionEntry) -> Self {
        let mut targets = [default_handler as ExceptionEntry; 8];
        targets[ExceptionKind::Reset as usize] = reset;
        Self { slots: [LDR_PC_LITERAL; 8], targets }
    }

    /// Route `kind` to `entry`.
    pub const fn with(mut self, kind: ExceptionKind, entry: ExceptionEntry) -> Self {
        self.targets[kind as usize] = entry;
        self
    }

    pub fn entry(&self, kind: ExceptionKind) -> ExceptionEntry {
        self.targets[kind as usize]
    }

    pub fn instruction(&self, kind: ExceptionKind) -> u32 {
        self.slots[kind as usize]
    }

    /// Address to program into VBAR.
    pub fn base(&self) -> usize {
        self as *const Self as usize
    }
}

/// Where the vector-install stage points VBAR.
#[derive(Clone, Copy)]
pub enum VectorBase {
    /// The table built here.
    Table(&'static VectorTable),
    /// A table owned by someone else, e.g. an interrupt controller runtime
    /// that does its own dispatch.
    External(usize),
}

impl VectorBase {
    pub fn address(&self) -> usize {
        match self {
            VectorBase::Table(table) => table.base(),
            VectorBase::External(address) => *address,
        }
    }
}

#[cfg(target_arch = "arm")]
extern "C" {
    fn _reset() -> !;
}

/// Vector table of the standalone image.
#[cfg(target_arch = "arm")]
#[link_section = ".vectors"]
#[no_mangle]
pub static VECTORS: VectorTable = VectorTable::new(_reset);

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn on_reset() -> ! {
        panic!("reset");
    }

    unsafe extern "C" fn on_irq() -> ! {
        panic!("irq");
    }

    fn addr(entry: ExceptionEntry) -> usize {
        entry as usize
    }

    #[test]
    fn every_slot_loads_its_literal() {
        let table = VectorTable::new(on_reset);

        for kind in ExceptionKind::ALL {
            assert_eq!(table.instruction(kind), 0xE59F_F018);
        }
        // Immediate is 24: slot + 8 (pipeline) + 24 = slot + 32
        assert_eq!(LDR_PC_LITERAL & 0xFFF, 24);
    }

    #[test]
    fn unclaimed_slots_fall_back_to_the_default() {
        let table = VectorTable::new(on_reset).with(ExceptionKind::Irq, on_irq);

        assert_eq!(addr(table.entry(ExceptionKind::Reset)), addr(on_reset));
        assert_eq!(addr(table.entry(ExceptionKind::Irq)), addr(on_irq));
        for kind in ExceptionKind::ALL {
            if kind != ExceptionKind::Reset && kind != ExceptionKind::Irq {
                assert_eq!(addr(table.entry(kind)), addr(default_handler));
            }
        }
    }

    #[test]
    fn slot_offsets_follow_the_architecture() {
        assert_eq!(ExceptionKind::Undefined.offset(), 0x04);
        assert_eq!(ExceptionKind::DataAbort.offset(), 0x10);
        assert_eq!(ExceptionKind::Irq.offset(), 0x18);
        assert_eq!(ExceptionKind::Fiq.offset(), 0x1C);
    }

    #[test]
    fn table_is_vbar_aligned() {
        static TABLE: VectorTable = VectorTable::new(on_reset);

        assert_eq!(TABLE.base() % 32, 0);
        assert_eq!(VectorBase::Table(&TABLE).address(), TABLE.base());
        assert_eq!(VectorBase::External(0xFFFF_0000).address(), 0xFFFF_0000);
    }

    #[test]
    fn faults_without_a_handler_reach_the_diverging_default() {
        // Only a `-> !` function coerces to this type
        let fail_stop: unsafe extern "C" fn() -> ! = default_handler;
        let table = VectorTable::new(on_reset);

        for kind in [ExceptionKind::Undefined, ExceptionKind::DataAbort, ExceptionKind::Reserved, ExceptionKind::Fiq] {
            assert_eq!(addr(table.entry(kind)), addr(fail_stop));
            assert_eq!(table.instruction(kind), LDR_PC_LITERAL);
        }
    }
}
