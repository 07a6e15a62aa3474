// =============================================================================
// C5BOOT - Processor Modes and Exception Stacks
// =============================================================================
// Every privileged mode of the Cortex-A9 has its own banked stack pointer.
// The placement of those stacks comes from the linker script; here it is an
// explicit `StackLayout` handed to the initializer.
// =============================================================================

use crate::cpu::Cpu;
use crate::registers::{CPSR_F, CPSR_I, CPSR_MODE_MASK};

/// Privileged processor modes that own a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorMode {
    Fiq = 0x11,
    Irq = 0x12,
    Svc = 0x13,
    Abt = 0x17,
    Und = 0x1B,
    Sys = 0x1F,
}

impl ProcessorMode {
    /// Modes in the order their stacks are installed.
    pub const ALL: [ProcessorMode; 6] = [
        ProcessorMode::Fiq,
        ProcessorMode::Irq,
        ProcessorMode::Svc,
        ProcessorMode::Abt,
        ProcessorMode::Und,
        ProcessorMode::Sys,
    ];

    /// Decode the mode field of a CPSR value.
    pub const fn from_cpsr(cpsr: u32) -> Option<Self> {
        match cpsr & CPSR_MODE_MASK {
            0x11 => Some(ProcessorMode::Fiq),
            0x12 => Some(ProcessorMode::Irq),
            0x13 => Some(ProcessorMode::Svc),
            0x17 => Some(ProcessorMode::Abt),
            0x1B => Some(ProcessorMode::Und),
            0x1F => Some(ProcessorMode::Sys),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        match self {
            ProcessorMode::Fiq => 0,
            ProcessorMode::Irq => 1,
            ProcessorMode::Svc => 2,
            ProcessorMode::Abt => 3,
            ProcessorMode::Und => 4,
            ProcessorMode::Sys => 5,
        }
    }
}

/// CPSR control value that enters `mode` with IRQ and FIQ masked.
pub const fn transition(mode: ProcessorMode) -> u32 {
    mode as u32 | CPSR_I | CPSR_F
}

/// One stack: `base` is the lowest address, `limit` the initial SP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    pub base: usize,
    pub limit: usize,
}

impl StackRegion {
    pub const fn new(base: usize, limit: usize) -> Self {
        Self { base, limit }
    }

    pub const fn size(&self) -> usize {
        self.limit - self.base
    }
}

/// Stack placement for every privileged mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    regions: [StackRegion; 6],
}

impl StackLayout {
    pub const fn new(
        fiq: StackRegion,
        irq: StackRegion,
        svc: StackRegion,
        abt: StackRegion,
        und: StackRegion,
        sys: StackRegion,
    ) -> Self {
        Self { regions: [fiq, irq, svc, abt, und, sys] }
    }

    pub const fn region(&self, mode: ProcessorMode) -> StackRegion {
        self.regions[mode.index()]
    }

    /// Stack pointer value a mode starts with.
    pub const fn initial_sp(&self, mode: ProcessorMode) -> usize {
        self.region(mode).limit
    }
}

/// Install the banked stack pointer of every mode.
///
/// The mode the CPU is running in already got its stack from the entry stub;
/// rewriting it here would pull the stack out from under the caller, so it is
/// skipped.
pub fn install_stacks<C: Cpu + ?Sized>(cpu: &mut C, layout: &StackLayout) {
    let current = cpu.current_mode();

    for mode in ProcessorMode::ALL {
        if Some(mode) == current {
            continue;
        }
        let sp = layout.initial_sp(mode);
        log::trace!("[mode] {:?} stack -> {:#010x}", mode, sp);
        cpu.set_stack_pointer(mode, sp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_masks_both_interrupt_lines() {
        assert_eq!(transition(ProcessorMode::Fiq), 0xD1);
        assert_eq!(transition(ProcessorMode::Irq), 0xD2);
        assert_eq!(transition(ProcessorMode::Svc), 0xD3);
        assert_eq!(transition(ProcessorMode::Abt), 0xD7);
        assert_eq!(transition(ProcessorMode::Und), 0xDB);
        assert_eq!(transition(ProcessorMode::Sys), 0xDF);
    }

    #[test]
    fn cpsr_decoding_ignores_flag_bits() {
        assert_eq!(ProcessorMode::from_cpsr(0x6000_01D3), Some(ProcessorMode::Svc));
        assert_eq!(ProcessorMode::from_cpsr(0x1F), Some(ProcessorMode::Sys));
        // User and monitor modes own no stack here.
        assert_eq!(ProcessorMode::from_cpsr(0x10), None);
        assert_eq!(ProcessorMode::from_cpsr(0x16), None);
    }

    #[test]
    fn layout_hands_out_limits() {
        let layout = StackLayout::new(
            StackRegion::new(0x1000, 0x1400),
            StackRegion::new(0x1400, 0x1800),
            StackRegion::new(0x1800, 0x2000),
            StackRegion::new(0x2000, 0x2400),
            StackRegion::new(0x2400, 0x2800),
            StackRegion::new(0x2800, 0x8000),
        );

        assert_eq!(layout.initial_sp(ProcessorMode::Fiq), 0x1400);
        assert_eq!(layout.initial_sp(ProcessorMode::Sys), 0x8000);
        assert_eq!(layout.region(ProcessorMode::Svc).size(), 0x800);
    }

    /// Records stack writes; every other operation is out of scope here.
    struct StackRecorder {
        mode: Option<ProcessorMode>,
        installed: Vec<(ProcessorMode, usize)>,
    }

    impl Cpu for StackRecorder {
        fn mask_interrupts(&mut self) {}
        fn unmask_interrupts(&mut self) {}

        fn current_mode(&self) -> Option<ProcessorMode> {
            self.mode
        }

        fn set_stack_pointer(&mut self, mode: ProcessorMode, sp: usize) {
            self.installed.push((mode, sp));
        }

        fn enable_coprocessor_access(&mut self) {}
        fn enable_fpu(&mut self) {}
        fn set_vector_base(&mut self, _base: usize) {}
        fn enable_smp_coherency(&mut self) {}

        fn enter_runtime(&mut self, _entry: crate::cpu::RuntimeEntry) -> ! {
            unreachable!()
        }

        fn idle(&mut self) -> ! {
            unreachable!()
        }
    }

    fn layout() -> StackLayout {
        let stack = |i: usize| StackRegion::new(0x1000 * (i + 1), 0x1000 * (i + 2));
        StackLayout::new(stack(0), stack(1), stack(2), stack(3), stack(4), stack(5))
    }

    fn installed_from(mode: Option<ProcessorMode>) -> Vec<(ProcessorMode, usize)> {
        let mut cpu = StackRecorder { mode, installed: Vec::new() };
        install_stacks(&mut cpu, &layout());
        cpu.installed
    }

    #[test]
    fn unknown_mode_gets_every_stack() {
        let layout = layout();
        let expected: Vec<_> = ProcessorMode::ALL.iter().map(|&m| (m, layout.initial_sp(m))).collect();

        assert_eq!(installed_from(None), expected);
    }

    #[test]
    fn running_mode_keeps_its_stack() {
        for current in [ProcessorMode::Svc, ProcessorMode::Sys] {
            let installed = installed_from(Some(current));

            assert_eq!(installed.len(), 5);
            assert!(installed.iter().all(|(mode, _)| *mode != current));
        }
        let from_sys = installed_from(Some(ProcessorMode::Sys));
        assert_eq!(from_sys.last(), Some(&(ProcessorMode::Und, 0x6000)));
    }
}
