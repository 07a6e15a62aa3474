// =============================================================================
// C5BOOT - Bootloader Handoff
// =============================================================================
// When the image is started by a bootloader `go` command, it runs as a
// function called by the bootloader: r0 = argc, r1 = argv, and the caller
// expects control (and its stack) back with the exit code in r0.
//
// `_handoff_start` (boot.S) pushes the caller's r4-r12 and LR, then records
// the caller's SP and LR in `__handoff_frame` before any Rust code runs.
// A `BootContext` is built from that frame once and is consumed by the way
// back, so there is exactly one return per boot.
// =============================================================================

use core::ffi::{c_char, CStr};

/// Bytes pushed by the entry stub below the caller's SP: r4-r12 and LR.
/// A multiple of 8, so an AAPCS-aligned caller SP stays aligned.
pub const SAVED_REGS_SIZE: usize = 10 * 4;

/// Caller state recorded by the entry stub. Layout is shared with boot.S.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffFrame {
    pub sp: usize,
    pub lr: usize,
}

#[cfg(target_arch = "arm")]
#[export_name = "__handoff_frame"]
static mut HANDOFF_FRAME: HandoffFrame = HandoffFrame { sp: 0, lr: 0 };

/// Register state the caller resumes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    /// SP to restore before popping the saved registers.
    pub sp: usize,
    /// Where execution continues: the instruction after the caller's call.
    pub pc: usize,
    /// Exit code handed back in r0.
    pub r0: i32,
}

/// Everything the program needs from, and owes to, the bootloader.
#[derive(Debug)]
pub struct BootContext {
    caller_sp: usize,
    caller_lr: usize,
    argc: i32,
    argv: *const *const c_char,
}

impl BootContext {
    /// Build the context from the frame recorded by `_handoff_start`.
    ///
    /// # Safety
    /// Must be called once, from `handoff_main`, with the arguments it was
    /// given.
    #[cfg(target_arch = "arm")]
    pub unsafe fn capture(argc: i32, argv: *const *const c_char) -> Self {
        let frame = core::ptr::read_volatile(core::ptr::addr_of!(HANDOFF_FRAME));
        Self::from_parts(frame, argc, argv)
    }

    pub const fn from_parts(frame: HandoffFrame, argc: i32, argv: *const *const c_char) -> Self {
        Self { caller_sp: frame.sp, caller_lr: frame.lr, argc, argv }
    }

    pub fn argc(&self) -> usize {
        self.argc.max(0) as usize
    }

    pub fn caller_sp(&self) -> usize {
        self.caller_sp
    }

    pub fn caller_lr(&self) -> usize {
        self.caller_lr
    }

    /// Command-line arguments passed by the bootloader.
    ///
    /// # Safety
    /// `argv` must hold `argc` pointers to NUL-terminated strings that stay
    /// alive for as long as the iterator is used.
    pub unsafe fn args(&self) -> impl Iterator<Item = &CStr> + '_ {
        let argv = self.argv;
        (0..if argv.is_null() { 0 } else { self.argc() })
            .map(move |i| *argv.add(i))
            .take_while(|arg| !arg.is_null())
            .map(|arg| CStr::from_ptr(arg))
    }

    /// Where `return_to_caller` will leave the CPU.
    pub fn resume(&self, code: i32) -> Resume {
        Resume { sp: self.caller_sp - SAVED_REGS_SIZE, pc: self.caller_lr, r0: code }
    }

    /// Restore the caller's SP, callee-saved registers and LR, and return to
    /// it with `code` in r0.
    #[cfg(target_arch = "arm")]
    pub fn return_to_caller(self, code: i32) -> ! {
        let resume = self.resume(code);
        log::debug!("[handoff] returning {} to {:#010x}", code, resume.pc);

        // SAFETY: sp points at the r4-r12/LR block pushed by _handoff_start
        // on the caller's stack, which nothing since has touched.
        unsafe {
            core::arch::asm!(
                "mov sp, r1",
                "pop {{r4-r12, lr}}",
                "bx lr",
                in("r0") resume.r0,
                in("r1") resume.sp,
                options(noreturn),
            )
        }
    }
}

/// Run `program` with the bootloader's arguments and return its exit code
/// to the bootloader.
#[cfg(target_arch = "arm")]
pub fn enter(ctx: BootContext, program: fn(&BootContext) -> i32) -> ! {
    log::debug!("[handoff] caller sp {:#010x} lr {:#010x}, argc {}", ctx.caller_sp, ctx.caller_lr, ctx.argc);
    let code = program(&ctx);
    ctx.return_to_caller(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn resume_point_is_the_call_site() {
        // A bootloader at 0x3FF0_1000 did `blx` from 0x3FF0_1234 with SP 0x3FF8_0000
        let frame = HandoffFrame { sp: 0x3FF8_0000, lr: 0x3FF0_1238 };
        let ctx = BootContext::from_parts(frame, 0, core::ptr::null());

        let resume = ctx.resume(7);

        assert_eq!(resume.pc, 0x3FF0_1238);
        assert_eq!(resume.r0, 7);
        // Popping r4-r12 and LR lands back on the caller's SP
        assert_eq!(resume.sp + SAVED_REGS_SIZE, frame.sp);
        assert_eq!(ctx.caller_sp(), frame.sp);
        assert_eq!(ctx.caller_lr(), frame.lr);
    }

    #[test]
    fn handoff_main_runs_on_an_aligned_stack() {
        // AAPCS: SP is 8-byte aligned at every public call
        for caller_sp in [0x3FF8_0000, 0x3FF7_FFF8, 0x0010_0008] {
            let ctx = BootContext::from_parts(HandoffFrame { sp: caller_sp, lr: 0 }, 0, core::ptr::null());

            assert_eq!(ctx.resume(0).sp % 8, 0, "caller sp {:#x}", caller_sp);
        }
        assert_eq!(SAVED_REGS_SIZE % 8, 0);
    }

    const ENTRY_STUB: &str = include_str!("boot.S");

    #[test]
    fn entry_stub_saves_what_the_return_path_restores() {
        let pushed = ENTRY_STUB.lines().find(|l| l.trim_start().starts_with("push"));
        let skipped = ENTRY_STUB.lines().find(|l| l.contains("caller SP before the push"));

        assert_eq!(pushed.map(str::trim), Some("push    {r4-r12, lr}"));
        assert!(skipped.is_some_and(|l| l.contains(&format!("#{}", SAVED_REGS_SIZE))));
    }

    #[test]
    fn handoff_builds_branch_to_the_stub_from_the_image_base() {
        let entry: Vec<&str> = ENTRY_STUB
            .lines()
            .map(str::trim)
            .skip_while(|l| *l != "#ifdef HANDOFF_ENTRY")
            .take_while(|l| *l != "#endif")
            .collect();

        assert!(entry.contains(&".section .text.entry, \"ax\""));
        assert!(entry.contains(&"b       _handoff_start"));
    }

    #[test]
    fn args_walks_argv() {
        let owned: Vec<CString> = ["c5boot", "-v", "0x100"]
            .iter()
            .map(|s| CString::new(*s).unwrap())
            .collect();
        let argv: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        let ctx = BootContext::from_parts(HandoffFrame { sp: 0, lr: 0 }, 3, argv.as_ptr());

        let args: Vec<&str> = unsafe { ctx.args() }.map(|a| a.to_str().unwrap()).collect();

        assert_eq!(args, ["c5boot", "-v", "0x100"]);
        assert_eq!(ctx.argc(), 3);
    }

    #[test]
    fn args_stops_at_null_and_tolerates_missing_argv() {
        let first = CString::new("go").unwrap();
        let argv = [first.as_ptr(), core::ptr::null()];
        let ctx = BootContext::from_parts(HandoffFrame { sp: 0, lr: 0 }, 2, argv.as_ptr());
        let empty = BootContext::from_parts(HandoffFrame { sp: 0, lr: 0 }, 4, core::ptr::null());

        assert_eq!(unsafe { ctx.args() }.count(), 1);
        assert_eq!(unsafe { empty.args() }.count(), 0);
    }

    #[test]
    fn negative_argc_means_no_arguments() {
        let ctx = BootContext::from_parts(HandoffFrame { sp: 0, lr: 0 }, -1, core::ptr::null());

        assert_eq!(ctx.argc(), 0);
    }
}
