//! Bare-metal entry into guest programs.
//!
//! `lodestar_enter_guest` saves the callee-saved registers on the kernel
//! stack, records where they are in a [`ResumePoint`], and calls the guest
//! entry point with the syscall table address in `edi`. The outermost run
//! switches to the guest stack first; nested runs are entered from a
//! syscall, already on that stack, and stay on it.
//!
//! `lodestar_leave_guest` unwinds to the recorded point from any depth of
//! kernel frames, so nothing on the abandoned frames may still hold a lock.

use crate::exec::trampoline::{ResumePoint, Trampoline};
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use lodestar_common::SyscallTable;

// rdi = entry, rsi = table, rdx = stack top or 0, rcx = *mut ResumePoint
// ResumePoint layout: 0:rsp, 8:rbp
core::arch::global_asm!(
    r#"
.global lodestar_enter_guest
lodestar_enter_guest:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15

    mov [rcx], rsp
    mov [rcx + 8], rbp
    mov r12, rcx

    test rdx, rdx
    jz .Lkeep_stack
    mov rsp, rdx
.Lkeep_stack:
    and rsp, -16

    mov rax, rdi
    mov edi, esi
    call rax

    // returned from the entry point: same as EXIT with its result
    mov edi, eax
    mov rsi, r12
    jmp lodestar_leave_guest

// edi = exit code, rsi = *const ResumePoint
.global lodestar_leave_guest
lodestar_leave_guest:
    mov rsp, [rsi]
    mov rbp, [rsi + 8]
    pop r15
    pop r14
    pop r13
    pop r12
    pop rbx
    pop rbp
    mov eax, edi
    ret
"#
);

extern "C" {
    fn lodestar_enter_guest(entry: u64, table: u32, stack_top: u64, resume: *mut ResumePoint) -> i32;
    fn lodestar_leave_guest(code: i32, resume: *const ResumePoint) -> !;
}

/// Exit code reported for a program killed by a CPU exception.
pub const FAULT_EXIT_CODE: i32 = -1;

struct Resume(UnsafeCell<ResumePoint>);

// SAFETY: a single CPU with interrupts masked; the cell is only touched by
// enter, which is not reentrant except through the guest, and by leave.
unsafe impl Sync for Resume {}

static RESUME: Resume = Resume(UnsafeCell::new(ResumePoint { rsp: 0, rbp: 0 }));
static DEPTH: AtomicUsize = AtomicUsize::new(0);
static LEAVING: AtomicBool = AtomicBool::new(false);
static LAST_EXITED: AtomicBool = AtomicBool::new(false);
static STACK_TOP: AtomicU64 = AtomicU64::new(0);

/// The machine trampoline. All instances share one resume point.
pub struct X86Trampoline(());

impl X86Trampoline {
    /// Creates the trampoline; outermost runs start with `rsp = stack_top`.
    pub fn new(stack_top: u64) -> Self {
        STACK_TOP.store(stack_top & !0xF, Ordering::SeqCst);
        X86Trampoline(())
    }
}

impl Trampoline for X86Trampoline {
    fn enter(&self, entry: u32, table: &SyscallTable) -> i32 {
        let Ok(table) = u32::try_from(table as *const SyscallTable as usize) else {
            log::error!("syscall table above 4 GiB, cannot enter guest");
            return FAULT_EXIT_CODE;
        };
        // SAFETY: no guest is between enter and leave at this point in the
        // current frame, so the cell holds the caller's own resume point.
        let outer = unsafe { *RESUME.0.get() };
        let depth = DEPTH.fetch_add(1, Ordering::SeqCst);
        let stack = if depth == 0 { STACK_TOP.load(Ordering::SeqCst) } else { 0 };

        // SAFETY: `entry` was produced by the loader from a validated image
        // that now occupies the mapped load window. The asm restores every
        // callee-saved register before returning here.
        let code = unsafe { lodestar_enter_guest(u64::from(entry), table, stack, RESUME.0.get()) };

        // SAFETY: see above; the inner run is over.
        unsafe { *RESUME.0.get() = outer };
        DEPTH.fetch_sub(1, Ordering::SeqCst);
        LAST_EXITED.store(LEAVING.swap(false, Ordering::SeqCst), Ordering::SeqCst);
        code
    }

    fn leave(&self, code: i32) -> ! {
        leave_guest(code)
    }

    fn depth(&self) -> usize {
        DEPTH.load(Ordering::SeqCst)
    }

    fn exited(&self) -> bool {
        LAST_EXITED.load(Ordering::SeqCst)
    }
}

/// Whether guest code is somewhere on the current call chain.
pub fn guest_running() -> bool {
    DEPTH.load(Ordering::SeqCst) > 0
}

/// Abandons the innermost guest and resumes its `enter` with `code`.
///
/// Callers must have checked [`guest_running`].
pub fn leave_guest(code: i32) -> ! {
    LEAVING.store(true, Ordering::SeqCst);
    // SAFETY: a guest is running, so RESUME holds the point saved by its
    // enter, and that frame is still live below us on the stack.
    unsafe { lodestar_leave_guest(code, RESUME.0.get()) }
}
