//! Transfer of control into guest code and back.

use lodestar_common::SyscallTable;

/// Where a finished program resumes the kernel.
///
/// Holds the stack and frame pointer captured just before the guest's entry
/// point was called. Exactly one resume point is live at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ResumePoint {
    /// Saved stack pointer.
    pub rsp: u64,
    /// Saved frame pointer.
    pub rbp: u64,
}

/// One-shot handoff between the kernel and a guest program.
///
/// `enter` runs the program and returns its exit code once the program
/// calls `leave` (through the `EXIT` service) or returns from its entry
/// point. Calling `enter` again from inside a running program nests: the
/// outer resume point is set aside and put back when the inner run ends.
pub trait Trampoline {
    /// Calls `entry` with the address of `table` and waits for it to exit.
    fn enter(&self, entry: u32, table: &SyscallTable) -> i32;

    /// Ends the innermost running program with `code`.
    ///
    /// Must only be called while `depth() > 0`.
    fn leave(&self, code: i32) -> !;

    /// Number of programs currently running.
    fn depth(&self) -> usize;

    /// Whether the innermost program ended through `leave`.
    fn exited(&self) -> bool;
}
