//! Service dispatch for guest programs.
//!
//! Guests call the `dispatch` address from their [`SyscallTable`] with the
//! table itself, a service number and three words, and get one word back.
//! Negative results travel as their two's complement bit pattern.

mod handlers;

use crate::runtime::Kernel;
use alloc::format;
use lodestar_common::{Syscall, SyscallTable};

/// `-1` as a result word.
pub const SYSCALL_ERROR: u32 = u32::MAX;

/// Entry point published in the syscall table.
///
/// Reached only from guest code, which received `table` from the kernel.
pub extern "C" fn syscall_entry(table: u32, number: u32, arg1: u32, arg2: u32, arg3: u32) -> u32 {
    // SAFETY: guests are handed the table address at entry and pass it back
    // unchanged; there is no protection against a guest forging it.
    unsafe { dispatch_via(table as usize as *const SyscallTable, number, arg1, arg2, arg3) }
}

/// Dispatches a call made through `table`.
///
/// # Safety
///
/// `table` must be null or point to the table of a live [`Kernel`].
pub unsafe fn dispatch_via(
    table: *const SyscallTable,
    number: u32,
    arg1: u32,
    arg2: u32,
    arg3: u32,
) -> u32 {
    let Some(table) = table.as_ref() else {
        return SYSCALL_ERROR;
    };
    if !table.is_valid() || table.context == 0 {
        return SYSCALL_ERROR;
    }
    let kernel = &*(table.context as usize as *const Kernel);
    kernel.dispatch(number, arg1, arg2, arg3)
}

impl Kernel {
    /// Runs service `number` for the current program.
    pub fn dispatch(&self, number: u32, arg1: u32, arg2: u32, arg3: u32) -> u32 {
        let result = match Syscall::try_from(number) {
            Ok(Syscall::Print) => handlers::print(self, arg1),
            Ok(Syscall::Exit) => handlers::exit(self, arg1),
            Ok(Syscall::FileOpen) => handlers::file_open(self, arg1),
            Ok(Syscall::FileRead) => handlers::file_read(self, arg1, arg2),
            Ok(Syscall::FileClose) => handlers::file_close(self),
            Ok(Syscall::ListDir) => handlers::list_dir(self, arg1, arg2),
            Ok(Syscall::GetArgs) => handlers::get_args(self, arg1, arg2, arg3),
            Ok(Syscall::GetChar) => handlers::get_char(self),
            Ok(Syscall::Exec) => handlers::exec(self, arg1),
            Err(unknown) => {
                log::warn!("unknown syscall {}", unknown);
                self.console
                    .put_str(&format!("[Unknown syscall: {}]\n", unknown));
                -1
            }
        };
        result as u32
    }
}
