//! Guest-side library for Lodestar programs.
//!
//! The kernel calls a program's `_start` with the address of its syscall
//! table. [`entry!`] stores that address, runs `main` and exits with its
//! return value; every wrapper below goes through the stored table.

#![no_std]

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use lodestar_common::limits::ARG_COUNT_QUERY;
use lodestar_common::syscall::DispatchFn;

pub use lodestar_common::limits::MAX_CMDLINE_LEN;
pub use lodestar_common::{DirInfo, ExecError, Syscall, SyscallTable};

/// Longest string passed to the kernel in one piece.
const STR_CHUNK: usize = 256;

static TABLE: AtomicU32 = AtomicU32::new(0);

/// Records the syscall table handed to `_start`.
///
/// # Safety
///
/// `table` must be the address the kernel passed to the entry point.
pub unsafe fn init(table: u32) {
    TABLE.store(table, Ordering::Relaxed);
}

/// Raw service call; `-1` if the table is missing or not a Lodestar table.
pub fn syscall(service: Syscall, arg1: u32, arg2: u32, arg3: u32) -> i32 {
    let table = TABLE.load(Ordering::Relaxed);
    if table == 0 {
        return -1;
    }
    // SAFETY: `init` was given the kernel's table, which stays mapped for
    // the life of the program.
    let t = unsafe { &*(table as usize as *const SyscallTable) };
    if !t.is_valid() || t.dispatch == 0 {
        return -1;
    }
    // SAFETY: the kernel publishes a `DispatchFn` in `dispatch`.
    let dispatch: DispatchFn = unsafe { core::mem::transmute(t.dispatch as usize) };
    dispatch(table, service.number(), arg1, arg2, arg3) as i32
}

fn addr<T: ?Sized>(ptr: *const T) -> u32 {
    ptr as *const u8 as usize as u32
}

/// Runs `f` with `s` copied into `buf` as a NUL-terminated string.
///
/// Returns `None` when `s` and its terminator do not fit in `buf`.
fn with_cstr<R>(buf: &mut [u8], s: &str, f: impl FnOnce(u32) -> R) -> Option<R> {
    if s.len() >= buf.len() {
        return None;
    }
    buf[..s.len()].copy_from_slice(s.as_bytes());
    buf[s.len()] = 0;
    Some(f(addr(buf.as_ptr())))
}

/// Writes raw bytes to the console. Stops at an embedded NUL.
pub fn print_bytes(bytes: &[u8]) {
    let mut buf = [0u8; STR_CHUNK];
    for chunk in bytes.chunks(STR_CHUNK - 1) {
        buf[..chunk.len()].copy_from_slice(chunk);
        buf[chunk.len()] = 0;
        syscall(Syscall::Print, addr(buf.as_ptr()), 0, 0);
        if chunk.contains(&0) {
            return;
        }
    }
}

/// Writes a string to the console.
pub fn print(s: &str) {
    print_bytes(s.as_bytes());
}

/// Ends the program with `code`.
pub fn exit(code: i32) -> ! {
    syscall(Syscall::Exit, code as u32, 0, 0);
    loop {
        core::hint::spin_loop();
    }
}

/// Opens `name` as the program's file, closing any previous one.
pub fn open(name: &str) -> Result<(), i32> {
    let mut buf = [0u8; STR_CHUNK];
    match with_cstr(&mut buf, name, |p| syscall(Syscall::FileOpen, p, 0, 0)) {
        Some(0) => Ok(()),
        Some(e) => Err(e),
        None => Err(-1),
    }
}

/// Reads from the open file; `Ok(0)` at end of file.
pub fn read(buf: &mut [u8]) -> Result<usize, i32> {
    match syscall(Syscall::FileRead, addr(buf.as_mut_ptr()), buf.len() as u32, 0) {
        n if n >= 0 => Ok(n as usize),
        e => Err(e),
    }
}

/// Closes the open file.
pub fn close() -> Result<(), i32> {
    match syscall(Syscall::FileClose, 0, 0, 0) {
        0 => Ok(()),
        e => Err(e),
    }
}

/// Fills `entries` from the root directory and returns how many were written.
pub fn list_dir(entries: &mut [DirInfo]) -> Result<usize, i32> {
    match syscall(
        Syscall::ListDir,
        addr(entries.as_mut_ptr()),
        entries.len() as u32,
        0,
    ) {
        n if n >= 0 => Ok(n as usize),
        e => Err(e),
    }
}

/// Number of arguments after the program name.
pub fn arg_count() -> usize {
    syscall(Syscall::GetArgs, ARG_COUNT_QUERY, 0, 0).max(0) as usize
}

/// Copies argument `index` into `buf` and returns it.
pub fn arg(index: usize, buf: &mut [u8]) -> Option<&str> {
    if buf.is_empty() {
        return None;
    }
    let rc = syscall(
        Syscall::GetArgs,
        index as u32,
        addr(buf.as_mut_ptr()),
        buf.len() as u32,
    );
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    core::str::from_utf8(&buf[..end]).ok()
}

/// Waits for one character of input. Enter reads as `\n`.
pub fn getchar() -> u8 {
    syscall(Syscall::GetChar, 0, 0, 0) as u8
}

/// Runs another program and waits for it to finish.
pub fn exec(line: &str) -> Result<(), ExecError> {
    let mut buf = [0u8; MAX_CMDLINE_LEN];
    match with_cstr(&mut buf, line, |p| syscall(Syscall::Exec, p, 0, 0)) {
        Some(0) => Ok(()),
        Some(code) => Err(ExecError::from_code(code).unwrap_or(ExecError::RunFailed)),
        None => Err(ExecError::NotFound),
    }
}

/// Console writer for `write!`.
pub struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print(s);
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    let _ = Console.write_fmt(args);
}

/// Prints to the console without a newline.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::_print(format_args!($($arg)*))
    };
}

/// Prints to the console with a newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)))
}

/// Declares the program entry point.
///
/// `main` must be a `fn() -> i32`; its result becomes the exit code.
#[macro_export]
macro_rules! entry {
    ($main:path) => {
        #[no_mangle]
        pub extern "C" fn _start(table: u32) -> ! {
            // SAFETY: the kernel passes its table as the only argument.
            unsafe { $crate::init(table) };
            let main: fn() -> i32 = $main;
            $crate::exit(main())
        }
    };
}

#[cfg(all(target_os = "none", not(test)))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("panic: {}", info);
    exit(101)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_fail_without_table() {
        assert_eq!(syscall(Syscall::Print, 0, 0, 0), -1);
        assert_eq!(arg_count(), 0);
        assert_eq!(open("a.txt"), Err(-1));
    }

    #[test]
    fn test_overlong_strings_are_refused() {
        let long = [b'a'; STR_CHUNK];
        let s = core::str::from_utf8(&long).unwrap();
        assert_eq!(with_cstr(&mut [0u8; STR_CHUNK], s, |_| 0), None);
        assert_eq!(with_cstr(&mut [0u8; STR_CHUNK], "ok", |_| 1), Some(1));
        assert_eq!(open(s), Err(-1));
    }

    #[test]
    fn test_full_command_line_fits() {
        // program name plus 16 arguments, every word 63 bytes long
        let mut raw = [b'w'; MAX_CMDLINE_LEN - 1];
        for sep in (63..raw.len()).step_by(64) {
            raw[sep] = b' ';
        }
        let line = core::str::from_utf8(&raw).unwrap();
        assert_eq!(line.split(' ').count(), 17);
        let mut buf = [0xffu8; MAX_CMDLINE_LEN];
        assert_eq!(with_cstr(&mut buf, line, |_| 0), Some(0));
        assert_eq!(buf[line.len()], 0);
        assert_eq!(with_cstr(&mut [0u8; STR_CHUNK], line, |_| 0), None);
    }
}
