//! One function per service. Each returns the signed result word.

use crate::config::{MAX_PATH_LEN, MAX_PRINT_LEN};
use crate::runtime::Kernel;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use bytemuck::bytes_of;
use lodestar_common::limits::{ARG_COUNT_QUERY, MAX_CMDLINE_LEN};

const CHUNK: usize = 512;

/// Reads a NUL-terminated string argument of at most `max` bytes including
/// the terminator; `None` for null, unreadable or unterminated.
fn guest_string(k: &Kernel, ptr: u32, max: usize) -> Option<String> {
    if ptr == 0 {
        return None;
    }
    let bytes = k.memory.read_cstr(ptr, max).ok()?;
    if bytes.len() == max {
        log::debug!("string at {:#x} has no terminator in {} bytes", ptr, max);
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

pub(super) fn print(k: &Kernel, ptr: u32) -> i32 {
    if ptr == 0 {
        return -1;
    }
    match k.memory.read_cstr(ptr, MAX_PRINT_LEN) {
        Ok(bytes) => {
            k.console.put_bytes(&bytes);
            0
        }
        Err(e) => {
            log::warn!("print: {}", e);
            -1
        }
    }
}

pub(super) fn exit(k: &Kernel, code: u32) -> i32 {
    let code = code as i32;
    if k.trampoline.depth() == 0 {
        log::warn!("exit({}) with no program running", code);
        return -1;
    }
    k.console
        .put_str(&format!("\n[Program exited with code: {}]\n", code));
    k.trampoline.leave(code)
}

pub(super) fn file_open(k: &Kernel, ptr: u32) -> i32 {
    if let Some(mut previous) = k.state.open_file.lock().take() {
        k.fs.close(&mut previous);
    }
    let Some(name) = guest_string(k, ptr, MAX_PATH_LEN) else {
        return -1;
    };
    match k.fs.open(&name.to_ascii_uppercase()) {
        Ok(file) => {
            *k.state.open_file.lock() = Some(file);
            0
        }
        Err(e) => {
            log::debug!("open {}: {}", name, e);
            -1
        }
    }
}

pub(super) fn file_read(k: &Kernel, buf: u32, count: u32) -> i32 {
    if buf == 0 {
        return -1;
    }
    let mut open = k.state.open_file.lock();
    let Some(file) = open.as_mut() else {
        return -1;
    };

    let mut chunk = [0u8; CHUNK];
    // the byte count travels back as a non-negative i32
    let count = count.min(i32::MAX as u32) as usize;
    let mut total = 0usize;
    while total < count {
        let want = CHUNK.min(count - total);
        let n = match k.fs.read(file, &mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::warn!("read: {}", e);
                return -1;
            }
        };
        let Some(at) = buf.checked_add(total as u32) else {
            return -1;
        };
        if k.memory.write(at, &chunk[..n]).is_err() {
            return -1;
        }
        total += n;
    }
    total as i32
}

pub(super) fn file_close(k: &Kernel) -> i32 {
    match k.state.open_file.lock().take() {
        Some(mut file) => {
            k.fs.close(&mut file);
            0
        }
        None => -1,
    }
}

pub(super) fn list_dir(k: &Kernel, buf: u32, max: u32) -> i32 {
    if buf == 0 || max == 0 {
        return -1;
    }
    let entries = match k.fs.list(max as usize) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("list: {}", e);
            return -1;
        }
    };
    let records: Vec<u8> = entries
        .iter()
        .flat_map(|e| bytes_of(&e.to_info()).to_vec())
        .collect();
    if k.memory.write(buf, &records).is_err() {
        return -1;
    }
    entries.len() as i32
}

pub(super) fn get_args(k: &Kernel, index: u32, buf: u32, size: u32) -> i32 {
    let args = k.state.args.lock();
    if index == ARG_COUNT_QUERY {
        return args.count() as i32;
    }
    if buf == 0 || size == 0 {
        return -1;
    }
    let Some(arg) = args.get(index as usize) else {
        return -1;
    };
    let n = arg.len().min(size as usize - 1);
    let mut out = Vec::with_capacity(n + 1);
    out.extend_from_slice(&arg.as_bytes()[..n]);
    out.push(0);
    match k.memory.write(buf, &out) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

pub(super) fn get_char(k: &Kernel) -> i32 {
    match k.console.read_char() {
        b'\r' => i32::from(b'\n'),
        c => i32::from(c),
    }
}

pub(super) fn exec(k: &Kernel, ptr: u32) -> i32 {
    let Some(line) = guest_string(k, ptr, MAX_CMDLINE_LEN) else {
        return lodestar_common::ExecError::NotFound.code();
    };
    match k.exec(&line) {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}
