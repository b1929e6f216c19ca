//! Services as seen from running programs.

mod common;

use bytemuck::pod_read_unaligned;
use common::{Guest, Harness, SCRATCH};
use lodestar_common::limits::{ARG_COUNT_QUERY, MAX_ARGS, MAX_ARG_LEN, MAX_CMDLINE_LEN};
use lodestar_common::{DirInfo, Syscall};
use lodestar_kernel::config::LOAD_BASE;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const ENTRY_A: u32 = LOAD_BASE + 0x100;
const ENTRY_B: u32 = LOAD_BASE + 0x200;

fn args_of(g: Guest, buf: u32) -> Vec<String> {
    let count = g.call(Syscall::GetArgs, ARG_COUNT_QUERY, 0, 0);
    (0..count as u32)
        .map(|i| {
            assert_eq!(g.call(Syscall::GetArgs, i, buf, 64), 0);
            g.get_str(buf)
        })
        .collect()
}

#[test]
fn test_args_survive_nested_exec() {
    let h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = seen.clone();
    h.install(
        "B.ELF",
        ENTRY_B,
        Arc::new(move |g: Guest| {
            s.lock().unwrap().push(args_of(g, SCRATCH + 0x400));
            0
        }),
    );
    let s = seen.clone();
    h.install(
        "A.ELF",
        ENTRY_A,
        Arc::new(move |g: Guest| {
            s.lock().unwrap().push(args_of(g, SCRATCH + 0x400));
            assert_eq!(g.exec(SCRATCH, "b x y z"), 0);
            s.lock().unwrap().push(args_of(g, SCRATCH + 0x400));
            0
        }),
    );

    assert_eq!(h.kernel.exec("a one two"), Ok(0));
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], vec!["one", "two"]);
    assert_eq!(seen[1], vec!["x", "y", "z"]);
    assert_eq!(seen[2], vec!["one", "two"]);
    assert_eq!(h.kernel.args().count(), 0);
}

#[test]
fn test_exec_passes_full_length_command_line() {
    let h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let words: Vec<String> = (0..MAX_ARGS)
        .map(|i| format!("{:02}{}", i, "x".repeat(MAX_ARG_LEN - 3)))
        .collect();

    let s = seen.clone();
    h.install(
        "B.ELF",
        ENTRY_B,
        Arc::new(move |g: Guest| {
            *s.lock().unwrap() = args_of(g, SCRATCH + 0x800);
            0
        }),
    );
    let line = format!("b {}", words.join(" "));
    h.install(
        "A.ELF",
        ENTRY_A,
        Arc::new(move |g: Guest| g.exec(SCRATCH, &line)),
    );

    assert_eq!(h.kernel.exec("a"), Ok(0));
    assert_eq!(*seen.lock().unwrap(), words);
}

#[test]
fn test_exec_rejects_unterminated_command_line() {
    let h = Harness::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let r = runs.clone();
    h.install(
        "B.ELF",
        ENTRY_B,
        Arc::new(move |_: Guest| {
            r.fetch_add(1, Ordering::SeqCst);
            0
        }),
    );
    h.install(
        "A.ELF",
        ENTRY_A,
        Arc::new(|g: Guest| {
            let mut line = vec![b'x'; MAX_CMDLINE_LEN + 1];
            line[..2].copy_from_slice(b"b ");
            // terminator one byte past the limit
            line[MAX_CMDLINE_LEN] = 0;
            g.memory().write(SCRATCH, &line).unwrap();
            assert_eq!(g.call(Syscall::Exec, SCRATCH, 0, 0), -1);

            // the longest line that still fits
            g.memory().write(SCRATCH + MAX_CMDLINE_LEN as u32 - 1, &[0]).unwrap();
            assert_eq!(g.call(Syscall::Exec, SCRATCH, 0, 0), 0);
            0
        }),
    );

    assert_eq!(h.kernel.exec("a"), Ok(0));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_read_count_is_clamped() {
    let h = Harness::new();
    h.fs.add_file("TEN.TXT", b"0123456789");
    h.install(
        "A.ELF",
        ENTRY_A,
        Arc::new(|g: Guest| {
            let name = g.put_str(SCRATCH, "ten.txt");
            assert_eq!(g.call(Syscall::FileOpen, name, 0, 0), 0);
            g.call(Syscall::FileRead, SCRATCH + 0x100, u32::MAX, 0)
        }),
    );
    assert_eq!(h.kernel.exec("a"), Ok(10));
}

#[test]
fn test_open_file_survives_nested_exec() {
    let h = Harness::new();
    h.fs.add_file("OUTER.TXT", b"0123456789");
    h.fs.add_file("INNER.TXT", b"abcdef");
    let reads = Arc::new(Mutex::new(Vec::new()));

    let r = reads.clone();
    h.install(
        "B.ELF",
        ENTRY_B,
        Arc::new(move |g: Guest| {
            let name = g.put_str(SCRATCH + 0x300, "inner.txt");
            assert_eq!(g.call(Syscall::FileOpen, name, 0, 0), 0);
            let n = g.call(Syscall::FileRead, SCRATCH + 0x500, 3, 0);
            let mut buf = vec![0u8; n as usize];
            g.memory().read(SCRATCH + 0x500, &mut buf).unwrap();
            r.lock().unwrap().push(buf);
            // left open on purpose
            g.exit(0)
        }),
    );
    let r = reads.clone();
    h.install(
        "A.ELF",
        ENTRY_A,
        Arc::new(move |g: Guest| {
            let name = g.put_str(SCRATCH + 0x200, "OUTER.TXT");
            assert_eq!(g.call(Syscall::FileOpen, name, 0, 0), 0);
            assert_eq!(g.call(Syscall::FileRead, SCRATCH + 0x500, 4, 0), 4);
            assert_eq!(g.exec(SCRATCH, "b"), 0);
            let n = g.call(Syscall::FileRead, SCRATCH + 0x500, 64, 0);
            let mut buf = vec![0u8; n as usize];
            g.memory().read(SCRATCH + 0x500, &mut buf).unwrap();
            r.lock().unwrap().push(buf);
            assert_eq!(g.call(Syscall::FileClose, 0, 0, 0), 0);
            assert_eq!(g.call(Syscall::FileClose, 0, 0, 0), -1);
            0
        }),
    );

    assert_eq!(h.kernel.exec("a"), Ok(0));
    let reads = reads.lock().unwrap();
    assert_eq!(reads[0], b"abc");
    assert_eq!(reads[1], b"456789");
    assert!(h.kernel.open_file().is_none());
}

#[test]
fn test_read_whole_file_in_pieces() {
    let h = Harness::new();
    let content: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
    h.fs.add_file("DATA.BIN", &content);
    let collected = Arc::new(Mutex::new(Vec::new()));
    let c = collected.clone();
    h.install(
        "A.ELF",
        ENTRY_A,
        Arc::new(move |g: Guest| {
            let name = g.put_str(SCRATCH, "data.bin");
            assert_eq!(g.call(Syscall::FileOpen, name, 0, 0), 0);
            loop {
                let n = g.call(Syscall::FileRead, SCRATCH + 0x100, 700, 0);
                assert!(n >= 0);
                if n == 0 {
                    break;
                }
                let mut buf = vec![0u8; n as usize];
                g.memory().read(SCRATCH + 0x100, &mut buf).unwrap();
                c.lock().unwrap().extend_from_slice(&buf);
            }
            g.call(Syscall::FileClose, 0, 0, 0);
            0
        }),
    );
    assert_eq!(h.kernel.exec("a"), Ok(0));
    assert!(*collected.lock().unwrap() == content);
}

#[test]
fn test_list_dir_from_guest() {
    let h = Harness::new();
    h.fs.add_file("HELLO.TXT", b"hi");
    let names = Arc::new(Mutex::new(Vec::new()));
    let n = names.clone();
    h.install(
        "LS.ELF",
        ENTRY_A,
        Arc::new(move |g: Guest| {
            let count = g.call(Syscall::ListDir, SCRATCH, 16, 0);
            let size = core::mem::size_of::<DirInfo>();
            let mut raw = vec![0u8; count as usize * size];
            g.memory().read(SCRATCH, &mut raw).unwrap();
            for record in raw.chunks_exact(size) {
                let info: DirInfo = pod_read_unaligned(record);
                let name = String::from_utf8_lossy(info.name()).into_owned();
                n.lock().unwrap().push((name, info.size));
            }
            0
        }),
    );
    assert_eq!(h.kernel.exec("ls"), Ok(0));
    let names = names.lock().unwrap();
    assert!(names.contains(&("HELLO.TXT".to_string(), 2)));
    assert!(names.iter().any(|(name, _)| name == "LS.ELF"));
}

#[test]
fn test_getchar_and_print_echo() {
    let h = Harness::with_input(b"hi\r");
    h.install(
        "ECHO.ELF",
        ENTRY_A,
        Arc::new(|g: Guest| {
            let mut line = String::new();
            loop {
                let c = g.call(Syscall::GetChar, 0, 0, 0) as u8;
                if c == b'\n' {
                    break;
                }
                line.push(c as char);
            }
            let msg = g.put_str(SCRATCH, &format!("got {}\n", line));
            g.call(Syscall::Print, msg, 0, 0);
            0
        }),
    );
    assert_eq!(h.kernel.exec("echo"), Ok(0));
    assert!(h.output().starts_with("got hi\n"));
}

#[test]
fn test_unknown_service_from_guest() {
    let h = Harness::new();
    h.install(
        "A.ELF",
        ENTRY_A,
        Arc::new(|g: Guest| {
            // SAFETY: table pointer from enter.
            let result = unsafe {
                lodestar_kernel::syscall::dispatch_via(&g.table(), 77, 0, 0, 0)
            };
            result as i32
        }),
    );
    assert_eq!(h.kernel.exec("a"), Ok(-1));
    assert!(h.output().contains("[Unknown syscall: 77]"));
}
