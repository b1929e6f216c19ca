//! Host harness for exercising the execution subsystem without hardware.
//!
//! Guest programs are Rust closures registered under an entry address. The
//! closures talk to the kernel only through the syscall table they are
//! handed, exactly like machine code would. `EXIT` unwinds out of the
//! closure back to the matching `enter`.

#![allow(dead_code)]

use lodestar_common::{Syscall, SyscallTable};
use lodestar_kernel::config::{KernelConfig, GUEST_STACK_BOTTOM, LOAD_BASE};
use lodestar_kernel::console::ConsoleIo;
use lodestar_kernel::exec::trampoline::Trampoline;
use lodestar_kernel::fs::{DirEntry, FileSystem, FsError, OpenFile, RamFs};
use lodestar_kernel::memory::{BufferMemory, GuestMemory};
use lodestar_kernel::syscall::dispatch_via;
use lodestar_kernel::testutil::ImageBuilder;
use lodestar_kernel::Kernel;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Start of guest-addressable memory in tests.
pub const MEM_BASE: u32 = GUEST_STACK_BOTTOM;
/// Covers the stack, the load window and a scratch area above it.
pub const MEM_SIZE: usize = 0x0020_0000;
/// Scratch memory outside the load window, for strings the tests pass in.
pub const SCRATCH: u32 = LOAD_BASE + 0x0008_0000;

/// Handle a guest closure uses to make calls.
#[derive(Clone, Copy)]
pub struct Guest {
    table: *const SyscallTable,
}

impl Guest {
    /// Raw call through the published dispatch path.
    pub fn call(&self, service: Syscall, a1: u32, a2: u32, a3: u32) -> i32 {
        // SAFETY: the table pointer came from `enter` and the kernel
        // outlives every program it runs.
        unsafe { dispatch_via(self.table, service.number(), a1, a2, a3) as i32 }
    }

    /// Syscall table as the guest sees it.
    pub fn table(&self) -> SyscallTable {
        // SAFETY: as above.
        unsafe { *self.table }
    }

    /// The memory the guest runs in.
    pub fn memory(&self) -> &dyn GuestMemory {
        // SAFETY: `context` is the address of the boxed kernel that owns
        // the table, which outlives the program.
        let kernel = unsafe { &*(self.table().context as usize as *const Kernel) };
        kernel.memory()
    }

    /// Writes a NUL-terminated string at `addr` and returns `addr`.
    pub fn put_str(&self, addr: u32, s: &str) -> u32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.memory().write(addr, &bytes).unwrap();
        addr
    }

    /// Reads the NUL-terminated string at `addr`.
    pub fn get_str(&self, addr: u32) -> String {
        String::from_utf8(self.memory().read_cstr(addr, 256).unwrap()).unwrap()
    }

    /// `EXEC` with a command line placed at `addr`.
    pub fn exec(&self, addr: u32, line: &str) -> i32 {
        let ptr = self.put_str(addr, line);
        self.call(Syscall::Exec, ptr, 0, 0)
    }

    /// `EXIT`; never returns.
    pub fn exit(&self, code: i32) -> ! {
        self.call(Syscall::Exit, code as u32, 0, 0);
        unreachable!("EXIT returned")
    }
}

/// A guest program body.
pub type Program = Arc<dyn Fn(Guest) -> i32 + Send + Sync>;

struct GuestExit(i32);

/// Runs registered closures in place of machine code.
#[derive(Default)]
pub struct HostTrampoline {
    programs: Mutex<HashMap<u32, Program>>,
    depth: AtomicUsize,
    leaving: AtomicBool,
    last_exited: AtomicBool,
    max_depth: AtomicUsize,
}

impl HostTrampoline {
    pub fn register(&self, entry: u32, program: Program) {
        self.programs.lock().unwrap().insert(entry, program);
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::SeqCst)
    }
}

impl Trampoline for HostTrampoline {
    fn enter(&self, entry: u32, table: &SyscallTable) -> i32 {
        let program = self
            .programs
            .lock()
            .unwrap()
            .get(&entry)
            .cloned()
            .unwrap_or_else(|| panic!("no program registered at {:#x}", entry));
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_depth.fetch_max(depth, Ordering::SeqCst);

        let guest = Guest { table };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| program(guest)));

        self.depth.fetch_sub(1, Ordering::SeqCst);
        self.last_exited
            .store(self.leaving.swap(false, Ordering::SeqCst), Ordering::SeqCst);
        match outcome {
            Ok(code) => code,
            Err(payload) => match payload.downcast::<GuestExit>() {
                Ok(exit) => exit.0,
                Err(other) => panic::resume_unwind(other),
            },
        }
    }

    fn leave(&self, code: i32) -> ! {
        self.leaving.store(true, Ordering::SeqCst);
        panic::resume_unwind(Box::new(GuestExit(code)))
    }

    fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    fn exited(&self) -> bool {
        self.last_exited.load(Ordering::SeqCst)
    }
}

/// Console that records output and replays scripted input.
#[derive(Default)]
pub struct RecordingConsole {
    out: Arc<Mutex<Vec<u8>>>,
    input: Mutex<VecDeque<u8>>,
}

impl ConsoleIo for RecordingConsole {
    fn put_bytes(&self, bytes: &[u8]) {
        self.out.lock().unwrap().extend_from_slice(bytes);
    }

    fn poll_char(&self) -> Option<u8> {
        self.input.lock().unwrap().pop_front()
    }
}

/// A kernel plus handles on its fakes.
pub struct Harness {
    pub kernel: Box<Kernel>,
    pub trampoline: Arc<HostTrampoline>,
    pub fs: Arc<RamFs>,
    pub fail_reads: Arc<AtomicBool>,
    out: Arc<Mutex<Vec<u8>>>,
}

struct SharedTrampoline(Arc<HostTrampoline>);

impl Trampoline for SharedTrampoline {
    fn enter(&self, entry: u32, table: &SyscallTable) -> i32 {
        self.0.enter(entry, table)
    }

    fn leave(&self, code: i32) -> ! {
        self.0.leave(code)
    }

    fn depth(&self) -> usize {
        self.0.depth()
    }

    fn exited(&self) -> bool {
        self.0.exited()
    }
}

/// Filesystem wrapper that can be told to fail reads.
struct SharedFs(Arc<RamFs>, Arc<AtomicBool>);

impl FileSystem for SharedFs {
    fn open(&self, name: &str) -> Result<OpenFile, FsError> {
        self.0.open(name)
    }

    fn read(&self, file: &mut OpenFile, buf: &mut [u8]) -> Result<usize, FsError> {
        if self.1.load(Ordering::SeqCst) {
            return Err(FsError::Corrupt);
        }
        self.0.read(file, buf)
    }

    fn close(&self, file: &mut OpenFile) {
        self.0.close(file)
    }

    fn list(&self, max: usize) -> Result<Vec<DirEntry>, FsError> {
        self.0.list(max)
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(input: &[u8]) -> Self {
        let trampoline = Arc::new(HostTrampoline::default());
        let fs = Arc::new(RamFs::new());
        let fail_reads = Arc::new(AtomicBool::new(false));
        let console = RecordingConsole::default();
        console.input.lock().unwrap().extend(input.iter().copied());
        let out = console.out.clone();
        let kernel = Kernel::new(
            KernelConfig::DEFAULT,
            Box::new(BufferMemory::new(MEM_BASE, MEM_SIZE)),
            Box::new(SharedFs(fs.clone(), fail_reads.clone())),
            Box::new(console),
            Box::new(SharedTrampoline(trampoline.clone())),
        );
        Harness {
            kernel,
            trampoline,
            fs,
            fail_reads,
            out,
        }
    }

    /// Installs a program file whose single segment is `code` at `entry`.
    pub fn install(&self, name: &str, entry: u32, program: Program) {
        let code = entry.to_le_bytes();
        let image = ImageBuilder::new(entry)
            .segment(entry, &code, 0x40)
            .build();
        self.fs.add_file(name, &image);
        self.trampoline.register(entry, program);
    }

    /// Fills the load window with a recognizable pattern.
    pub fn scribble_window(&self, byte: u8) {
        let config = self.kernel.config();
        self.kernel
            .memory()
            .fill(config.load_base, config.load_size as usize, byte)
            .unwrap();
    }

    /// Copy of the whole load window.
    pub fn window(&self) -> Vec<u8> {
        let config = self.kernel.config();
        let mut bytes = vec![0u8; config.load_size as usize];
        self.kernel.memory().read(config.load_base, &mut bytes).unwrap();
        bytes
    }

    /// Writes a NUL-terminated string into scratch memory at `offset`.
    pub fn put_str(&self, offset: u32, s: &str) -> u32 {
        let addr = SCRATCH + offset;
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.kernel.memory().write(addr, &bytes).unwrap();
        addr
    }

    /// Everything printed so far.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.out.lock().unwrap()).into_owned()
    }
}
