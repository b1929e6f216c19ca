//! The kernel object shared by the syscall layer and the kernel monitor.

use crate::config::KernelConfig;
use crate::console::ConsoleIo;
use crate::exec::args::ArgTable;
use crate::exec::snapshot::SnapshotStack;
use crate::exec::trampoline::Trampoline;
use crate::exec::RunState;
use crate::fs::{FileSystem, OpenFile};
use crate::memory::GuestMemory;
use alloc::boxed::Box;
use lodestar_common::SyscallTable;
use spin::Mutex;

/// State owned by whichever program is currently running.
///
/// Each field is locked for the duration of one service and never while
/// guest code runs.
pub struct KernelState {
    /// Arguments of the running program.
    pub args: Mutex<ArgTable>,
    /// The single open file of the running program.
    pub open_file: Mutex<Option<OpenFile>>,
    /// Images of every program waiting on a nested run.
    pub snapshots: Mutex<SnapshotStack>,
    /// Lifecycle of the innermost invocation.
    pub run_state: Mutex<RunState>,
}

impl KernelState {
    /// Fresh state with no program loaded.
    pub const fn new() -> Self {
        Self {
            args: Mutex::new(ArgTable::new()),
            open_file: Mutex::new(None),
            snapshots: Mutex::new(SnapshotStack::new()),
            run_state: Mutex::new(RunState::Idle),
        }
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}

/// The execution subsystem and its collaborators.
///
/// Always lives in a `Box`: the syscall table carries the kernel's address
/// and guests reach it through that pointer.
pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) memory: Box<dyn GuestMemory>,
    pub(crate) fs: Box<dyn FileSystem>,
    pub(crate) console: Box<dyn ConsoleIo>,
    pub(crate) trampoline: Box<dyn Trampoline>,
    pub(crate) state: KernelState,
    table: SyscallTable,
}

impl Kernel {
    /// Assembles a kernel and publishes its syscall table.
    pub fn new(
        config: KernelConfig,
        memory: Box<dyn GuestMemory>,
        fs: Box<dyn FileSystem>,
        console: Box<dyn ConsoleIo>,
        trampoline: Box<dyn Trampoline>,
    ) -> Box<Kernel> {
        let entry = crate::syscall::syscall_entry as *const () as usize;
        let dispatch = u32::try_from(entry).unwrap_or(0);
        if dispatch == 0 {
            log::warn!("dispatch entry is not addressable from 32-bit guests");
        }
        let mut kernel = Box::new(Kernel {
            config,
            memory,
            fs,
            console,
            trampoline,
            state: KernelState::new(),
            table: SyscallTable::new(dispatch, 0),
        });
        kernel.table.context = &*kernel as *const Kernel as u64;
        kernel
    }

    /// The table handed to every guest entry point.
    pub fn table(&self) -> &SyscallTable {
        &self.table
    }

    /// Guest address of the syscall table.
    pub fn table_address(&self) -> u64 {
        &self.table as *const SyscallTable as u64
    }

    /// Layout and limits in use.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Guest memory.
    pub fn memory(&self) -> &dyn GuestMemory {
        &*self.memory
    }

    /// The mounted filesystem.
    pub fn filesystem(&self) -> &dyn FileSystem {
        &*self.fs
    }

    /// The console collaborator.
    pub fn console(&self) -> &dyn ConsoleIo {
        &*self.console
    }

    /// Lifecycle of the innermost invocation.
    pub fn run_state(&self) -> RunState {
        *self.state.run_state.lock()
    }

    /// Copy of the current argument table.
    pub fn args(&self) -> ArgTable {
        self.state.args.lock().clone()
    }

    /// The open file of the running program, if any.
    pub fn open_file(&self) -> Option<OpenFile> {
        *self.state.open_file.lock()
    }

    /// Number of programs currently running.
    pub fn depth(&self) -> usize {
        self.trampoline.depth()
    }
}
