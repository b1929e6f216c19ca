//! Program execution: loading, running and nesting guest programs.
//!
//! Every program is linked for the same fixed load window. Before a program
//! starts, the window is copied aside together with the caller's argument
//! table and open file; when the program ends, on every path, all three are
//! put back. A program can therefore run another one and continue as if
//! nothing had happened. Nesting depth is limited only by heap space.

pub mod args;
pub mod elf;
pub mod snapshot;
pub mod trampoline;

use self::args::ArgTable;
use self::elf::ElfError;
use self::snapshot::{Snapshot, SnapshotError};
use crate::fs::{FsError, OpenFile};
use crate::runtime::Kernel;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use lodestar_common::ExecError;

/// Lifecycle of one program invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has run yet.
    Idle,
    /// Validating and copying segments.
    Loading,
    /// Guest code is executing.
    Running,
    /// The program ended with this code.
    Exited(i32),
    /// The image could not be loaded.
    Failed(ElfError),
}

impl Kernel {
    fn set_run_state(&self, next: RunState) {
        let mut state = self.state.run_state.lock();
        log::debug!("run state: {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Runs the program named by the first word of `line` to completion.
    ///
    /// Returns the program's exit code. The load window, the argument table
    /// and the open file are the same afterwards as before, whatever the
    /// outcome.
    pub fn exec(&self, line: &str) -> Result<i32, ExecError> {
        let args = ArgTable::parse(line);
        let mut file = self.resolve(args.program())?;
        let image = self.read_image(&mut file);
        self.fs.close(&mut file);
        let image = image?;

        if !elf::has_elf_magic(&image) {
            return Err(ExecError::NotElf);
        }

        self.save_caller(args)?;
        let outcome = self.run_image(&image);
        self.restore_caller();

        let result = match outcome {
            Ok(code) => {
                self.set_run_state(RunState::Exited(code));
                Ok(code)
            }
            Err(e) => {
                log::warn!("exec {}: {}", line.trim(), e);
                self.set_run_state(RunState::Failed(e));
                Err(ExecError::RunFailed)
            }
        };
        if self.depth() > 0 {
            // back in the program that called EXEC
            self.set_run_state(RunState::Running);
        }
        result
    }

    /// Opens the program file, trying `NAME.ELF` when `NAME` has no extension.
    fn resolve(&self, program: &str) -> Result<OpenFile, ExecError> {
        if program.is_empty() {
            return Err(ExecError::NotFound);
        }
        let name = program.to_ascii_uppercase();
        let mut result = self.fs.open(&name);
        if result == Err(FsError::NotFound) && !name.contains('.') {
            let with_ext: String = format!("{}.ELF", name);
            result = self.fs.open(&with_ext);
        }
        result.map_err(|e| match e {
            FsError::NotFound => ExecError::NotFound,
            other => {
                log::warn!("exec {}: {}", name, other);
                ExecError::ReadFailed
            }
        })
    }

    fn read_image(&self, file: &mut OpenFile) -> Result<Vec<u8>, ExecError> {
        let size = file.size as usize;
        if size > self.config.max_image_size {
            return Err(ExecError::TooLarge);
        }
        let mut image = alloc::vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            match self.fs.read(file, &mut image[filled..]) {
                Ok(0) => return Err(ExecError::ReadFailed),
                Ok(n) => filled += n,
                Err(e) => {
                    log::warn!("exec read: {}", e);
                    return Err(ExecError::ReadFailed);
                }
            }
        }
        Ok(image)
    }

    /// Pushes a snapshot of the caller and installs `args` for the callee.
    fn save_caller(&self, args: ArgTable) -> Result<(), ExecError> {
        let oom = |e: SnapshotError| {
            log::warn!("exec snapshot: {:?}", e);
            match e {
                SnapshotError::OutOfMemory => ExecError::OutOfMemory,
                SnapshotError::Memory(_) => ExecError::RunFailed,
            }
        };
        let mut snapshot = Snapshot::capture(
            &*self.memory,
            self.config.load_base,
            self.config.load_size as usize,
        )
        .map_err(oom)?;

        let mut stack = self.state.snapshots.lock();
        stack.reserve().map_err(oom)?;
        let mut current = self.state.args.lock();
        snapshot.args = core::mem::replace(&mut *current, args);
        snapshot.open_file = self.state.open_file.lock().take();
        stack.push(snapshot);
        log::debug!("exec: snapshot depth {}", stack.depth());
        Ok(())
    }

    /// Pops the innermost snapshot and puts the caller back in place.
    fn restore_caller(&self) {
        let Some(snapshot) = self.state.snapshots.lock().pop() else {
            log::error!("exec: snapshot stack empty on restore");
            return;
        };
        if let Err(e) = snapshot.restore(&*self.memory) {
            log::error!("exec: restoring load window failed: {}", e);
        }
        if let Some(mut leaked) = self.state.open_file.lock().take() {
            self.fs.close(&mut leaked);
        }
        *self.state.open_file.lock() = snapshot.open_file;
        *self.state.args.lock() = snapshot.args;
    }

    /// Validates, loads and enters `image`.
    fn run_image(&self, image: &[u8]) -> Result<i32, ElfError> {
        self.set_run_state(RunState::Loading);
        let parsed = elf::validate(image)?;

        let window = u64::from(self.config.load_base)..self.config.load_end();
        for (index, seg) in parsed.segments.iter().enumerate() {
            let end = u64::from(seg.vaddr) + u64::from(seg.mem_size);
            if !window.contains(&u64::from(seg.vaddr)) || end > window.end {
                return Err(ElfError::SegmentOutOfBounds(index));
            }
        }

        let entry = elf::load(&parsed, image, &*self.memory)?;
        self.set_run_state(RunState::Running);
        log::debug!("exec: entering {:#x} at depth {}", entry, self.depth() + 1);

        let code = self.trampoline.enter(entry, self.table());
        if !self.trampoline.exited() {
            log::debug!("exec: program returned {} without EXIT", code);
        }
        Ok(code)
    }
}
