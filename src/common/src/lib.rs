//! Shared definitions between the Lodestar kernel and guest programs.
//!
//! Everything in this crate is part of the guest ABI: service numbers, the
//! syscall table layout, directory records and result codes.

#![no_std]

pub mod error;
pub mod fs;
pub mod limits;
pub mod syscall;

pub use error::ExecError;
pub use fs::{DirInfo, FileAttributes};
pub use syscall::{Syscall, SyscallTable};
