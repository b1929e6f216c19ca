//! Fixed limits shared by the kernel and guest programs.

/// Maximum number of arguments after the program name.
pub const MAX_ARGS: usize = 16;

/// Maximum length of one argument including its terminating NUL.
pub const MAX_ARG_LEN: usize = 64;

/// Length of an 8.3 name rendered as `NAME.EXT` plus its terminating NUL.
pub const NAME_LEN: usize = 13;

/// Index passed to `GET_ARGS` to request the argument count.
pub const ARG_COUNT_QUERY: u32 = u32::MAX;

/// Longest command line `EXEC` accepts, terminator included: the program
/// name and every argument at full length, each followed by one separator.
pub const MAX_CMDLINE_LEN: usize = (MAX_ARGS + 1) * MAX_ARG_LEN;
