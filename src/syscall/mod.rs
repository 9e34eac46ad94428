//! Syscall table and dispatcher entry point.
//!
//! The low-level interrupt glue passes `(syscall_nr, arg0..arg3)` into
//! [`dispatch`]. Numbers and result encoding live here, kernel dispatch
//! logic in `dispatch`.

mod dispatch;

pub use dispatch::{
    dispatch, dispatch_checked, set_syscall_trace_enabled, syscall_name_for_number,
};

/// Stable syscall numbers exposed to user mode.
pub struct SyscallId;

impl SyscallId {
    /// Current system time in seconds.
    pub const GETTIME: u64 = 0;
    /// Copy the calling task's name into a caller buffer.
    pub const GET_TASK_NAME: u64 = 1;
    /// Print a NUL-terminated string through the kernel log.
    pub const PRINT: u64 = 2;
    /// Sleep the calling task for a number of seconds.
    pub const SLEEP: u64 = 3;
    /// Terminate the calling task.
    pub const EXIT: u64 = 4;
}

/// Unknown syscall number.
pub const SYSCALL_ERR_UNSUPPORTED: u64 = u64::MAX;

/// Invalid argument combination for a known syscall.
pub const SYSCALL_ERR_INVALID_ARG: u64 = u64::MAX - 1;

/// Successful syscall return code for void-like operations.
pub const SYSCALL_OK: u64 = 0;

/// Kernel-internal syscall error space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// Unknown syscall number.
    Unsupported,
    /// Invalid syscall arguments.
    InvalidArg,
}

pub type SyscallResult<T> = Result<T, SyscallError>;

/// Encodes a typed result into the raw ABI value returned to caller context.
pub fn syscall_result_to_raw(result: SyscallResult<u64>) -> u64 {
    match result {
        Ok(value) => value,
        Err(SyscallError::Unsupported) => SYSCALL_ERR_UNSUPPORTED,
        Err(SyscallError::InvalidArg) => SYSCALL_ERR_INVALID_ARG,
    }
}
