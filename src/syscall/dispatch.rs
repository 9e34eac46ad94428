//! Kernel-side syscall dispatcher.
//!
//! Responsibilities of this module:
//! - decode syscall number + arguments,
//! - route to the corresponding kernel implementation,
//! - enforce minimal argument validation at syscall boundaries,
//! - return stable numeric result/error codes to caller context.

use core::slice;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::clock;
use crate::logging::{self, Severity};
use crate::scheduler;

use super::{
    syscall_result_to_raw, SyscallError, SyscallId, SyscallResult, SYSCALL_OK,
};

/// Maximum number of bytes a single Print syscall will scan for the string
/// terminator. Bounds syscall execution time so one call cannot monopolize
/// the CPU.
const MAX_PRINT_LEN: usize = 4096;

/// Global switch for per-syscall trace logging (`[SYSCALL] ...` lines).
static SYSCALL_TRACE_ENABLED: AtomicBool = AtomicBool::new(true);

/// Enable/disable syscall trace logging.
pub fn set_syscall_trace_enabled(enabled: bool) {
    SYSCALL_TRACE_ENABLED.store(enabled, Ordering::Relaxed);
}

fn syscall_trace_enabled() -> bool {
    SYSCALL_TRACE_ENABLED.load(Ordering::Relaxed)
}

/// Returns the stable human-readable syscall name for a raw syscall number,
/// so serial traces remain understandable without a lookup table.
pub const fn syscall_name_for_number(syscall_nr: u64) -> &'static str {
    match syscall_nr {
        SyscallId::GETTIME => "GetTime",
        SyscallId::GET_TASK_NAME => "GetTaskName",
        SyscallId::PRINT => "Print",
        SyscallId::SLEEP => "Sleep",
        SyscallId::EXIT => "Exit",
        _ => "Unknown",
    }
}

/// Resolves the syscall number and dispatches to the kernel handler,
/// returning kernel-internal typed results. Raw ABI conversion happens at
/// the syscall boundary in [`dispatch`].
pub fn dispatch_checked(
    syscall_nr: u64,
    arg0: u64,
    arg1: u64,
    _arg2: u64,
    _arg3: u64,
) -> SyscallResult<u64> {
    let result = match syscall_nr {
        SyscallId::GETTIME => syscall_gettime_impl(),
        SyscallId::GET_TASK_NAME => syscall_get_task_name_impl(arg0 as *mut u8, arg1 as usize),
        SyscallId::PRINT => syscall_print_impl(arg0 as *const u8),
        SyscallId::SLEEP => syscall_sleep_impl(arg0 as u32),
        SyscallId::EXIT => syscall_exit_impl(),
        _ => {
            logging::logln(
                "syscall",
                Severity::Error,
                format_args!("system call number {} not recognized", syscall_nr),
            );
            Err(SyscallError::Unsupported)
        }
    };

    if syscall_trace_enabled() {
        logging::logln(
            "syscall",
            Severity::Debug,
            format_args!(
                "[SYSCALL] nr={} name={} arg0={:#x} arg1={:#x} ret={:#x}",
                syscall_nr,
                syscall_name_for_number(syscall_nr),
                arg0,
                arg1,
                syscall_result_to_raw(result)
            ),
        );
    }

    result
}

/// ABI-compatible raw dispatcher (`Result` encoded to sentinel values).
pub fn dispatch(syscall_nr: u64, arg0: u64, arg1: u64, arg2: u64, arg3: u64) -> u64 {
    syscall_result_to_raw(dispatch_checked(syscall_nr, arg0, arg1, arg2, arg3))
}

/// Implements `GetTime`: seconds derived from the coarse tick counter.
fn syscall_gettime_impl() -> SyscallResult<u64> {
    Ok((clock::ticks() / clock::TICKS_HZ) as u64)
}

/// Implements `GetTaskName(buf, len)`.
///
/// Copies the calling task's name into `buf`, NUL-terminated and truncated
/// to `len - 1` bytes. Returns the number of name bytes copied.
fn syscall_get_task_name_impl(buf: *mut u8, len: usize) -> SyscallResult<u64> {
    if buf.is_null() || len == 0 {
        return Err(SyscallError::InvalidArg);
    }

    let name = scheduler::task_name(scheduler::current_task())
        .unwrap_or_default();
    let copy_len = name.len().min(len - 1);

    // SAFETY:
    // - The caller contract requires `buf` to be valid for `len` writes.
    // - `copy_len + 1 <= len`, so both the copy and the terminator stay in
    //   bounds.
    unsafe {
        core::ptr::copy_nonoverlapping(name.as_ptr(), buf, copy_len);
        buf.add(copy_len).write(0);
    }

    Ok(copy_len as u64)
}

/// Implements `Print(ptr)`: logs a NUL-terminated string at notice level.
///
/// The scan for the terminator is bounded by `MAX_PRINT_LEN`; a string
/// without a terminator in that window is rejected, as is non-UTF-8 text.
fn syscall_print_impl(ptr: *const u8) -> SyscallResult<u64> {
    if ptr.is_null() {
        return Err(SyscallError::InvalidArg);
    }

    let mut len = 0;
    // SAFETY:
    // - The caller contract requires `ptr` to reference a readable,
    //   NUL-terminated string; the scan never reads past `MAX_PRINT_LEN`.
    while len < MAX_PRINT_LEN && unsafe { ptr.add(len).read() } != 0 {
        len += 1;
    }
    if len == MAX_PRINT_LEN {
        return Err(SyscallError::InvalidArg);
    }

    // SAFETY:
    // - The bytes `ptr..ptr+len` were just read while scanning for the
    //   terminator.
    let bytes = unsafe { slice::from_raw_parts(ptr, len) };
    let Ok(text) = core::str::from_utf8(bytes) else {
        return Err(SyscallError::InvalidArg);
    };

    logging::logln("user", Severity::Notice, format_args!("{}", text));
    Ok(len as u64)
}

/// Implements `Sleep(seconds)` through the scheduler sleep path.
fn syscall_sleep_impl(seconds: u32) -> SyscallResult<u64> {
    scheduler::sleep(seconds);
    Ok(SYSCALL_OK)
}

/// Implements `Exit`.
///
/// Marks the calling task [`Terminated`](scheduler::TaskState::Terminated)
/// and returns; the interrupt glue that invoked the dispatcher drives the
/// actual reschedule with the original trap frame, and a later selection
/// pass reaps the task once execution has moved off its stack.
fn syscall_exit_impl() -> SyscallResult<u64> {
    scheduler::mark_current_terminated();
    Ok(SYSCALL_OK)
}
