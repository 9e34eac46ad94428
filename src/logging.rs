//! Central kernel logging with optional in-memory capture.
//!
//! Log lines carry a source target and a severity. Output is handed to a
//! replaceable sink (the platform's console or serial driver); an optional
//! capture buffer additionally records lines in memory so diagnostics and
//! tests can inspect them. Fatal conditions go through [`fatal!`], which
//! writes a [`Severity::Panic`] line and then panics.

use core::fmt::{self, Write as _};

use crate::sync::spinlock::SpinLock;

const CAPTURE_BUF_SIZE: usize = 16 * 1024;

/// Log severities, most severe first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Unrecoverable condition; the system will not continue.
    Panic,
    Error,
    Warning,
    Notice,
    Debug,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Panic => "panic",
            Severity::Error => "error",
            Severity::Warning => "warn",
            Severity::Notice => "notice",
            Severity::Debug => "debug",
        }
    }
}

/// Sink for log lines, invoked once per [`logln`] call with the raw pieces.
///
/// The sink formats and writes them itself through `core::fmt::Write` (the
/// way a serial or console driver already does); no owned line is built on
/// the way in, so the path works even when the allocator is what failed.
pub type LogSink = fn(target: &str, severity: Severity, args: fmt::Arguments<'_>);

struct LogState {
    sink: Option<LogSink>,
    capture_enabled: bool,
    capture_len: usize,
    capture_overflow: bool,
    capture_buf: [u8; CAPTURE_BUF_SIZE],
}

static LOGGER: SpinLock<LogState> = SpinLock::new(LogState {
    sink: None,
    capture_enabled: false,
    capture_len: 0,
    capture_overflow: false,
    capture_buf: [0; CAPTURE_BUF_SIZE],
});

struct BufferWriter<'a> {
    state: &'a mut LogState,
}

impl fmt::Write for BufferWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self
            .state
            .capture_buf
            .len()
            .saturating_sub(self.state.capture_len);
        let write_len = remaining.min(bytes.len());

        if write_len > 0 {
            let start = self.state.capture_len;
            let end = start + write_len;
            self.state.capture_buf[start..end].copy_from_slice(&bytes[..write_len]);
            self.state.capture_len = end;
        }

        if write_len < bytes.len() {
            self.state.capture_overflow = true;
        }
        Ok(())
    }
}

/// Central log entry point: one line per call, `target|severity|message`.
pub fn logln(target: &str, severity: Severity, args: fmt::Arguments<'_>) {
    let sink = {
        let mut state = LOGGER.lock();
        if state.capture_enabled {
            let mut writer = BufferWriter { state: &mut *state };
            let _ = writer.write_str(target);
            let _ = writer.write_char('|');
            let _ = writer.write_str(severity.as_str());
            let _ = writer.write_char('|');
            let _ = fmt::write(&mut writer, args);
            let _ = writer.write_char('\n');
        }
        state.sink
    };

    // The sink runs outside the logger lock so it may itself log or block.
    // It gets the pieces unformatted: building a line here would allocate,
    // and fatal reports must still get out when allocation is what failed.
    if let Some(sink) = sink {
        sink(target, severity, args);
    }
}

/// Installs the platform log sink. Pass `None` to drop output.
pub fn set_log_sink(sink: Option<LogSink>) {
    LOGGER.lock().sink = sink;
}

/// Enables or disables the capture buffer, resetting it either way.
pub fn set_capture_enabled(enabled: bool) {
    let mut state = LOGGER.lock();
    state.capture_enabled = enabled;
    state.capture_len = 0;
    state.capture_overflow = false;
}

/// Returns the captured log text and whether the buffer overflowed.
pub fn captured() -> (alloc::string::String, bool) {
    let state = LOGGER.lock();
    let text = core::str::from_utf8(&state.capture_buf[..state.capture_len])
        .unwrap_or("")
        .into();
    (text, state.capture_overflow)
}

/// Logs a [`Severity::Panic`] line for `target` and panics with the same
/// message. Used for every unrecoverable condition: capacity exhaustion,
/// invariant violations, and programmer misuse.
#[macro_export]
macro_rules! fatal {
    ($target:expr, $($arg:tt)*) => {{
        $crate::logging::logln(
            $target,
            $crate::logging::Severity::Panic,
            format_args!($($arg)*),
        );
        panic!($($arg)*);
    }};
}
