//! Leveled logging that never allocates.
//!
//! Messages are formatted into a fixed stack buffer and handed to stderr with
//! a single `write(2)`, so logging is safe while the heap lock is held. Lines
//! longer than the buffer are cut and end in `...`.

use crate::config;
use core::fmt;

const LOG_BUFFER_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Debug = 3,
    Trace = 4,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }
}

#[inline]
pub fn enabled(level: Level) -> bool {
    allows(config::log_level(), level)
}

/// Whether a `threshold` log level lets `level` messages through.
#[inline]
fn allows(threshold: u8, level: Level) -> bool {
    level as u8 <= threshold
}

#[cold]
pub fn log(level: Level, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    let mut buffer = [0u8; LOG_BUFFER_SIZE];
    let line = format_line(&mut buffer, level, args);
    unsafe {
        libc::write(2, line.as_ptr() as *const libc::c_void, line.len());
    }
}

/// Render `[tagmalloc LEVEL] message\n` into `buffer`.
fn format_line<'a>(buffer: &'a mut [u8], level: Level, args: fmt::Arguments<'_>) -> &'a [u8] {
    // One byte is kept back for the newline.
    let capacity = buffer.len() - 1;
    let mut writer = BufWriter {
        buffer: &mut buffer[..capacity],
        filled: 0,
        truncated: false,
    };
    let _ = fmt::write(&mut writer, format_args!("[tagmalloc {}] {}", level.label(), args));
    let (mut filled, truncated) = (writer.filled, writer.truncated);
    if truncated {
        buffer[capacity - 3..capacity].copy_from_slice(b"...");
        filled = capacity;
    }
    buffer[filled] = b'\n';
    &buffer[..filled + 1]
}

struct BufWriter<'a> {
    buffer: &'a mut [u8],
    filled: usize,
    truncated: bool,
}

impl fmt::Write for BufWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buffer.len() - self.filled;
        let amt = s.len().min(room);
        self.buffer[self.filled..self.filled + amt].copy_from_slice(&s.as_bytes()[..amt]);
        self.filled += amt;
        if amt < s.len() {
            self.truncated = true;
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Level::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Level::Debug, format_args!($($arg)*))
    };
}

/// Per-operation tracing. The level check happens before any formatting.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::Level::Trace) {
            $crate::log::log($crate::log::Level::Trace, format_args!($($arg)*))
        }
    };
}
