//! Kernel-style logging
//!
//! Messages are formatted into fixed-size entries and stored in a lock-free
//! ring buffer. Entries at or above the console level are additionally
//! handed to a console sink, if the embedder registered one with
//! [`set_console_sink`].

#[macro_use]
mod macros;

pub mod config;
pub mod level;

mod buffer;
mod context;
mod entry;
mod log_core;

#[cfg(test)]
mod tests;

pub use entry::LogEntry;
pub use level::LogLevel;
pub use log_core::{ConsoleSink, LogCore};

static GLOBAL_LOG: LogCore = LogCore::default();

/// Registers the console sink. Only the first registration takes effect;
/// returns `false` if a sink was already installed.
pub fn set_console_sink(sink: ConsoleSink) -> bool {
    GLOBAL_LOG.set_console_sink(sink)
}

/// Checks if a log level is enabled for recording in the global log
#[inline(always)]
#[doc(hidden)]
pub fn is_level_enabled(level: LogLevel) -> bool {
    GLOBAL_LOG.is_level_enabled(level)
}

/// Entry point of the `pr_*` macros
#[doc(hidden)]
pub fn log_impl(level: LogLevel, args: core::fmt::Arguments) {
    GLOBAL_LOG._log(level, args);
}

/// Sets the global log level threshold
pub fn set_global_level(level: LogLevel) {
    GLOBAL_LOG._set_global_level(level);
}

/// Gets the current global log level
pub fn get_global_level() -> LogLevel {
    GLOBAL_LOG._get_global_level()
}

/// Sets the console output level threshold
pub fn set_console_level(level: LogLevel) {
    GLOBAL_LOG._set_console_level(level);
}

/// Gets the current console output level
pub fn get_console_level() -> LogLevel {
    GLOBAL_LOG._get_console_level()
}

/// Reads the next entry from the global log, `None` when it is drained
pub fn read_log() -> Option<LogEntry> {
    GLOBAL_LOG._read_log()
}

/// Returns the number of unread entries in the global log
pub fn log_len() -> usize {
    GLOBAL_LOG._log_len()
}

/// Returns the number of global log entries lost to overflow
pub fn log_dropped_count() -> usize {
    GLOBAL_LOG._log_dropped_count()
}
