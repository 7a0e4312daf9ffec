// src/log/tests/mod.rs

use core::sync::atomic::{AtomicUsize, Ordering};

use super::buffer::MAX_LOG_ENTRIES;
use super::entry::LogEntry;
use super::level::LogLevel;
use super::log_core::LogCore;

// ========== 测试辅助宏 ==========

/// 测试专用日志宏
///
/// 模拟生产宏的行为，但操作独立的 LogCore 实例
macro_rules! test_log {
    ($logger:expr, $level:expr, $($arg:tt)*) => {
        $logger._log($level, format_args!($($arg)*))
    };
}

mod filter;
