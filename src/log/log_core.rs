//! 日志核心
//!
//! `LogCore` 持有环形缓冲区、两级过滤阈值和控制台输出钩子。全局实例是一个
//! `static`，测试中可以单独创建实例，互不干扰。

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use alloc::boxed::Box;
use once_cell::race::OnceBox;

use super::buffer::GlobalLogBuffer;
use super::config::{DEFAULT_CONSOLE_LEVEL, DEFAULT_LOG_LEVEL};
use super::context;
use super::entry::LogEntry;
use super::level::LogLevel;

/// 控制台输出钩子，接收达到控制台级别的条目
pub type ConsoleSink = fn(&LogEntry);

/// 日志核心
///
/// 所有状态都是原子量或无锁结构，可以在任意执行流中并发调用。
pub struct LogCore {
    buffer: GlobalLogBuffer,
    /// 低于（数值大于）该级别的日志不进入缓冲区
    global_level: AtomicU8,
    /// 达到该级别的日志还会立即交给 `sink`
    console_level: AtomicU8,
    sink: OnceBox<ConsoleSink>,
}

impl LogCore {
    /// 使用默认阈值（缓冲 Info，输出 Warning）创建，可用于初始化 `static`
    #[allow(clippy::should_implement_trait)]
    pub const fn default() -> Self {
        Self {
            buffer: GlobalLogBuffer::new(),
            global_level: AtomicU8::new(DEFAULT_LOG_LEVEL as u8),
            console_level: AtomicU8::new(DEFAULT_CONSOLE_LEVEL as u8),
            sink: OnceBox::new(),
        }
    }

    /// 使用指定阈值创建，测试中用来构造独立实例
    pub fn new(global_level: LogLevel, console_level: LogLevel) -> Self {
        Self {
            buffer: GlobalLogBuffer::new(),
            global_level: AtomicU8::new(global_level as u8),
            console_level: AtomicU8::new(console_level as u8),
            sink: OnceBox::new(),
        }
    }

    /// 安装控制台钩子，只有第一次安装生效；已有钩子时返回 `false`
    pub fn set_console_sink(&self, sink: ConsoleSink) -> bool {
        self.sink.set(Box::new(sink)).is_ok()
    }

    /// 记录一条日志：过滤、盖戳、写入缓冲区，必要时输出到控制台
    pub fn _log(&self, level: LogLevel, args: fmt::Arguments) {
        if !self.is_level_enabled(level) {
            return;
        }
        let entry = LogEntry::from_args(level, context::next_stamp(), args);
        self.buffer.write(&entry);
        if level as u8 <= self.console_level.load(Ordering::Acquire) {
            if let Some(sink) = self.sink.get() {
                sink(&entry);
            }
        }
    }

    /// 取出最旧的一条日志；只允许一个读者
    pub fn _read_log(&self) -> Option<LogEntry> {
        self.buffer.read()
    }

    /// 未读条目数
    pub fn _log_len(&self) -> usize {
        self.buffer.len()
    }

    /// 因缓冲区满而被覆盖的条目数
    pub fn _log_dropped_count(&self) -> usize {
        self.buffer.dropped_count()
    }

    /// 设置缓冲阈值
    pub fn _set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Release);
    }

    /// 当前缓冲阈值
    pub fn _get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Acquire))
    }

    /// 设置控制台输出阈值
    pub fn _set_console_level(&self, level: LogLevel) {
        self.console_level.store(level as u8, Ordering::Release);
    }

    /// 当前控制台输出阈值
    pub fn _get_console_level(&self) -> LogLevel {
        LogLevel::from_u8(self.console_level.load(Ordering::Acquire))
    }

    /// `level` 的日志是否会进入缓冲区
    #[inline(always)]
    pub fn is_level_enabled(&self, level: LogLevel) -> bool {
        level as u8 <= self.global_level.load(Ordering::Acquire)
    }
}
