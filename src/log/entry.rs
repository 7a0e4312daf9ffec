use super::config::MAX_LOG_MESSAGE_LENGTH;
use super::level::LogLevel;
use core::cmp::min;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicUsize, Ordering};

/// One formatted log record, stored inline so that logging never allocates.
#[repr(C, align(8))]
#[derive(Debug)]
pub struct LogEntry {
    seq: AtomicUsize,
    level: LogLevel,
    stamp: usize,
    length: usize,
    message: [u8; MAX_LOG_MESSAGE_LENGTH],
}

impl LogEntry {
    /// An unused slot, never visible to readers.
    pub const fn empty() -> Self {
        Self {
            seq: AtomicUsize::new(0),
            level: LogLevel::Debug,
            stamp: 0,
            length: 0,
            message: [0; MAX_LOG_MESSAGE_LENGTH],
        }
    }

    /// Formats `args` into a new entry, truncating on a char boundary.
    pub fn from_args(level: LogLevel, stamp: usize, args: fmt::Arguments) -> Self {
        let mut entry = Self {
            seq: AtomicUsize::new(0),
            level,
            stamp,
            length: 0,
            message: [0; MAX_LOG_MESSAGE_LENGTH],
        };

        let mut writer = MessageWriter::new(&mut entry.message);
        let _ = fmt::write(&mut writer, args);
        entry.length = writer.len();

        entry
    }

    /// The formatted message text.
    pub fn message(&self) -> &str {
        // MessageWriter only ever cuts on a char boundary
        core::str::from_utf8(&self.message[..self.length]).unwrap_or("")
    }

    /// Priority the entry was logged at.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Monotonic stamp taken when the entry was created.
    pub fn stamp(&self) -> usize {
        self.stamp
    }
}

impl LogEntry {
    /// (内部使用) 复制数据到缓冲区槽位
    ///
    /// 不能用 ptr::write，它会覆盖 dest.seq，因此逐个字段复制 *除了* seq
    ///
    /// # Safety
    /// `dest` 必须指向缓冲区中的一个有效槽位
    pub(super) unsafe fn copy_data_to(&self, dest: *mut LogEntry) {
        unsafe {
            (*dest).level = self.level;
            (*dest).stamp = self.stamp;
            (*dest).length = self.length;
            (*dest).message = self.message;
        }
    }

    /// (内部使用) 设置序列号并“发布”
    ///
    /// Release 内存序保证上面的数据写入在 seq 更新之前对其他核心可见
    ///
    /// # Safety
    /// `dest` 必须指向缓冲区中的一个有效槽位
    pub(super) unsafe fn publish(dest: *const LogEntry, seq_num: usize) {
        unsafe { (*dest).seq.store(seq_num, Ordering::Release) };
    }

    /// (内部使用) 检查槽位是否已准备好，与 `publish` 的 Release 配对
    ///
    /// # Safety
    /// `slot` 必须指向缓冲区中的一个有效槽位
    pub(super) unsafe fn is_ready(slot: *const LogEntry, expected_seq: usize) -> bool {
        unsafe { (*slot).seq.load(Ordering::Acquire) == expected_seq }
    }
}

impl Clone for LogEntry {
    fn clone(&self) -> Self {
        Self {
            seq: AtomicUsize::new(self.seq.load(Ordering::Relaxed)),
            level: self.level,
            stamp: self.stamp,
            length: self.length,
            message: self.message,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:12}] {} {}", self.stamp, self.level.as_str(), self.message())
    }
}

/// a helper to write message from args to [u8; MAX_LOG_MESSAGE_LENGTH]
struct MessageWriter<'a> {
    buffer: &'a mut [u8],
    pos: usize,
}

impl<'a> MessageWriter<'a> {
    fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    fn len(&self) -> usize {
        self.pos
    }
}

impl Write for MessageWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = self.buffer.len() - self.pos;
        let mut to_copy = min(s.len(), remaining);
        while !s.is_char_boundary(to_copy) {
            to_copy -= 1;
        }
        self.buffer[self.pos..self.pos + to_copy].copy_from_slice(&s.as_bytes()[..to_copy]);
        self.pos += to_copy;
        Ok(())
    }
}
