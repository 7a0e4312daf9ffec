//! 锁无关的日志存储环形缓冲区
//!
//! 该模块实现了多生产者单消费者 (MPSC) 环形缓冲区，使用原子操作进行同步。

use core::cell::UnsafeCell;
use core::ops::Deref;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::config::GLOBAL_LOG_BUFFER_SIZE;
use super::entry::LogEntry;

/// 单个日志条目的大小（以字节为单位）
const LOG_ENTRY_SIZE: usize = core::mem::size_of::<LogEntry>();

/// 缓冲区中可存储的最大日志条目数
pub(crate) const MAX_LOG_ENTRIES: usize = GLOBAL_LOG_BUFFER_SIZE / LOG_ENTRY_SIZE;

/// 缓存行填充封装器，用于防止伪共享
#[repr(C, align(64))]
struct CachePadded64<T> {
    inner: T,
}

impl<T> Deref for CachePadded64<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// 存储日志条目的锁无关环形缓冲区
///
/// 采用多生产者单消费者 (MPSC) 设计，其中：
/// - 多个线程可以并发地写入日志而无需阻塞
/// - 单个消费者按顺序读取日志
#[repr(C)]
pub(super) struct GlobalLogBuffer {
    /// 写入操作的单调递增序列号
    write_seq: CachePadded64<AtomicUsize>,
    /// 读取操作的单调递增序列号
    read_seq: CachePadded64<AtomicUsize>,
    /// 由于缓冲区溢出而丢弃的日志计数
    dropped: AtomicUsize,
    /// 固定大小的日志条目数组
    buffer: [UnsafeCell<LogEntry>; MAX_LOG_ENTRIES],
}

// 槽位只通过 seq 的 Release/Acquire 协议发布和读取
unsafe impl Sync for GlobalLogBuffer {}

impl GlobalLogBuffer {
    /// 在编译时创建一个新的日志缓冲区
    pub(super) const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const EMPTY: UnsafeCell<LogEntry> = UnsafeCell::new(LogEntry::empty());
        Self {
            write_seq: CachePadded64 {
                inner: AtomicUsize::new(1),
            },
            read_seq: CachePadded64 {
                inner: AtomicUsize::new(1),
            },
            dropped: AtomicUsize::new(0),
            buffer: [EMPTY; MAX_LOG_ENTRIES],
        }
    }

    /// 将日志条目写入缓冲区
    ///
    /// 1. 原子地获取一个唯一的序列号（票据）
    /// 2. 使用模运算计算目标槽位索引
    /// 3. 处理缓冲区满（覆盖）
    /// 4. 将日志数据复制到槽位（*不包括* seq 字段）
    /// 5. 以 Release 语义设置 seq 来发布条目
    pub(super) fn write(&self, entry: &LogEntry) {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let slot = self.buffer[seq % MAX_LOG_ENTRIES].get();

        self.handle_overwrite(seq);

        unsafe {
            entry.copy_data_to(slot);
            LogEntry::publish(slot, seq);
        }
    }

    /// 缓冲区满时推进读取指针，并把被覆盖的条目计入丢弃数
    fn handle_overwrite(&self, current_seq: usize) {
        let read_seq = self.read_seq.load(Ordering::Acquire);
        if current_seq < read_seq + MAX_LOG_ENTRIES {
            return;
        }
        let new_read_seq = current_seq - MAX_LOG_ENTRIES + 1;
        let overwritten = new_read_seq.saturating_sub(read_seq);
        self.dropped.fetch_add(overwritten, Ordering::Relaxed);

        // CAS 循环以推进 read_seq
        let mut current_read_seq = read_seq;
        while current_read_seq < new_read_seq {
            match self.read_seq.compare_exchange_weak(
                current_read_seq,
                new_read_seq,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen_seq) => {
                    if seen_seq >= new_read_seq {
                        break;
                    }
                    current_read_seq = seen_seq;
                }
            }
        }
    }

    /// 从缓冲区读取下一个日志条目，没有可用条目时返回 `None`
    pub(super) fn read(&self) -> Option<LogEntry> {
        let read_seq = self.read_seq.load(Ordering::Acquire);
        let slot = self.buffer[read_seq % MAX_LOG_ENTRIES].get();

        if !unsafe { LogEntry::is_ready(slot, read_seq) } {
            return None;
        }

        let entry = unsafe { (*slot).clone() };
        self.read_seq.store(read_seq + 1, Ordering::Release);
        Some(entry)
    }

    /// 返回缓冲区中未读日志条目的数量
    pub(super) fn len(&self) -> usize {
        let write = self.write_seq.load(Ordering::Relaxed);
        let read = self.read_seq.load(Ordering::Relaxed);
        write.saturating_sub(read)
    }

    /// 返回由于缓冲区溢出而丢弃的日志总数
    pub(super) fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
