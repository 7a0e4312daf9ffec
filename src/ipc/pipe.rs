//! 管道模块
//!
//! 管道由 2 的幂个槽位组成的环形队列构成，每个槽位可以持有一个 [`PipeBuffer`]：
//! 一个页帧中的一段数据。消费者从 `curbuf` 开始读取，生产者在队尾追加。

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::{Mutex, MutexGuard};

use crate::config::{PAGE_SIZE, PIPE_DEF_BUFFERS};
use crate::error::UioError;
use crate::mm::{FRAME_ALLOCATOR, FrameAllocator, PageRef};

/// 管道中的一个页缓冲
#[derive(Debug, Clone)]
pub struct PipeBuffer {
    /// 缓冲所在的页
    pub page: PageRef,
    /// 数据在页内的起始偏移
    pub offset: usize,
    /// 有效数据长度
    pub len: usize,
    /// 后续写入能否追加到该缓冲的页中。
    /// 由管道自己分配的页可以合并，拼接进来的外部页不行。
    pub mergeable: bool,
}

/// 管道环形缓冲区
#[derive(Debug)]
pub(crate) struct PipeRing {
    bufs: Vec<Option<PipeBuffer>>,
    curbuf: usize,
    nrbufs: usize,
}

impl PipeRing {
    fn new(buffers: usize) -> Self {
        let mut bufs = Vec::with_capacity(buffers);
        bufs.resize_with(buffers, || None);
        PipeRing {
            bufs,
            curbuf: 0,
            nrbufs: 0,
        }
    }

    pub(crate) fn buffers(&self) -> usize {
        self.bufs.len()
    }

    pub(crate) fn mask(&self) -> usize {
        self.bufs.len() - 1
    }

    pub(crate) fn next_idx(&self, idx: usize) -> usize {
        (idx + 1) & self.mask()
    }

    pub(crate) fn prev_idx(&self, idx: usize) -> usize {
        idx.wrapping_sub(1) & self.mask()
    }

    /// 最旧的缓冲所在槽位，消费者从这里读取
    pub(crate) fn tail(&self) -> usize {
        self.curbuf
    }

    /// 下一个空闲槽位
    pub(crate) fn head(&self) -> usize {
        (self.curbuf + self.nrbufs) & self.mask()
    }

    pub(crate) fn nrbufs(&self) -> usize {
        self.nrbufs
    }

    pub(crate) fn free_slots(&self) -> usize {
        self.buffers() - self.nrbufs
    }

    pub(crate) fn is_full(&self) -> bool {
        self.nrbufs == self.buffers()
    }

    pub(crate) fn buf(&self, idx: usize) -> Option<&PipeBuffer> {
        self.bufs[idx & self.mask()].as_ref()
    }

    pub(crate) fn buf_mut(&mut self, idx: usize) -> Option<&mut PipeBuffer> {
        let mask = self.mask();
        self.bufs[idx & mask].as_mut()
    }

    /// 在队尾追加一个缓冲，返回其槽位；队列已满时返回 None
    pub(crate) fn push(&mut self, buf: PipeBuffer) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let idx = self.head();
        self.bufs[idx] = Some(buf);
        self.nrbufs += 1;
        Some(idx)
    }

    /// 释放队尾的缓冲
    pub(crate) fn pop_head(&mut self) -> Option<PipeBuffer> {
        if self.nrbufs == 0 {
            return None;
        }
        self.nrbufs -= 1;
        let idx = self.head();
        self.bufs[idx].take()
    }
}

/// 页缓冲管道
pub struct Pipe {
    ring: Mutex<PipeRing>,
    frames: Arc<FrameAllocator>,
}

impl Pipe {
    /// 创建一个有 [`PIPE_DEF_BUFFERS`] 个槽位的管道
    pub fn new() -> Self {
        Pipe {
            ring: Mutex::new(PipeRing::new(PIPE_DEF_BUFFERS)),
            frames: FRAME_ALLOCATOR.clone(),
        }
    }

    /// 槽位数必须是非零的 2 的幂
    pub fn with_capacity(buffers: usize, frames: Arc<FrameAllocator>) -> Result<Self, UioError> {
        if !buffers.is_power_of_two() {
            return Err(UioError::InvalidArgument);
        }
        Ok(Pipe {
            ring: Mutex::new(PipeRing::new(buffers)),
            frames,
        })
    }

    /// 环形队列的槽位数
    pub fn buffers(&self) -> usize {
        self.ring.lock().buffers()
    }

    /// 已占用的槽位数
    pub fn nr_bufs(&self) -> usize {
        self.ring.lock().nrbufs
    }

    /// 管道中尚未读取的字节数
    pub fn len(&self) -> usize {
        let ring = self.ring.lock();
        (0..ring.nrbufs)
            .filter_map(|i| ring.buf(ring.curbuf + i))
            .map(|b| b.len)
            .sum()
    }

    /// 是否没有任何缓冲
    pub fn is_empty(&self) -> bool {
        self.nr_bufs() == 0
    }

    /// 按消费顺序返回第 `n` 个已占用缓冲的快照
    pub fn buffer(&self, n: usize) -> Option<PipeBuffer> {
        let ring = self.ring.lock();
        if n >= ring.nrbufs {
            return None;
        }
        ring.buf(ring.curbuf + n).cloned()
    }

    /// 从管道中读取数据
    /// 返回值: 实际读取的字节数
    ///
    /// 读空的缓冲会被释放，其页帧引用随之归还。
    pub fn read(&self, dst: &mut [u8]) -> usize {
        let mut ring = self.ring.lock();
        let mut done = 0;
        while done < dst.len() && ring.nrbufs > 0 {
            let cur = ring.curbuf;
            let Some(buf) = ring.buf_mut(cur) else {
                break;
            };
            let n = buf.len.min(dst.len() - done);
            buf.page.read(buf.offset, &mut dst[done..done + n]);
            buf.offset += n;
            buf.len -= n;
            done += n;
            if buf.len == 0 {
                ring.bufs[cur] = None;
                ring.curbuf = ring.next_idx(cur);
                ring.nrbufs -= 1;
            }
        }
        done
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, PipeRing> {
        self.ring.lock()
    }

    pub(crate) fn alloc_page(&self) -> Option<PageRef> {
        self.frames.alloc_page()
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}
