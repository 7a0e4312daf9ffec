//! Pipe-backed iteration
//!
//! 管道迭代器从构造时的队尾 `start_idx` 开始向管道追加缓冲，位置 `(idx, iov_offset)`
//! 总是落在 `start_idx` 之后的缓冲之内：`iov_offset == 0` 当且仅当迭代器还位于起点。
//!
//! `start_idx` 之后有哪些缓冲每次都在锁内从环形队列读出，不在游标里缓存，
//! 因此 `dup` 出来的副本与原迭代器看到的是同一份队列。每次写入前都会先截断当前位置
//! 之后的全部缓冲（`truncate`），写入点于是总在当前缓冲的末尾或队尾。
//! 迭代器存活期间，消费者不应读取 `start_idx` 之后的缓冲。

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::iter::{Backing, IovIter};
use super::pages::PageExtent;
use super::segment::Chunk;
use crate::config::PAGE_SIZE;
use crate::error::UioError;
use crate::ipc::pipe::PipeRing;
use crate::ipc::{Pipe, PipeBuffer};
use crate::mm::{PageRef, PinnedPages};

#[derive(Clone)]
pub(super) struct PipeCursor<'a> {
    pub(super) pipe: &'a Pipe,
    pub(super) idx: usize,
    pub(super) start_idx: usize,
    /// 构造时管道已满，`start_idx` 之后不可能有本迭代器的缓冲
    full_at_start: bool,
    /// `dup` 出来的副本持有的页引用
    #[allow(dead_code)]
    held: Vec<PageRef>,
}

impl<'a> PipeCursor<'a> {
    pub(super) fn new(pipe: &'a Pipe, head: usize, full: bool) -> Self {
        PipeCursor {
            pipe,
            idx: head,
            start_idx: head,
            full_at_start: full,
            held: Vec::new(),
        }
    }

    pub(super) fn dup(&self) -> Self {
        let ring = self.pipe.lock();
        let held = (0..self.appended(&ring))
            .filter_map(|i| ring.buf(self.start_idx + i))
            .map(|buf| buf.page.clone())
            .collect();
        PipeCursor {
            pipe: self.pipe,
            idx: self.idx,
            start_idx: self.start_idx,
            full_at_start: self.full_at_start,
            held,
        }
    }

    /// `start_idx` 之后的缓冲数
    pub(super) fn appended(&self, ring: &PipeRing) -> usize {
        if self.full_at_start {
            return 0;
        }
        let before = self.start_idx.wrapping_sub(ring.tail()) & ring.mask();
        ring.nrbufs().saturating_sub(before)
    }

    /// 相对 `start_idx` 的槽位号
    fn rel(&self, ring: &PipeRing, idx: usize) -> usize {
        idx.wrapping_sub(self.start_idx) & ring.mask()
    }

    /// 截断时需要保留的缓冲数
    fn keep(&self, ring: &PipeRing, off: usize) -> usize {
        if off == 0 {
            0
        } else {
            self.rel(ring, self.idx) + 1
        }
    }

    /// 丢弃位置 `(idx, off)` 之后的数据，包括其他副本追加的缓冲
    fn truncate(&self, ring: &mut PipeRing, off: usize) {
        let keep = self.keep(ring, off);
        if off != 0 {
            if let Some(buf) = ring.buf_mut(self.idx) {
                buf.len = off - buf.offset;
            }
        }
        for _ in keep..self.appended(ring) {
            ring.pop_head();
        }
    }

    /// 新数据的写入起点：当前缓冲的页还能继续写时接着写，否则用下一个槽位
    fn data_start(&self, ring: &PipeRing, off: usize) -> (usize, usize) {
        if off == 0 {
            return (self.idx, 0);
        }
        match ring.buf(self.idx) {
            Some(buf) if buf.mergeable && off < PAGE_SIZE => (self.idx, off),
            _ => (ring.next_idx(self.idx), 0),
        }
    }

    /// 在当前位置之后准备 `size` 字节的空间
    ///
    /// 返回 `(实际准备的字节数, 起始槽位, 起始页内偏移)`；槽位用尽或页分配失败时会少于 `size`。
    fn push(&self, ring: &mut PipeRing, off: usize, size: usize) -> (usize, usize, usize) {
        self.truncate(ring, off);
        let (start, start_off) = self.data_start(ring, off);
        let mut left = size;
        if start_off != 0 {
            let n = left.min(PAGE_SIZE - start_off);
            if let Some(buf) = ring.buf_mut(start) {
                buf.len += n;
            }
            left -= n;
        }
        while left > 0 && !ring.is_full() {
            let Some(page) = self.pipe.alloc_page() else {
                pr_err!("uio: no page for pipe buffer, {} bytes short", left);
                break;
            };
            let n = left.min(PAGE_SIZE);
            ring.push(PipeBuffer {
                page,
                offset: 0,
                len: n,
                mergeable: true,
            });
            left -= n;
        }
        (size - left, start, start_off)
    }

    /// 当前位置之后已经追加、尚未越过的字节数
    fn pending(&self, ring: &PipeRing, off: usize) -> usize {
        let mut total = 0;
        let first = if off == 0 {
            0
        } else {
            total += ring
                .buf(self.idx)
                .map_or(0, |b| (b.offset + b.len).saturating_sub(off));
            self.rel(ring, self.idx) + 1
        };
        for rel in first..self.appended(ring) {
            total += ring.buf(self.start_idx + rel).map_or(0, |b| b.len);
        }
        total
    }

    /// 从起点到当前位置的字节数
    fn consumed(&self, ring: &PipeRing, off: usize) -> usize {
        if off == 0 {
            return 0;
        }
        let before: usize = (0..self.rel(ring, self.idx))
            .filter_map(|rel| ring.buf(self.start_idx + rel))
            .map(|b| b.len)
            .sum();
        before + ring.buf(self.idx).map_or(0, |b| off - b.offset)
    }

    /// 从 `(idx, off)` 向前走 `n` 字节，`0 < n <= pending`
    fn walk(&self, ring: &PipeRing, off: usize, n: usize) -> (usize, usize) {
        let mut idx = self.idx;
        let mut left = n;
        if off != 0 {
            let tail = ring
                .buf(idx)
                .map_or(0, |b| (b.offset + b.len).saturating_sub(off));
            if left <= tail {
                return (idx, off + left);
            }
            left -= tail;
            idx = ring.next_idx(idx);
        }
        for _ in 0..ring.buffers() {
            let Some(buf) = ring.buf(idx) else {
                break;
            };
            if left <= buf.len {
                return (idx, buf.offset + left);
            }
            left -= buf.len;
            idx = ring.next_idx(idx);
        }
        (self.idx, off)
    }
}

impl IovIter<'_> {
    /// 在管道中追加 `bytes` 字节并逐页交给 `step`
    pub(super) fn pipe_iterate<F>(&mut self, bytes: usize, mut step: F) -> usize
    where
        F: FnMut(Chunk<'_>, usize) -> usize,
    {
        let Backing::Pipe(cursor) = &mut self.backing else {
            return 0;
        };
        let pipe = cursor.pipe;
        let mut ring = pipe.lock();
        let (pushed, mut idx, mut off) = cursor.push(&mut ring, self.iov_offset, bytes);
        let mut done = 0;
        while done < pushed {
            let Some(buf) = ring.buf(idx) else {
                break;
            };
            let n = (pushed - done).min(PAGE_SIZE - off);
            let copied = step(
                Chunk::Page {
                    page: &buf.page,
                    offset: off,
                    len: n,
                },
                done,
            );
            done += copied;
            if copied > 0 {
                cursor.idx = idx;
                self.iov_offset = off + copied;
            }
            if copied < n {
                break;
            }
            idx = ring.next_idx(idx);
            off = 0;
        }
        self.count -= done;
        if done < pushed {
            cursor.truncate(&mut ring, self.iov_offset);
        }
        done
    }

    /// 越过已追加的数据；超出部分以零填充的缓冲补齐
    pub(super) fn pipe_advance(&mut self, bytes: usize) {
        let bytes = bytes.min(self.count);
        if bytes == 0 {
            return;
        }
        let Backing::Pipe(cursor) = &mut self.backing else {
            return;
        };
        let pipe = cursor.pipe;
        let mut ring = pipe.lock();
        let skip = bytes.min(cursor.pending(&ring, self.iov_offset));
        if skip > 0 {
            let (idx, off) = cursor.walk(&ring, self.iov_offset, skip);
            cursor.idx = idx;
            self.iov_offset = off;
            self.count -= skip;
        }
        cursor.truncate(&mut ring, self.iov_offset);
        drop(ring);
        if bytes > skip {
            self.pipe_iterate(bytes - skip, |chunk, _| chunk.zero());
        }
    }

    pub(super) fn pipe_revert(&mut self, unroll: usize) {
        let Backing::Pipe(cursor) = &mut self.backing else {
            return;
        };
        let pipe = cursor.pipe;
        let mut ring = pipe.lock();
        let unroll = unroll.min(cursor.consumed(&ring, self.iov_offset));
        if unroll == 0 {
            return;
        }
        self.count += unroll;
        let mut left = unroll;
        let mut idx = cursor.idx;
        let mut off = self.iov_offset;
        while off != 0 {
            let n = off - ring.buf(idx).map_or(0, |b| b.offset);
            if left < n {
                off -= left;
                break;
            }
            left -= n;
            if idx == cursor.start_idx {
                off = 0;
                break;
            }
            idx = ring.prev_idx(idx);
            off = ring.buf(idx).map_or(0, |b| b.offset + b.len);
            if left == 0 {
                break;
            }
        }
        cursor.idx = idx;
        self.iov_offset = off;
        cursor.truncate(&mut ring, off);
    }

    pub(super) fn pipe_alignment(&self) -> usize {
        let Backing::Pipe(cursor) = &self.backing else {
            return 0;
        };
        let ring = cursor.pipe.lock();
        let off = self.iov_offset;
        if off != 0 && ring.buf(cursor.idx).is_some_and(|b| b.mergeable) {
            self.count | off
        } else {
            self.count
        }
    }

    /// 还能写入的页数：空闲槽位、当前位置之后可复用的缓冲，以及可继续写的当前缓冲
    pub(super) fn pipe_npages(&self, maxpages: usize) -> usize {
        let Backing::Pipe(cursor) = &self.backing else {
            return 0;
        };
        let ring = cursor.pipe.lock();
        let off = self.iov_offset;
        let (_, start_off) = cursor.data_start(&ring, off);
        let reusable = cursor.appended(&ring).saturating_sub(cursor.keep(&ring, off));
        let npages = ring.free_slots() + reusable + usize::from(start_off != 0);
        npages.min(maxpages)
    }

    /// 把页的一段以引用的方式拼接进管道，不拷贝数据
    ///
    /// 与当前缓冲是同一页且首尾相接时直接合并。
    pub(super) fn pipe_splice_page(&mut self, page: &PageRef, offset: usize, bytes: usize) -> usize {
        let bytes = bytes.min(self.count);
        if bytes == 0 {
            return 0;
        }
        let Backing::Pipe(cursor) = &mut self.backing else {
            return 0;
        };
        let pipe = cursor.pipe;
        let mut ring = pipe.lock();
        let off = self.iov_offset;
        cursor.truncate(&mut ring, off);
        if off != 0 && off == offset {
            if let Some(buf) = ring.buf_mut(cursor.idx) {
                if Arc::ptr_eq(&buf.page, page) {
                    buf.len += bytes;
                    self.iov_offset += bytes;
                    self.count -= bytes;
                    return bytes;
                }
            }
        }
        let Some(idx) = ring.push(PipeBuffer {
            page: page.clone(),
            offset,
            len: bytes,
            mergeable: false,
        }) else {
            return 0;
        };
        cursor.idx = idx;
        self.iov_offset = offset + bytes;
        self.count -= bytes;
        bytes
    }

    /// 预留空间并返回其页，不移动迭代器
    pub(super) fn pipe_get_pages(
        &mut self,
        maxsize: usize,
        maxpages: Option<usize>,
    ) -> Result<PageExtent, UioError> {
        let Backing::Pipe(cursor) = &mut self.backing else {
            return Err(UioError::InvalidArgument);
        };
        let pipe = cursor.pipe;
        let mut ring = pipe.lock();
        let off = self.iov_offset;
        cursor.truncate(&mut ring, off);
        let (_, start_off) = cursor.data_start(&ring, off);
        let slots = ring.free_slots() + usize::from(start_off != 0);
        let slots = maxpages.map_or(slots, |max| slots.min(max));
        if slots == 0 {
            return Err(UioError::WouldBlock);
        }
        let size = maxsize.min(slots * PAGE_SIZE - start_off);
        let (pushed, first, first_off) = cursor.push(&mut ring, off, size);
        if pushed == 0 {
            return Err(UioError::NoMemory);
        }
        let npages = (first_off + pushed).div_ceil(PAGE_SIZE);
        let mut pages = PinnedPages::try_with_capacity(npages)?;
        let mut idx = first;
        for _ in 0..npages {
            let Some(buf) = ring.buf(idx) else {
                break;
            };
            pages.push(buf.page.clone());
            idx = ring.next_idx(idx);
        }
        Ok(PageExtent {
            pages,
            start: first_off,
            len: pushed,
        })
    }
}
