//! The I/O vector iterator
//!
//! 迭代器的位置由三部分组成：当前段下标、段内偏移 `iov_offset` 和剩余字节数 `count`。
//! 对数组类后备存储（iovec / kvec / bvec），每次移动后都会规整位置：
//! 当前段读完则移到下一段，剩余字节数非零时跳过长度为 0 的段。
//! 管道类后备存储的位置由 `PipeCursor` 维护，见 `pipe.rs`。

use core::fmt;

use super::pipe::PipeCursor;
use super::segment::{BioVec, Chunk, KVec};
use crate::config::PAGE_SIZE;
use crate::error::UioError;
use crate::ipc::Pipe;
use crate::mm::UserAccess;
use crate::uapi::IoVec;

/// 迭代器相对于后备存储的数据流向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 后备存储是数据的目的地（读系统调用），使用 `copy_to_iter`
    Dest,
    /// 后备存储是数据的来源（写系统调用），使用 `copy_from_iter`
    Source,
}

/// 后备存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterType {
    /// 用户地址空间中的 iovec 数组
    Iovec,
    /// 内核内存中的 kvec 数组
    Kvec,
    /// 页片段数组
    Bvec,
    /// 管道的页缓冲队列
    Pipe,
}

#[derive(Clone)]
pub(super) enum Backing<'a> {
    Iovec {
        iov: &'a [IoVec],
        idx: usize,
        mm: &'a dyn UserAccess,
    },
    Kvec {
        kvec: &'a [KVec<'a>],
        idx: usize,
    },
    Bvec {
        bvec: &'a [BioVec<'a>],
        idx: usize,
    },
    Pipe(PipeCursor<'a>),
}

/// I/O 向量迭代器
///
/// 迭代器只借用后备存储；段数组、页和管道都必须比迭代器活得更久。
/// 除 `dup` 以外，同一时刻只能有一个执行流操作同一个迭代器。
pub struct IovIter<'a> {
    pub(super) dir: Direction,
    pub(super) iov_offset: usize,
    pub(super) count: usize,
    pub(super) backing: Backing<'a>,
}

impl<'a> IovIter<'a> {
    /// 用户地址空间中的 iovec 数组，`count` 超过各段总长时被截到总长
    pub fn new_iovec(
        dir: Direction,
        mm: &'a dyn UserAccess,
        iov: &'a [IoVec],
        count: usize,
    ) -> Self {
        let total = iov
            .iter()
            .fold(0usize, |acc, v| acc.saturating_add(v.iov_len));
        Self::new_array(dir, Backing::Iovec { iov, idx: 0, mm }, count.min(total))
    }

    /// 内核内存中的 kvec 数组
    pub fn new_kvec(dir: Direction, kvec: &'a [KVec<'a>], count: usize) -> Self {
        let total = kvec.iter().fold(0usize, |acc, v| acc.saturating_add(v.len()));
        Self::new_array(dir, Backing::Kvec { kvec, idx: 0 }, count.min(total))
    }

    /// 页片段数组
    pub fn new_bvec(dir: Direction, bvec: &'a [BioVec<'a>], count: usize) -> Self {
        let total = bvec.iter().fold(0usize, |acc, v| acc.saturating_add(v.len));
        Self::new_array(dir, Backing::Bvec { bvec, idx: 0 }, count.min(total))
    }

    /// 管道，只能作为数据的目的地
    ///
    /// 数据从管道当前的队尾开始追加，`count` 被截到空闲槽位能容纳的字节数。
    pub fn new_pipe(dir: Direction, pipe: &'a Pipe, count: usize) -> Result<Self, UioError> {
        if dir != Direction::Dest {
            pr_warn!("uio: pipe iterator must be a destination");
            return Err(UioError::InvalidArgument);
        }
        let ring = pipe.lock();
        if ring.is_full() {
            pr_warn!("uio: pipe iterator over a full pipe");
        }
        let head = ring.head();
        let full = ring.is_full();
        let capacity = ring.free_slots() * PAGE_SIZE;
        drop(ring);
        Ok(IovIter {
            dir,
            iov_offset: 0,
            count: count.min(capacity),
            backing: Backing::Pipe(PipeCursor::new(pipe, head, full)),
        })
    }

    fn new_array(dir: Direction, backing: Backing<'a>, count: usize) -> Self {
        let mut iter = IovIter {
            dir,
            iov_offset: 0,
            count,
            backing,
        };
        iter.settle();
        iter
    }

    /// 后备存储类型
    pub fn iter_type(&self) -> IterType {
        match self.backing {
            Backing::Iovec { .. } => IterType::Iovec,
            Backing::Kvec { .. } => IterType::Kvec,
            Backing::Bvec { .. } => IterType::Bvec,
            Backing::Pipe(_) => IterType::Pipe,
        }
    }

    /// 构造时确定的数据流向
    pub fn direction(&self) -> Direction {
        self.dir
    }

    /// 是否是用户 iovec 迭代器
    pub fn is_iovec(&self) -> bool {
        matches!(self.backing, Backing::Iovec { .. })
    }

    /// 剩余字节数
    pub fn count(&self) -> usize {
        self.count
    }

    /// 当前段内偏移；管道类型为当前缓冲的页内偏移
    pub fn iov_offset(&self) -> usize {
        self.iov_offset
    }

    /// 当前段在段数组中的下标，管道类型返回 None
    pub fn seg_index(&self) -> Option<usize> {
        match self.backing {
            Backing::Pipe(_) => None,
            _ => Some(self.cur_idx()),
        }
    }

    /// 从当前段起剩余的段数；管道类型为起点之后已追加的缓冲数
    pub fn nr_segs(&self) -> usize {
        match &self.backing {
            Backing::Pipe(cursor) => cursor.appended(&cursor.pipe.lock()),
            _ => self.array_len().saturating_sub(self.cur_idx()),
        }
    }

    /// 管道类型的 `(当前缓冲槽位, 起始槽位)`
    pub fn pipe_indices(&self) -> Option<(usize, usize)> {
        match &self.backing {
            Backing::Pipe(cursor) => Some((cursor.idx, cursor.start_idx)),
            _ => None,
        }
    }

    /// 当前 iovec/kvec 段剩余的部分，受剩余字节数限制
    pub fn iovec(&self) -> Option<IoVec> {
        match self.backing {
            Backing::Iovec { .. } | Backing::Kvec { .. } => {}
            _ => return None,
        }
        let idx = self.cur_idx();
        if idx >= self.array_len() {
            return None;
        }
        let len = self.count.min(self.seg_len(idx) - self.iov_offset);
        Some(IoVec::new(self.seg_base(idx) + self.iov_offset, len))
    }

    /// 不移动迭代器，依次给出剩余的 iovec/kvec 段（已按剩余字节数截断，跳过空段）
    ///
    /// 其他类型不产生任何段。
    pub fn segments(&self) -> impl Iterator<Item = IoVec> + '_ {
        let addressable = matches!(self.backing, Backing::Iovec { .. } | Backing::Kvec { .. });
        self.segs()
            .take_while(move |_| addressable)
            .map(move |(idx, off, len)| IoVec::new(self.seg_base(idx) + off, len))
    }

    /// Advances the cursor by `bytes`, clamped to [`count`](Self::count).
    pub fn advance(&mut self, bytes: usize) {
        if matches!(self.backing, Backing::Pipe(_)) {
            self.pipe_advance(bytes);
            return;
        }
        self.iterate_and_advance(bytes, |chunk, _| chunk.len());
    }

    /// 回退 `unroll` 字节，最多回退到构造时的位置
    pub fn revert(&mut self, unroll: usize) {
        if unroll == 0 {
            return;
        }
        if matches!(self.backing, Backing::Pipe(_)) {
            self.pipe_revert(unroll);
            return;
        }
        let mut left = unroll;
        let mut idx = self.cur_idx();
        let mut off = self.iov_offset;
        if left <= off {
            off -= left;
            left = 0;
        } else {
            left -= off;
            off = 0;
            while idx > 0 {
                idx -= 1;
                let n = self.seg_len(idx);
                if left <= n {
                    off = n - left;
                    left = 0;
                    break;
                }
                left -= n;
            }
        }
        self.count += unroll - left;
        self.set_idx(idx);
        self.iov_offset = off;
        self.settle();
    }

    /// 把剩余字节数限制在 `count` 以内，不会增加剩余字节数
    pub fn truncate(&mut self, count: u64) {
        if self.count as u64 > count {
            self.count = count as usize;
        }
    }

    /// 恢复 `truncate` 之前的剩余字节数，调用者保证 `count` 就是截断前的值
    pub fn reexpand(&mut self, count: usize) {
        self.count = count;
    }

    /// 当前段中剩余的字节数
    pub fn single_seg_count(&self) -> usize {
        if matches!(self.backing, Backing::Pipe(_)) {
            return self.count;
        }
        let idx = self.cur_idx();
        if self.array_len().saturating_sub(idx) <= 1 {
            self.count
        } else {
            self.count.min(self.seg_len(idx) - self.iov_offset)
        }
    }

    /// 所有剩余段的起始地址（bvec 为页内偏移）与长度按位或的结果
    pub fn alignment(&self) -> usize {
        if self.count == 0 {
            return 0;
        }
        if matches!(self.backing, Backing::Pipe(_)) {
            return self.pipe_alignment();
        }
        self.segs()
            .fold(0, |res, (idx, off, len)| res | (self.seg_base(idx) + off) | len)
    }

    /// 段与段之间的"缝隙"对齐
    ///
    /// 除第一段外各段起始地址，以及不是最后一段时的剩余字节数，按位或的结果。
    /// 管道类型没有意义，返回 `usize::MAX`。
    pub fn gap_alignment(&self) -> usize {
        if matches!(self.backing, Backing::Pipe(_)) {
            pr_warn!("uio: gap_alignment on a pipe iterator");
            return usize::MAX;
        }
        let mut remaining = self.count;
        let mut res = 0;
        for (idx, off, len) in self.segs() {
            if res != 0 {
                res |= self.seg_base(idx) + off;
            }
            if remaining != len {
                res |= remaining;
            }
            remaining -= len;
        }
        res
    }

    /// 剩余数据覆盖的页数，不超过 `maxpages`
    pub fn npages(&self, maxpages: usize) -> usize {
        if self.count == 0 {
            return 0;
        }
        match self.backing {
            Backing::Pipe(_) => self.pipe_npages(maxpages),
            Backing::Bvec { .. } => self.segs().count().min(maxpages),
            _ => {
                let mut npages = 0;
                for (idx, off, len) in self.segs() {
                    let p = self.seg_base(idx) + off;
                    npages += (p + len).div_ceil(PAGE_SIZE) - p / PAGE_SIZE;
                    if npages >= maxpages {
                        return maxpages;
                    }
                }
                npages
            }
        }
    }

    /// 预先换入接下来 `bytes` 字节覆盖的用户页，不移动迭代器
    ///
    /// 非用户类型直接成功。
    pub fn fault_in_readable(&self, bytes: usize) -> Result<(), UioError> {
        let Backing::Iovec { mm, .. } = self.backing else {
            return Ok(());
        };
        let mut left = bytes.min(self.count);
        for (idx, off, len) in self.segs() {
            if left == 0 {
                break;
            }
            let len = len.min(left);
            mm.fault_in_readable(self.seg_base(idx) + off, len)?;
            left -= len;
        }
        Ok(())
    }

    /// 复制出一个可以独立移动的迭代器
    ///
    /// 管道类型会额外持有本迭代器已追加缓冲的页引用，直到副本被 drop。
    pub fn dup(&self) -> Self {
        let backing = match &self.backing {
            Backing::Pipe(cursor) => Backing::Pipe(cursor.dup()),
            other => other.clone(),
        };
        IovIter {
            dir: self.dir,
            iov_offset: self.iov_offset,
            count: self.count,
            backing,
        }
    }

    /// 按段遍历接下来 `bytes` 字节（不超过剩余字节数），并前移迭代器
    ///
    /// `step` 的参数为当前可访问区域和此前已处理的字节数，返回实际处理的字节数；
    /// 返回值小于区域长度时遍历提前结束（例如用户页无法访问）。
    pub(super) fn iterate_and_advance<F>(&mut self, bytes: usize, mut step: F) -> usize
    where
        F: FnMut(Chunk<'_>, usize) -> usize,
    {
        let bytes = bytes.min(self.count);
        if bytes == 0 {
            return 0;
        }
        if matches!(self.backing, Backing::Pipe(_)) {
            return self.pipe_iterate(bytes, step);
        }
        let nr = self.array_len();
        let mut idx = self.cur_idx();
        let mut off = self.iov_offset;
        let mut done = 0;
        while done < bytes && idx < nr {
            let seg_len = self.seg_len(idx);
            if off >= seg_len {
                idx += 1;
                off = 0;
                continue;
            }
            let want = (bytes - done).min(seg_len - off);
            let Some(chunk) = self.chunk(idx, off, want) else {
                break;
            };
            let n = step(chunk, done);
            done += n;
            off += n;
            if n < want {
                break;
            }
        }
        self.set_idx(idx);
        self.iov_offset = off;
        self.count -= done;
        self.settle();
        done
    }

    /// 当前段中从 `iov_offset` 开始、最长 `len` 字节的区域，不跨段
    pub(super) fn current_chunk(&self, len: usize) -> Option<Chunk<'a>> {
        let idx = self.cur_idx();
        if idx >= self.array_len() {
            return None;
        }
        let len = len.min(self.seg_len(idx) - self.iov_offset);
        self.chunk(idx, self.iov_offset, len)
    }

    /// 规整数组类迭代器的位置
    fn settle(&mut self) {
        if matches!(self.backing, Backing::Pipe(_)) {
            return;
        }
        let nr = self.array_len();
        let mut idx = self.cur_idx();
        if idx < nr && self.iov_offset > 0 && self.iov_offset >= self.seg_len(idx) {
            idx += 1;
            self.iov_offset = 0;
        }
        if self.count > 0 {
            while idx < nr && self.seg_len(idx) == 0 {
                idx += 1;
            }
        }
        self.set_idx(idx);
    }

    pub(super) fn segs(&self) -> Segs<'_, 'a> {
        Segs {
            iter: self,
            idx: self.cur_idx(),
            off: self.iov_offset,
            left: self.count,
        }
    }

    pub(super) fn array_len(&self) -> usize {
        match self.backing {
            Backing::Iovec { iov, .. } => iov.len(),
            Backing::Kvec { kvec, .. } => kvec.len(),
            Backing::Bvec { bvec, .. } => bvec.len(),
            Backing::Pipe(_) => 0,
        }
    }

    pub(super) fn seg_len(&self, idx: usize) -> usize {
        match self.backing {
            Backing::Iovec { iov, .. } => iov[idx].iov_len,
            Backing::Kvec { kvec, .. } => kvec[idx].len(),
            Backing::Bvec { bvec, .. } => bvec[idx].len,
            Backing::Pipe(_) => 0,
        }
    }

    /// 段起始地址；bvec 返回页内偏移
    pub(super) fn seg_base(&self, idx: usize) -> usize {
        match self.backing {
            Backing::Iovec { iov, .. } => iov[idx].iov_base,
            Backing::Kvec { kvec, .. } => kvec[idx].base(),
            Backing::Bvec { bvec, .. } => bvec[idx].offset,
            Backing::Pipe(_) => 0,
        }
    }

    pub(super) fn cur_idx(&self) -> usize {
        match &self.backing {
            Backing::Iovec { idx, .. } | Backing::Kvec { idx, .. } | Backing::Bvec { idx, .. } => {
                *idx
            }
            Backing::Pipe(cursor) => cursor.idx,
        }
    }

    fn set_idx(&mut self, new: usize) {
        match &mut self.backing {
            Backing::Iovec { idx, .. } | Backing::Kvec { idx, .. } | Backing::Bvec { idx, .. } => {
                *idx = new
            }
            Backing::Pipe(cursor) => cursor.idx = new,
        }
    }

    fn chunk(&self, idx: usize, off: usize, len: usize) -> Option<Chunk<'a>> {
        match self.backing {
            Backing::Iovec { iov, mm, .. } => Some(Chunk::User {
                mm,
                addr: iov[idx].iov_base + off,
                len,
            }),
            Backing::Kvec { kvec, .. } => {
                Some(Chunk::Kernel(&kvec[idx].as_cells()[off..off + len]))
            }
            Backing::Bvec { bvec, .. } => {
                let bv = bvec[idx];
                Some(Chunk::Page {
                    page: bv.page.as_ref(),
                    offset: bv.offset + off,
                    len,
                })
            }
            Backing::Pipe(_) => None,
        }
    }
}

impl Clone for IovIter<'_> {
    fn clone(&self) -> Self {
        self.dup()
    }
}

impl fmt::Debug for IovIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IovIter")
            .field("type", &self.iter_type())
            .field("dir", &self.dir)
            .field("count", &self.count)
            .field("idx", &self.cur_idx())
            .field("iov_offset", &self.iov_offset)
            .finish()
    }
}

/// 剩余段的 `(段下标, 段内偏移, 长度)`
pub(super) struct Segs<'s, 'a> {
    iter: &'s IovIter<'a>,
    idx: usize,
    off: usize,
    left: usize,
}

impl Iterator for Segs<'_, '_> {
    type Item = (usize, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.left > 0 && self.idx < self.iter.array_len() {
            let idx = self.idx;
            let off = self.off;
            let len = self.left.min(self.iter.seg_len(idx).saturating_sub(off));
            self.idx += 1;
            self.off = 0;
            if len == 0 {
                continue;
            }
            self.left -= len;
            return Some((idx, off, len));
        }
        None
    }
}
