//! Copy operations
//!
//! 拷贝的方向必须与迭代器构造时的方向一致，否则记录警告并返回 0。
//! 返回值小于请求的字节数不是错误：可能是剩余字节数不足，也可能是用户页无法访问。

use super::iter::{Direction, IovIter};
use super::segment::Chunk;
use crate::config::{FAULT_IN_RETRIES, PAGE_SIZE};
use crate::mm::{PageRef, UserAccess};

/// `[offset, offset + bytes)` 是否落在一个页内
fn page_copy_sane(offset: usize, bytes: usize) -> bool {
    offset
        .checked_add(bytes)
        .is_some_and(|end| end <= PAGE_SIZE)
}

/// 先换入再原子拷贝，重试若干次后退回允许缺页的慢速路径
fn copy_to_user_faulting(mm: &dyn UserAccess, addr: usize, src: &[u8]) -> usize {
    let mut copied = 0;
    for _ in 0..FAULT_IN_RETRIES {
        if mm.fault_in_writeable(addr + copied, src.len() - copied).is_err() {
            break;
        }
        copied += mm.copy_to_user_inatomic(addr + copied, &src[copied..]);
        if copied == src.len() {
            return copied;
        }
    }
    copied + mm.copy_to_user(addr + copied, &src[copied..])
}

fn copy_from_user_faulting(mm: &dyn UserAccess, dst: &mut [u8], addr: usize) -> usize {
    let len = dst.len();
    let mut copied = 0;
    for _ in 0..FAULT_IN_RETRIES {
        if mm.fault_in_readable(addr + copied, len - copied).is_err() {
            break;
        }
        copied += mm.copy_from_user_inatomic(&mut dst[copied..], addr + copied);
        if copied == len {
            return copied;
        }
    }
    copied + mm.copy_from_user(&mut dst[copied..], addr + copied)
}

impl IovIter<'_> {
    pub(super) fn check_dir(&self, want: Direction, op: &str) -> bool {
        if self.dir != want {
            pr_warn!("uio: {} on a {:?} iterator", op, self.dir);
            return false;
        }
        true
    }

    /// 把 `src` 拷贝进迭代器，返回实际拷贝的字节数
    pub fn copy_to_iter(&mut self, src: &[u8]) -> usize {
        if !self.check_dir(Direction::Dest, "copy_to_iter") {
            return 0;
        }
        self.iterate_and_advance(src.len(), |chunk, done| {
            chunk.write(&src[done..done + chunk.len()])
        })
    }

    /// 从迭代器拷贝出 `dst.len()` 字节，返回实际拷贝的字节数
    pub fn copy_from_iter(&mut self, dst: &mut [u8]) -> usize {
        if !self.check_dir(Direction::Source, "copy_from_iter") {
            return 0;
        }
        self.iterate_and_advance(dst.len(), |chunk, done| {
            let n = chunk.len();
            chunk.read(&mut dst[done..done + n])
        })
    }

    /// 剩余字节数不足时不拷贝；否则返回是否全部拷贝成功
    pub fn copy_to_iter_full(&mut self, src: &[u8]) -> bool {
        if self.count < src.len() {
            return false;
        }
        self.copy_to_iter(src) == src.len()
    }

    /// 剩余字节数不足时不拷贝；否则返回是否全部拷贝成功
    ///
    /// 部分拷贝时迭代器已经前移了实际拷贝的字节数。
    pub fn copy_from_iter_full(&mut self, dst: &mut [u8]) -> bool {
        if self.count < dst.len() {
            return false;
        }
        self.copy_from_iter(dst) == dst.len()
    }

    /// 与 [`copy_from_iter`](Self::copy_from_iter) 相同，调用者提示数据不会很快再被读取
    pub fn copy_from_iter_nocache(&mut self, dst: &mut [u8]) -> usize {
        self.copy_from_iter(dst)
    }

    /// [`copy_from_iter_full`](Self::copy_from_iter_full) 的 nocache 版本
    pub fn copy_from_iter_full_nocache(&mut self, dst: &mut [u8]) -> bool {
        self.copy_from_iter_full(dst)
    }

    /// 与 [`copy_from_iter`](Self::copy_from_iter) 相同，用于目的地需要持久化的场景
    pub fn copy_from_iter_flushcache(&mut self, dst: &mut [u8]) -> usize {
        self.copy_from_iter(dst)
    }

    /// 向迭代器写入 `bytes` 个零字节
    pub fn zero(&mut self, bytes: usize) -> usize {
        if !self.check_dir(Direction::Dest, "iov_iter_zero") {
            return 0;
        }
        self.iterate_and_advance(bytes, |chunk, _| chunk.zero())
    }

    /// 把页中 `[offset, offset + bytes)` 拷贝进迭代器
    ///
    /// 管道类型不拷贝数据，而是把页本身拼接进管道。
    pub fn copy_page_to_iter(&mut self, page: &PageRef, offset: usize, bytes: usize) -> usize {
        if !page_copy_sane(offset, bytes) {
            pr_warn!("uio: page copy out of range: offset {} bytes {}", offset, bytes);
            return 0;
        }
        if !self.check_dir(Direction::Dest, "copy_page_to_iter") {
            return 0;
        }
        if self.pipe_indices().is_some() {
            return self.pipe_splice_page(page, offset, bytes);
        }
        let mut bounce = [0u8; PAGE_SIZE];
        page.read(offset, &mut bounce[..bytes]);
        let src = &bounce[..bytes];
        self.iterate_and_advance(bytes, |chunk, done| {
            let part = &src[done..done + chunk.len()];
            match chunk {
                Chunk::User { mm, addr, .. } => copy_to_user_faulting(mm, addr, part),
                other => other.write(part),
            }
        })
    }

    /// 从迭代器拷贝 `bytes` 字节到页中 `offset` 处
    pub fn copy_page_from_iter(&mut self, page: &PageRef, offset: usize, bytes: usize) -> usize {
        if !page_copy_sane(offset, bytes) {
            pr_warn!("uio: page copy out of range: offset {} bytes {}", offset, bytes);
            return 0;
        }
        if !self.check_dir(Direction::Source, "copy_page_from_iter") {
            return 0;
        }
        let mut bounce = [0u8; PAGE_SIZE];
        let n = self.iterate_and_advance(bytes, |chunk, done| {
            let dst = &mut bounce[done..done + chunk.len()];
            match chunk {
                Chunk::User { mm, addr, .. } => copy_from_user_faulting(mm, dst, addr),
                other => other.read(dst),
            }
        });
        page.write(offset, &bounce[..n]);
        n
    }

    /// 在不允许缺页的上下文中，从当前段拷贝到页中
    ///
    /// 只访问当前段，不会跨到下一段；不移动迭代器，调用者随后按实际拷贝量 `advance`。
    pub fn copy_from_user_atomic(&self, page: &PageRef, offset: usize, bytes: usize) -> usize {
        if !page_copy_sane(offset, bytes) {
            pr_warn!("uio: page copy out of range: offset {} bytes {}", offset, bytes);
            return 0;
        }
        if !self.check_dir(Direction::Source, "copy_from_user_atomic") {
            return 0;
        }
        let Some(chunk) = self.current_chunk(bytes.min(self.count)) else {
            return 0;
        };
        let mut bounce = [0u8; PAGE_SIZE];
        let dst = &mut bounce[..chunk.len()];
        let n = match chunk {
            Chunk::User { mm, addr, .. } => mm.copy_from_user_inatomic(dst, addr),
            other => other.read(dst),
        };
        page.write(offset, &bounce[..n]);
        n
    }
}
