//! Segment descriptors
//!
//! [`KVec`] 描述内核内存中的一段缓冲区，[`BioVec`] 描述某个页帧中的一段。
//! 迭代器按段遍历时，把当前段的可访问部分包装为 `Chunk` 交给具体的拷贝操作。

use core::cell::Cell;

use alloc::vec::Vec;

use crate::config::PAGE_SIZE;
use crate::error::UioError;
use crate::mm::{Page, PageRef, UserAccess};

/// 内核缓冲区段，对应 `struct kvec`
///
/// 以 `Cell<u8>` 切片保存，使得同一块内核缓冲区可以同时被一个读迭代器和
/// 一个写迭代器借用（例如在两个方向上往返拷贝）。
#[derive(Debug, Clone, Copy)]
pub struct KVec<'a> {
    buf: &'a [Cell<u8>],
}

impl<'a> KVec<'a> {
    /// 借用一块可写的内核缓冲区
    pub fn new(buf: &'a mut [u8]) -> Self {
        KVec {
            buf: Cell::from_mut(buf).as_slice_of_cells(),
        }
    }

    /// 与另一个 `KVec` 共享同一块缓冲区
    pub fn from_cells(buf: &'a [Cell<u8>]) -> Self {
        KVec { buf }
    }

    /// 缓冲区长度
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// 长度是否为 0
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 段的起始地址，只用于对齐计算
    pub fn base(&self) -> usize {
        self.buf.as_ptr() as usize
    }

    /// 按字节访问的视图
    pub fn as_cells(&self) -> &'a [Cell<u8>] {
        self.buf
    }

    /// 拷贝出当前内容
    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.iter().map(Cell::get).collect()
    }
}

/// 页片段，对应 `struct bio_vec`
///
/// 片段总在一个页之内：`offset + len <= PAGE_SIZE`。
#[derive(Debug, Clone, Copy)]
pub struct BioVec<'a> {
    pub(crate) page: &'a PageRef,
    /// 页内偏移
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

impl<'a> BioVec<'a> {
    /// # Panics
    ///
    /// 片段越出页边界时 panic；不确定时用 [`BioVec::try_new`]。
    pub fn new(page: &'a PageRef, offset: usize, len: usize) -> Self {
        match Self::try_new(page, offset, len) {
            Ok(bv) => bv,
            Err(_) => panic!("bio_vec crosses its page: offset {} len {}", offset, len),
        }
    }

    /// 片段越出页边界时返回 [`UioError::InvalidArgument`]
    pub fn try_new(page: &'a PageRef, offset: usize, len: usize) -> Result<Self, UioError> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(BioVec { page, offset, len }),
            _ => Err(UioError::InvalidArgument),
        }
    }

    /// 片段所在的页
    pub fn page(&self) -> &'a PageRef {
        self.page
    }

    /// 页内偏移
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 片段长度
    pub fn len(&self) -> usize {
        self.len
    }

    /// 长度是否为 0
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// 当前段中的一块可访问区域
pub(crate) enum Chunk<'c> {
    User {
        mm: &'c dyn UserAccess,
        addr: usize,
        len: usize,
    },
    Kernel(&'c [Cell<u8>]),
    Page {
        page: &'c Page,
        offset: usize,
        len: usize,
    },
}

impl Chunk<'_> {
    pub(crate) fn len(&self) -> usize {
        match self {
            Chunk::User { len, .. } | Chunk::Page { len, .. } => *len,
            Chunk::Kernel(cells) => cells.len(),
        }
    }

    /// 把 `src` 写入这块区域，`src.len()` 不得超过区域长度
    pub(crate) fn write(&self, src: &[u8]) -> usize {
        match self {
            Chunk::User { mm, addr, .. } => mm.copy_to_user(*addr, src),
            Chunk::Kernel(cells) => {
                for (cell, byte) in cells.iter().zip(src) {
                    cell.set(*byte);
                }
                src.len().min(cells.len())
            }
            Chunk::Page { page, offset, .. } => {
                page.write(*offset, src);
                src.len()
            }
        }
    }

    /// 把这块区域读入 `dst`，`dst.len()` 不得超过区域长度
    pub(crate) fn read(&self, dst: &mut [u8]) -> usize {
        match self {
            Chunk::User { mm, addr, .. } => mm.copy_from_user(dst, *addr),
            Chunk::Kernel(cells) => {
                for (byte, cell) in dst.iter_mut().zip(cells.iter()) {
                    *byte = cell.get();
                }
                dst.len().min(cells.len())
            }
            Chunk::Page { page, offset, .. } => {
                page.read(*offset, dst);
                dst.len()
            }
        }
    }

    pub(crate) fn zero(&self) -> usize {
        match self {
            Chunk::User { mm, addr, len } => mm.clear_user(*addr, *len),
            Chunk::Kernel(cells) => {
                cells.iter().for_each(|c| c.set(0));
                cells.len()
            }
            Chunk::Page { page, offset, len } => {
                page.fill(*offset, *len, 0);
                *len
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    test_case!(test_kvec_shared_cells, {
        let mut raw = [1u8, 2, 3];
        let kv = KVec::new(&mut raw);
        let alias = KVec::from_cells(kv.as_cells());
        alias.as_cells()[0].set(9);
        kassert!(kv.to_vec() == [9, 2, 3]);
        kassert!(kv.len() == 3 && !kv.is_empty());
    });

    test_case!(test_bio_vec_stays_in_page, {
        let page = Page::new_shared();
        let bv = BioVec::new(&page, 100, PAGE_SIZE - 100);
        kassert!((bv.offset(), bv.len()) == (100, PAGE_SIZE - 100));
        kassert!(alloc::sync::Arc::ptr_eq(bv.page(), &page));
        let err = BioVec::try_new(&page, 100, PAGE_SIZE - 99).err();
        kassert!(err == Some(UioError::InvalidArgument));
        kassert!(BioVec::try_new(&page, usize::MAX, 2).is_err());
        kassert!(BioVec::try_new(&page, PAGE_SIZE, 0).is_ok_and(|bv| bv.is_empty()));
    });

    test_case!(test_kernel_chunk_copy, {
        let mut raw = [0u8; 4];
        let kv = KVec::new(&mut raw);
        let chunk = Chunk::Kernel(&kv.as_cells()[1..3]);
        kassert!(chunk.write(b"xy") == 2);
        let mut out = [0u8; 2];
        kassert!(chunk.read(&mut out) == 2);
        kassert!(&out == b"xy");
        kassert!(chunk.zero() == 2);
        kassert!(kv.to_vec() == [0, 0, 0, 0]);
    });
}
