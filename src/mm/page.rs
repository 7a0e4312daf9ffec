//! Page frames
//!
//! 页帧内容以原子字节存放，同一页可以被多个迭代器、管道缓冲与用户映射
//! 同时共享（例如把一页拷贝到它自身的另一段）。

use core::fmt;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::FrameAllocator;
use crate::config::PAGE_SIZE;

/// Shared handle to a page frame.
pub type PageRef = Arc<Page>;

/// A physical page frame
///
/// 页帧释放时（最后一个 [`PageRef`] 被 drop）归还给分配它的 [`FrameAllocator`]。
pub struct Page {
    data: Box<[AtomicU8]>,
    pins: AtomicUsize,
    owner: Option<Arc<FrameAllocator>>,
}

impl Page {
    /// 分配一个清零的页帧，不计入任何分配器的额度
    pub fn new_shared() -> PageRef {
        Arc::new(Self::zeroed(None))
    }

    pub(super) fn zeroed(owner: Option<Arc<FrameAllocator>>) -> Self {
        let data = (0..PAGE_SIZE).map(|_| AtomicU8::new(0)).collect();
        Page {
            data,
            pins: AtomicUsize::new(0),
            owner,
        }
    }

    /// Copies `dst.len()` bytes starting at `offset` out of the page.
    ///
    /// # Panics
    ///
    /// Panics if the range does not fit inside the page.
    pub fn read(&self, offset: usize, dst: &mut [u8]) {
        let src = &self.data[offset..offset + dst.len()];
        for (d, s) in dst.iter_mut().zip(src) {
            *d = s.load(Ordering::Relaxed);
        }
    }

    /// Copies `src` into the page starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range does not fit inside the page.
    pub fn write(&self, offset: usize, src: &[u8]) {
        let dst = &self.data[offset..offset + src.len()];
        for (d, s) in dst.iter().zip(src) {
            d.store(*s, Ordering::Relaxed);
        }
    }

    /// Sets `len` bytes starting at `offset` to `byte`.
    pub fn fill(&self, offset: usize, len: usize, byte: u8) {
        for b in &self.data[offset..offset + len] {
            b.store(byte, Ordering::Relaxed);
        }
    }

    /// 拷贝出 `[offset, offset + len)`
    pub fn to_vec(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut buf = alloc::vec![0u8; len];
        self.read(offset, &mut buf);
        buf
    }

    /// 当前被 pin 住的次数
    pub fn pin_count(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }

    pub(super) fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn unpin(&self) {
        let prev = self.pins.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unpin of an unpinned page");
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.dealloc();
        }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("addr", &(self.data.as_ptr() as usize))
            .field("pins", &self.pin_count())
            .finish()
    }
}
