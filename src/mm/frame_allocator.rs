use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::sync::Arc;
use lazy_static::lazy_static;

use super::{Page, PageRef};

lazy_static! {
    /// 全局页帧分配器，不设额度
    pub static ref FRAME_ALLOCATOR: Arc<FrameAllocator> = FrameAllocator::unlimited();
}

/// Page frame allocator
///
/// 只记录已分配页帧的数量，页帧在 drop 时自动归还。
/// 设置额度后可以用来模拟内存耗尽。
#[derive(Debug)]
pub struct FrameAllocator {
    limit: usize,
    allocated: AtomicUsize,
}

impl FrameAllocator {
    /// 最多同时分配 `limit` 个页帧
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(FrameAllocator {
            limit,
            allocated: AtomicUsize::new(0),
        })
    }

    /// 不设额度的分配器
    pub fn unlimited() -> Arc<Self> {
        Self::new(usize::MAX)
    }

    /// Allocates one zeroed frame, `None` once the budget is used up.
    pub fn alloc_page(self: &Arc<Self>) -> Option<PageRef> {
        self.allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()?;
        Some(Arc::new(Page::zeroed(Some(self.clone()))))
    }

    /// 当前尚未归还的页帧数
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    pub(super) fn dealloc(&self) {
        self.allocated.fetch_sub(1, Ordering::AcqRel);
    }
}
