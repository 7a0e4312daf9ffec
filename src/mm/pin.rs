//! Pinned page sets
//!
//! [`PinnedPages`] 在页被加入时增加其 pin 计数，在自身 drop 时统一释放，
//! 因此提取出的页不会因为调用者忘记释放而一直被钉住。

use core::ops::Deref;

use alloc::vec::Vec;

use super::PageRef;
use crate::error::UioError;

/// 一组被 pin 住的页，drop 时解除 pin
#[derive(Debug, Default)]
pub struct PinnedPages {
    pages: Vec<PageRef>,
}

impl PinnedPages {
    /// 预留 `num` 个槽位，分配失败返回 [`UioError::NoMemory`]
    pub fn try_with_capacity(num: usize) -> Result<Self, UioError> {
        let mut pages = Vec::new();
        pages
            .try_reserve_exact(num)
            .map_err(|_| UioError::NoMemory)?;
        Ok(PinnedPages { pages })
    }

    /// pin 住 `page` 并加入集合
    pub fn push(&mut self, page: PageRef) {
        page.pin();
        self.pages.push(page);
    }

}

impl Deref for PinnedPages {
    type Target = [PageRef];

    fn deref(&self) -> &[PageRef] {
        &self.pages
    }
}

impl Drop for PinnedPages {
    fn drop(&mut self) {
        for page in &self.pages {
            page.unpin();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::Page;

    test_case!(test_pin_released_on_drop, {
        let page = Page::new_shared();
        {
            let mut pinned = PinnedPages::default();
            pinned.push(page.clone());
            pinned.push(page.clone());
            kassert!(page.pin_count() == 2);
            kassert!(pinned.len() == 2);
        }
        kassert!(page.pin_count() == 0);
    });

    test_case!(test_drop_returns_page_refs, {
        let page = Page::new_shared();
        let mut pinned = PinnedPages::try_with_capacity(1).unwrap();
        pinned.push(page.clone());
        kassert!(alloc::sync::Arc::strong_count(&page) == 2);
        drop(pinned);
        kassert!(page.pin_count() == 0);
        kassert!(alloc::sync::Arc::strong_count(&page) == 1);
    });
}
