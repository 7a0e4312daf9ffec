//! Page extraction
//!
//! 返回迭代器开头一段连续数据所在的页。页被 [`PinnedPages`] pin 住，
//! 在返回的 [`PageExtent`] drop 之前不会被换出或回收。提取不会移动迭代器。

use super::iter::{Backing, Direction, IovIter};
use crate::config::PAGE_SIZE;
use crate::error::UioError;
use crate::mm::PinnedPages;
use crate::mm::address::{page_floor, page_offset, pages_spanned};

/// 提取出的页
#[derive(Debug, Default)]
pub struct PageExtent {
    /// 数据所在的页，按顺序排列
    pub pages: PinnedPages,
    /// 数据在第一页中的偏移
    pub start: usize,
    /// 数据总长度
    pub len: usize,
}

impl IovIter<'_> {
    /// 最多提取 `maxpages` 个页、`maxsize` 字节
    pub fn get_pages(&mut self, maxsize: usize, maxpages: usize) -> Result<PageExtent, UioError> {
        self.extract_pages(maxsize, Some(maxpages))
    }

    /// 不限页数，页数组按需分配
    pub fn get_pages_alloc(&mut self, maxsize: usize) -> Result<PageExtent, UioError> {
        self.extract_pages(maxsize, None)
    }

    fn extract_pages(
        &mut self,
        maxsize: usize,
        maxpages: Option<usize>,
    ) -> Result<PageExtent, UioError> {
        let maxsize = maxsize.min(self.count);
        if maxsize == 0 || maxpages == Some(0) {
            return Ok(PageExtent::default());
        }
        match self.backing {
            Backing::Pipe(_) => self.pipe_get_pages(maxsize, maxpages),
            Backing::Kvec { .. } => {
                pr_warn!("uio: get_pages on a kvec iterator");
                Err(UioError::NotSupported)
            }
            Backing::Bvec { bvec, .. } => {
                let (idx, off, len) = self.segs().next().ok_or(UioError::BadAddress)?;
                let bv = bvec[idx];
                let mut pages = PinnedPages::try_with_capacity(1)?;
                pages.push(bv.page.clone());
                Ok(PageExtent {
                    pages,
                    start: bv.offset + off,
                    len: len.min(maxsize),
                })
            }
            Backing::Iovec { iov, mm, .. } => {
                let (idx, off, len) = self.segs().next().ok_or(UioError::BadAddress)?;
                let addr = iov[idx].iov_base + off;
                let start = page_offset(addr);
                let mut len = len.min(maxsize);
                let mut npages = pages_spanned(addr, len);
                if let Some(max) = maxpages {
                    if npages > max {
                        npages = max;
                        len = npages * PAGE_SIZE - start;
                    }
                }
                let mut pages = PinnedPages::try_with_capacity(npages).inspect_err(|_| {
                    pr_err!("uio: no memory for {} page handles", npages);
                })?;
                let write = self.dir == Direction::Dest;
                let got = mm.get_user_pages(page_floor(addr), npages, write, &mut pages)?;
                if got < npages {
                    len = got * PAGE_SIZE - start;
                }
                pr_debug!("uio: pinned {} user pages at {:#x}", got, page_floor(addr));
                Ok(PageExtent { pages, start, len })
            }
        }
    }
}
