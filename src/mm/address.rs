//! Address helpers
//!
//! 注意：所有范围均为左闭右开。

use crate::config::{PAGE_MASK, PAGE_SIZE};

/// virtual page number
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Vpn(pub usize);

impl Vpn {
    /// `addr` 所在的页
    pub const fn from_addr_floor(addr: usize) -> Self {
        Self(addr / PAGE_SIZE)
    }

    /// `addr` 之后（含）的第一个完整页
    pub const fn from_addr_ceil(addr: usize) -> Self {
        Self(addr.div_ceil(PAGE_SIZE))
    }

    /// 移到下一页
    pub fn step(&mut self) {
        self.0 += 1;
    }
}

/// Rounds `addr` down to its page boundary.
#[inline]
pub const fn page_floor(addr: usize) -> usize {
    addr & PAGE_MASK
}

/// Offset of `addr` inside its page.
#[inline]
pub const fn page_offset(addr: usize) -> usize {
    addr & !PAGE_MASK
}

/// Number of pages touched by `[addr, addr + len)`.
#[inline]
pub const fn pages_spanned(addr: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (page_offset(addr) + len).div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    test_case!(test_page_math, {
        kassert!(page_floor(0x1fff) == 0x1000);
        kassert!(page_offset(0x1fff) == 0xfff);
        kassert!(Vpn::from_addr_floor(0x2001) == Vpn(2));
        kassert!(Vpn::from_addr_ceil(0x2001) == Vpn(3));
    });

    test_case!(test_pages_spanned, {
        kassert!(pages_spanned(0x1000, 0) == 0);
        kassert!(pages_spanned(0x1000, PAGE_SIZE) == 1);
        kassert!(pages_spanned(0x1fff, 2) == 2);
        kassert!(pages_spanned(0x1800, 5 * PAGE_SIZE) == 6);
    });
}
