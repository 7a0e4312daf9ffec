//! In-memory user address space
//!
//! 以页为单位记录映射关系。每个映射页都有自己的页帧，并带有"是否驻留"标记：
//! [`UserSpace::evict`] 把页标记为换出（内容保留），之后原子拷贝会在该页停下，
//! 而允许缺页的访问会把它重新换入并计入 [`UserSpace::fault_count`]。

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::sync::Arc;
use bitflags::bitflags;
use hashbrown::HashMap;
use spin::Mutex;

use super::address::{Vpn, page_offset};
use super::{FRAME_ALLOCATOR, FrameAllocator, PageRef, PinnedPages, UserAccess};
use crate::config::PAGE_SIZE;
use crate::error::UioError;

bitflags! {
    /// 用户页访问权限
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct MapPermission: u8 {
        const R = 1 << 1;
        const W = 1 << 2;
    }
}

#[derive(Debug)]
struct UserPage {
    frame: PageRef,
    perm: MapPermission,
    resident: bool,
}

/// 访问方式
#[derive(Copy, Clone)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn perm(self) -> MapPermission {
        match self {
            Access::Read => MapPermission::R,
            Access::Write => MapPermission::W,
        }
    }
}

/// 内存中模拟的用户地址空间
///
/// 以页为单位记录映射、权限和是否驻留。访问被换出的页时，允许缺页的路径会把它换入
/// 并计数，原子路径则在该页停下。
pub struct UserSpace {
    pages: Mutex<HashMap<Vpn, UserPage>>,
    frames: Arc<FrameAllocator>,
    faults: AtomicUsize,
}

impl UserSpace {
    /// 使用全局页帧分配器
    pub fn new() -> Self {
        Self::with_allocator(FRAME_ALLOCATOR.clone())
    }

    /// 使用指定的页帧分配器，用于模拟内存耗尽
    pub fn with_allocator(frames: Arc<FrameAllocator>) -> Self {
        UserSpace {
            pages: Mutex::new(HashMap::new()),
            frames,
            faults: AtomicUsize::new(0),
        }
    }

    /// 映射覆盖 `[start, start + len)` 的所有页，已映射的页只更新权限
    pub fn map(&self, start: usize, len: usize, perm: MapPermission) -> Result<(), UioError> {
        if len == 0 {
            return Ok(());
        }
        if !self.access_ok(start, len) {
            return Err(UioError::BadAddress);
        }
        let mut vpn = Vpn::from_addr_floor(start);
        let end = Vpn::from_addr_ceil(start + len);
        let mut pages = self.pages.lock();
        while vpn < end {
            match pages.get_mut(&vpn) {
                Some(page) => page.perm = perm,
                None => {
                    let frame = self.frames.alloc_page().ok_or(UioError::NoMemory)?;
                    pages.insert(
                        vpn,
                        UserPage {
                            frame,
                            perm,
                            resident: true,
                        },
                    );
                }
            }
            vpn.step();
        }
        Ok(())
    }

    /// 取消覆盖 `[start, start + len)` 的所有页的映射
    pub fn unmap(&self, start: usize, len: usize) {
        self.for_each_vpn(start, len, |pages, vpn| {
            pages.remove(&vpn);
        });
    }

    /// 把覆盖 `[start, start + len)` 的页标记为换出
    pub fn evict(&self, start: usize, len: usize) {
        self.for_each_vpn(start, len, |pages, vpn| {
            if let Some(page) = pages.get_mut(&vpn) {
                page.resident = false;
            }
        });
    }

    /// `addr` 所在的页是否已映射且驻留
    pub fn is_resident(&self, addr: usize) -> bool {
        self.pages
            .lock()
            .get(&Vpn::from_addr_floor(addr))
            .is_some_and(|p| p.resident)
    }

    /// 迄今为止发生的缺页换入次数
    pub fn fault_count(&self) -> usize {
        self.faults.load(Ordering::Relaxed)
    }

    fn for_each_vpn(
        &self,
        start: usize,
        len: usize,
        mut f: impl FnMut(&mut HashMap<Vpn, UserPage>, Vpn),
    ) {
        let Some(end) = start.checked_add(len) else {
            return;
        };
        let mut vpn = Vpn::from_addr_floor(start);
        let end = Vpn::from_addr_ceil(end);
        let mut pages = self.pages.lock();
        while vpn < end {
            f(&mut pages, vpn);
            vpn.step();
        }
    }

    /// 查找 `addr` 所在页，必要时换入
    fn lookup(&self, addr: usize, access: Access, may_fault: bool) -> Option<PageRef> {
        let mut pages = self.pages.lock();
        let page = pages.get_mut(&Vpn::from_addr_floor(addr))?;
        if !page.perm.contains(access.perm()) {
            return None;
        }
        if !page.resident {
            if !may_fault {
                return None;
            }
            page.resident = true;
            self.faults.fetch_add(1, Ordering::Relaxed);
        }
        Some(page.frame.clone())
    }

    /// 逐页访问 `[addr, addr + len)`，在第一个无法访问的页停下
    ///
    /// `f` 的参数依次为：页帧、页内偏移、已处理字节数、本次长度。
    fn walk(
        &self,
        addr: usize,
        len: usize,
        access: Access,
        may_fault: bool,
        mut f: impl FnMut(&PageRef, usize, usize, usize),
    ) -> usize {
        if !self.access_ok(addr, len) {
            return 0;
        }
        let mut done = 0;
        while done < len {
            let va = addr + done;
            let offset = page_offset(va);
            let n = (len - done).min(PAGE_SIZE - offset);
            let Some(frame) = self.lookup(va, access, may_fault) else {
                break;
            };
            f(&frame, offset, done, n);
            done += n;
        }
        done
    }

    fn fault_in(&self, addr: usize, len: usize, access: Access) -> Result<(), UioError> {
        if self.walk(addr, len, access, true, |_, _, _, _| {}) == len {
            Ok(())
        } else {
            Err(UioError::BadAddress)
        }
    }

    fn read_user(&self, dst: &mut [u8], addr: usize, may_fault: bool) -> usize {
        let len = dst.len();
        self.walk(addr, len, Access::Read, may_fault, |frame, off, done, n| {
            frame.read(off, &mut dst[done..done + n]);
        })
    }

    fn write_user(&self, addr: usize, src: &[u8], may_fault: bool) -> usize {
        self.walk(addr, src.len(), Access::Write, may_fault, |frame, off, done, n| {
            frame.write(off, &src[done..done + n]);
        })
    }
}

impl Default for UserSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAccess for UserSpace {
    fn fault_in_readable(&self, addr: usize, len: usize) -> Result<(), UioError> {
        self.fault_in(addr, len, Access::Read)
    }

    fn fault_in_writeable(&self, addr: usize, len: usize) -> Result<(), UioError> {
        self.fault_in(addr, len, Access::Write)
    }

    fn copy_from_user(&self, dst: &mut [u8], addr: usize) -> usize {
        self.read_user(dst, addr, true)
    }

    fn copy_to_user(&self, addr: usize, src: &[u8]) -> usize {
        self.write_user(addr, src, true)
    }

    fn copy_from_user_inatomic(&self, dst: &mut [u8], addr: usize) -> usize {
        self.read_user(dst, addr, false)
    }

    fn copy_to_user_inatomic(&self, addr: usize, src: &[u8]) -> usize {
        self.write_user(addr, src, false)
    }

    fn clear_user(&self, addr: usize, len: usize) -> usize {
        self.walk(addr, len, Access::Write, true, |frame, off, _, n| {
            frame.fill(off, n, 0);
        })
    }

    fn get_user_pages(
        &self,
        addr: usize,
        nr_pages: usize,
        write: bool,
        pages: &mut PinnedPages,
    ) -> Result<usize, UioError> {
        let access = if write { Access::Write } else { Access::Read };
        let mut got = 0;
        while got < nr_pages {
            let va = addr + got * PAGE_SIZE;
            if !self.access_ok(va, PAGE_SIZE) {
                break;
            }
            let Some(frame) = self.lookup(va, access, true) else {
                break;
            };
            pages.push(frame);
            got += 1;
        }
        if got == 0 && nr_pages > 0 {
            return Err(UioError::BadAddress);
        }
        Ok(got)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x10_0000;

    test_case!(test_user_copy_roundtrip, {
        let mm = UserSpace::new();
        mm.map(BASE, 2 * PAGE_SIZE, MapPermission::R | MapPermission::W).unwrap();
        let data: alloc::vec::Vec<u8> = (0..100u8).collect();
        // 跨页写入
        let addr = BASE + PAGE_SIZE - 50;
        kassert!(mm.copy_to_user(addr, &data) == 100);
        let mut back = [0u8; 100];
        kassert!(mm.copy_from_user(&mut back, addr) == 100);
        kassert!(back[..] == data[..]);
    });

    test_case!(test_short_copy_at_unmapped_page, {
        let mm = UserSpace::new();
        mm.map(BASE, PAGE_SIZE, MapPermission::R | MapPermission::W).unwrap();
        let src = [7u8; 200];
        kassert!(mm.copy_to_user(BASE + PAGE_SIZE - 100, &src) == 100);
        kassert!(mm.fault_in_readable(BASE, PAGE_SIZE + 1) == Err(UioError::BadAddress));
    });

    test_case!(test_permission_checked, {
        let mm = UserSpace::new();
        mm.map(BASE, PAGE_SIZE, MapPermission::R).unwrap();
        kassert!(mm.copy_to_user(BASE, b"x") == 0);
        kassert!(mm.fault_in_writeable(BASE, 1).is_err());
        kassert!(mm.fault_in_readable(BASE, 1).is_ok());
    });

    test_case!(test_evicted_page_stops_atomic_copy, {
        let mm = UserSpace::new();
        mm.map(BASE, 2 * PAGE_SIZE, MapPermission::R | MapPermission::W).unwrap();
        kassert!(mm.copy_to_user(BASE, &[1u8; 16]) == 16);
        mm.evict(BASE + PAGE_SIZE, PAGE_SIZE);
        kassert!(!mm.is_resident(BASE + PAGE_SIZE));
        let mut buf = [0u8; 2 * PAGE_SIZE];
        kassert!(mm.copy_from_user_inatomic(&mut buf, BASE) == PAGE_SIZE);
        kassert!(mm.fault_count() == 0);
        kassert!(mm.copy_from_user(&mut buf, BASE) == 2 * PAGE_SIZE);
        kassert!(mm.fault_count() == 1);
        kassert!(buf[..16] == [1u8; 16]);
    });

    test_case!(test_access_ok, {
        let mm = UserSpace::new();
        kassert!(mm.access_ok(BASE, 100));
        kassert!(!mm.access_ok(usize::MAX - 10, 100));
        kassert!(!mm.access_ok(crate::config::USER_SPACE_TOP, 1));
        kassert!(mm.map(usize::MAX - PAGE_SIZE, 1, MapPermission::R).is_err());
    });

    test_case!(test_get_user_pages_pins, {
        let mm = UserSpace::new();
        mm.map(BASE, 2 * PAGE_SIZE, MapPermission::R).unwrap();
        let mut pinned = PinnedPages::default();
        kassert!(mm.get_user_pages(BASE, 3, false, &mut pinned) == Ok(2));
        kassert!(pinned.iter().all(|p| p.pin_count() == 1));
        let mut none = PinnedPages::default();
        kassert!(mm.get_user_pages(BASE + 8 * PAGE_SIZE, 1, false, &mut none).is_err());
        kassert!(mm.get_user_pages(BASE, 1, true, &mut none).is_err());
    });
}
