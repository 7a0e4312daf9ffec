use alloc::sync::Arc;

use super::*;
use crate::mm::Page;
use crate::uio::{Direction, IterType};

test_case!(test_copy_more_than_segment, {
    let mm = user_space(1);
    let iov = [IoVec::new(UBASE, 100)];
    let data = pattern(150);

    let mut iter = IovIter::new_iovec(Direction::Dest, &mm, &iov, 100);
    kassert!(iter.is_iovec());
    kassert!(iter.iter_type() == IterType::Iovec);
    kassert!(iter.copy_to_iter(&data) == 100);
    kassert!(iter.count() == 0);
    kassert!(read_user(&mm, UBASE, 100)[..] == data[..100]);
});

test_case!(test_copy_stops_at_unmapped_page, {
    let mm = user_space(1);
    let iov = [IoVec::new(UBASE + PAGE_SIZE - 10, 30)];

    let mut iter = IovIter::new_iovec(Direction::Dest, &mm, &iov, 30);
    kassert!(iter.copy_to_iter(&pattern(30)) == 10);
    kassert!(iter.count() == 20);
    kassert!(iter.iov_offset() == 10);
    // 映射之后可以从停下的位置继续
    mm.map(UBASE + PAGE_SIZE, PAGE_SIZE, MapPermission::R | MapPermission::W)
        .unwrap();
    kassert!(iter.copy_to_iter(&pattern(30)[10..]) == 20);
    kassert!(read_user(&mm, UBASE + PAGE_SIZE - 10, 30) == pattern(30));
});

test_case!(test_copy_from_user_segments, {
    let mm = user_space(1);
    let data = pattern(64);
    kassert!(mm.copy_to_user(UBASE, &data) == 64);
    let iov = [
        IoVec::new(UBASE, 16),
        IoVec::new(UBASE + 16, 0),
        IoVec::new(UBASE + 32, 32),
    ];

    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 48);
    let mut out = [0u8; 48];
    kassert!(iter.copy_from_iter(&mut out) == 48);
    kassert!(out[..16] == data[..16]);
    kassert!(out[16..] == data[32..]);
});

test_case!(test_page_copy_faults_in_evicted_pages, {
    let mm = user_space(2);
    mm.evict(UBASE, 2 * PAGE_SIZE);
    let page = Page::new_shared();
    page.write(0, &pattern(PAGE_SIZE));
    let iov = [IoVec::new(UBASE, 2 * PAGE_SIZE)];

    let mut iter = IovIter::new_iovec(Direction::Dest, &mm, &iov, 2 * PAGE_SIZE);
    kassert!(iter.copy_page_to_iter(&page, 0, PAGE_SIZE) == PAGE_SIZE);
    kassert!(mm.fault_count() == 1);
    kassert!(mm.is_resident(UBASE));
    kassert!(!mm.is_resident(UBASE + PAGE_SIZE));
    kassert!(read_user(&mm, UBASE, PAGE_SIZE) == pattern(PAGE_SIZE));
    kassert!(iter.count() == PAGE_SIZE);
});

test_case!(test_page_copy_from_user, {
    let mm = user_space(2);
    kassert!(mm.copy_to_user(UBASE + 100, &pattern(200)) == 200);
    mm.evict(UBASE, PAGE_SIZE);
    let page = Page::new_shared();
    let iov = [IoVec::new(UBASE + 100, 200)];

    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 200);
    kassert!(iter.copy_page_from_iter(&page, 10, 200) == 200);
    kassert!(page.to_vec(10, 200) == pattern(200));
    kassert!(iter.count() == 0);
    // 越界的页范围直接拒绝
    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 200);
    kassert!(iter.copy_page_from_iter(&page, PAGE_SIZE - 10, 20) == 0);
    kassert!(iter.count() == 200);
});

test_case!(test_atomic_copy_stays_in_current_segment, {
    let mm = user_space(1);
    kassert!(mm.copy_to_user(UBASE, &pattern(200)) == 200);
    let iov = [IoVec::new(UBASE, 10), IoVec::new(UBASE + 100, 10)];
    let page = Page::new_shared();

    let iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 20);
    kassert!(iter.copy_from_user_atomic(&page, 0, 20) == 10);
    kassert!(iter.count() == 20);
    kassert!(page.to_vec(0, 10) == pattern(10));

    // 不允许缺页：换出的页一个字节也拷不到
    mm.evict(UBASE, PAGE_SIZE);
    kassert!(iter.copy_from_user_atomic(&page, 0, 20) == 0);
    kassert!(mm.fault_count() == 0);
});

test_case!(test_fault_in_readable, {
    let mm = user_space(2);
    mm.evict(UBASE, 2 * PAGE_SIZE);
    let iov = [IoVec::new(UBASE, 10), IoVec::new(UBASE + PAGE_SIZE, 10)];

    let iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 20);
    kassert!(iter.fault_in_readable(15).is_ok());
    kassert!(mm.is_resident(UBASE) && mm.is_resident(UBASE + PAGE_SIZE));
    kassert!(iter.count() == 20);

    let bad = [IoVec::new(UBASE + 8 * PAGE_SIZE, 10)];
    let iter = IovIter::new_iovec(Direction::Source, &mm, &bad, 10);
    kassert!(iter.fault_in_readable(10).is_err());
    kassert!(iter.count() == 10);
});

test_case!(test_get_pages_caps_page_count, {
    let mm = user_space(5);
    let iov = [IoVec::new(UBASE, 5 * PAGE_SIZE)];

    let mut iter = IovIter::new_iovec(Direction::Dest, &mm, &iov, 5 * PAGE_SIZE);
    let extent = iter.get_pages(usize::MAX, 2).unwrap();
    kassert!(extent.pages.len() == 2);
    kassert!(extent.start == 0);
    kassert!(extent.len == 2 * PAGE_SIZE);
    // 提取不移动迭代器
    kassert!(iter.count() == 5 * PAGE_SIZE);

    let first = extent.pages[0].clone();
    kassert!(first.pin_count() == 1);
    drop(extent);
    kassert!(first.pin_count() == 0);
});

test_case!(test_get_pages_alloc_unaligned, {
    let mm = user_space(3);
    kassert!(mm.copy_to_user(UBASE + 0x800, b"abc") == 3);
    let iov = [IoVec::new(UBASE + 0x800, PAGE_SIZE)];

    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &iov, PAGE_SIZE);
    let extent = iter.get_pages_alloc(usize::MAX).unwrap();
    kassert!(extent.pages.len() == 2);
    kassert!(extent.start == 0x800);
    kassert!(extent.len == PAGE_SIZE);
    kassert!(extent.pages[0].to_vec(0x800, 3) == b"abc");

    let extent = iter.get_pages_alloc(100).unwrap();
    kassert!(extent.pages.len() == 1);
    kassert!(extent.len == 100);
});

test_case!(test_get_pages_short_and_failing, {
    let mm = user_space(1);
    let iov = [IoVec::new(UBASE, 3 * PAGE_SIZE)];
    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 3 * PAGE_SIZE);
    let extent = iter.get_pages_alloc(usize::MAX).unwrap();
    kassert!(extent.pages.len() == 1);
    kassert!(extent.len == PAGE_SIZE);

    let bad = [IoVec::new(UBASE + 4 * PAGE_SIZE, 10)];
    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &bad, 10);
    kassert!(iter.get_pages(10, 1).err() == Some(crate::UioError::BadAddress));
});

test_case!(test_npages_and_alignment, {
    let mm = user_space(4);
    let iov = [IoVec::new(UBASE + 0x800, 2 * PAGE_SIZE)];
    let iter = IovIter::new_iovec(Direction::Dest, &mm, &iov, 2 * PAGE_SIZE);
    kassert!(iter.npages(16) == 3);
    kassert!(iter.npages(2) == 2);

    let iov = [IoVec::new(UBASE, 0x200), IoVec::new(UBASE + 0x1000, 0x400)];
    let iter = IovIter::new_iovec(Direction::Dest, &mm, &iov, 0x600);
    kassert!(iter.alignment() == 0x10_1600);
    kassert!(iter.gap_alignment() == 0x10_1600);

    let single = [IoVec::new(UBASE, 0x200)];
    let iter = IovIter::new_iovec(Direction::Dest, &mm, &single, 0x200);
    kassert!(iter.gap_alignment() == 0);
    kassert!(iter.alignment() == UBASE | 0x200);
});

test_case!(test_page_to_iter_shares_nothing, {
    let mm = user_space(1);
    let page = Page::new_shared();
    page.write(0, b"data");
    let iov = [IoVec::new(UBASE, 4)];
    let mut iter = IovIter::new_iovec(Direction::Dest, &mm, &iov, 4);
    kassert!(iter.copy_page_to_iter(&page, 0, 4) == 4);
    kassert!(Arc::strong_count(&page) == 1);
    kassert!(read_user(&mm, UBASE, 4) == b"data");
});

test_case!(test_read_stops_at_unmapped_page, {
    let mm = user_space(2);
    kassert!(mm.copy_to_user(UBASE, &pattern(2 * PAGE_SIZE)) == 2 * PAGE_SIZE);
    mm.unmap(UBASE + PAGE_SIZE, PAGE_SIZE);
    let iov = [IoVec::new(UBASE + PAGE_SIZE - 8, 16)];

    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 16);
    let mut out = [0u8; 16];
    kassert!(iter.copy_from_iter(&mut out) == 8);
    kassert!(out[..8] == pattern(PAGE_SIZE)[PAGE_SIZE - 8..]);
    kassert!(iter.count() == 8);
    kassert!(iter.fault_in_readable(8) == Err(crate::UioError::BadAddress));
});
