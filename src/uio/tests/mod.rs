use alloc::vec::Vec;

use super::IovIter;
use crate::config::PAGE_SIZE;
use crate::mm::{MapPermission, UserAccess, UserSpace};
use crate::uapi::IoVec;

// 测试辅助函数 (fixtures)

/// 测试用用户缓冲区的起始地址
pub const UBASE: usize = 0x10_0000;

/// 创建一个在 `UBASE` 处映射了 `pages` 个可读写页的用户地址空间
pub fn user_space(pages: usize) -> UserSpace {
    let mm = UserSpace::new();
    mm.map(UBASE, pages * PAGE_SIZE, MapPermission::R | MapPermission::W)
        .unwrap();
    mm
}

/// 可辨识的测试数据
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

/// 把段数组写进用户内存
pub fn write_uvector(mm: &UserSpace, addr: usize, iov: &[IoVec]) {
    for (i, v) in iov.iter().enumerate() {
        let raw = v.to_ne_bytes();
        assert_eq!(mm.copy_to_user(addr + i * IoVec::SIZE, &raw), raw.len());
    }
}

/// 读出用户内存中的一段
pub fn read_user(mm: &UserSpace, addr: usize, len: usize) -> Vec<u8> {
    let mut buf = alloc::vec![0u8; len];
    assert_eq!(mm.copy_from_user(&mut buf, addr), len);
    buf
}

/// 迭代器位置快照：(剩余字节数, 段内偏移, 段下标或管道槽位)
pub fn state(iter: &IovIter<'_>) -> (usize, usize, usize) {
    let idx = iter
        .seg_index()
        .or_else(|| iter.pipe_indices().map(|(idx, _)| idx))
        .unwrap_or(usize::MAX);
    (iter.count(), iter.iov_offset(), idx)
}

mod csum;
mod user;
