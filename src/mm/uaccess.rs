//! User memory access primitives
//!
//! 迭代器通过 [`UserAccess`] 访问用户缓冲区。`*_inatomic` 版本在原子上下文中使用：
//! 遇到未驻留的页立即停止，不会触发换入；普通版本允许缺页并在需要时换入。
//! 所有拷贝函数返回实际拷贝的字节数，短拷贝表示遇到了无法访问的地址。

use crate::config::USER_SPACE_TOP;
use crate::error::UioError;
use crate::mm::PinnedPages;

/// User memory access primitives
///
/// 带 `_inatomic` 后缀的拷贝不会触发缺页换入，遇到不在内存中的页就停下；
/// 其余拷贝允许缺页。拷贝类方法都返回实际拷贝的字节数。
pub trait UserAccess {
    /// 检查 `[addr, addr + len)` 是否完全落在用户地址空间内
    fn access_ok(&self, addr: usize, len: usize) -> bool {
        addr.checked_add(len)
            .is_some_and(|end| end <= USER_SPACE_TOP)
    }

    /// 预先换入 `[addr, addr + len)` 覆盖的页，要求可读
    fn fault_in_readable(&self, addr: usize, len: usize) -> Result<(), UioError>;

    /// 预先换入 `[addr, addr + len)` 覆盖的页，要求可写
    fn fault_in_writeable(&self, addr: usize, len: usize) -> Result<(), UioError>;

    /// 从用户内存 `addr` 读入 `dst`，允许缺页
    fn copy_from_user(&self, dst: &mut [u8], addr: usize) -> usize;

    /// 把 `src` 写到用户内存 `addr`，允许缺页
    fn copy_to_user(&self, addr: usize, src: &[u8]) -> usize;

    /// 不允许缺页的 `copy_from_user`
    fn copy_from_user_inatomic(&self, dst: &mut [u8], addr: usize) -> usize;

    /// 不允许缺页的 `copy_to_user`
    fn copy_to_user_inatomic(&self, addr: usize, src: &[u8]) -> usize;

    /// 清零用户内存，返回清零的字节数
    fn clear_user(&self, addr: usize, len: usize) -> usize;

    /// 从页对齐的 `addr` 开始换入并 pin 住最多 `nr_pages` 个页
    ///
    /// 返回实际加入 `pages` 的页数；第一页就无法访问时返回 [`UioError::BadAddress`]。
    fn get_user_pages(
        &self,
        addr: usize,
        nr_pages: usize,
        write: bool,
        pages: &mut PinnedPages,
    ) -> Result<usize, UioError>;
}
