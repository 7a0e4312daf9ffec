//! I/O 向量迭代器
//!
//! [`IovIter`] 在一组段上维护一个游标，并提供在游标处拷贝、清零、前移、回退
//! 以及提取页的操作。四种后备存储：
//!
//! | 类型 | 段 | 构造函数 |
//! |---|---|---|
//! | 用户 iovec | [`IoVec`](crate::uapi::IoVec) | [`IovIter::new_iovec`]、[`import_iovec`] |
//! | 内核 kvec | [`KVec`] | [`IovIter::new_kvec`] |
//! | 页片段 | [`BioVec`] | [`IovIter::new_bvec`] |
//! | 管道 | [`Pipe`](crate::ipc::Pipe) 中的页缓冲 | [`IovIter::new_pipe`] |
//!
//! # 示例
//!
//! ```
//! use uio::{Direction, IovIter, KVec};
//!
//! let mut a = [0u8; 4];
//! let mut b = [0u8; 4];
//! let kvec = [KVec::new(&mut a), KVec::new(&mut b)];
//! let mut iter = IovIter::new_kvec(Direction::Dest, &kvec, 8);
//! assert_eq!(iter.copy_to_iter(b"abcdef"), 6);
//! assert_eq!(iter.count(), 2);
//! assert_eq!(kvec[1].to_vec(), b"ef\0\0");
//! ```

mod copy;
mod csum;
mod import;
mod iter;
mod pages;
mod pipe;
mod segment;

#[cfg(test)]
mod tests;

pub use csum::{Checksum, InetCsum};
pub use import::{
    IovecArray, compat_import_iovec, import_iovec, import_single_range, iov_length, iov_shorten,
};
pub use iter::{Direction, IovIter, IterType};
pub use pages::PageExtent;
pub use segment::{BioVec, KVec};
