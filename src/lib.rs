//! 通用 I/O 向量迭代器
//!
//! 上层 I/O 代码（文件读写、网络收发、块设备 I/O）通过 [`uio::IovIter`]
//! 在调用方提供的缓冲区与内核之间搬运数据，而不必关心缓冲区究竟是：
//!
//! - 用户地址空间中的 iovec 数组；
//! - 内核内存中的 kvec 数组；
//! - 物理页片段（bio_vec）数组；
//! - 管道的页缓冲队列。
//!
//! 迭代器只借用这些后备存储，从不拥有它们。

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[cfg(test)]
#[macro_use]
mod testing;

#[macro_use]
pub mod log;

pub mod config;
pub mod error;
pub mod ipc;
pub mod mm;
pub mod uapi;
pub mod uio;

pub use error::UioError;
pub use uio::{BioVec, Direction, IovIter, IterType, KVec};
