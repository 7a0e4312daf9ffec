//! 用户态 ABI 结构
//!
//! 这些类型与用户程序共享内存布局，必须保持 `#[repr(C)]`。

mod iovec;

pub use iovec::{CompatIoVec, IoVec};
