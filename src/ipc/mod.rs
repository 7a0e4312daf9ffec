//! 进程间通信
//!
//! 目前只有管道：由页缓冲组成的环形队列，写入端可以是 [`crate::uio::IovIter`]。

pub mod pipe;

pub use pipe::{Pipe, PipeBuffer};
