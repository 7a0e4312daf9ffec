//! Memory management collaborators of the I/O vector layer
//!
//! # Components
//!
//! - [`Page`] / [`PageRef`]: a reference-counted physical page frame
//! - [`FrameAllocator`]: page frame allocator with an optional budget
//! - [`PinnedPages`]: RAII guard keeping extracted pages pinned
//! - [`UserAccess`]: fault-in and copy primitives for user memory
//! - [`UserSpace`]: an in-memory user address space implementing [`UserAccess`]

pub mod address;
mod frame_allocator;
mod page;
mod pin;
mod uaccess;
mod user_space;

pub use frame_allocator::{FRAME_ALLOCATOR, FrameAllocator};
pub use page::{Page, PageRef};
pub use pin::PinnedPages;
pub use uaccess::UserAccess;
pub use user_space::{MapPermission, UserSpace};
