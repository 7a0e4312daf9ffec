//! constants for the I/O vector layer (platform-independent)

// about memory management
/// Size of a page frame in bytes.
pub const PAGE_SIZE: usize = 4096;
/// `log2(PAGE_SIZE)`
pub const PAGE_SHIFT: usize = 12;
/// Mask selecting the page-aligned part of an address.
pub const PAGE_MASK: usize = !(PAGE_SIZE - 1);

/// Top of the user address space (SV39 lower half).
///
/// `access_ok` rejects any range reaching beyond this address.
pub const USER_SPACE_TOP: usize = 0x40_0000_0000;

// vectored I/O limits (same values as the Linux ABI)

/// Number of segments an import keeps on the caller's stack before
/// spilling to the heap.
pub const UIO_FASTIOV: usize = 8;
/// Maximum number of segments accepted from user space.
pub const UIO_MAXIOV: usize = 1024;
/// Largest byte count a single read/write may transfer.
pub const MAX_RW_COUNT: usize = (i32::MAX as usize) & PAGE_MASK;

/// Default ring size of a pipe, in buffers. Must be a power of two.
pub const PIPE_DEF_BUFFERS: usize = 16;

/// How many times the atomic user-copy fast path is retried after a
/// fault-in before falling back to the faulting slow path.
pub const FAULT_IN_RETRIES: usize = 2;
