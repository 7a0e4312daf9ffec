//! Importing user-supplied iovec arrays
//!
//! 用户传入的段数组在拷贝进内核并逐段检查之后，才能用来构造迭代器。
//! 段数不超过 [`UIO_FASTIOV`] 时存放在调用者提供的 [`IovecArray`] 内联数组中，
//! 否则分配堆内存。

use core::slice;

use alloc::vec::Vec;

use super::iter::{Direction, IovIter};
use crate::config::{MAX_RW_COUNT, UIO_FASTIOV, UIO_MAXIOV};
use crate::error::UioError;
use crate::mm::UserAccess;
use crate::uapi::{CompatIoVec, IoVec};

/// 导入后的段数组存储
#[derive(Debug)]
pub struct IovecArray {
    fast: [IoVec; UIO_FASTIOV],
    heap: Vec<IoVec>,
    nr: usize,
    on_heap: bool,
}

impl IovecArray {
    /// 空的段数组，可以放在栈上
    pub const fn new() -> Self {
        IovecArray {
            fast: [IoVec::new(0, 0); UIO_FASTIOV],
            heap: Vec::new(),
            nr: 0,
            on_heap: false,
        }
    }

    /// 已导入的段
    pub fn as_slice(&self) -> &[IoVec] {
        if self.on_heap {
            &self.heap
        } else {
            &self.fast[..self.nr]
        }
    }

    /// 段数组是否分配在堆上
    pub fn is_on_heap(&self) -> bool {
        self.on_heap
    }

    fn prepare(&mut self, nr: usize) -> Result<&mut [IoVec], UioError> {
        self.nr = nr;
        self.heap.clear();
        if nr <= UIO_FASTIOV {
            self.on_heap = false;
            return Ok(&mut self.fast[..nr]);
        }
        self.heap.try_reserve_exact(nr).map_err(|_| {
            pr_err!("uio: no memory for {} segments", nr);
            UioError::NoMemory
        })?;
        self.heap.resize(nr, IoVec::default());
        self.on_heap = true;
        pr_debug!("uio: {} segments spilled to the heap", nr);
        Ok(&mut self.heap)
    }
}

impl Default for IovecArray {
    fn default() -> Self {
        Self::new()
    }
}

/// 段长度之和，溢出时返回 None
pub fn iov_length(iov: &[IoVec]) -> Option<usize> {
    iov.iter()
        .try_fold(0usize, |total, v| total.checked_add(v.iov_len))
}

/// 把段数组缩短为最多覆盖 `to` 字节，返回保留的段数
pub fn iov_shorten(iov: &mut [IoVec], to: usize) -> usize {
    let mut len = 0usize;
    for (seg, v) in iov.iter_mut().enumerate() {
        if len.saturating_add(v.iov_len) >= to {
            v.iov_len = to - len;
            return seg + 1;
        }
        len += v.iov_len;
    }
    iov.len()
}

/// 读取并检查用户段数组，返回总字节数
fn copy_check_uvector<T>(
    mm: &dyn UserAccess,
    uvector: usize,
    nr_segs: usize,
    storage: &mut IovecArray,
    decode: impl Fn(&[u8; 16]) -> IoVec,
) -> Result<usize, UioError> {
    let elem = core::mem::size_of::<T>();
    if nr_segs == 0 || nr_segs > UIO_MAXIOV {
        return Err(UioError::InvalidArgument);
    }
    let iov = storage.prepare(nr_segs)?;
    let mut raw = [0u8; 16];
    for (i, v) in iov.iter_mut().enumerate() {
        let addr = uvector
            .checked_add(i * elem)
            .ok_or(UioError::BadAddress)?;
        if mm.copy_from_user(&mut raw[..elem], addr) != elem {
            return Err(UioError::BadAddress);
        }
        *v = decode(&raw);
    }

    let mut total = 0usize;
    let mut raw_total = 0usize;
    for v in iov.iter_mut() {
        if v.iov_len > isize::MAX as usize {
            return Err(UioError::InvalidArgument);
        }
        raw_total = raw_total
            .checked_add(v.iov_len)
            .ok_or(UioError::InvalidArgument)?;
        if !mm.access_ok(v.iov_base, v.iov_len) {
            return Err(UioError::BadAddress);
        }
        if v.iov_len > MAX_RW_COUNT - total {
            v.iov_len = MAX_RW_COUNT - total;
        }
        total += v.iov_len;
    }
    Ok(total)
}

/// 从用户内存导入 `nr_segs` 个段并构造用户 iovec 迭代器
///
/// 段数为 0 或超过 [`UIO_MAXIOV`]、段长度超过 `isize::MAX` 或长度之和溢出时返回
/// [`UioError::InvalidArgument`]；段数组或某个段不可访问时返回 [`UioError::BadAddress`]。
/// 总长度被截到 [`MAX_RW_COUNT`]。
pub fn import_iovec<'a>(
    dir: Direction,
    mm: &'a dyn UserAccess,
    uvector: usize,
    nr_segs: usize,
    storage: &'a mut IovecArray,
) -> Result<IovIter<'a>, UioError> {
    let total = copy_check_uvector::<IoVec>(mm, uvector, nr_segs, storage, |raw| {
        let mut buf = [0u8; IoVec::SIZE];
        buf.copy_from_slice(&raw[..IoVec::SIZE]);
        IoVec::from_ne_bytes(&buf)
    })?;
    let storage: &'a IovecArray = storage;
    Ok(IovIter::new_iovec(dir, mm, storage.as_slice(), total))
}

/// 32 位兼容进程的 [`import_iovec`]
pub fn compat_import_iovec<'a>(
    dir: Direction,
    mm: &'a dyn UserAccess,
    uvector: usize,
    nr_segs: usize,
    storage: &'a mut IovecArray,
) -> Result<IovIter<'a>, UioError> {
    let total = copy_check_uvector::<CompatIoVec>(mm, uvector, nr_segs, storage, |raw| {
        let mut buf = [0u8; CompatIoVec::SIZE];
        buf.copy_from_slice(&raw[..CompatIoVec::SIZE]);
        CompatIoVec::from_ne_bytes(&buf).into()
    })?;
    let storage: &'a IovecArray = storage;
    Ok(IovIter::new_iovec(dir, mm, storage.as_slice(), total))
}

/// 由单个用户地址范围构造迭代器，长度被截到 [`MAX_RW_COUNT`]
pub fn import_single_range<'a>(
    dir: Direction,
    mm: &'a dyn UserAccess,
    buf: usize,
    len: usize,
    iov: &'a mut IoVec,
) -> Result<IovIter<'a>, UioError> {
    let len = len.min(MAX_RW_COUNT);
    if !mm.access_ok(buf, len) {
        return Err(UioError::BadAddress);
    }
    *iov = IoVec::new(buf, len);
    let iov: &'a IoVec = iov;
    Ok(IovIter::new_iovec(dir, mm, slice::from_ref(iov), len))
}
