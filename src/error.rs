//! I/O 向量错误类型
//!
//! 定义了与 POSIX 兼容的错误码，可通过 [`UioError::to_errno()`] 转换为系统调用错误码。
//!
//! 注意：部分拷贝不是错误，拷贝类操作直接返回实际搬运的字节数。

use core::fmt;

/// I/O 向量错误类型
///
/// 各错误码对应标准 POSIX errno 值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UioError {
    /// -EINVAL(22): 无效参数（段数非法、长度溢出、方向错误）
    InvalidArgument,
    /// -EFAULT(14): 用户地址无效或无法换入
    BadAddress,
    /// -ENOMEM(12): 页或索引数组分配失败
    NoMemory,
    /// -EOPNOTSUPP(95): 该后备存储类型不支持此操作
    NotSupported,
    /// -EAGAIN(11): 管道已满
    WouldBlock,
}

impl UioError {
    /// 转换为系统调用错误码（负数）
    pub fn to_errno(&self) -> isize {
        match self {
            UioError::WouldBlock => -11,
            UioError::NoMemory => -12,
            UioError::BadAddress => -14,
            UioError::InvalidArgument => -22,
            UioError::NotSupported => -95,
        }
    }
}

impl fmt::Display for UioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            UioError::InvalidArgument => "invalid argument",
            UioError::BadAddress => "bad address",
            UioError::NoMemory => "out of memory",
            UioError::NotSupported => "operation not supported",
            UioError::WouldBlock => "resource temporarily unavailable",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    test_case!(test_error_codes, {
        kassert!(UioError::InvalidArgument.to_errno() == -22);
        kassert!(UioError::BadAddress.to_errno() == -14);
        kassert!(UioError::NoMemory.to_errno() == -12);
        kassert!(UioError::NotSupported.to_errno() == -95);
    });

    test_case!(test_error_display, {
        let msg = alloc::format!("{}", UioError::BadAddress);
        kassert!(msg == "bad address");
    });
}
