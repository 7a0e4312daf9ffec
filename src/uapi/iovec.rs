use core::mem::size_of;

/// 散布/聚集 I/O 的一个段，对应 `struct iovec`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoVec {
    /// 段起始地址
    pub iov_base: usize,
    /// 段长度（字节）
    pub iov_len: usize,
}

impl IoVec {
    /// 在用户内存中占用的字节数
    pub const SIZE: usize = size_of::<IoVec>();

    /// 描述 `[iov_base, iov_base + iov_len)` 的段
    pub const fn new(iov_base: usize, iov_len: usize) -> Self {
        IoVec { iov_base, iov_len }
    }

    /// 以本机字节序从用户数组中解码一个段
    pub fn from_ne_bytes(raw: &[u8; IoVec::SIZE]) -> Self {
        const W: usize = size_of::<usize>();
        let mut base = [0u8; W];
        let mut len = [0u8; W];
        base.copy_from_slice(&raw[..W]);
        len.copy_from_slice(&raw[W..]);
        IoVec {
            iov_base: usize::from_ne_bytes(base),
            iov_len: usize::from_ne_bytes(len),
        }
    }

    /// 按本机字节序编码
    pub fn to_ne_bytes(&self) -> [u8; IoVec::SIZE] {
        const W: usize = size_of::<usize>();
        let mut raw = [0u8; IoVec::SIZE];
        raw[..W].copy_from_slice(&self.iov_base.to_ne_bytes());
        raw[W..].copy_from_slice(&self.iov_len.to_ne_bytes());
        raw
    }
}

/// 32 位兼容进程使用的 `struct compat_iovec`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompatIoVec {
    /// 起始地址
    pub iov_base: u32,
    /// 长度
    pub iov_len: u32,
}

impl CompatIoVec {
    /// 在用户内存中的大小
    pub const SIZE: usize = size_of::<CompatIoVec>();

    /// 描述 `[iov_base, iov_base + iov_len)` 的 32 位段
    pub const fn new(iov_base: u32, iov_len: u32) -> Self {
        CompatIoVec { iov_base, iov_len }
    }

    /// 从用户内存中的原始字节解码
    pub fn from_ne_bytes(raw: &[u8; CompatIoVec::SIZE]) -> Self {
        CompatIoVec {
            iov_base: u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]),
            iov_len: u32::from_ne_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }
    }

    /// 按本机字节序编码
    pub fn to_ne_bytes(&self) -> [u8; CompatIoVec::SIZE] {
        let mut raw = [0u8; CompatIoVec::SIZE];
        raw[..4].copy_from_slice(&self.iov_base.to_ne_bytes());
        raw[4..].copy_from_slice(&self.iov_len.to_ne_bytes());
        raw
    }
}

impl From<CompatIoVec> for IoVec {
    fn from(v: CompatIoVec) -> Self {
        IoVec::new(v.iov_base as usize, v.iov_len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    test_case!(test_iovec_layout, {
        kassert!(IoVec::SIZE == 2 * size_of::<usize>());
        kassert!(CompatIoVec::SIZE == 8);
        let v = IoVec::new(0x1234, 99);
        kassert!(IoVec::from_ne_bytes(&v.to_ne_bytes()) == v);
    });

    test_case!(test_compat_widening, {
        let c = CompatIoVec::new(0xffff_0000, 7);
        let raw = c.to_ne_bytes();
        kassert!(IoVec::from(CompatIoVec::from_ne_bytes(&raw)) == IoVec::new(0xffff_0000, 7));
    });
}
