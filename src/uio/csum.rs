//! Checksum-combined copies
//!
//! 校验和按拷贝顺序逐字节累加，结果与段的切分方式无关。

use super::iter::{Direction, IovIter};

/// 校验和累加器
pub trait Checksum {
    /// 按顺序累加 `data`
    fn update(&mut self, data: &[u8]);
}

/// Internet checksum (RFC 1071)
///
/// 记录已累加字节数的奇偶，跨段累加时 16 位字的边界保持不变。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InetCsum {
    sum: u64,
    odd: bool,
}

fn fold(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

impl InetCsum {
    /// 空的累加器
    pub const fn new() -> Self {
        InetCsum { sum: 0, odd: false }
    }

    /// 折叠后的部分和
    pub fn partial(&self) -> u16 {
        fold(self.sum)
    }

    /// 最终校验和（部分和取反）
    pub fn finish(&self) -> u16 {
        !self.partial()
    }
}

impl Checksum for InetCsum {
    fn update(&mut self, data: &[u8]) {
        let mut sum = self.sum;
        for &byte in data {
            sum += if self.odd {
                byte as u64
            } else {
                (byte as u64) << 8
            };
            self.odd = !self.odd;
        }
        self.sum = fold(sum) as u64;
    }
}

impl IovIter<'_> {
    /// 拷贝进迭代器，同时把拷贝的字节累加进 `csum`
    pub fn csum_and_copy_to_iter<C>(&mut self, src: &[u8], csum: &mut C) -> usize
    where
        C: Checksum + ?Sized,
    {
        if !self.check_dir(Direction::Dest, "csum_and_copy_to_iter") {
            return 0;
        }
        self.iterate_and_advance(src.len(), |chunk, done| {
            let part = &src[done..done + chunk.len()];
            let n = chunk.write(part);
            csum.update(&part[..n]);
            n
        })
    }

    /// 从迭代器拷贝出来，同时把拷贝的字节累加进 `csum`
    pub fn csum_and_copy_from_iter<C>(&mut self, dst: &mut [u8], csum: &mut C) -> usize
    where
        C: Checksum + ?Sized,
    {
        if !self.check_dir(Direction::Source, "csum_and_copy_from_iter") {
            return 0;
        }
        self.iterate_and_advance(dst.len(), |chunk, done| {
            let part = &mut dst[done..done + chunk.len()];
            let n = chunk.read(part);
            csum.update(&part[..n]);
            n
        })
    }

    /// 剩余字节数不足时不拷贝；否则返回是否全部拷贝成功
    pub fn csum_and_copy_from_iter_full<C>(&mut self, dst: &mut [u8], csum: &mut C) -> bool
    where
        C: Checksum + ?Sized,
    {
        if self.count < dst.len() {
            return false;
        }
        self.csum_and_copy_from_iter(dst, csum) == dst.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    test_case!(test_rfc1071_example, {
        let mut csum = InetCsum::new();
        csum.update(&[0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7]);
        kassert!(csum.partial() == 0xddf2);
        kassert!(csum.finish() == 0x220d);
    });

    test_case!(test_odd_split, {
        let data = [0x12u8, 0x34, 0x56, 0x78, 0x9a];
        let mut whole = InetCsum::new();
        whole.update(&data);
        let mut split = InetCsum::new();
        split.update(&data[..1]);
        split.update(&data[1..4]);
        split.update(&data[4..]);
        kassert!(whole.finish() == split.finish());
    });
}
