use super::*;
use crate::ipc::Pipe;
use crate::uio::{Checksum, Direction, InetCsum, KVec};

/// 按 `split` 切分的 kvec 段
fn split_buffers(split: &[usize]) -> Vec<Vec<u8>> {
    split.iter().map(|&n| alloc::vec![0u8; n]).collect()
}

test_case!(test_checksum_independent_of_segmentation, {
    let data = pattern(101);
    let mut expected = InetCsum::new();
    expected.update(&data);

    for split in [&[101][..], &[1, 100], &[3, 5, 1, 7, 85], &[50, 0, 51]] {
        let mut bufs = split_buffers(split);
        let kvec: Vec<KVec<'_>> = bufs.iter_mut().map(|b| KVec::new(b)).collect();

        let mut csum = InetCsum::new();
        let mut iter = IovIter::new_kvec(Direction::Dest, &kvec, data.len());
        kassert!(iter.csum_and_copy_to_iter(&data, &mut csum) == data.len());
        kassert!(csum.finish() == expected.finish());

        let mut csum = InetCsum::new();
        let mut out = alloc::vec![0u8; data.len()];
        let mut iter = IovIter::new_kvec(Direction::Source, &kvec, data.len());
        kassert!(iter.csum_and_copy_from_iter_full(&mut out, &mut csum));
        kassert!(out == data);
        kassert!(csum.finish() == expected.finish());
    }
});

test_case!(test_checksum_covers_only_copied_bytes, {
    let mm = user_space(1);
    mm.copy_to_user(UBASE + PAGE_SIZE - 4, b"\x01\x02\x03\x04");
    let iov = [IoVec::new(UBASE + PAGE_SIZE - 4, 8)];
    let mut iter = IovIter::new_iovec(Direction::Source, &mm, &iov, 8);

    let mut csum = InetCsum::new();
    let mut out = [0u8; 8];
    kassert!(iter.csum_and_copy_from_iter(&mut out, &mut csum) == 4);
    let mut expected = InetCsum::new();
    expected.update(b"\x01\x02\x03\x04");
    kassert!(csum == expected);
    kassert!(iter.count() == 4);
});

test_case!(test_checksum_full_refuses_when_short, {
    let mut a = pattern(4);
    let kvec = [KVec::new(&mut a)];
    let mut iter = IovIter::new_kvec(Direction::Source, &kvec, 4);
    let mut csum = InetCsum::new();
    let mut out = [0u8; 5];
    kassert!(!iter.csum_and_copy_from_iter_full(&mut out, &mut csum));
    kassert!(csum == InetCsum::new());
});

test_case!(test_checksum_into_pipe, {
    let pipe = Pipe::new();
    let data = pattern(5000);
    let mut csum = InetCsum::new();
    let mut iter = IovIter::new_pipe(Direction::Dest, &pipe, usize::MAX).unwrap();
    kassert!(iter.csum_and_copy_to_iter(&data, &mut csum) == 5000);
    let mut expected = InetCsum::new();
    expected.update(&data);
    kassert!(csum.finish() == expected.finish());
});

test_case!(test_checksum_trait_object, {
    let mut a = [0u8; 4];
    let kvec = [KVec::new(&mut a)];
    let mut iter = IovIter::new_kvec(Direction::Dest, &kvec, 4);
    let mut inet = InetCsum::new();
    let csum: &mut dyn Checksum = &mut inet;
    kassert!(iter.csum_and_copy_to_iter(b"\xff\xff\x00\x01", csum) == 4);
    kassert!(inet.partial() == 0x0001);
});
