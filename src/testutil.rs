//! 测试夹具

use alloc::vec;

use crate::block::MemoryDevice;
use crate::fs::{DiskVolume, FormatOptions, OpenOptions, Volume};

/// 1000 个 1 KiB 块、32 个 inode 的空卷；元数据占用块 1..7
pub(crate) fn volume() -> DiskVolume<MemoryDevice> {
    let options = FormatOptions {
        inodes_count: 32,
        open: OpenOptions {
            cache_blocks: 16,
            ..OpenOptions::default()
        },
    };
    DiskVolume::format(MemoryDevice::new(1024, 1000), &options).unwrap()
}

/// 用 `byte` 填满一个块
pub(crate) fn fill_block<V: Volume>(vol: &mut V, block: u64, byte: u8) {
    let buf = vec![byte; vol.block_size() as usize];
    vol.write_block(block, &buf).unwrap();
}

/// 块的每个字节是否都是 `byte`
pub(crate) fn block_is_filled<V: Volume>(vol: &mut V, block: u64, byte: u8) -> bool {
    let mut buf = vec![0u8; vol.block_size() as usize];
    vol.read_block(block, &mut buf).unwrap();
    buf.iter().all(|&b| b == byte)
}
