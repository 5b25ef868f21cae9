//! Superblock 写入和更新

use byteorder::{ByteOrder, LittleEndian};

use super::read::*;
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    crc,
    error::Result,
};
use alloc::vec;

/// 将 superblock 写回块设备（重新计算校验和）
pub fn write_superblock<D: BlockDevice>(bdev: &mut BlockDev<D>, sb: &Superblock) -> Result<()> {
    let mut sb_buf = vec![0u8; E2BLK_SUPERBLOCK_SIZE];
    sb.encode(&mut sb_buf);
    bdev.write_bytes(E2BLK_SUPERBLOCK_OFFSET, &sb_buf)
}

impl Superblock {
    /// 编码到磁盘格式，`buf` 至少 `E2BLK_SUPERBLOCK_SIZE` 字节
    pub fn encode(&self, buf: &mut [u8]) {
        let buf = &mut buf[..E2BLK_SUPERBLOCK_SIZE];
        buf.fill(0);
        LittleEndian::write_u32(&mut buf[OFF_MAGIC..], E2BLK_SUPERBLOCK_MAGIC);
        LittleEndian::write_u32(&mut buf[OFF_LOG_BLOCK_SIZE..], self.log_block_size);
        LittleEndian::write_u64(&mut buf[OFF_BLOCKS_COUNT..], self.blocks_count);
        LittleEndian::write_u64(&mut buf[OFF_FREE_BLOCKS..], self.free_blocks_count);
        LittleEndian::write_u32(&mut buf[OFF_INODES_COUNT..], self.inodes_count);
        LittleEndian::write_u32(&mut buf[OFF_FIRST_DATA_BLOCK..], self.first_data_block);
        LittleEndian::write_u16(&mut buf[OFF_STATE..], self.state.bits());
        LittleEndian::write_u64(&mut buf[OFF_BLOCK_BITMAP..], self.block_bitmap);
        LittleEndian::write_u32(&mut buf[OFF_BITMAP_BLOCKS..], self.bitmap_blocks);
        LittleEndian::write_u64(&mut buf[OFF_INODE_TABLE..], self.inode_table);
        LittleEndian::write_u32(&mut buf[OFF_INODE_TABLE_BLOCKS..], self.inode_table_blocks);
        let csum = crc::checksum(&buf[..OFF_CHECKSUM]);
        LittleEndian::write_u32(&mut buf[OFF_CHECKSUM..], csum);
    }

    /// 设置空闲块数
    pub fn set_free_blocks_count(&mut self, count: u64) {
        self.free_blocks_count = count;
    }

    /// 设置文件系统状态
    pub fn set_state(&mut self, state: FsState) {
        self.state = state;
    }

    /// 写回块设备
    pub fn write<D: BlockDevice>(&self, bdev: &mut BlockDev<D>) -> Result<()> {
        write_superblock(bdev, self)
    }
}
