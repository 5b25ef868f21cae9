//! Inode 写入和更新操作

use byteorder::{ByteOrder, LittleEndian};

use super::read::*;
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::Result,
    superblock::Superblock,
};
use alloc::vec;

/// 写入 inode 到 inode 表
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `inode_num` - inode 编号
/// * `inode` - inode 结构
pub fn write_inode<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    inode_num: u32,
    inode: &Inode,
) -> Result<()> {
    let offset = inode_offset(sb, inode_num)?;
    let mut inode_buf = vec![0u8; E2BLK_INODE_SIZE];
    inode.encode(&mut inode_buf);
    bdev.write_bytes(offset, &inode_buf)
        .map_err(|e| e.for_inode(inode_num))
}

impl Inode {
    /// 编码为磁盘记录，`buf` 至少 `E2BLK_INODE_SIZE` 字节
    pub fn encode(&self, buf: &mut [u8]) {
        let buf = &mut buf[..E2BLK_INODE_SIZE];
        buf.fill(0);
        LittleEndian::write_u16(&mut buf[OFF_MODE..], self.mode);
        LittleEndian::write_u16(&mut buf[OFF_LINKS..], self.links_count);
        LittleEndian::write_u32(&mut buf[OFF_FLAGS..], self.flags);
        LittleEndian::write_u64(&mut buf[OFF_SIZE..], self.size);
        LittleEndian::write_u32(&mut buf[OFF_BLOCKS_COUNT..], self.blocks_count);
        LittleEndian::write_u32_into(
            &self.block,
            &mut buf[OFF_BLOCK..OFF_BLOCK + 4 * E2BLK_INODE_BLOCKS],
        );
    }

    /// 设置文件模式
    pub fn set_mode(&mut self, mode: u16) {
        self.mode = mode;
    }

    /// 设置链接计数
    pub fn set_links_count(&mut self, count: u16) {
        self.links_count = count;
    }

    /// 设置文件大小
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// 设置已分配块数
    pub fn set_blocks_count(&mut self, count: u32) {
        self.blocks_count = count;
    }

    /// 设置块指针数组中的某一项
    ///
    /// 超出范围的 slot 被忽略
    pub fn set_block_pointer(&mut self, slot: usize, block: u32) {
        if let Some(p) = self.block.get_mut(slot) {
            *p = block;
        }
    }
}
