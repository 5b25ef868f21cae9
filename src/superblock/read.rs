//! Superblock 结构、读取和验证
//!
//! 磁盘布局（小端序，位于字节偏移 1024，共 1024 字节）：
//!
//! ```text
//! 0   magic               u32
//! 4   log_block_size      u32   块大小 = 1024 << log_block_size
//! 8   blocks_count        u64
//! 16  free_blocks_count   u64
//! 24  inodes_count        u32
//! 28  first_data_block    u32
//! 32  state               u16   FsState
//! 40  block_bitmap        u64   位图起始块
//! 48  bitmap_blocks       u32
//! 56  inode_table         u64   inode 表起始块
//! 64  inode_table_blocks  u32
//! 1020 checksum           u32   覆盖 [0, 1020)
//! ```

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

use crate::{
    bitmap::BlockBitmap,
    block::{BlockDev, BlockDevice},
    consts::*,
    crc,
    error::{Error, ErrorKind, Result},
};
use alloc::vec;

pub(super) const OFF_MAGIC: usize = 0;
pub(super) const OFF_LOG_BLOCK_SIZE: usize = 4;
pub(super) const OFF_BLOCKS_COUNT: usize = 8;
pub(super) const OFF_FREE_BLOCKS: usize = 16;
pub(super) const OFF_INODES_COUNT: usize = 24;
pub(super) const OFF_FIRST_DATA_BLOCK: usize = 28;
pub(super) const OFF_STATE: usize = 32;
pub(super) const OFF_BLOCK_BITMAP: usize = 40;
pub(super) const OFF_BITMAP_BLOCKS: usize = 48;
pub(super) const OFF_INODE_TABLE: usize = 56;
pub(super) const OFF_INODE_TABLE_BLOCKS: usize = 64;
pub(super) const OFF_CHECKSUM: usize = E2BLK_SUPERBLOCK_SIZE - 4;

bitflags! {
    /// 文件系统状态
    ///
    /// 对应 ext2 的 `s_state`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FsState: u16 {
        /// 干净卸载
        const VALID = 0x0001;
        /// 检测到错误
        const ERROR = 0x0002;
    }
}

/// 卷 superblock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub(super) log_block_size: u32,
    pub(super) blocks_count: u64,
    pub(super) free_blocks_count: u64,
    pub(super) inodes_count: u32,
    pub(super) first_data_block: u32,
    pub(super) state: FsState,
    pub(super) block_bitmap: u64,
    pub(super) bitmap_blocks: u32,
    pub(super) inode_table: u64,
    pub(super) inode_table_blocks: u32,
}

/// 从块设备读取 superblock
pub fn read_superblock<D: BlockDevice>(bdev: &mut BlockDev<D>) -> Result<Superblock> {
    let mut sb_buf = vec![0u8; E2BLK_SUPERBLOCK_SIZE];
    bdev.read_bytes(E2BLK_SUPERBLOCK_OFFSET, &mut sb_buf)?;
    Superblock::decode(&sb_buf)
}

impl Superblock {
    /// 按几何参数计算新卷的布局
    ///
    /// 元数据依次排在卷首：superblock 所在块、块位图、inode 表。
    pub fn with_layout(block_size: u32, blocks_count: u64, inodes_count: u32) -> Result<Self> {
        if !block_size.is_power_of_two()
            || !(E2BLK_MIN_BLOCK_SIZE..=E2BLK_MAX_BLOCK_SIZE).contains(&block_size)
        {
            return Err(Error::new(ErrorKind::InvalidInput, "Unsupported block size"));
        }
        if inodes_count < E2BLK_ROOT_INODE {
            return Err(Error::new(ErrorKind::InvalidInput, "Too few inodes"));
        }

        let log_block_size = block_size.trailing_zeros() - E2BLK_MIN_BLOCK_SIZE.trailing_zeros();
        // superblock 在 1 KiB 块卷上占用块 1，其余情况下位于块 0
        let first_data_block = if block_size == E2BLK_MIN_BLOCK_SIZE { 1 } else { 0 };
        let bs = block_size as u64;
        let bitmap_blocks = (BlockBitmap::bytes_for(blocks_count) as u64 + bs - 1) / bs;
        let table_bytes = inodes_count as u64 * E2BLK_INODE_SIZE as u64;
        let inode_table_blocks = (table_bytes + bs - 1) / bs;

        let block_bitmap = first_data_block as u64 + 1;
        let inode_table = block_bitmap + bitmap_blocks;
        let meta_end = inode_table + inode_table_blocks;
        if meta_end >= blocks_count {
            return Err(Error::new(
                ErrorKind::NoSpace,
                "Volume too small for its metadata",
            ));
        }

        Ok(Self {
            log_block_size,
            blocks_count,
            free_blocks_count: blocks_count - meta_end,
            inodes_count,
            first_data_block,
            state: FsState::VALID,
            block_bitmap,
            bitmap_blocks: bitmap_blocks as u32,
            inode_table,
            inode_table_blocks: inode_table_blocks as u32,
        })
    }

    /// 从磁盘字节解码并验证
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < E2BLK_SUPERBLOCK_SIZE {
            return Err(Error::new(ErrorKind::InvalidInput, "Superblock buffer too small"));
        }
        if LittleEndian::read_u32(&buf[OFF_MAGIC..]) != E2BLK_SUPERBLOCK_MAGIC {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Invalid superblock magic number",
            ));
        }
        let stored = LittleEndian::read_u32(&buf[OFF_CHECKSUM..]);
        if crc::checksum(&buf[..OFF_CHECKSUM]) != stored {
            return Err(Error::new(ErrorKind::Corrupted, "Superblock checksum mismatch"));
        }

        let sb = Self {
            log_block_size: LittleEndian::read_u32(&buf[OFF_LOG_BLOCK_SIZE..]),
            blocks_count: LittleEndian::read_u64(&buf[OFF_BLOCKS_COUNT..]),
            free_blocks_count: LittleEndian::read_u64(&buf[OFF_FREE_BLOCKS..]),
            inodes_count: LittleEndian::read_u32(&buf[OFF_INODES_COUNT..]),
            first_data_block: LittleEndian::read_u32(&buf[OFF_FIRST_DATA_BLOCK..]),
            state: FsState::from_bits_retain(LittleEndian::read_u16(&buf[OFF_STATE..])),
            block_bitmap: LittleEndian::read_u64(&buf[OFF_BLOCK_BITMAP..]),
            bitmap_blocks: LittleEndian::read_u32(&buf[OFF_BITMAP_BLOCKS..]),
            inode_table: LittleEndian::read_u64(&buf[OFF_INODE_TABLE..]),
            inode_table_blocks: LittleEndian::read_u32(&buf[OFF_INODE_TABLE_BLOCKS..]),
        };
        sb.check()?;
        Ok(sb)
    }

    /// 检查几何参数的合理性
    pub fn check(&self) -> Result<()> {
        if self.log_block_size > 6 {
            return Err(Error::new(ErrorKind::Corrupted, "Invalid log block size"));
        }
        if self.meta_end() >= self.blocks_count
            || (self.first_data_block as u64) >= self.block_bitmap
        {
            return Err(Error::new(ErrorKind::Corrupted, "Inconsistent metadata layout"));
        }
        let needed = BlockBitmap::bytes_for(self.blocks_count) as u64;
        if (self.bitmap_blocks as u64) * (self.block_size() as u64) < needed {
            return Err(Error::new(ErrorKind::Corrupted, "Block bitmap area too small"));
        }
        Ok(())
    }

    /// 获取块大小
    pub fn block_size(&self) -> u32 {
        E2BLK_MIN_BLOCK_SIZE << self.log_block_size
    }

    /// 总块数
    pub fn blocks_count(&self) -> u64 {
        self.blocks_count
    }

    /// 空闲块数
    pub fn free_blocks_count(&self) -> u64 {
        self.free_blocks_count
    }

    /// inode 总数
    pub fn inodes_count(&self) -> u32 {
        self.inodes_count
    }

    /// 第一个数据块
    pub fn first_data_block(&self) -> u32 {
        self.first_data_block
    }

    /// 文件系统状态
    pub fn state(&self) -> FsState {
        self.state
    }

    /// 块位图起始块
    pub fn block_bitmap(&self) -> u64 {
        self.block_bitmap
    }

    /// 块位图占用块数
    pub fn bitmap_blocks(&self) -> u32 {
        self.bitmap_blocks
    }

    /// inode 表起始块
    pub fn inode_table(&self) -> u64 {
        self.inode_table
    }

    /// inode 表占用块数
    pub fn inode_table_blocks(&self) -> u32 {
        self.inode_table_blocks
    }

    /// 元数据之后的第一个块
    pub fn meta_end(&self) -> u64 {
        self.inode_table + self.inode_table_blocks as u64
    }

    /// 卷是否干净
    pub fn is_clean(&self) -> bool {
        self.state.contains(FsState::VALID) && !self.state.contains(FsState::ERROR)
    }

    /// 是否需要先运行一致性检查
    ///
    /// 对应 e2blk 的 `need_check()`
    pub fn needs_check(&self) -> bool {
        !self.is_clean() || self.free_blocks_count > self.blocks_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_1k_blocks() {
        let sb = Superblock::with_layout(1024, 1000, 32).unwrap();
        assert_eq!(sb.first_data_block(), 1);
        assert_eq!(sb.block_bitmap(), 2);
        assert_eq!(sb.bitmap_blocks(), 1);
        assert_eq!(sb.inode_table(), 3);
        // 32 * 128 = 4096 字节 = 4 块
        assert_eq!(sb.inode_table_blocks(), 4);
        assert_eq!(sb.meta_end(), 7);
        assert_eq!(sb.free_blocks_count(), 993);
    }

    #[test]
    fn test_layout_4k_blocks() {
        let sb = Superblock::with_layout(4096, 256, 16).unwrap();
        assert_eq!(sb.first_data_block(), 0);
        assert_eq!(sb.block_bitmap(), 1);
        assert_eq!(sb.block_size(), 4096);
    }

    #[test]
    fn test_layout_rejects_bad_geometry() {
        assert!(Superblock::with_layout(1000, 1000, 32).is_err());
        assert!(Superblock::with_layout(1024, 5, 32).is_err());
        assert!(Superblock::with_layout(1024, 1000, 1).is_err());
    }

    #[test]
    fn test_needs_check() {
        let mut sb = Superblock::with_layout(1024, 1000, 32).unwrap();
        assert!(!sb.needs_check());

        sb.set_state(FsState::VALID | FsState::ERROR);
        assert!(sb.needs_check());

        sb.set_state(FsState::empty());
        assert!(sb.needs_check());

        sb.set_state(FsState::VALID);
        sb.set_free_blocks_count(5000);
        assert!(sb.needs_check());
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let sb = Superblock::with_layout(1024, 1000, 32).unwrap();
        let mut buf = vec![0u8; E2BLK_SUPERBLOCK_SIZE];
        sb.encode(&mut buf);
        assert_eq!(Superblock::decode(&buf).unwrap(), sb);

        buf[OFF_BLOCKS_COUNT] ^= 1;
        let err = Superblock::decode(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);

        buf[OFF_MAGIC] = 0;
        assert!(Superblock::decode(&buf).is_err());
    }
}
