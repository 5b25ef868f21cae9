//! Inode 读取和操作
//!
//! 磁盘上的 inode 记录（小端序，128 字节）：
//!
//! ```text
//! 0   mode          u16
//! 2   links_count   u16
//! 4   flags         u32
//! 8   size          u64
//! 16  blocks_count  u32   已分配的块数（含间接块）
//! 20  block[15]     u32 x 15
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    superblock::Superblock,
};
use alloc::vec;

pub(super) const OFF_MODE: usize = 0;
pub(super) const OFF_LINKS: usize = 2;
pub(super) const OFF_FLAGS: usize = 4;
pub(super) const OFF_SIZE: usize = 8;
pub(super) const OFF_BLOCKS_COUNT: usize = 16;
pub(super) const OFF_BLOCK: usize = 20;

/// 计算 inode 在设备上的字节偏移
///
/// inode 编号从 1 开始，0 表示无效 inode
pub(super) fn inode_offset(sb: &Superblock, inode_num: u32) -> Result<u64> {
    if inode_num == 0 || inode_num > sb.inodes_count() {
        return Err(Error::new(ErrorKind::NotFound, "Inode number out of range").for_inode(inode_num));
    }
    Ok(sb.inode_table() * sb.block_size() as u64
        + (inode_num as u64 - 1) * E2BLK_INODE_SIZE as u64)
}

/// 从 inode 表读取 inode
///
/// # 参数
///
/// * `bdev` - 块设备引用
/// * `sb` - superblock 引用
/// * `inode_num` - inode 编号（从 1 开始）
pub fn read_inode<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    inode_num: u32,
) -> Result<Inode> {
    let offset = inode_offset(sb, inode_num)?;
    let mut inode_buf = vec![0u8; E2BLK_INODE_SIZE];
    bdev.read_bytes(offset, &mut inode_buf)
        .map_err(|e| e.for_inode(inode_num))?;
    Ok(Inode::decode(&inode_buf))
}

/// 内存中的 inode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub(super) mode: u16,
    pub(super) links_count: u16,
    pub(super) flags: u32,
    pub(super) size: u64,
    pub(super) blocks_count: u32,
    pub(super) block: [u32; E2BLK_INODE_BLOCKS],
}

impl Inode {
    /// 创建链接数为 1、没有任何块的 inode
    pub fn new(mode: u16) -> Self {
        Self {
            mode,
            links_count: 1,
            flags: 0,
            size: 0,
            blocks_count: 0,
            block: [0; E2BLK_INODE_BLOCKS],
        }
    }

    /// 从磁盘记录解码，`buf` 至少 `E2BLK_INODE_SIZE` 字节
    pub fn decode(buf: &[u8]) -> Self {
        let mut block = [0u32; E2BLK_INODE_BLOCKS];
        LittleEndian::read_u32_into(
            &buf[OFF_BLOCK..OFF_BLOCK + 4 * E2BLK_INODE_BLOCKS],
            &mut block,
        );
        Self {
            mode: LittleEndian::read_u16(&buf[OFF_MODE..]),
            links_count: LittleEndian::read_u16(&buf[OFF_LINKS..]),
            flags: LittleEndian::read_u32(&buf[OFF_FLAGS..]),
            size: LittleEndian::read_u64(&buf[OFF_SIZE..]),
            blocks_count: LittleEndian::read_u32(&buf[OFF_BLOCKS_COUNT..]),
            block,
        }
    }

    /// 获取文件模式（类型 + 权限）
    pub fn mode(&self) -> u16 {
        self.mode
    }

    /// 获取链接计数
    pub fn links_count(&self) -> u16 {
        self.links_count
    }

    /// 获取标志
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// 获取文件大小
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 已分配的块数（含间接块）
    pub fn blocks_count(&self) -> u32 {
        self.blocks_count
    }

    /// 检查是否是目录
    pub fn is_dir(&self) -> bool {
        self.mode & E2BLK_INODE_MODE_TYPE_MASK == E2BLK_INODE_MODE_DIRECTORY
    }

    /// 检查是否是普通文件
    pub fn is_file(&self) -> bool {
        self.mode & E2BLK_INODE_MODE_TYPE_MASK == E2BLK_INODE_MODE_FILE
    }

    /// 检查是否是符号链接
    pub fn is_symlink(&self) -> bool {
        self.mode & E2BLK_INODE_MODE_TYPE_MASK == E2BLK_INODE_MODE_SOFTLINK
    }

    /// 块指针数组中的原始值
    pub fn block_pointer(&self, slot: usize) -> u32 {
        self.block.get(slot).copied().unwrap_or(0)
    }

    /// 获取直接块指针
    pub fn get_direct_block(&self, index: usize) -> Option<u32> {
        if index < E2BLK_INODE_DIRECT_BLOCKS {
            Some(self.block[index])
        } else {
            None
        }
    }

    /// 获取间接块指针
    pub fn get_indirect_block(&self) -> u32 {
        self.block[E2BLK_INODE_INDIRECT_BLOCK]
    }

    /// 获取二级间接块指针
    pub fn get_double_indirect_block(&self) -> u32 {
        self.block[E2BLK_INODE_DOUBLE_INDIRECT_BLOCK]
    }

    /// 获取三级间接块指针
    pub fn get_triple_indirect_block(&self) -> u32 {
        self.block[E2BLK_INODE_TRIPLE_INDIRECT_BLOCK]
    }

    /// inode 的块指针是否真正指向数据块
    ///
    /// 对应 libext2fs 的 `ext2fs_inode_has_valid_blocks2()`：
    /// 只有目录、普通文件和符号链接有块；没有分配块的符号链接是快速符号链接，
    /// 目标路径直接存放在指针数组里。
    pub fn has_valid_blocks(&self) -> bool {
        if !self.is_dir() && !self.is_file() && !self.is_symlink() {
            return false;
        }
        if self.is_symlink() && self.blocks_count == 0 {
            return false;
        }
        self.block.iter().any(|&b| b != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_checks() {
        assert!(Inode::new(E2BLK_INODE_MODE_DIRECTORY | 0o755).is_dir());
        assert!(Inode::new(E2BLK_INODE_MODE_FILE | 0o644).is_file());
        assert!(Inode::new(E2BLK_INODE_MODE_SOFTLINK).is_symlink());
    }

    #[test]
    fn test_has_valid_blocks() {
        let mut file = Inode::new(E2BLK_INODE_MODE_FILE);
        assert!(!file.has_valid_blocks());
        file.set_block_pointer(3, 100);
        assert!(file.has_valid_blocks());

        // 快速符号链接：指针数组里是路径字节
        let mut link = Inode::new(E2BLK_INODE_MODE_SOFTLINK);
        link.set_block_pointer(0, 0x6F6F_662F);
        assert!(!link.has_valid_blocks());
        link.set_blocks_count(1);
        assert!(link.has_valid_blocks());

        let mut fifo = Inode::new(0x1000);
        fifo.set_block_pointer(0, 100);
        assert!(!fifo.has_valid_blocks());
    }

    #[test]
    fn test_encode_decode() {
        let mut inode = Inode::new(E2BLK_INODE_MODE_DIRECTORY | 0o700);
        inode.set_size(3 * 1024);
        inode.set_blocks_count(4);
        inode.set_block_pointer(0, 17);
        inode.set_block_pointer(E2BLK_INODE_INDIRECT_BLOCK, 900);

        let mut buf = vec![0u8; E2BLK_INODE_SIZE];
        inode.encode(&mut buf);
        assert_eq!(Inode::decode(&buf), inode);
        assert_eq!(buf[OFF_BLOCK], 17);
    }
}
