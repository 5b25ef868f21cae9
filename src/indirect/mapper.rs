//! 间接块映射器实现
//!
//! 将文件的逻辑块号映射到物理块号，并能定位、改写映射树中的任意一个指针。

use alloc::vec;

use byteorder::{ByteOrder, LittleEndian};

use super::BlockIndex;
use crate::block::{BlockDev, BlockDevice};
use crate::consts::E2BLK_INODE_DIRECT_BLOCKS;
use crate::error::{Error, ErrorKind, Result};
use crate::inode::Inode;

/// 指针在映射树中的存放位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSlot {
    /// inode 块指针数组中的下标
    Inode(usize),
    /// 某个间接块中的第 `offset` 个条目
    Indirect {
        /// 间接块的物理块号
        block: u64,
        /// 条目下标
        offset: u32,
    },
}

/// 间接块映射器
pub struct IndirectBlockMapper {
    /// 每个间接块可以容纳的指针数量 (block_size / 4)
    blocks_per_indirect: u64,

    /// 每个间接层级的块数限制
    ///
    /// - limits[0] = 12 (直接块)
    /// - limits[1] = 12 + blocks_per_indirect (一级间接)
    /// - limits[2] = limits[1] + blocks_per_indirect^2 (二级间接)
    /// - limits[3] = limits[2] + blocks_per_indirect^3 (三级间接)
    block_limits: [u64; 4],

    /// 每个层级可以寻址的块数
    ///
    /// - blocks_per_level[0] = 1
    /// - blocks_per_level[1] = blocks_per_indirect
    /// - blocks_per_level[2] = blocks_per_indirect^2
    /// - blocks_per_level[3] = blocks_per_indirect^3
    blocks_per_level: [u64; 4],
}

/// 逻辑块在映射树中的路径
struct Path {
    /// 树根在 inode 块指针数组中的下标
    top_slot: usize,
    /// 树高：1 表示一级间接
    height: u8,
    /// 从树根开始每一层的条目下标
    idxs: [u32; 3],
}

impl IndirectBlockMapper {
    /// 创建新的间接块映射器
    ///
    /// # 参数
    ///
    /// - `block_size`: 文件系统块大小（字节）
    pub fn new(block_size: u32) -> Self {
        // 每个间接块能存储的指针数 = 块大小 / sizeof(u32)
        let blocks_per_indirect = (block_size / 4) as u64;

        let mut block_limits = [0u64; 4];
        let mut blocks_per_level = [0u64; 4];

        block_limits[0] = E2BLK_INODE_DIRECT_BLOCKS as u64;
        blocks_per_level[0] = 1;

        for i in 1..4 {
            blocks_per_level[i] = blocks_per_level[i - 1] * blocks_per_indirect;
            block_limits[i] = block_limits[i - 1] + blocks_per_level[i];
        }

        Self {
            blocks_per_indirect,
            block_limits,
            blocks_per_level,
        }
    }

    /// 每个间接块的指针数
    pub fn blocks_per_indirect(&self) -> u64 {
        self.blocks_per_indirect
    }

    /// 第 `level` 级间接块覆盖的逻辑块数
    pub fn span(&self, level: u8) -> u64 {
        self.blocks_per_level[level as usize]
    }

    /// 可寻址的最大逻辑块数
    pub fn max_blocks(&self) -> u64 {
        self.block_limits[3]
    }

    fn path(&self, logical_block: u64) -> Result<Path> {
        let mut idxs = [0u32; 3];
        for level in 1..4 {
            if logical_block < self.block_limits[level] {
                let mut rel = logical_block - self.block_limits[level - 1];
                // 从树根往下，每一层消耗一个下标
                for depth in 0..level {
                    let span = self.blocks_per_level[level - 1 - depth];
                    idxs[depth] = (rel / span) as u32;
                    rel %= span;
                }
                return Ok(Path {
                    top_slot: E2BLK_INODE_DIRECT_BLOCKS + level - 1,
                    height: level as u8,
                    idxs,
                });
            }
        }

        Err(Error::new(
            ErrorKind::InvalidInput,
            "Logical block number exceeds maximum file size",
        ))
    }

    /// 将逻辑块号映射到物理块号
    ///
    /// # 返回
    ///
    /// - `Ok(Some(physical_block))`: 找到了对应的物理块
    /// - `Ok(None)`: 逻辑块号对应的是文件空洞
    pub fn map_block<D: BlockDevice>(
        &self,
        blockdev: &mut BlockDev<D>,
        inode: &Inode,
        logical_block: u64,
    ) -> Result<Option<u64>> {
        match self.locate(blockdev, inode, BlockIndex::Data(logical_block)) {
            Ok(slot) => self.read_slot(blockdev, inode, slot),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 定位保存 `index` 所指块地址的指针
    ///
    /// 路径上的间接块不存在时返回 `NotFound`
    pub fn locate<D: BlockDevice>(
        &self,
        blockdev: &mut BlockDev<D>,
        inode: &Inode,
        index: BlockIndex,
    ) -> Result<BlockSlot> {
        let (logical, level) = match index {
            BlockIndex::Data(l) => (l, 0u8),
            BlockIndex::Indirect { level, first } => (first, level),
        };

        if level == 0 && logical < E2BLK_INODE_DIRECT_BLOCKS as u64 {
            return Ok(BlockSlot::Inode(logical as usize));
        }

        let path = self.path(logical)?;
        if level > path.height {
            return Err(Error::new(ErrorKind::InvalidInput, "Indirect level out of range"));
        }
        if level == path.height {
            return Ok(BlockSlot::Inode(path.top_slot));
        }

        let mut block = inode.block_pointer(path.top_slot) as u64;
        let hops = (path.height - level - 1) as usize;
        for depth in 0..hops {
            if block == 0 {
                break;
            }
            block = self.read_pointer(blockdev, block, path.idxs[depth])?;
        }
        if block == 0 {
            return Err(Error::new(ErrorKind::NotFound, "Hole in indirect block path"));
        }

        Ok(BlockSlot::Indirect {
            block,
            offset: path.idxs[hops],
        })
    }

    /// 读取指针的当前值
    pub fn read_slot<D: BlockDevice>(
        &self,
        blockdev: &mut BlockDev<D>,
        inode: &Inode,
        slot: BlockSlot,
    ) -> Result<Option<u64>> {
        let value = match slot {
            BlockSlot::Inode(i) => inode.block_pointer(i) as u64,
            BlockSlot::Indirect { block, offset } => self.read_pointer(blockdev, block, offset)?,
        };
        Ok(if value == 0 { None } else { Some(value) })
    }

    /// 改写指针
    ///
    /// inode 中的指针只修改内存副本，由调用者负责写回 inode；
    /// 间接块中的指针立即写回设备。
    pub fn write_slot<D: BlockDevice>(
        &self,
        blockdev: &mut BlockDev<D>,
        inode: &mut Inode,
        slot: BlockSlot,
        new_block: u64,
    ) -> Result<()> {
        let value = u32::try_from(new_block).map_err(|_| {
            Error::new(ErrorKind::InvalidInput, "Block address does not fit a 32-bit pointer")
                .at_block(new_block)
        })?;

        match slot {
            BlockSlot::Inode(i) => {
                inode.set_block_pointer(i, value);
                Ok(())
            }
            BlockSlot::Indirect { block, offset } => {
                let mut buf = vec![0u8; blockdev.block_size() as usize];
                blockdev.read_block(block, &mut buf)?;
                let at = self.entry_offset(&buf, offset)?;
                LittleEndian::write_u32(&mut buf[at..at + 4], value);
                blockdev.write_block(block, &buf)
            }
        }
    }

    /// 从间接块中读取指定位置的块指针
    fn read_pointer<D: BlockDevice>(
        &self,
        blockdev: &mut BlockDev<D>,
        indirect_block: u64,
        index: u32,
    ) -> Result<u64> {
        let mut buf = vec![0u8; blockdev.block_size() as usize];
        blockdev.read_block(indirect_block, &mut buf)?;
        let at = self.entry_offset(&buf, index)?;
        Ok(LittleEndian::read_u32(&buf[at..at + 4]) as u64)
    }

    fn entry_offset(&self, buf: &[u8], index: u32) -> Result<usize> {
        let offset = index as usize * 4;
        if offset + 4 > buf.len() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Index out of bounds in indirect block",
            ));
        }
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryDevice;
    use crate::consts::*;

    #[test]
    fn test_mapper_initialization() {
        let mapper = IndirectBlockMapper::new(4096);

        assert_eq!(mapper.blocks_per_indirect, 1024);
        assert_eq!(mapper.block_limits[0], 12);
        assert_eq!(mapper.block_limits[1], 12 + 1024);
        assert_eq!(mapper.block_limits[2], 1036 + 1024 * 1024);
        assert_eq!(mapper.span(2), 1024 * 1024);
    }

    #[test]
    fn test_path() {
        // 1 KiB 块：每个间接块 256 个指针
        let mapper = IndirectBlockMapper::new(1024);

        let p = mapper.path(12).unwrap();
        assert_eq!((p.top_slot, p.height, p.idxs[0]), (12, 1, 0));

        let p = mapper.path(12 + 256 + 256 * 3 + 7).unwrap();
        assert_eq!((p.top_slot, p.height), (13, 2));
        assert_eq!(&p.idxs[..2], &[3, 7]);

        let base = 12 + 256 + 256 * 256;
        let p = mapper.path(base + 256 * 256 * 2 + 256 * 5 + 9).unwrap();
        assert_eq!((p.top_slot, p.height), (14, 3));
        assert_eq!(p.idxs, [2, 5, 9]);

        assert!(mapper.path(mapper.max_blocks()).is_err());
    }

    #[test]
    fn test_locate_and_rewrite() {
        let mut bdev = BlockDev::new(MemoryDevice::new(1024, 64)).unwrap();
        let mapper = IndirectBlockMapper::new(1024);

        // 一级间接块在块 40，逻辑块 12 -> 41，逻辑块 14 -> 42
        let mut ind = vec![0u8; 1024];
        LittleEndian::write_u32(&mut ind[0..4], 41);
        LittleEndian::write_u32(&mut ind[8..12], 42);
        bdev.write_block(40, &ind).unwrap();

        let mut inode = Inode::new(E2BLK_INODE_MODE_FILE);
        inode.set_block_pointer(0, 30);
        inode.set_block_pointer(E2BLK_INODE_INDIRECT_BLOCK, 40);

        assert_eq!(mapper.map_block(&mut bdev, &inode, 0).unwrap(), Some(30));
        assert_eq!(mapper.map_block(&mut bdev, &inode, 14).unwrap(), Some(42));
        assert_eq!(mapper.map_block(&mut bdev, &inode, 13).unwrap(), None);
        // 二级间接不存在，视为空洞
        assert_eq!(mapper.map_block(&mut bdev, &inode, 12 + 256).unwrap(), None);

        let slot = mapper.locate(&mut bdev, &inode, BlockIndex::Data(14)).unwrap();
        assert_eq!(slot, BlockSlot::Indirect { block: 40, offset: 2 });
        mapper.write_slot(&mut bdev, &mut inode, slot, 50).unwrap();
        assert_eq!(mapper.map_block(&mut bdev, &inode, 14).unwrap(), Some(50));

        let slot = mapper
            .locate(&mut bdev, &inode, BlockIndex::Indirect { level: 1, first: 12 })
            .unwrap();
        assert_eq!(slot, BlockSlot::Inode(E2BLK_INODE_INDIRECT_BLOCK));
    }

    #[test]
    fn test_write_slot_rejects_wide_address() {
        let mut bdev = BlockDev::new(MemoryDevice::new(1024, 4)).unwrap();
        let mapper = IndirectBlockMapper::new(1024);
        let mut inode = Inode::new(E2BLK_INODE_MODE_FILE);
        let err = mapper
            .write_slot(&mut bdev, &mut inode, BlockSlot::Inode(0), 1 << 33)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
