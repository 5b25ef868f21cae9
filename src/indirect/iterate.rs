//! inode 块枚举
//!
//! 对应 libext2fs 的 `ext2fs_block_iterate3()`（只读模式）。枚举顺序为先序：
//! 直接块，然后每棵间接树先给出间接块本身，再给出它映射的块。

use alloc::vec;
use core::ops::ControlFlow;

use byteorder::{ByteOrder, LittleEndian};

use super::{BlockIndex, IndirectBlockMapper};
use crate::block::{BlockDev, BlockDevice};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::inode::Inode;

struct Walker<'a, D, F> {
    bdev: &'a mut BlockDev<D>,
    mapper: IndirectBlockMapper,
    first_data_block: u64,
    total_blocks: u64,
    visit: F,
}

impl<D, F> Walker<'_, D, F>
where
    D: BlockDevice,
    F: FnMut(BlockIndex, u64) -> ControlFlow<()>,
{
    fn check(&self, block: u64) -> Result<()> {
        if block < self.first_data_block || block >= self.total_blocks {
            return Err(Error::new(ErrorKind::Corrupted, "Block pointer out of range").at_block(block));
        }
        Ok(())
    }

    fn walk(&mut self, block: u64, level: u8, first: u64) -> Result<ControlFlow<()>> {
        self.check(block)?;
        if (self.visit)(BlockIndex::Indirect { level, first }, block).is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let mut buf = vec![0u8; self.bdev.block_size() as usize];
        self.bdev.read_block(block, &mut buf)?;
        let span = self.mapper.span(level - 1);

        for (i, raw) in buf.chunks_exact(4).enumerate() {
            let ptr = LittleEndian::read_u32(raw) as u64;
            if ptr == 0 {
                continue;
            }
            let child_first = first + i as u64 * span;
            let flow = if level == 1 {
                self.check(ptr)?;
                (self.visit)(BlockIndex::Data(child_first), ptr)
            } else {
                self.walk(ptr, level - 1, child_first)?
            };
            if flow.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// 枚举 inode 拥有的全部块
///
/// 回调收到块在映射树中的位置和物理块号，返回 `ControlFlow::Break` 可提前结束。
/// 越界的块指针视为损坏，返回 `Corrupted`。
///
/// # 返回
///
/// 回调提前结束时返回 `ControlFlow::Break(())`
pub fn iterate_blocks<D, F>(
    bdev: &mut BlockDev<D>,
    inode: &Inode,
    first_data_block: u64,
    visit: F,
) -> Result<ControlFlow<()>>
where
    D: BlockDevice,
    F: FnMut(BlockIndex, u64) -> ControlFlow<()>,
{
    let mapper = IndirectBlockMapper::new(bdev.block_size());
    let mut walker = Walker {
        total_blocks: bdev.total_blocks(),
        bdev,
        mapper,
        first_data_block,
        visit,
    };

    for logical in 0..E2BLK_INODE_DIRECT_BLOCKS {
        let ptr = inode.block_pointer(logical) as u64;
        if ptr == 0 {
            continue;
        }
        walker.check(ptr)?;
        if (walker.visit)(BlockIndex::Data(logical as u64), ptr).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }

    let roots = [
        (E2BLK_INODE_INDIRECT_BLOCK, 1u8),
        (E2BLK_INODE_DOUBLE_INDIRECT_BLOCK, 2),
        (E2BLK_INODE_TRIPLE_INDIRECT_BLOCK, 3),
    ];
    let mut first = E2BLK_INODE_DIRECT_BLOCKS as u64;
    for (slot, level) in roots {
        let ptr = inode.block_pointer(slot) as u64;
        if ptr != 0 && walker.walk(ptr, level, first)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
        first += walker.mapper.span(level);
    }

    Ok(ControlFlow::Continue(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryDevice;
    use alloc::vec::Vec;

    fn pointers(entries: &[(usize, u32)]) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        for &(i, v) in entries {
            LittleEndian::write_u32(&mut buf[i * 4..i * 4 + 4], v);
        }
        buf
    }

    fn fixture() -> (BlockDev<MemoryDevice>, Inode) {
        let mut bdev = BlockDev::new(MemoryDevice::new(1024, 128)).unwrap();
        let mut inode = Inode::new(E2BLK_INODE_MODE_FILE);
        inode.set_block_pointer(0, 10);
        inode.set_block_pointer(2, 11);
        // 一级间接：块 20，逻辑块 12 -> 21
        inode.set_block_pointer(E2BLK_INODE_INDIRECT_BLOCK, 20);
        bdev.write_block(20, &pointers(&[(0, 21)])).unwrap();
        // 二级间接：块 30 -> [1] 块 31 -> [4] 块 32
        inode.set_block_pointer(E2BLK_INODE_DOUBLE_INDIRECT_BLOCK, 30);
        bdev.write_block(30, &pointers(&[(1, 31)])).unwrap();
        bdev.write_block(31, &pointers(&[(4, 32)])).unwrap();
        (bdev, inode)
    }

    #[test]
    fn test_preorder_enumeration() {
        let (mut bdev, inode) = fixture();
        let mut seen = Vec::new();
        let flow = iterate_blocks(&mut bdev, &inode, 1, |idx, b| {
            seen.push((idx, b));
            ControlFlow::Continue(())
        })
        .unwrap();
        assert!(flow.is_continue());

        let dind_first = 12 + 256;
        assert_eq!(
            seen,
            vec![
                (BlockIndex::Data(0), 10),
                (BlockIndex::Data(2), 11),
                (BlockIndex::Indirect { level: 1, first: 12 }, 20),
                (BlockIndex::Data(12), 21),
                (BlockIndex::Indirect { level: 2, first: dind_first }, 30),
                (BlockIndex::Indirect { level: 1, first: dind_first + 256 }, 31),
                (BlockIndex::Data(dind_first + 256 + 4), 32),
            ]
        );
    }

    #[test]
    fn test_early_termination() {
        let (mut bdev, inode) = fixture();
        let mut visited = 0;
        let flow = iterate_blocks(&mut bdev, &inode, 1, |_, b| {
            visited += 1;
            if b == 21 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert!(flow.is_break());
        assert_eq!(visited, 4);
    }

    #[test]
    fn test_out_of_range_pointer_is_corruption() {
        let (mut bdev, mut inode) = fixture();
        inode.set_block_pointer(5, 500);
        let err = iterate_blocks(&mut bdev, &inode, 1, |_, _| ControlFlow::Continue(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(err.block(), Some(500));
    }
}
