//! 单个 inode 的块搬迁
//!
//! 对 inode 拥有的每个位于保留区内的块：规划替换块、原样复制内容、改写映射、
//! 认领替换块。已完成的替换在出错时也会提交（写回 inode、释放原块），不做回滚。

use alloc::vec;
use alloc::vec::Vec;

use bitflags::bitflags;

use super::{ClaimMap, RelocationPlanner};
use crate::error::{Error, Result};
use crate::fs::Volume;
use crate::indirect::BlockIndex;
use crate::inode::Inode;

bitflags! {
    /// 搬迁选项
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RelocateFlags: u32 {
        /// 每次块移动以 info 级别记录
        const DEBUG = 0x0002;
    }
}

/// 一次块移动
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMove {
    /// 块在映射树中的位置
    pub index: BlockIndex,
    /// 原块
    pub from: u64,
    /// 替换块
    pub to: u64,
}

/// 进度事件，每移动一个块产生一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationEvent {
    /// 属主 inode
    pub ino: u32,
    /// 块移动
    pub moved: BlockMove,
}

/// 正在处理的 inode 的搬迁记录
#[derive(Debug)]
pub struct RelocationRecord {
    /// inode 编号
    pub ino: u32,
    /// inode 的工作副本
    pub inode: Inode,
    /// 是否需要登记目录块
    pub register_dir: bool,
    /// 已完成的块移动
    pub moves: Vec<BlockMove>,
    /// 中止处理的错误
    pub error: Option<Error>,
    buf: Vec<u8>,
}

impl RelocationRecord {
    fn new(ino: u32, inode: Inode, register_dir: bool, block_size: u32) -> Self {
        Self {
            ino,
            inode,
            register_dir,
            moves: Vec::new(),
            error: None,
            buf: vec![0u8; block_size as usize],
        }
    }
}

/// 单个 inode 的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationOutcome {
    /// 链接数为 0 或没有块，未做任何处理
    Skipped,
    /// 移动了若干块
    Relocated(usize),
}

/// 块搬迁器
#[derive(Debug, Clone, Copy)]
pub struct BlockRelocator {
    planner: RelocationPlanner,
    flags: RelocateFlags,
}

impl BlockRelocator {
    /// 创建搬迁器
    pub fn new(planner: RelocationPlanner, flags: RelocateFlags) -> Self {
        Self { planner, flags }
    }

    /// 把 inode 位于保留区的块全部移出
    ///
    /// # 参数
    ///
    /// * `vol` - 卷
    /// * `ino` - inode 编号
    /// * `claims` - 本次运行的认领位图
    /// * `progress` - 每移动一个块调用一次
    ///
    /// # 错误
    ///
    /// 任何 I/O 或分配错误都会中止这个 inode。出错前完成的移动仍然提交。
    pub fn relocate_inode<V: Volume + ?Sized>(
        &self,
        vol: &mut V,
        ino: u32,
        claims: &mut ClaimMap,
        progress: &mut dyn FnMut(&RelocationEvent),
    ) -> Result<RelocationOutcome> {
        let inode = vol.read_inode(ino)?;
        if inode.links_count() == 0 || !inode.has_valid_blocks() {
            log::debug!("[RELOCATE] inode {} has nothing to move", ino);
            return Ok(RelocationOutcome::Skipped);
        }

        let register_dir = vol.inode_is_directory(&inode) && vol.tracks_directories();
        let blocks = vol
            .enumerate_blocks(&inode)
            .map_err(|e| e.for_inode(ino))?;
        let mut record = RelocationRecord::new(ino, inode, register_dir, vol.block_size());

        for (index, block) in blocks {
            match self.move_block(vol, &mut record, claims, index, block) {
                Ok(Some(moved)) => progress(&RelocationEvent { ino, moved }),
                Ok(None) => {}
                Err(e) => {
                    record.error = Some(e.for_inode(ino));
                    break;
                }
            }
        }

        self.commit(vol, record)
    }

    fn move_block<V: Volume + ?Sized>(
        &self,
        vol: &mut V,
        record: &mut RelocationRecord,
        claims: &mut ClaimMap,
        index: BlockIndex,
        block: u64,
    ) -> Result<Option<BlockMove>> {
        let mut current = block;
        let mut moved = None;

        if claims.is_reserved(block) {
            let target = self.planner.find_replacement(block, claims)?;
            vol.read_block(block, &mut record.buf)?;
            vol.write_block(target, &record.buf)?;
            vol.rewrite_block_mapping(&mut record.inode, index, target)?;
            claims.claim(target)?;
            vol.mark_allocated(target)?;

            let m = BlockMove {
                index,
                from: block,
                to: target,
            };
            record.moves.push(m);
            if self.flags.contains(RelocateFlags::DEBUG) {
                log::info!("[RELOCATE] inode {} {:?}: {} -> {}", record.ino, index, block, target);
            } else {
                log::debug!("[RELOCATE] inode {} {:?}: {} -> {}", record.ino, index, block, target);
            }
            current = target;
            moved = Some(m);
        }

        if record.register_dir {
            if let Some(logical) = index.logical() {
                vol.register_directory_block(record.ino, current, logical)?;
            }
        }
        Ok(moved)
    }

    /// 写回 inode 并释放被替换的原块
    fn commit<V: Volume + ?Sized>(
        &self,
        vol: &mut V,
        record: RelocationRecord,
    ) -> Result<RelocationOutcome> {
        let ino = record.ino;
        if !record.moves.is_empty() {
            if let Err(e) = vol.write_inode(ino, &record.inode) {
                if let Some(first) = &record.error {
                    log::error!("[RELOCATE] inode {} aborted: {}", ino, first);
                }
                return Err(e.for_inode(ino));
            }
            for m in &record.moves {
                vol.mark_free(m.from)?;
            }
        }

        match record.error {
            Some(e) => {
                log::error!(
                    "[RELOCATE] inode {} aborted after {} blocks: {}",
                    ino,
                    record.moves.len(),
                    e
                );
                Err(e)
            }
            None => {
                if !record.moves.is_empty() {
                    log::info!("[RELOCATE] inode {}: {} blocks moved", ino, record.moves.len());
                }
                Ok(RelocationOutcome::Relocated(record.moves.len()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::error::ErrorKind;
    use crate::fs::DiskVolume;
    use crate::block::MemoryDevice;
    use crate::testutil;

    fn relocate(
        vol: &mut DiskVolume<MemoryDevice>,
        ino: u32,
        claims: &mut ClaimMap,
    ) -> (Result<RelocationOutcome>, Vec<RelocationEvent>) {
        let relocator = BlockRelocator::new(
            RelocationPlanner::for_volume(&*vol),
            RelocateFlags::empty(),
        );
        let mut events = Vec::new();
        let result = relocator.relocate_inode(vol, ino, claims, &mut |e| events.push(*e));
        (result, events)
    }

    #[test]
    fn test_moves_only_reserved_blocks() {
        let mut vol = testutil::volume();
        let ino = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        vol.attach_block(ino, 0, 995).unwrap();
        vol.attach_block(ino, 1, 500).unwrap();
        vol.attach_block(ino, 2, 998).unwrap();
        testutil::fill_block(&mut vol, 995, 0xA1);
        testutil::fill_block(&mut vol, 998, 0xB2);

        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        let (result, events) = relocate(&mut vol, ino, &mut claims);
        assert_eq!(result.unwrap(), RelocationOutcome::Relocated(2));
        assert_eq!(events.len(), 2);

        assert_eq!(vol.map_block(ino, 0).unwrap(), Some(7));
        assert_eq!(vol.map_block(ino, 1).unwrap(), Some(500));
        assert_eq!(vol.map_block(ino, 2).unwrap(), Some(8));
        assert!(testutil::block_is_filled(&mut vol, 7, 0xA1));
        assert!(testutil::block_is_filled(&mut vol, 8, 0xB2));

        assert!(!vol.is_allocated(995) && !vol.is_allocated(998));
        assert!(vol.is_allocated(7) && vol.is_allocated(8));
        assert_eq!(claims.claims(), 2);
    }

    #[test]
    fn test_indirect_block_moves_before_children() {
        let mut vol = testutil::volume();
        let ino = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        // 先占住低地址，让间接块落进保留区
        for block in 7..990 {
            vol.mark_allocated(block).unwrap();
        }
        vol.attach_block(ino, 12, 993).unwrap();
        let ind = vol.read_inode(ino).unwrap().get_indirect_block() as u64;
        assert!(ind >= 990);
        for block in 100..110 {
            vol.mark_free(block).unwrap();
        }
        testutil::fill_block(&mut vol, 993, 0x5C);

        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        let (result, events) = relocate(&mut vol, ino, &mut claims);
        assert_eq!(result.unwrap(), RelocationOutcome::Relocated(2));

        assert_eq!(events[0].moved.index, BlockIndex::Indirect { level: 1, first: 12 });
        assert_eq!(events[0].moved.to, 100);
        assert_eq!(vol.read_inode(ino).unwrap().get_indirect_block(), 100);
        assert_eq!(vol.map_block(ino, 12).unwrap(), Some(101));
        assert!(testutil::block_is_filled(&mut vol, 101, 0x5C));
        assert!(!vol.is_allocated(ind) && !vol.is_allocated(993));
    }

    #[test]
    fn test_double_indirect_chain_moves_parent_first() {
        let mut vol = testutil::volume();
        let ino = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        for block in 7..990 {
            vol.mark_allocated(block).unwrap();
        }
        // 逻辑块 268 是二级间接树的第一个数据块：根 990，一级 991
        vol.attach_block(ino, 268, 993).unwrap();
        let inode = vol.read_inode(ino).unwrap();
        assert_eq!(inode.block_pointer(E2BLK_INODE_DOUBLE_INDIRECT_BLOCK), 990);
        for block in 100..110 {
            vol.mark_free(block).unwrap();
        }
        testutil::fill_block(&mut vol, 993, 0x6D);

        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        let (result, events) = relocate(&mut vol, ino, &mut claims);
        assert_eq!(result.unwrap(), RelocationOutcome::Relocated(3));

        let moves: Vec<_> = events
            .iter()
            .map(|e| (e.moved.index, e.moved.from, e.moved.to))
            .collect();
        assert_eq!(
            moves,
            vec![
                (BlockIndex::Indirect { level: 2, first: 268 }, 990, 100),
                (BlockIndex::Indirect { level: 1, first: 268 }, 991, 101),
                (BlockIndex::Data(268), 993, 102),
            ]
        );

        let inode = vol.read_inode(ino).unwrap();
        assert_eq!(inode.block_pointer(E2BLK_INODE_DOUBLE_INDIRECT_BLOCK), 100);
        // 新根的第一个槽指向搬走后的一级间接块
        let mut buf = vec![0u8; 1024];
        vol.read_block(100, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 101);
        assert_eq!(vol.map_block(ino, 268).unwrap(), Some(102));
        assert!(testutil::block_is_filled(&mut vol, 102, 0x6D));
        for old in [990, 991, 993] {
            assert!(!vol.is_allocated(old));
        }
    }

    #[test]
    fn test_directory_blocks_are_registered() {
        let mut vol = testutil::volume();
        let dir = vol.allocate_inode(E2BLK_INODE_MODE_DIRECTORY).unwrap();
        vol.attach_block(dir, 0, 400).unwrap();
        vol.attach_block(dir, 1, 996).unwrap();
        vol.enable_dir_tracking().unwrap();

        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        let (result, _) = relocate(&mut vol, dir, &mut claims);
        assert_eq!(result.unwrap(), RelocationOutcome::Relocated(1));

        let list = vol.dir_blocks().unwrap();
        assert_eq!(list.block_of(dir, 0), Some(400));
        assert_eq!(list.block_of(dir, 1), Some(7));
    }

    #[test]
    fn test_unlinked_inode_is_skipped() {
        let mut vol = testutil::volume();
        let ino = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        let (result, events) = relocate(&mut vol, ino, &mut claims);
        assert_eq!(result.unwrap(), RelocationOutcome::Skipped);
        assert!(events.is_empty());
    }

    #[test]
    fn test_io_error_keeps_completed_moves() {
        let mut vol = testutil::volume();
        let ino = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        vol.attach_block(ino, 0, 995).unwrap();
        vol.attach_block(ino, 1, 998).unwrap();
        vol.block_device_mut().device_mut().fail_reads_at(998);

        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        let (result, events) = relocate(&mut vol, ino, &mut claims);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.block(), Some(998));
        assert_eq!(err.inode(), Some(ino));
        assert_eq!(events.len(), 1);

        // 第一个块的移动已提交
        assert_eq!(vol.map_block(ino, 0).unwrap(), Some(7));
        assert!(!vol.is_allocated(995));
        assert_eq!(vol.map_block(ino, 1).unwrap(), Some(998));
        assert!(vol.is_allocated(998));
    }

    #[test]
    fn test_exhaustion_fails_without_mutation() {
        let mut vol = testutil::volume();
        let ino = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        vol.attach_block(ino, 0, 995).unwrap();
        for block in 7..990 {
            vol.mark_allocated(block).unwrap();
        }
        let before = vol.copy_bitmap();

        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        let (result, _) = relocate(&mut vol, ino, &mut claims);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocFailed);
        assert_eq!(err.block(), Some(995));
        assert_eq!(vol.copy_bitmap(), before);
        assert_eq!(vol.map_block(ino, 0).unwrap(), Some(995));
    }
}
