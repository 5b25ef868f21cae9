//! 块属主查找
//!
//! 从根 inode 开始按编号递增扫描，逐个枚举 inode 的块，遇到目标块立即停止。
//! 多个 inode 引用同一块时返回编号最小的那个。

use core::ops::ControlFlow;

use crate::consts::E2BLK_ROOT_INODE;
use crate::error::{Error, ErrorKind, Result};
use crate::fs::Volume;

/// inode 属主查找器
#[derive(Debug, Default)]
pub struct InodeLocator {
    inodes_scanned: u64,
}

impl InodeLocator {
    /// 创建查找器
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计检查过的 inode 数
    pub fn inodes_scanned(&self) -> u64 {
        self.inodes_scanned
    }

    /// 查找拥有 `block` 的 inode
    ///
    /// 无法读取的 inode 和链接数为 0 的 inode 被跳过。
    ///
    /// # 错误
    ///
    /// - `ErrorKind::Corrupted` - 没有任何 inode 拥有这个块（位图与 inode 表不一致）
    pub fn find_owner<V: Volume + ?Sized>(&mut self, vol: &mut V, block: u64) -> Result<u32> {
        for ino in E2BLK_ROOT_INODE..=vol.inodes_count() {
            let inode = match vol.read_inode(ino) {
                Ok(inode) => inode,
                Err(e) => {
                    log::trace!("[LOCATE] skip unreadable inode {}: {}", ino, e);
                    continue;
                }
            };
            if inode.links_count() == 0 || !inode.has_valid_blocks() {
                continue;
            }
            self.inodes_scanned += 1;

            let flow = vol.for_each_block(&inode, &mut |_, b| {
                if b == block {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            });
            match flow {
                Ok(ControlFlow::Break(())) => {
                    log::debug!("[LOCATE] block {} owned by inode {}", block, ino);
                    return Ok(ino);
                }
                Ok(ControlFlow::Continue(())) => {}
                Err(e) => log::warn!("[LOCATE] cannot enumerate inode {}: {}", ino, e),
            }
        }

        log::error!("[LOCATE] no inode owns allocated block {}", block);
        Err(Error::new(ErrorKind::Corrupted, "Allocated block has no owning inode").at_block(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::inode::Inode;
    use crate::testutil;

    #[test]
    fn test_finds_direct_and_indirect_owner() {
        let mut vol = testutil::volume();
        let a = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        let b = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        vol.attach_block(a, 0, 100).unwrap();
        vol.attach_block(b, 20, 200).unwrap();
        let ind = vol.read_inode(b).unwrap().get_indirect_block() as u64;

        let mut locator = InodeLocator::new();
        assert_eq!(locator.find_owner(&mut vol, 100).unwrap(), a);
        assert_eq!(locator.find_owner(&mut vol, 200).unwrap(), b);
        assert_eq!(locator.find_owner(&mut vol, ind).unwrap(), b);
    }

    #[test]
    fn test_lowest_inode_wins() {
        let mut vol = testutil::volume();
        let a = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        let b = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        vol.attach_block(b, 0, 300).unwrap();
        // 人为制造两个 inode 共享同一块
        let mut inode = vol.read_inode(a).unwrap();
        inode.set_block_pointer(3, 300);
        inode.set_blocks_count(1);
        vol.write_inode(a, &inode).unwrap();

        let mut locator = InodeLocator::new();
        assert_eq!(locator.find_owner(&mut vol, 300).unwrap(), a.min(b));
    }

    #[test]
    fn test_skips_unlinked_inodes() {
        let mut vol = testutil::volume();
        let a = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        vol.attach_block(a, 0, 400).unwrap();
        let mut inode = vol.read_inode(a).unwrap();
        inode.set_links_count(0);
        vol.write_inode(a, &inode).unwrap();

        let err = InodeLocator::new().find_owner(&mut vol, 400).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(err.block(), Some(400));
    }

    #[test]
    fn test_skips_broken_inode() {
        let mut vol = testutil::volume();
        let broken = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        let mut inode = Inode::new(E2BLK_INODE_MODE_FILE);
        inode.set_block_pointer(0, 5000);
        inode.set_blocks_count(1);
        vol.write_inode(broken, &inode).unwrap();

        let owner = vol.allocate_inode(E2BLK_INODE_MODE_FILE).unwrap();
        vol.attach_block(owner, 0, 600).unwrap();

        assert_eq!(InodeLocator::new().find_owner(&mut vol, 600).unwrap(), owner);
    }
}
