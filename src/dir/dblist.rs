//! 目录块列表
//!
//! 对应 libext2fs 的 `dblist`：记录每个目录 inode 的每个逻辑块当前位于哪个物理块。
//! 块被搬迁后必须重新登记，否则按 dblist 工作的目录检查会读到旧地址。

use alloc::collections::BTreeMap;

/// 目录块列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirBlockList {
    /// (inode, 逻辑块号) -> 物理块号
    blocks: BTreeMap<(u32, u64), u64>,
}

/// 目录块列表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirBlock {
    /// 目录 inode
    pub ino: u32,
    /// 物理块号
    pub block: u64,
    /// 逻辑块号
    pub logical: u64,
}

impl DirBlockList {
    /// 创建空列表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记目录块
    ///
    /// 对应 `ext2fs_add_dir_block2()`；同一 (inode, 逻辑块) 再次登记时覆盖旧地址
    pub fn register(&mut self, ino: u32, block: u64, logical: u64) {
        if let Some(old) = self.blocks.insert((ino, logical), block) {
            if old != block {
                log::debug!(
                    "[DBLIST] ino={} logical={} moved {} -> {}",
                    ino, logical, old, block
                );
            }
        }
    }

    /// 查询目录逻辑块当前的物理地址
    pub fn block_of(&self, ino: u32, logical: u64) -> Option<u64> {
        self.blocks.get(&(ino, logical)).copied()
    }

    /// 登记的块数
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// 按 (inode, 逻辑块) 顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = DirBlock> + '_ {
        self.blocks.iter().map(|(&(ino, logical), &block)| DirBlock {
            ino,
            block,
            logical,
        })
    }
}
