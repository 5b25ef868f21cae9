//! 间接块寻址（ext2 风格的 12 个直接块 + 一/二/三级间接块）
//!
//! - [`IndirectBlockMapper`] 逻辑块号到物理块号的映射，以及改写映射中的单个指针
//! - [`iterate_blocks`] 按先序枚举 inode 拥有的全部块（间接块先于其映射的块）

mod iterate;
mod mapper;

pub use iterate::iterate_blocks;
pub use mapper::{BlockSlot, IndirectBlockMapper};

/// 块在 inode 映射树中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockIndex {
    /// 数据块，值为逻辑块号
    Data(u64),
    /// 间接块
    Indirect {
        /// 层级：1 表示其条目指向数据块，2/3 表示指向下一级间接块
        level: u8,
        /// 该间接块映射的第一个逻辑块号
        first: u64,
    },
}

impl BlockIndex {
    /// 是否是数据块
    pub fn is_data(&self) -> bool {
        matches!(self, BlockIndex::Data(_))
    }

    /// 数据块的逻辑块号
    pub fn logical(&self) -> Option<u64> {
        match *self {
            BlockIndex::Data(l) => Some(l),
            BlockIndex::Indirect { .. } => None,
        }
    }
}
