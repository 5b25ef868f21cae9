//! 卷模型接口
//!
//! 搬迁引擎只通过这个 trait 访问卷：位图、inode、块枚举、原始块读写、
//! 映射改写与目录块登记。引擎不解析任何磁盘格式。

use alloc::vec::Vec;
use core::ops::ControlFlow;

use crate::bitmap::BlockBitmap;
use crate::error::Result;
use crate::indirect::BlockIndex;
use crate::inode::Inode;

/// 已打开、已载入分配位图的卷
pub trait Volume {
    /// 总块数
    fn total_blocks(&self) -> u64;

    /// 第一个可用块
    fn first_data_block(&self) -> u64;

    /// 块大小（字节）
    fn block_size(&self) -> u32;

    /// inode 总数，合法编号为 `[1, inodes_count]`
    fn inodes_count(&self) -> u32;

    /// 当前空闲块数（按内存中的位图计算）
    fn free_blocks_count(&self) -> u64;

    /// 卷是否只读
    fn is_read_only(&self) -> bool;

    /// 卷是否需要先做一致性检查
    fn needs_check(&self) -> bool {
        false
    }

    /// 块是否已分配
    fn is_allocated(&self, block: u64) -> bool;

    /// 标记块为已分配
    fn mark_allocated(&mut self, block: u64) -> Result<()>;

    /// 释放块
    fn mark_free(&mut self, block: u64) -> Result<()>;

    /// 复制当前的分配位图
    fn copy_bitmap(&self) -> BlockBitmap;

    /// 读取 inode；不存在或读取失败时返回错误
    fn read_inode(&mut self, ino: u32) -> Result<Inode>;

    /// 写回 inode
    fn write_inode(&mut self, ino: u32, inode: &Inode) -> Result<()>;

    /// inode 是否是目录
    fn inode_is_directory(&self, inode: &Inode) -> bool {
        inode.is_dir()
    }

    /// 按先序枚举 inode 拥有的块（含间接块），只读
    ///
    /// 回调返回 `ControlFlow::Break` 时提前结束，并把 `Break` 返回给调用者
    fn for_each_block(
        &mut self,
        inode: &Inode,
        visit: &mut dyn FnMut(BlockIndex, u64) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>>;

    /// 收集 inode 拥有的全部块
    fn enumerate_blocks(&mut self, inode: &Inode) -> Result<Vec<(BlockIndex, u64)>> {
        let mut blocks = Vec::new();
        let _flow = self.for_each_block(inode, &mut |index, block| {
            blocks.push((index, block));
            ControlFlow::Continue(())
        })?;
        Ok(blocks)
    }

    /// 读取一个完整的块
    fn read_block(&mut self, block: u64, buf: &mut [u8]) -> Result<()>;

    /// 写入一个完整的块
    fn write_block(&mut self, block: u64, buf: &[u8]) -> Result<()>;

    /// 让 `index` 处的映射指向 `new_block`
    ///
    /// inode 内的指针只修改 `inode`（调用者随后写回）；间接块中的指针立即写回设备。
    fn rewrite_block_mapping(
        &mut self,
        inode: &mut Inode,
        index: BlockIndex,
        new_block: u64,
    ) -> Result<()>;

    /// 是否维护目录块列表
    fn tracks_directories(&self) -> bool {
        false
    }

    /// 登记目录块的当前地址；不维护目录块列表的卷什么都不做
    fn register_directory_block(&mut self, _ino: u32, _block: u64, _logical: u64) -> Result<()> {
        Ok(())
    }

    /// 把内存中的分配位图写回设备
    fn persist_bitmaps(&mut self) -> Result<()>;

    /// 持久化所有状态并关闭卷
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
