//! 磁盘卷
//!
//! [`DiskVolume`] 在 [`BlockDev`] 之上实现 [`Volume`]。块分配位图在打开时整体载入内存，
//! 修改只落在内存里，直到 [`Volume::persist_bitmaps`] 或卸载时写回设备。

use alloc::vec;
use core::ops::ControlFlow;

use crate::{
    bitmap::BlockBitmap,
    block::{BlockDev, BlockDevice},
    consts::*,
    dir::DirBlockList,
    error::{Error, ErrorKind, Result},
    indirect::{iterate_blocks, BlockIndex, IndirectBlockMapper},
    inode::{read_inode, write_inode, Inode},
    superblock::{read_superblock, Superblock},
};

use super::{FormatOptions, OpenOptions, StatFs, Volume};

/// 块设备上的卷
///
/// # 示例
///
/// ```rust,ignore
/// use e2blk_core::{DiskVolume, MemoryDevice, FormatOptions, Volume};
///
/// let mut vol = DiskVolume::format(MemoryDevice::new(1024, 1000), &FormatOptions::default())?;
/// let ino = vol.allocate_inode(E2BLK_INODE_MODE_FILE)?;
/// vol.attach_block(ino, 0, 500)?;
/// vol.close()?;
/// ```
pub struct DiskVolume<D: BlockDevice> {
    bdev: BlockDev<D>,
    sb: Superblock,
    block_map: BlockBitmap,
    mapper: IndirectBlockMapper,
    bitmap_dirty: bool,
    read_only: bool,
    force: bool,
    dblist: Option<DirBlockList>,
}

impl<D: BlockDevice> DiskVolume<D> {
    /// 在设备上创建新卷并打开
    ///
    /// 块大小和总块数取自设备。元数据块（superblock、位图、inode 表）被标记为已分配，
    /// 根目录 inode 被初始化为没有数据块的空目录。
    ///
    /// # 错误
    ///
    /// - `ErrorKind::PermissionDenied` - 设备只读
    /// - `ErrorKind::NoSpace` - 设备放不下元数据
    pub fn format(device: D, options: &FormatOptions) -> Result<Self> {
        let mut bdev = BlockDev::new_with_cache(device, options.open.cache_blocks)?;
        if bdev.is_read_only() {
            return Err(Error::new(
                ErrorKind::PermissionDenied,
                "Cannot format a read-only device",
            ));
        }

        let block_size = bdev.block_size();
        let sb = Superblock::with_layout(block_size, bdev.total_blocks(), options.inodes_count)?;

        let zero = vec![0u8; block_size as usize];
        for block in sb.inode_table()..sb.meta_end() {
            bdev.write_block(block, &zero)?;
        }

        let mut block_map = BlockBitmap::new(sb.blocks_count());
        block_map.mark_range(0, sb.meta_end())?;
        write_bitmap(&mut bdev, &sb, &block_map)?;

        let mut root = Inode::new(E2BLK_INODE_MODE_DIRECTORY | 0o755);
        root.set_links_count(2);
        write_inode(&mut bdev, &sb, E2BLK_ROOT_INODE, &root)?;
        sb.write(&mut bdev)?;
        bdev.flush()?;

        log::info!(
            "[VOLUME] formatted: blocks={} inodes={} block_size={} meta_end={}",
            sb.blocks_count(),
            sb.inodes_count(),
            block_size,
            sb.meta_end()
        );
        Self::open_bdev(bdev, options.open)
    }

    /// 打开设备上已有的卷
    ///
    /// # 错误
    ///
    /// - `ErrorKind::Corrupted` - superblock 或位图无效
    /// - `ErrorKind::InvalidInput` - 设备块大小与卷不一致
    /// - `ErrorKind::Io` - 设备读取失败
    pub fn open(device: D, options: OpenOptions) -> Result<Self> {
        let bdev = BlockDev::new_with_cache(device, options.cache_blocks)?;
        Self::open_bdev(bdev, options)
    }

    fn open_bdev(mut bdev: BlockDev<D>, options: OpenOptions) -> Result<Self> {
        let sb = read_superblock(&mut bdev)?;
        if sb.block_size() != bdev.block_size() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Device block size does not match the volume",
            ));
        }
        if sb.blocks_count() > bdev.total_blocks() {
            return Err(Error::new(ErrorKind::Corrupted, "Volume is larger than its device"));
        }

        log::debug!("[VOLUME] reading block bitmap");
        let block_map = read_bitmap(&mut bdev, &sb)?;
        let read_only = options.read_only || bdev.is_read_only();

        let mut vol = Self {
            mapper: IndirectBlockMapper::new(sb.block_size()),
            bdev,
            sb,
            block_map,
            bitmap_dirty: false,
            read_only,
            force: options.force,
            dblist: None,
        };
        log::info!(
            "[VOLUME] opened: blocks={} free={} read_only={}",
            vol.sb.blocks_count(),
            vol.free_blocks_count(),
            read_only
        );

        if options.track_directories {
            vol.enable_dir_tracking()?;
        }
        Ok(vol)
    }

    /// 卸载卷，返回块设备
    ///
    /// 可写的卷会先写回位图和 superblock 并刷新设备；失败以 `ErrorKind::Persist` 返回。
    pub fn unmount(mut self) -> Result<BlockDev<D>> {
        if !self.is_read_only() {
            self.persist_bitmaps()?;
            self.sb.write(&mut self.bdev).map_err(Error::into_persist)?;
            self.bdev.flush().map_err(Error::into_persist)?;
        }
        log::debug!("[VOLUME] closed");
        Ok(self.bdev)
    }

    /// 建立目录块列表
    ///
    /// 扫描所有在用的目录 inode，登记它们的每个数据块。
    pub fn enable_dir_tracking(&mut self) -> Result<()> {
        let mut list = DirBlockList::new();
        let first_data_block = self.first_data_block();

        for ino in E2BLK_ROOT_INODE..=self.sb.inodes_count() {
            let inode = read_inode(&mut self.bdev, &self.sb, ino)?;
            if inode.links_count() == 0 || !inode.is_dir() {
                continue;
            }
            let _flow = iterate_blocks(&mut self.bdev, &inode, first_data_block, |index, block| {
                if let Some(logical) = index.logical() {
                    list.register(ino, block, logical);
                }
                ControlFlow::Continue(())
            })?;
        }

        log::debug!("[VOLUME] directory block list: {} blocks", list.len());
        self.dblist = Some(list);
        Ok(())
    }

    /// 目录块列表（未启用时为 `None`）
    pub fn dir_blocks(&self) -> Option<&DirBlockList> {
        self.dblist.as_ref()
    }

    /// 分配一个空闲 inode 并以 `mode` 初始化
    ///
    /// # 返回
    ///
    /// 新 inode 的编号
    pub fn allocate_inode(&mut self, mode: u16) -> Result<u32> {
        self.ensure_writable()?;
        for ino in E2BLK_ROOT_INODE + 1..=self.sb.inodes_count() {
            let inode = read_inode(&mut self.bdev, &self.sb, ino)?;
            if inode.links_count() == 0 {
                write_inode(&mut self.bdev, &self.sb, ino, &Inode::new(mode))?;
                return Ok(ino);
            }
        }
        Err(Error::new(ErrorKind::NoSpace, "No free inode"))
    }

    /// 把物理块 `physical` 挂到 inode 的逻辑块 `logical` 上
    ///
    /// 路径上缺失的间接块从最低的空闲块开始分配并清零。inode 的块计数和大小随之更新。
    ///
    /// # 参数
    ///
    /// * `ino` - inode 编号
    /// * `logical` - 逻辑块号
    /// * `physical` - 空闲的物理块号
    pub fn attach_block(&mut self, ino: u32, logical: u64, physical: u64) -> Result<()> {
        self.ensure_writable()?;
        if logical >= self.mapper.max_blocks() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Logical block number exceeds maximum file size",
            ));
        }
        if physical < self.sb.meta_end() || physical >= self.total_blocks() {
            return Err(
                Error::new(ErrorKind::InvalidInput, "Block is not a data block").at_block(physical),
            );
        }
        if self.block_map.test(physical) {
            return Err(
                Error::new(ErrorKind::AlreadyExists, "Block already allocated").at_block(physical),
            );
        }

        let mut inode = read_inode(&mut self.bdev, &self.sb, ino)?;
        self.block_map.mark(physical)?;
        self.bitmap_dirty = true;
        let mut added = 1u32;

        if logical >= E2BLK_INODE_DIRECT_BLOCKS as u64 {
            let zero = vec![0u8; self.block_size() as usize];
            for level in (1..=3u8).rev() {
                let index = BlockIndex::Indirect { level, first: logical };
                let slot = match self.mapper.locate(&mut self.bdev, &inode, index) {
                    Ok(slot) => slot,
                    // 树高不足该层级
                    Err(e) if e.kind() == ErrorKind::InvalidInput => continue,
                    Err(e) => return Err(e),
                };
                if self.mapper.read_slot(&mut self.bdev, &inode, slot)?.is_none() {
                    let block = self.alloc_block()?;
                    self.bdev.write_block(block, &zero)?;
                    self.mapper.write_slot(&mut self.bdev, &mut inode, slot, block)?;
                    added += 1;
                }
            }
        }

        let slot = self
            .mapper
            .locate(&mut self.bdev, &inode, BlockIndex::Data(logical))?;
        if self.mapper.read_slot(&mut self.bdev, &inode, slot)?.is_some() {
            return Err(Error::new(ErrorKind::AlreadyExists, "Logical block already mapped")
                .for_inode(ino));
        }
        self.mapper.write_slot(&mut self.bdev, &mut inode, slot, physical)?;

        inode.set_blocks_count(inode.blocks_count() + added);
        let end = (logical + 1) * self.block_size() as u64;
        if end > inode.size() {
            inode.set_size(end);
        }
        write_inode(&mut self.bdev, &self.sb, ino, &inode)
    }

    /// 查询 inode 逻辑块对应的物理块
    pub fn map_block(&mut self, ino: u32, logical: u64) -> Result<Option<u64>> {
        let inode = read_inode(&mut self.bdev, &self.sb, ino)?;
        self.mapper.map_block(&mut self.bdev, &inode, logical)
    }

    /// 卷统计信息
    pub fn statfs(&self) -> StatFs {
        StatFs {
            blocks_count: self.sb.blocks_count(),
            free_blocks_count: self.free_blocks_count(),
            first_data_block: self.first_data_block(),
            meta_end: self.sb.meta_end(),
            inodes_count: self.sb.inodes_count(),
            block_size: self.sb.block_size(),
        }
    }

    /// 获取 superblock 引用
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// 获取块设备引用
    pub fn block_device(&self) -> &BlockDev<D> {
        &self.bdev
    }

    /// 获取可变块设备引用
    pub fn block_device_mut(&mut self) -> &mut BlockDev<D> {
        &mut self.bdev
    }

    fn alloc_block(&mut self) -> Result<u64> {
        let block = self
            .block_map
            .find_first_free(self.sb.meta_end(), self.total_blocks())
            .ok_or(Error::new(ErrorKind::NoSpace, "No free block"))?;
        self.block_map.mark(block)?;
        self.bitmap_dirty = true;
        Ok(block)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::new(ErrorKind::PermissionDenied, "Volume is read-only"));
        }
        Ok(())
    }
}

impl<D: BlockDevice> Volume for DiskVolume<D> {
    fn total_blocks(&self) -> u64 {
        self.sb.blocks_count()
    }

    fn first_data_block(&self) -> u64 {
        self.sb.first_data_block() as u64
    }

    fn block_size(&self) -> u32 {
        self.sb.block_size()
    }

    fn inodes_count(&self) -> u32 {
        self.sb.inodes_count()
    }

    fn free_blocks_count(&self) -> u64 {
        self.block_map
            .count_free(self.first_data_block(), self.total_blocks())
    }

    fn is_read_only(&self) -> bool {
        self.read_only || self.bdev.is_read_only()
    }

    fn needs_check(&self) -> bool {
        !self.force && self.sb.needs_check()
    }

    fn is_allocated(&self, block: u64) -> bool {
        self.block_map.test(block)
    }

    fn mark_allocated(&mut self, block: u64) -> Result<()> {
        self.block_map.mark(block)?;
        self.bitmap_dirty = true;
        Ok(())
    }

    fn mark_free(&mut self, block: u64) -> Result<()> {
        self.block_map.unmark(block)?;
        self.bitmap_dirty = true;
        Ok(())
    }

    fn copy_bitmap(&self) -> BlockBitmap {
        self.block_map.clone()
    }

    fn read_inode(&mut self, ino: u32) -> Result<Inode> {
        read_inode(&mut self.bdev, &self.sb, ino)
    }

    fn write_inode(&mut self, ino: u32, inode: &Inode) -> Result<()> {
        self.ensure_writable()?;
        write_inode(&mut self.bdev, &self.sb, ino, inode)
    }

    fn for_each_block(
        &mut self,
        inode: &Inode,
        visit: &mut dyn FnMut(BlockIndex, u64) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>> {
        let first_data_block = self.first_data_block();
        iterate_blocks(&mut self.bdev, inode, first_data_block, visit)
    }

    fn read_block(&mut self, block: u64, buf: &mut [u8]) -> Result<()> {
        self.bdev.read_block(block, buf)
    }

    fn write_block(&mut self, block: u64, buf: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.bdev.write_block(block, buf)
    }

    fn rewrite_block_mapping(
        &mut self,
        inode: &mut Inode,
        index: BlockIndex,
        new_block: u64,
    ) -> Result<()> {
        self.ensure_writable()?;
        let slot = self.mapper.locate(&mut self.bdev, inode, index)?;
        self.mapper.write_slot(&mut self.bdev, inode, slot, new_block)
    }

    fn tracks_directories(&self) -> bool {
        self.dblist.is_some()
    }

    fn register_directory_block(&mut self, ino: u32, block: u64, logical: u64) -> Result<()> {
        if let Some(list) = self.dblist.as_mut() {
            list.register(ino, block, logical);
        }
        Ok(())
    }

    fn persist_bitmaps(&mut self) -> Result<()> {
        if !self.bitmap_dirty {
            return Ok(());
        }
        self.ensure_writable().map_err(Error::into_persist)?;

        write_bitmap(&mut self.bdev, &self.sb, &self.block_map).map_err(Error::into_persist)?;
        let free = self.free_blocks_count();
        self.sb.set_free_blocks_count(free);
        self.sb.write(&mut self.bdev).map_err(Error::into_persist)?;
        self.bitmap_dirty = false;

        log::debug!("[VOLUME] block bitmap written, free={}", free);
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.unmount().map(|_| ())
    }
}

fn read_bitmap<D: BlockDevice>(bdev: &mut BlockDev<D>, sb: &Superblock) -> Result<BlockBitmap> {
    let bs = sb.block_size() as usize;
    let mut bytes = vec![0u8; sb.bitmap_blocks() as usize * bs];
    for (i, chunk) in bytes.chunks_exact_mut(bs).enumerate() {
        bdev.read_block(sb.block_bitmap() + i as u64, chunk)?;
    }
    BlockBitmap::from_bytes(sb.blocks_count(), &bytes)
}

fn write_bitmap<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    sb: &Superblock,
    block_map: &BlockBitmap,
) -> Result<()> {
    let bs = sb.block_size() as usize;
    let bits = block_map.as_bytes();
    let mut buf = vec![0u8; bs];
    for i in 0..sb.bitmap_blocks() as usize {
        buf.fill(0);
        let start = (i * bs).min(bits.len());
        let end = ((i + 1) * bs).min(bits.len());
        buf[..end - start].copy_from_slice(&bits[start..end]);
        bdev.write_block(sb.block_bitmap() + i as u64, &buf)?;
    }
    Ok(())
}
