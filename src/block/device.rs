//! 块设备核心类型

use crate::cache::{BlockCache, CacheStats};
use crate::error::{Error, ErrorKind, Result};

/// 块设备接口
///
/// 读写以扇区为单位，`BlockDev` 负责块号与扇区号的换算。
/// 现成实现见 [`MemoryDevice`](super::MemoryDevice) 和 `FileDevice`（`std` 特性）。
pub trait BlockDevice {
    /// 逻辑块大小
    fn block_size(&self) -> u32;

    /// 物理扇区大小（通常 512）
    fn sector_size(&self) -> u32;

    /// 总块数
    fn total_blocks(&self) -> u64;

    /// 从扇区 `lba` 起读取 `count` 个扇区到 `buf`，返回读取的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 从扇区 `lba` 起写入 `count` 个扇区，返回写入的字节数
    ///
    /// # 错误
    ///
    /// 只读设备应返回 `PermissionDenied`
    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize>;

    /// 把已写入的数据落盘
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// 是否只读
    fn is_read_only(&self) -> bool {
        false
    }
}

/// 块 I/O 计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// 块读取次数（含缓存命中）
    pub reads: u64,
    /// 块写入次数
    pub writes: u64,
    /// 实际到达设备的读取次数
    pub device_reads: u64,
}

/// 块设备包装器
///
/// 在 [`BlockDevice`] 之上提供按逻辑块的读写、可选的 LRU 读缓存和 I/O 计数。
/// 缓存为写穿模式：写操作总是立即到达设备。卷在一次搬迁期间独占它。
pub struct BlockDev<D> {
    device: D,
    /// 每块扇区数
    sectors_per_block: u32,
    pub(super) stats: IoStats,
    pub(super) bcache: Option<BlockCache>,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 包装设备（无缓存）
    ///
    /// # 错误
    ///
    /// 块大小不是扇区大小的整数倍时返回 `InvalidInput`
    pub fn new(device: D) -> Result<Self> {
        let sector_size = device.sector_size();
        if sector_size == 0 || device.block_size() % sector_size != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Block size must be a multiple of sector size",
            ));
        }
        Ok(Self {
            sectors_per_block: device.block_size() / sector_size,
            device,
            stats: IoStats::default(),
            bcache: None,
        })
    }

    /// 包装设备并启用 `cache_blocks` 块的读缓存，0 表示不缓存
    pub fn new_with_cache(device: D, cache_blocks: usize) -> Result<Self> {
        let mut bd = Self::new(device)?;
        bd.bcache = BlockCache::new(cache_blocks);
        Ok(bd)
    }

    /// 底层设备
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 底层设备（可变）
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 取回底层设备
    pub fn into_device(self) -> D {
        self.device
    }

    /// 逻辑块大小
    pub fn block_size(&self) -> u32 {
        self.device.block_size()
    }

    /// 总块数
    pub fn total_blocks(&self) -> u64 {
        self.device.total_blocks()
    }

    /// 设备是否只读
    pub fn is_read_only(&self) -> bool {
        self.device.is_read_only()
    }

    /// I/O 计数快照
    pub fn stats(&self) -> IoStats {
        self.stats
    }

    /// 缓存统计，未启用缓存时为 `None`
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.bcache.as_ref().map(|cache| cache.stats())
    }

    /// 刷新底层设备
    pub fn flush(&mut self) -> Result<()> {
        self.device.flush()
    }

    /// 逻辑块 `lba` 的起始扇区和扇区数
    pub(super) fn sector_span(&self, lba: u64) -> (u64, u32) {
        (lba * self.sectors_per_block as u64, self.sectors_per_block)
    }
}
