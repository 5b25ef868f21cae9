//! 块缓存实现（基于 lru crate）

use alloc::vec::Vec;
use core::num::NonZeroUsize;
use lru::LruCache;

/// 默认缓存块数量
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 因容量不足被驱逐的块数
    pub evictions: u64,
    /// 当前缓存的块数
    pub used: usize,
    /// 容量（块数）
    pub capacity: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 块缓存
///
/// `get` 自动把块移到最近使用端，`insert` 满时驱逐最久未使用的块。
pub struct BlockCache {
    cache: LruCache<u64, Vec<u8>>,
    stats: CacheStats,
}

impl BlockCache {
    /// 创建新的块缓存
    ///
    /// `capacity` 为 0 时返回 None（不启用缓存）
    pub fn new(capacity: usize) -> Option<Self> {
        let cap = NonZeroUsize::new(capacity)?;
        Some(Self {
            cache: LruCache::new(cap),
            stats: CacheStats {
                capacity,
                ..CacheStats::default()
            },
        })
    }

    /// 查找缓存块
    pub fn get(&mut self, lba: u64) -> Option<&[u8]> {
        self.stats.total_accesses += 1;
        match self.cache.get(&lba) {
            Some(data) => {
                self.stats.hits += 1;
                log::trace!("[CACHE] LBA={:#x} HIT", lba);
                Some(data.as_slice())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 插入从设备读到的块
    pub fn insert(&mut self, lba: u64, data: &[u8]) {
        if let Some((old, _)) = self.cache.push(lba, data.to_vec()) {
            if old != lba {
                self.stats.evictions += 1;
                log::trace!("[CACHE] Evicted LBA={:#x}", old);
            }
        }
    }

    /// 写穿后更新已缓存的副本，未缓存的块同样插入
    pub fn update(&mut self, lba: u64, data: &[u8]) {
        match self.cache.get_mut(&lba) {
            Some(cached) => cached.copy_from_slice(data),
            None => self.insert(lba, data),
        }
    }

    /// 使某块失效
    pub fn invalidate(&mut self, lba: u64) {
        if self.cache.pop(&lba).is_some() {
            log::debug!("[CACHE] invalidate LBA={:#x}", lba);
        }
    }

    /// 清空缓存
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            used: self.cache.len(),
            ..self.stats.clone()
        }
    }
}
