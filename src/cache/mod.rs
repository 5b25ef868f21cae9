//! 块缓存模块
//!
//! 为 `BlockDev` 提供按逻辑块的 LRU 读缓存。
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 块缓存管理器，使用 lru crate 提供 LRU 驱逐
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 一致性
//!
//! 缓存只保存干净副本，写操作总是写穿到设备，没有脏块。
//!
//! # 内存分配要求
//!
//! 本模块依赖 `alloc` crate，需要用户提供全局分配器。

mod block_cache;

pub use block_cache::{BlockCache, CacheStats, DEFAULT_CACHE_SIZE};
