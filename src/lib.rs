//! e2blk_core: 为缩小卷而清空卷尾保留区的块搬迁引擎
//!
//! 给定保留区大小（块数或字节数），把所有仍位于 `[total_blocks - reserved, total_blocks)`
//! 中的已分配块搬到保留区之外，同时更新 inode 的块映射、分配位图和目录块列表。
//!
//! # 示例
//!
//! ```rust,ignore
//! use e2blk_core::{DiskVolume, EngineConfig, OpenOptions, ReservationEngine, Volume};
//!
//! let mut vol = DiskVolume::open(device, OpenOptions::default())?;
//! let reservation = e2blk_core::parse_reservation("64M")?;
//! let outcome = ReservationEngine::new(&mut vol, EngineConfig::default())
//!     .evacuate_region(reservation)?;
//! vol.close()?;
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象和 I/O 操作
//! - [`superblock`] / [`inode`] - 磁盘结构编解码
//! - [`indirect`] - 间接块映射与块枚举
//! - [`fs`] - 卷模型（[`Volume`] trait 与 [`DiskVolume`]）
//! - [`relocate`] - 属主查找、替换块规划、块搬迁和保留区清空引擎
//! - [`utils`] - 保留区大小解析

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// Superblock 操作
pub mod superblock;

/// Inode 操作
pub mod inode;

/// 间接块寻址
pub mod indirect;

/// 目录元数据
pub mod dir;

/// 卷模型
pub mod fs;

/// 块缓存
pub mod cache;

/// 位图操作
pub mod bitmap;

/// 块搬迁
pub mod relocate;

/// 工具函数
pub mod utils;

/// CRC32 校验和计算
pub(crate) mod crc;

#[cfg(test)]
pub(crate) mod testutil;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDev, BlockDevice, IoStats, MemoryDevice};
#[cfg(feature = "std")]
pub use block::FileDevice;

// 磁盘结构
pub use bitmap::BlockBitmap;
pub use inode::Inode;
pub use superblock::{FsState, Superblock};

// Indirect blocks
pub use indirect::{BlockIndex, IndirectBlockMapper};

// Dir
pub use dir::DirBlockList;

// 卷
pub use fs::{DiskVolume, FormatOptions, OpenOptions, StatFs, Volume};

// Cache
pub use cache::{BlockCache, CacheStats, DEFAULT_CACHE_SIZE};

// 搬迁
pub use relocate::{
    EngineConfig, EngineState, EvacuationSummary, InodeLocator, Outcome, RelocateFlags,
    RelocationEvent, RelocationPlanner, ReservationEngine,
};
pub use utils::{parse_reservation, Reservation};
