//! 常量定义
//!
//! 这个模块包含了卷布局与搬迁引擎使用的常量定义，包括：
//! - 磁盘布局相关常量
//! - inode 文件类型位
//! - 退出码

//=============================================================================
// 基础常量
//=============================================================================

/// 默认物理块大小（扇区大小，512 字节）
pub const E2BLK_DEFAULT_SECTOR_SIZE: u32 = 512;

/// 默认逻辑块大小（4096 字节）
pub const E2BLK_DEFAULT_BLOCK_SIZE: u32 = 4096;

/// 最小块大小（1024 字节）
pub const E2BLK_MIN_BLOCK_SIZE: u32 = 1024;

/// 最大块大小（65536 字节）
pub const E2BLK_MAX_BLOCK_SIZE: u32 = 65536;

//=============================================================================
// Superblock 相关
//=============================================================================

/// Superblock 在设备上的字节偏移
pub const E2BLK_SUPERBLOCK_OFFSET: u64 = 1024;

/// Superblock 编码后的大小（字节）
pub const E2BLK_SUPERBLOCK_SIZE: usize = 1024;

/// 卷魔数 ("e2bk")
pub const E2BLK_SUPERBLOCK_MAGIC: u32 = 0x6532_626B;

/// Root inode 编号
pub const E2BLK_ROOT_INODE: u32 = 2;

//=============================================================================
// Inode 相关
//=============================================================================

/// inode 中的块指针总数
///
/// - 12个直接块
/// - 1个一级间接块
/// - 1个二级间接块
/// - 1个三级间接块
pub const E2BLK_INODE_BLOCKS: usize = 15;

/// 直接块指针数量
pub const E2BLK_INODE_DIRECT_BLOCKS: usize = 12;

/// 一级间接块索引
pub const E2BLK_INODE_INDIRECT_BLOCK: usize = 12;

/// 二级间接块索引
pub const E2BLK_INODE_DOUBLE_INDIRECT_BLOCK: usize = 13;

/// 三级间接块索引
pub const E2BLK_INODE_TRIPLE_INDIRECT_BLOCK: usize = 14;

/// 磁盘上 inode 记录大小
pub const E2BLK_INODE_SIZE: usize = 128;

//=============================================================================
// Inode 模式位（文件类型）
//=============================================================================

/// 文件类型掩码
pub const E2BLK_INODE_MODE_TYPE_MASK: u16 = 0xF000;

/// 目录
pub const E2BLK_INODE_MODE_DIRECTORY: u16 = 0x4000;

/// 普通文件
pub const E2BLK_INODE_MODE_FILE: u16 = 0x8000;

/// 符号链接
pub const E2BLK_INODE_MODE_SOFTLINK: u16 = 0xA000;

//=============================================================================
// 退出码（对应 sysexits.h 与 e2blk.h）
//=============================================================================

/// 设备错误，卷可能需要 fsck
pub const EX_DEVICE: i32 = 2;

/// 参数错误
pub const EX_USAGE: i32 = 64;

/// 运行时错误
pub const EX_OSERR: i32 = 71;
