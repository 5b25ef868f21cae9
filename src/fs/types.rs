//! 卷配置类型

use crate::cache::DEFAULT_CACHE_SIZE;

/// 打开卷的选项
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// 以只读方式打开
    pub read_only: bool,
    /// 即使卷状态不干净也允许修改（对应 e2blk 的 `-f`）
    pub force: bool,
    /// 块缓存大小（块数），0 表示不缓存
    pub cache_blocks: usize,
    /// 打开时建立目录块列表
    pub track_directories: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            force: false,
            cache_blocks: DEFAULT_CACHE_SIZE,
            track_directories: false,
        }
    }
}

/// 格式化选项
///
/// 块大小和总块数取自设备
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// inode 总数
    pub inodes_count: u32,
    /// 格式化后打开卷使用的选项
    pub open: OpenOptions,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            inodes_count: 64,
            open: OpenOptions::default(),
        }
    }
}

/// 卷统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatFs {
    /// 总块数
    pub blocks_count: u64,
    /// 空闲块数
    pub free_blocks_count: u64,
    /// 第一个数据块
    pub first_data_block: u64,
    /// 元数据之后的第一个块
    pub meta_end: u64,
    /// inode 总数
    pub inodes_count: u32,
    /// 块大小（字节）
    pub block_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let open = OpenOptions::default();
        assert!(!open.read_only && !open.force && !open.track_directories);
        assert_eq!(open.cache_blocks, 256);
        assert_eq!(FormatOptions::default().inodes_count, 64);
    }
}
