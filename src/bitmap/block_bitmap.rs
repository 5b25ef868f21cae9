//! 块分配位图
//!
//! 对应 libext2fs 的 `ext2fs_block_bitmap`，覆盖 `[0, total_blocks)`。

use alloc::vec;
use alloc::vec::Vec;

use super::ops;
use crate::error::{Error, ErrorKind, Result};

/// 块分配位图
///
/// 每个块地址占一位，置位表示已分配。`Clone` 即 `ext2fs_copy_bitmap()`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBitmap {
    bits: Vec<u8>,
    total_blocks: u64,
}

impl BlockBitmap {
    /// 创建全空的位图
    pub fn new(total_blocks: u64) -> Self {
        Self {
            bits: vec![0u8; Self::bytes_for(total_blocks)],
            total_blocks,
        }
    }

    /// 从磁盘上的原始字节构造
    ///
    /// 多余的字节会被截断；字节不足时返回错误
    pub fn from_bytes(total_blocks: u64, bytes: &[u8]) -> Result<Self> {
        let needed = Self::bytes_for(total_blocks);
        if bytes.len() < needed {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Block bitmap shorter than block count",
            ));
        }
        let mut bits = bytes[..needed].to_vec();
        // 末尾字节中超出块数的位清零
        let tail = total_blocks % 8;
        if tail != 0 {
            if let Some(last) = bits.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        Ok(Self { bits, total_blocks })
    }

    /// 存储 `total_blocks` 位需要的字节数
    pub fn bytes_for(total_blocks: u64) -> usize {
        ((total_blocks + 7) / 8) as usize
    }

    /// 位图覆盖的块数
    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    /// 原始字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// 块是否已分配
    ///
    /// 超出范围的地址返回 false
    pub fn test(&self, block: u64) -> bool {
        block < self.total_blocks && ops::test_bit(&self.bits, block)
    }

    /// 标记块为已分配
    pub fn mark(&mut self, block: u64) -> Result<()> {
        self.check(block)?;
        ops::set_bit(&mut self.bits, block)
    }

    /// 清除块的分配标记
    pub fn unmark(&mut self, block: u64) -> Result<()> {
        self.check(block)?;
        ops::clear_bit(&mut self.bits, block)
    }

    /// 标记 `[start, end)` 中的全部块
    pub fn mark_range(&mut self, start: u64, end: u64) -> Result<()> {
        for block in start..end {
            self.mark(block)?;
        }
        Ok(())
    }

    /// `[start, end)` 中已分配的块数
    pub fn count_allocated(&self, start: u64, end: u64) -> u64 {
        ops::count_ones(&self.bits, start, end.min(self.total_blocks))
    }

    /// `[start, end)` 中空闲的块数
    pub fn count_free(&self, start: u64, end: u64) -> u64 {
        let end = end.min(self.total_blocks);
        end.saturating_sub(start) - self.count_allocated(start, end)
    }

    /// `[start, end)` 中第一个空闲块
    pub fn find_first_free(&self, start: u64, end: u64) -> Option<u64> {
        ops::find_first_zero(&self.bits, start, end.min(self.total_blocks))
    }

    fn check(&self, block: u64) -> Result<()> {
        if block >= self.total_blocks {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Block address beyond end of volume",
            )
            .at_block(block));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_count() {
        let mut bitmap = BlockBitmap::new(100);
        bitmap.mark(0).unwrap();
        bitmap.mark_range(90, 100).unwrap();

        assert!(bitmap.test(0));
        assert!(bitmap.test(95));
        assert!(!bitmap.test(89));
        assert_eq!(bitmap.count_allocated(0, 100), 11);
        assert_eq!(bitmap.count_free(0, 90), 89);
        assert_eq!(bitmap.find_first_free(0, 100), Some(1));
        assert_eq!(bitmap.find_first_free(90, 100), None);

        bitmap.unmark(95).unwrap();
        assert!(!bitmap.test(95));
    }

    #[test]
    fn test_bounds() {
        let mut bitmap = BlockBitmap::new(100);
        assert!(bitmap.mark(100).is_err());
        assert!(!bitmap.test(100));
        assert_eq!(bitmap.count_free(0, 1000), 100);
    }

    #[test]
    fn test_from_bytes_masks_tail() {
        let bitmap = BlockBitmap::from_bytes(10, &[0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(bitmap.as_bytes(), &[0xFF, 0x03]);
        assert_eq!(bitmap.count_allocated(0, 10), 10);

        assert!(BlockBitmap::from_bytes(10, &[0xFF]).is_err());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut live = BlockBitmap::new(16);
        live.mark(3).unwrap();
        let mut copy = live.clone();
        copy.mark(4).unwrap();

        assert!(copy.test(3));
        assert!(!live.test(4));
    }
}
