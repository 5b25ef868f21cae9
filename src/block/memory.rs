//! 内存块设备
//!
//! 整个卷保存在一块内存中，用于测试与演示。支持注入读写故障。

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use super::BlockDevice;
use crate::consts::E2BLK_DEFAULT_SECTOR_SIZE;
use crate::error::{Error, ErrorKind, Result};

/// 内存块设备
pub struct MemoryDevice {
    block_size: u32,
    total_blocks: u64,
    storage: Vec<u8>,
    read_only: bool,
    /// 读取时返回 I/O 错误的逻辑块
    bad_reads: BTreeSet<u64>,
    /// 写入时返回 I/O 错误的逻辑块
    bad_writes: BTreeSet<u64>,
}

impl MemoryDevice {
    /// 创建全零设备
    pub fn new(block_size: u32, total_blocks: u64) -> Self {
        Self {
            block_size,
            total_blocks,
            storage: vec![0u8; (total_blocks * block_size as u64) as usize],
            read_only: false,
            bad_reads: BTreeSet::new(),
            bad_writes: BTreeSet::new(),
        }
    }

    /// 设置只读
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// 之后读取 `block` 时返回 I/O 错误
    pub fn fail_reads_at(&mut self, block: u64) {
        self.bad_reads.insert(block);
    }

    /// 之后写入 `block` 时返回 I/O 错误
    pub fn fail_writes_at(&mut self, block: u64) {
        self.bad_writes.insert(block);
    }

    /// 清除所有注入的故障
    pub fn clear_faults(&mut self) {
        self.bad_reads.clear();
        self.bad_writes.clear();
    }

    /// 直接查看某个逻辑块的内容
    pub fn block(&self, block: u64) -> &[u8] {
        let start = (block * self.block_size as u64) as usize;
        &self.storage[start..start + self.block_size as usize]
    }

    fn span(&self, lba: u64, count: u32) -> Result<(usize, usize)> {
        let start = lba * E2BLK_DEFAULT_SECTOR_SIZE as u64;
        let len = count as u64 * E2BLK_DEFAULT_SECTOR_SIZE as u64;
        if start + len > self.storage.len() as u64 {
            return Err(Error::new(ErrorKind::Io, "Access beyond end of memory device"));
        }
        Ok((start as usize, len as usize))
    }

    fn touches(&self, set: &BTreeSet<u64>, start: usize, len: usize) -> Option<u64> {
        let bs = self.block_size as u64;
        let first = start as u64 / bs;
        let last = (start + len - 1) as u64 / bs;
        set.range(first..=last).next().copied()
    }
}

impl BlockDevice for MemoryDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn sector_size(&self) -> u32 {
        E2BLK_DEFAULT_SECTOR_SIZE
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let (start, len) = self.span(lba, count)?;
        if let Some(bad) = self.touches(&self.bad_reads, start, len) {
            return Err(Error::new(ErrorKind::Io, "Injected read error").at_block(bad));
        }
        buf[..len].copy_from_slice(&self.storage[start..start + len]);
        Ok(len)
    }

    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        if self.read_only {
            return Err(Error::new(ErrorKind::PermissionDenied, "Device is read-only"));
        }
        let (start, len) = self.span(lba, count)?;
        if let Some(bad) = self.touches(&self.bad_writes, start, len) {
            return Err(Error::new(ErrorKind::Io, "Injected write error").at_block(bad));
        }
        self.storage[start..start + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_injection() {
        let mut dev = MemoryDevice::new(1024, 8);
        let data = vec![7u8; 1024];
        dev.write_blocks(2, 2, &data).unwrap();
        assert_eq!(dev.block(1), &data[..]);

        dev.fail_reads_at(1);
        let mut out = vec![0u8; 1024];
        let err = dev.read_blocks(2, 2, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.block(), Some(1));
        assert!(dev.read_blocks(0, 2, &mut out).is_ok());

        dev.clear_faults();
        assert!(dev.read_blocks(2, 2, &mut out).is_ok());
    }
}
