//! 镜像文件块设备（需要 `std` 特性）

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::BlockDevice;
use crate::consts::E2BLK_DEFAULT_SECTOR_SIZE;
use crate::error::{Error, ErrorKind, Result};

/// 以普通文件或块设备节点为后端的块设备
pub struct FileDevice {
    file: File,
    block_size: u32,
    total_blocks: u64,
    read_only: bool,
}

impl FileDevice {
    /// 打开镜像
    ///
    /// 总块数由文件长度决定，不足一块的尾部被忽略
    pub fn open<P: AsRef<Path>>(path: P, block_size: u32, read_only: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .map_err(|_| Error::new(ErrorKind::Io, "Cannot open image file"))?;
        let len = file
            .metadata()
            .map_err(|_| Error::new(ErrorKind::Io, "Cannot stat image file"))?
            .len();
        if block_size == 0 || block_size % E2BLK_DEFAULT_SECTOR_SIZE != 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Invalid block size"));
        }
        Ok(Self {
            file,
            block_size,
            total_blocks: len / block_size as u64,
            read_only,
        })
    }

    fn seek_sector(&mut self, lba: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(lba * E2BLK_DEFAULT_SECTOR_SIZE as u64))
            .map(|_| ())
            .map_err(|_| Error::new(ErrorKind::Io, "Seek failed"))
    }
}

impl BlockDevice for FileDevice {
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
        let len = count as usize * E2BLK_DEFAULT_SECTOR_SIZE as usize;
        self.seek_sector(lba)?;
        self.file
            .read_exact(&mut buf[..len])
            .map_err(|_| Error::new(ErrorKind::Io, "Short read from image file"))?;
        Ok(len)
    }

    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        if self.read_only {
            return Err(Error::new(ErrorKind::PermissionDenied, "Device is read-only"));
        }
        let len = count as usize * E2BLK_DEFAULT_SECTOR_SIZE as usize;
        self.seek_sector(lba)?;
        self.file
            .write_all(&buf[..len])
            .map_err(|_| Error::new(ErrorKind::Io, "Write to image file failed"))?;
        Ok(len)
    }

    fn flush(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|_| Error::new(ErrorKind::Io, "fsync failed"))
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
