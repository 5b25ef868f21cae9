//! 块 I/O 操作实现

use super::{BlockDev, BlockDevice};
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;

impl<D: BlockDevice> BlockDev<D> {
    /// 读取单个逻辑块
    ///
    /// 如果启用了缓存，优先从缓存读取；缓存未命中则从设备读取并填充缓存。
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址
    /// * `buf` - 目标缓冲区（大小至少为 block_size）
    pub fn read_block(&mut self, lba: u64, buf: &mut [u8]) -> Result<()> {
        let block_size = self.block_size() as usize;
        self.check_access(lba, buf.len())?;
        self.stats.reads += 1;

        if let Some(cache) = &mut self.bcache {
            if let Some(data) = cache.get(lba) {
                buf[..block_size].copy_from_slice(data);
                return Ok(());
            }
        }

        let (pba, count) = self.sector_span(lba);
        self.stats.device_reads += 1;
        self.device_mut()
            .read_blocks(pba, count, &mut buf[..block_size])
            .map_err(|e| e.at_block(lba))?;

        if let Some(cache) = &mut self.bcache {
            cache.insert(lba, &buf[..block_size]);
        }
        Ok(())
    }

    /// 写入单个逻辑块
    ///
    /// 数据直接写入设备，缓存中已有的副本同步更新。
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址
    /// * `buf` - 源数据缓冲区（大小至少为 block_size）
    pub fn write_block(&mut self, lba: u64, buf: &[u8]) -> Result<()> {
        let block_size = self.block_size() as usize;
        self.check_access(lba, buf.len())?;
        if self.is_read_only() {
            return Err(Error::new(ErrorKind::PermissionDenied, "Device is read-only").at_block(lba));
        }
        self.stats.writes += 1;

        let (pba, count) = self.sector_span(lba);
        if let Err(e) = self.device_mut().write_blocks(pba, count, &buf[..block_size]) {
            // 设备上的内容已不确定
            if let Some(cache) = &mut self.bcache {
                cache.invalidate(lba);
            }
            return Err(e.at_block(lba));
        }

        if let Some(cache) = &mut self.bcache {
            cache.update(lba, &buf[..block_size]);
        }
        Ok(())
    }

    /// 按字节偏移读取（可跨块）
    pub fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let block_size = self.block_size() as u64;
        let mut block = vec![0u8; block_size as usize];
        let mut done = 0usize;

        while done < buf.len() {
            let pos = offset + done as u64;
            let lba = pos / block_size;
            let in_block = (pos % block_size) as usize;
            let n = (block_size as usize - in_block).min(buf.len() - done);

            self.read_block(lba, &mut block)?;
            buf[done..done + n].copy_from_slice(&block[in_block..in_block + n]);
            done += n;
        }
        Ok(())
    }

    /// 按字节偏移写入（可跨块，非整块部分先读后写）
    pub fn write_bytes(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let block_size = self.block_size() as u64;
        let mut block = vec![0u8; block_size as usize];
        let mut done = 0usize;

        while done < buf.len() {
            let pos = offset + done as u64;
            let lba = pos / block_size;
            let in_block = (pos % block_size) as usize;
            let n = (block_size as usize - in_block).min(buf.len() - done);

            if n < block_size as usize {
                self.read_block(lba, &mut block)?;
            }
            block[in_block..in_block + n].copy_from_slice(&buf[done..done + n]);
            self.write_block(lba, &block)?;
            done += n;
        }
        Ok(())
    }

    fn check_access(&self, lba: u64, len: usize) -> Result<()> {
        if len < self.block_size() as usize {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for block",
            ));
        }
        if lba >= self.total_blocks() {
            return Err(Error::new(ErrorKind::Io, "Block address beyond end of device").at_block(lba));
        }
        Ok(())
    }
}
