//! CRC32 校验和计算
//!
//! 为 superblock 提供校验和

use crc32fast::Hasher;

/// 校验和种子
pub const E2BLK_CRC32_INIT: u32 = !0u32;

/// 计算数据的 CRC32（从种子开始）
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    checksum_append(E2BLK_CRC32_INIT, data)
}

/// 追加模式计算 CRC32
#[inline]
pub fn checksum_append(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}
