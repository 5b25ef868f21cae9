//! Bitmap 底层位操作
//!
//! 对原始字节切片按位读写，位 `i` 位于第 `i / 8` 字节的第 `i % 8` 位。

use crate::error::{Error, ErrorKind, Result};

#[inline]
fn locate(index: u64) -> (usize, u8) {
    ((index / 8) as usize, (index % 8) as u8)
}

/// 测试位图中某一位是否被设置
///
/// 超出位图范围的索引视为未设置
pub fn test_bit(bitmap: &[u8], index: u64) -> bool {
    let (byte, bit) = locate(index);
    match bitmap.get(byte) {
        Some(b) => b & (1 << bit) != 0,
        None => false,
    }
}

/// 设置位图中的某一位
pub fn set_bit(bitmap: &mut [u8], index: u64) -> Result<()> {
    let (byte, bit) = locate(index);
    let slot = bitmap
        .get_mut(byte)
        .ok_or(Error::new(ErrorKind::InvalidInput, "Bitmap index out of range").at_block(index))?;
    *slot |= 1 << bit;
    Ok(())
}

/// 清除位图中的某一位
pub fn clear_bit(bitmap: &mut [u8], index: u64) -> Result<()> {
    let (byte, bit) = locate(index);
    let slot = bitmap
        .get_mut(byte)
        .ok_or(Error::new(ErrorKind::InvalidInput, "Bitmap index out of range").at_block(index))?;
    *slot &= !(1 << bit);
    Ok(())
}

/// 在 `[start, end)` 中查找第一个空闲位
pub fn find_first_zero(bitmap: &[u8], start: u64, end: u64) -> Option<u64> {
    let end = end.min(bitmap.len() as u64 * 8);
    let mut i = start;
    while i < end {
        // 整字节已满时直接跳过
        if i % 8 == 0 && i + 8 <= end && bitmap[(i / 8) as usize] == 0xFF {
            i += 8;
            continue;
        }
        if !test_bit(bitmap, i) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// 统计 `[start, end)` 范围内被设置的位数
pub fn count_ones(bitmap: &[u8], start: u64, end: u64) -> u64 {
    let end = end.min(bitmap.len() as u64 * 8);
    (start..end).filter(|&i| test_bit(bitmap, i)).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_operations() {
        let mut bitmap = [0u8; 4];

        assert!(!test_bit(&bitmap, 0));
        set_bit(&mut bitmap, 0).unwrap();
        set_bit(&mut bitmap, 15).unwrap();
        assert!(test_bit(&bitmap, 0));
        assert!(test_bit(&bitmap, 15));
        assert_eq!(bitmap[1], 0x80);

        clear_bit(&mut bitmap, 0).unwrap();
        assert!(!test_bit(&bitmap, 0));
        assert!(test_bit(&bitmap, 15));
    }

    #[test]
    fn test_find_first_zero_skips_full_bytes() {
        let mut bitmap = [0xFFu8; 4];
        clear_bit(&mut bitmap, 21).unwrap();

        assert_eq!(find_first_zero(&bitmap, 0, 32), Some(21));
        assert_eq!(find_first_zero(&bitmap, 22, 32), None);
        // 起点不在字节边界
        assert_eq!(find_first_zero(&bitmap, 3, 22), Some(21));
    }

    #[test]
    fn test_count_ones() {
        let mut bitmap = [0u8; 4];
        set_bit(&mut bitmap, 1).unwrap();
        set_bit(&mut bitmap, 9).unwrap();
        set_bit(&mut bitmap, 31).unwrap();

        assert_eq!(count_ones(&bitmap, 0, 32), 3);
        assert_eq!(count_ones(&bitmap, 2, 31), 1);
        assert_eq!(count_ones(&bitmap, 0, 100), 3);
    }

    #[test]
    fn test_out_of_range() {
        let mut bitmap = [0u8; 4];
        assert!(set_bit(&mut bitmap, 32).is_err());
        assert!(clear_bit(&mut bitmap, 32).is_err());
        assert!(!test_bit(&bitmap, 64));
        assert_eq!(find_first_zero(&bitmap, 32, 100), None);
    }
}
