//! 保留区大小解析
//!
//! 数字部分按 C `strtoul(.., 0)` 的规则：`0x` 前缀为十六进制，前导 `0` 为八进制，
//! 其余为十进制。后缀：
//!
//! | 后缀 | 含义 |
//! |------|------|
//! | 无   | 字节 |
//! | `B`  | 块数 |
//! | `K` `M` `G` | 2^10 / 2^20 / 2^30 字节 |
//! | `k` `m` `g` | 10^3 / 10^6 / 10^9 字节 |

use core::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

/// 保留区大小
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// 以块为单位
    Blocks(u64),
    /// 以字节为单位，必须是块大小的整数倍
    Bytes(u64),
}

impl Reservation {
    /// 换算为块数
    ///
    /// # 错误
    ///
    /// - `ErrorKind::InvalidInput` - 字节数不是块大小的整数倍
    pub fn to_blocks(self, block_size: u32) -> Result<u64> {
        match self {
            Reservation::Blocks(n) => Ok(n),
            Reservation::Bytes(bytes) => {
                let bs = block_size as u64;
                if bs == 0 || bytes % bs != 0 {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        "Reservation is not a whole number of blocks",
                    ));
                }
                Ok(bytes / bs)
            }
        }
    }
}

impl FromStr for Reservation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_reservation(s)
    }
}

const INVALID: Error =
    Error::new(ErrorKind::InvalidInput, "Invalid reservation size").as_precondition();

/// 解析保留区大小，例如 `"64B"`、`"1M"`、`"0x10000"`
pub fn parse_reservation(s: &str) -> Result<Reservation> {
    let (value, rest) = parse_number(s.trim_start())?;

    let mut chars = rest.chars();
    let scale = match chars.next() {
        None => return Ok(Reservation::Bytes(value)),
        Some('B') => None,
        Some('K') => Some(1u64 << 10),
        Some('M') => Some(1 << 20),
        Some('G') => Some(1 << 30),
        Some('k') => Some(1_000),
        Some('m') => Some(1_000_000),
        Some('g') => Some(1_000_000_000),
        Some(_) => return Err(INVALID),
    };
    if chars.next().is_some() {
        return Err(INVALID);
    }

    match scale {
        None => Ok(Reservation::Blocks(value)),
        Some(scale) => value
            .checked_mul(scale)
            .map(Reservation::Bytes)
            .ok_or(INVALID),
    }
}

/// 解析数字前缀，返回数值和剩余部分
fn parse_number(s: &str) -> Result<(u64, &str)> {
    let bytes = s.as_bytes();
    let (radix, start) = match bytes {
        [b'0', b'x' | b'X', d, ..] if d.is_ascii_hexdigit() => (16, 2),
        [b'0', ..] => (8, 0),
        _ => (10, 0),
    };

    let digits = s[start..]
        .find(|c: char| !c.is_digit(radix))
        .map_or(s.len(), |i| start + i);
    if digits == start {
        return Err(INVALID);
    }

    let value = u64::from_str_radix(&s[start..digits], radix).map_err(|_| INVALID)?;
    Ok((value, &s[digits..]))
}
