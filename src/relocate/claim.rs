//! 认领位图
//!
//! 一次搬迁运行开始时复制卷的分配位图，并把整个保留区标记为已认领。
//! 之后每选定一个替换块就认领它。位图只增不减。

use crate::bitmap::BlockBitmap;
use crate::error::{Error, ErrorKind, Result};
use crate::fs::Volume;

/// 本次运行中已被占用或已被认领的块
#[derive(Debug, Clone)]
pub struct ClaimMap {
    map: BlockBitmap,
    reservation_start: u64,
    claims: u64,
}

impl ClaimMap {
    /// 从卷的当前位图建立认领位图，并标记 `[reservation_start, total_blocks)`
    pub fn new<V: Volume + ?Sized>(vol: &V, reservation_start: u64) -> Result<Self> {
        let mut map = vol.copy_bitmap();
        let total = map.total_blocks();
        if reservation_start > total {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Reservation starts beyond the end of the volume",
            )
            .at_block(reservation_start));
        }
        map.mark_range(reservation_start, total)?;
        Ok(Self {
            map,
            reservation_start,
            claims: 0,
        })
    }

    /// 块是否已被占用、认领或位于保留区
    pub fn is_claimed(&self, block: u64) -> bool {
        self.map.test(block)
    }

    /// 块是否位于保留区
    pub fn is_reserved(&self, block: u64) -> bool {
        block >= self.reservation_start && block < self.map.total_blocks()
    }

    /// 认领一个替换块
    ///
    /// 同一个块不能被认领两次
    pub fn claim(&mut self, block: u64) -> Result<()> {
        if self.map.test(block) {
            return Err(
                Error::new(ErrorKind::InvalidState, "Block already claimed").at_block(block),
            );
        }
        self.map.mark(block)?;
        self.claims += 1;
        Ok(())
    }

    /// 本次运行认领的块数
    pub fn claims(&self) -> u64 {
        self.claims
    }

    /// 保留区起点
    pub fn reservation_start(&self) -> u64 {
        self.reservation_start
    }

    /// 总块数
    pub fn total_blocks(&self) -> u64 {
        self.map.total_blocks()
    }

    /// `[start, end)` 中未被认领的块数
    pub fn unclaimed(&self, start: u64, end: u64) -> u64 {
        self.map.count_free(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_region_is_premarked() {
        let mut vol = testutil::volume();
        vol.mark_allocated(100).unwrap();
        let claims = ClaimMap::new(&vol, 990).unwrap();

        assert!(claims.is_claimed(100));
        assert!(claims.is_claimed(990) && claims.is_claimed(999));
        assert!(!claims.is_claimed(989));
        assert!(claims.is_reserved(995));
        assert!(!claims.is_reserved(989));
        // 复制品与卷的位图相互独立
        assert!(!vol.is_allocated(995));
    }

    #[test]
    fn test_claims_only_grow() {
        let vol = testutil::volume();
        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        claims.claim(500).unwrap();
        assert_eq!(claims.claims(), 1);

        let err = claims.claim(500).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.block(), Some(500));
        assert!(claims.claim(995).is_err());
        assert_eq!(claims.claims(), 1);
    }
}
