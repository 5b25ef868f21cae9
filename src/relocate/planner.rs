//! 替换块规划
//!
//! 从原块的下一个块开始做环形线性探测，越过卷尾后回绕到第一个数据块，
//! 回到原块即说明卷上没有可用的块。

use super::ClaimMap;
use crate::error::{Error, ErrorKind, Result};
use crate::fs::Volume;

/// 环形地址扫描
///
/// 依次给出 `start + 1 .. total`，然后 `first .. start`，再次到达 `start` 时结束。
#[derive(Debug, Clone)]
pub struct CircularScan {
    start: u64,
    next: u64,
    first: u64,
    total: u64,
    finished: bool,
}

impl CircularScan {
    /// `start` 必须位于 `[first, total)` 中
    pub fn new(start: u64, first: u64, total: u64) -> Self {
        Self {
            start,
            next: start + 1,
            first,
            total,
            finished: start < first || start >= total,
        }
    }
}

impl Iterator for CircularScan {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.finished {
            return None;
        }
        let mut block = self.next;
        if block >= self.total {
            block = self.first;
        }
        if block == self.start {
            self.finished = true;
            return None;
        }
        self.next = block + 1;
        Some(block)
    }
}

/// 替换块规划器
#[derive(Debug, Clone, Copy)]
pub struct RelocationPlanner {
    first_data_block: u64,
    total_blocks: u64,
}

impl RelocationPlanner {
    /// 创建规划器
    pub fn new(first_data_block: u64, total_blocks: u64) -> Self {
        Self {
            first_data_block,
            total_blocks,
        }
    }

    /// 按卷的几何参数创建规划器
    pub fn for_volume<V: Volume + ?Sized>(vol: &V) -> Self {
        Self::new(vol.first_data_block(), vol.total_blocks())
    }

    /// 从 `original` 之后开始的环形扫描
    pub fn scan_from(&self, original: u64) -> CircularScan {
        CircularScan::new(original, self.first_data_block, self.total_blocks)
    }

    /// 为 `original` 找一个未被认领的替换块
    ///
    /// 只查询认领位图，不修改任何状态。
    ///
    /// # 错误
    ///
    /// - `ErrorKind::InvalidInput` - `original` 不在数据块范围内
    /// - `ErrorKind::AllocFailed` - 扫描一圈没有找到空闲块
    pub fn find_replacement(&self, original: u64, claims: &ClaimMap) -> Result<u64> {
        if original < self.first_data_block || original >= self.total_blocks {
            return Err(
                Error::new(ErrorKind::InvalidInput, "Block out of range").at_block(original),
            );
        }

        match self.scan_from(original).find(|&b| !claims.is_claimed(b)) {
            Some(block) => {
                log::trace!("[PLAN] block {} -> {}", original, block);
                Ok(block)
            }
            None => {
                log::error!("[PLAN] no free block for {}", original);
                Err(Error::new(
                    ErrorKind::AllocFailed,
                    "No free block outside the reserved region",
                )
                .at_block(original))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::Volume;
    use crate::testutil;
    use alloc::vec::Vec;

    #[test]
    fn test_scan_wraps_and_stops() {
        let order: Vec<u64> = CircularScan::new(7, 1, 10).collect();
        assert_eq!(order, [8, 9, 1, 2, 3, 4, 5, 6]);

        let order: Vec<u64> = CircularScan::new(9, 1, 10).collect();
        assert_eq!(order, [1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(CircularScan::new(1, 1, 2).count(), 0);
        assert_eq!(CircularScan::new(20, 1, 10).count(), 0);
    }

    #[test]
    fn test_replacement_wraps_below_region() {
        let vol = testutil::volume();
        let claims = ClaimMap::new(&vol, 990).unwrap();
        let planner = RelocationPlanner::for_volume(&vol);

        // 990 之后全部被认领，回绕后第一个空闲块紧跟元数据
        assert_eq!(planner.find_replacement(995, &claims).unwrap(), 7);
    }

    #[test]
    fn test_replacement_skips_claimed() {
        let mut vol = testutil::volume();
        vol.mark_allocated(501).unwrap();
        let mut claims = ClaimMap::new(&vol, 990).unwrap();
        claims.claim(502).unwrap();
        let planner = RelocationPlanner::for_volume(&vol);

        assert_eq!(planner.find_replacement(500, &claims).unwrap(), 503);
    }

    #[test]
    fn test_exhaustion() {
        let mut vol = testutil::volume();
        for block in 7..990 {
            vol.mark_allocated(block).unwrap();
        }
        let before = vol.copy_bitmap();
        let claims = ClaimMap::new(&vol, 990).unwrap();
        let planner = RelocationPlanner::for_volume(&vol);

        let err = planner.find_replacement(995, &claims).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocFailed);
        assert_eq!(err.block(), Some(995));
        assert_eq!(vol.copy_bitmap(), before);
        assert_eq!(claims.claims(), 0);
    }
}
