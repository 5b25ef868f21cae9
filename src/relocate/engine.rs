//! 保留区清空引擎
//!
//! 状态机：`Idle → Scanning → Relocating → Draining → Done | Failed`，外加 `Cancelled`。
//!
//! 从卷尾向保留区起点逐块扫描。每遇到一个仍被占用的块，先找出它的属主 inode，
//! 再把该 inode 位于保留区内的全部块移走。一个 inode 处理完之前不会响应取消请求。

use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, Ordering};

use super::{
    BlockRelocator, ClaimMap, InodeLocator, RelocateFlags, RelocationEvent, RelocationOutcome,
    RelocationPlanner,
};
use crate::error::{Error, ErrorKind, Result};
use crate::fs::Volume;
use crate::utils::Reservation;

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// 检查前置条件
    Idle,
    /// 扫描保留区
    Scanning,
    /// 搬迁某个 inode
    Relocating,
    /// 校验保留区并写回位图
    Draining,
    /// 成功结束
    Done,
    /// 出错结束
    Failed,
    /// 被取消
    Cancelled,
}

/// 引擎配置
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// 搬迁选项
    pub flags: RelocateFlags,
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvacuationSummary {
    /// 保留区起点
    pub reservation_start: u64,
    /// 保留区块数
    pub reserved_blocks: u64,
    /// 扫描过的保留区块数
    pub blocks_scanned: u64,
    /// 移动的块数
    pub blocks_relocated: u64,
    /// 有块被移动的 inode 数
    pub inodes_relocated: u64,
}

/// 运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 保留区已清空
    Done(EvacuationSummary),
    /// 在两个 inode 之间被取消
    Cancelled(EvacuationSummary),
}

impl Outcome {
    /// 运行统计
    pub fn summary(&self) -> &EvacuationSummary {
        match self {
            Outcome::Done(s) | Outcome::Cancelled(s) => s,
        }
    }
}

/// 保留区清空引擎
///
/// # 示例
///
/// ```rust,ignore
/// let mut engine = ReservationEngine::new(&mut vol, EngineConfig::default())
///     .with_progress(|e| println!("{} -> {}", e.moved.from, e.moved.to));
/// match engine.evacuate_region(parse_reservation("10B")?)? {
///     Outcome::Done(summary) => println!("moved {} blocks", summary.blocks_relocated),
///     Outcome::Cancelled(_) => println!("cancelled"),
/// }
/// ```
pub struct ReservationEngine<'a, V: Volume + ?Sized> {
    vol: &'a mut V,
    config: EngineConfig,
    state: EngineState,
    cancel: Option<&'a AtomicBool>,
    progress: Box<dyn FnMut(&RelocationEvent) + 'a>,
}

impl<'a, V: Volume + ?Sized> ReservationEngine<'a, V> {
    /// 创建引擎，运行期间独占卷
    pub fn new(vol: &'a mut V, config: EngineConfig) -> Self {
        Self {
            vol,
            config,
            state: EngineState::Idle,
            cancel: None,
            progress: Box::new(|_| {}),
        }
    }

    /// 设置取消标志，在两个 inode 之间检查
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// 设置进度回调
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: FnMut(&RelocationEvent) + 'a,
    {
        self.progress = Box::new(progress);
        self
    }

    /// 当前状态
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 清空卷尾的保留区
    ///
    /// # 返回
    ///
    /// - `Outcome::Done` - 保留区内已没有被占用的块
    /// - `Outcome::Cancelled` - 被取消；已完成的搬迁保留，位图已写回
    ///
    /// # 错误
    ///
    /// 前置条件错误发生在任何修改之前。其余错误保留出错前已提交的搬迁，
    /// 位图仍会写回；写回失败时返回 `ErrorKind::Persist`。
    pub fn evacuate_region(&mut self, reservation: Reservation) -> Result<Outcome> {
        self.state = EngineState::Idle;
        let result = self.run(reservation);

        if let Err(e) = &result {
            self.state = EngineState::Failed;
            log::error!("[ENGINE] evacuation failed: {}; {}", e, e.advice());
            if !e.is_precondition() && e.kind() != ErrorKind::Persist {
                if let Err(persist) = self.vol.persist_bitmaps() {
                    log::error!("[ENGINE] cannot write bitmaps: {}", persist);
                    return Err(persist.into_persist());
                }
            }
        }
        result
    }

    fn run(&mut self, reservation: Reservation) -> Result<Outcome> {
        let count = reservation
            .to_blocks(self.vol.block_size())
            .map_err(Error::as_precondition)?;
        let total = self.vol.total_blocks();
        let mut summary = EvacuationSummary {
            reservation_start: total.saturating_sub(count),
            reserved_blocks: count,
            ..EvacuationSummary::default()
        };

        if count == 0 {
            log::info!("[ENGINE] empty reservation, nothing to do");
            self.state = EngineState::Done;
            return Ok(Outcome::Done(summary));
        }

        let start = self
            .check_preconditions(count)
            .map_err(Error::as_precondition)?;
        let mut claims = ClaimMap::new(&*self.vol, start)?;
        let relocator = BlockRelocator::new(
            RelocationPlanner::for_volume(&*self.vol),
            self.config.flags,
        );
        let mut locator = InodeLocator::new();
        log::info!("[ENGINE] evacuating blocks {}..{}", start, total);

        self.state = EngineState::Scanning;
        for block in (start..total).rev() {
            summary.blocks_scanned += 1;
            if !self.vol.is_allocated(block) {
                continue;
            }

            if self.cancel_requested() {
                log::warn!("[ENGINE] cancelled at block {}", block);
                self.vol.persist_bitmaps().map_err(Error::into_persist)?;
                self.state = EngineState::Cancelled;
                return Ok(Outcome::Cancelled(summary));
            }

            self.state = EngineState::Relocating;
            let ino = locator.find_owner(&mut *self.vol, block)?;
            let outcome =
                relocator.relocate_inode(&mut *self.vol, ino, &mut claims, &mut *self.progress)?;
            if let RelocationOutcome::Relocated(moved) = outcome {
                summary.blocks_relocated += moved as u64;
                summary.inodes_relocated += 1;
            }
            if self.vol.is_allocated(block) {
                return Err(Error::new(
                    ErrorKind::Corrupted,
                    "Block still allocated after relocating its owner",
                )
                .at_block(block)
                .for_inode(ino));
            }
            self.state = EngineState::Scanning;
        }

        self.state = EngineState::Draining;
        if let Some(block) = (start..total).find(|&b| self.vol.is_allocated(b)) {
            return Err(
                Error::new(ErrorKind::Corrupted, "Reserved region not clear").at_block(block),
            );
        }
        self.vol.persist_bitmaps().map_err(Error::into_persist)?;

        self.state = EngineState::Done;
        log::info!(
            "[ENGINE] done: {} blocks from {} inodes moved, {} inodes scanned, {} claims",
            summary.blocks_relocated,
            summary.inodes_relocated,
            locator.inodes_scanned(),
            claims.claims()
        );
        Ok(Outcome::Done(summary))
    }

    /// 返回保留区起点
    fn check_preconditions(&self, count: u64) -> Result<u64> {
        if self.vol.is_read_only() {
            return Err(Error::new(ErrorKind::PermissionDenied, "Volume is read-only"));
        }
        if self.vol.needs_check() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "Volume must be checked before relocation",
            ));
        }

        let total = self.vol.total_blocks();
        let first = self.vol.first_data_block();
        if count >= total - first {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Reservation does not fit in the volume",
            ));
        }
        let start = total - count;

        let in_use = (start..total).filter(|&b| self.vol.is_allocated(b)).count() as u64;
        let free_outside = self.vol.free_blocks_count() - (count - in_use);
        if free_outside < count {
            log::error!(
                "[ENGINE] {} free blocks outside the region, {} needed",
                free_outside,
                count
            );
            return Err(Error::new(
                ErrorKind::NoSpace,
                "Not enough free space outside the reserved region",
            ));
        }
        Ok(start)
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }
}
