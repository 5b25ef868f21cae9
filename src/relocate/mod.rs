//! 保留区块搬迁
//!
//! - [`InodeLocator`] 查找某个块的属主 inode
//! - [`RelocationPlanner`] 在认领位图上环形探测替换块
//! - [`BlockRelocator`] 移走一个 inode 位于保留区内的块
//! - [`ReservationEngine`] 驱动整个保留区的清空

mod claim;
mod engine;
mod locator;
mod planner;
mod relocator;

pub use claim::ClaimMap;
pub use engine::{EngineConfig, EngineState, EvacuationSummary, Outcome, ReservationEngine};
pub use locator::InodeLocator;
pub use planner::{CircularScan, RelocationPlanner};
pub use relocator::{
    BlockMove, BlockRelocator, RelocateFlags, RelocationEvent, RelocationOutcome, RelocationRecord,
};
