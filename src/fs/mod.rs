//! 卷模型
//!
//! - [`Volume`] 搬迁引擎使用的卷接口
//! - [`DiskVolume`] 基于块设备的实现，以及格式化和测试夹具所需的分配操作

mod disk;
mod types;
mod volume;

pub use disk::DiskVolume;
pub use types::{FormatOptions, OpenOptions, StatFs};
pub use volume::Volume;
