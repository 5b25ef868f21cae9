//! Superblock 操作模块
//!
//! 这个模块提供卷 superblock 的布局计算、读取、验证和写入功能。

mod read;
mod write;

pub use read::*;
pub use write::*;
