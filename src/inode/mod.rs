//! Inode 操作模块
//!
//! 这个模块提供 inode 记录的编解码，以及在 inode 表中的读取和写入。

mod read;
mod write;

pub use read::*;
pub use write::*;
