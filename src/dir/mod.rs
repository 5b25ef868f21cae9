//! 目录元数据模块
//!
//! 目前只维护目录块列表（dblist），供块搬迁后保持目录项所在块的登记一致。

mod dblist;

pub use dblist::{DirBlock, DirBlockList};
