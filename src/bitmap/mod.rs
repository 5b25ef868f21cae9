//! 位图操作
//!
//! - [`ops`] 原始字节切片上的位操作
//! - [`BlockBitmap`] 整卷的块分配位图

pub mod ops;
mod block_bitmap;

pub use block_bitmap::BlockBitmap;
