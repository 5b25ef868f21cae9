//! 块设备抽象
//!
//! - `device.rs` 定义设备 trait 与包装器 [`BlockDev`]
//! - `io.rs` 提供按块 / 按字节的读写，读操作先查 LRU 缓存，写操作直接到达设备
//! - `memory.rs` 与 `file.rs` 是两个现成的设备实现

mod device;
mod io;
mod memory;
#[cfg(feature = "std")]
mod file;

pub use device::{BlockDev, BlockDevice, IoStats};
pub use memory::MemoryDevice;
#[cfg(feature = "std")]
pub use file::FileDevice;
