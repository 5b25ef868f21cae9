//! 工具函数

pub mod size;

pub use size::{parse_reservation, Reservation};
