//! 대량 적재.

pub mod encode;
pub mod loader;
pub mod sink;
