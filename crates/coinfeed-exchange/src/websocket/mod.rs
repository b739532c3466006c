//! WebSocket 스트림.

pub mod multiplex;

pub use multiplex::*;
