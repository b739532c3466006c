//! Binance 시세 수집 커넥터.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `KlineProvider` trait: 과거 캔들 조회 인터페이스
//! - Binance REST 커넥터 (캔들 페이지네이션)
//! - Binance 결합(multiplex) 티커 WebSocket 스트림

pub mod connector;
pub mod error;
pub mod traits;
pub mod websocket;

pub use connector::{BinanceClient, BinanceConfig};
pub use error::*;
pub use traits::*;
pub use websocket::{parse_frame, TickerStream};
