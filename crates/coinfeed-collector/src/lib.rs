//! Binance 가격 수집기.
//!
//! 이 crate는 수집 바이너리와 그 구성 요소를 제공합니다:
//! - 과거 캔들 수집 (단건 / 묶음 단위 backfill)
//! - 마지막 저장 시각 기준 증분 수집 (단건 / 데몬)
//! - 실시간 티커 스트림 리스너 (분 단위 샘플링)
//! - 저장된 OHLCV 내보내기

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
