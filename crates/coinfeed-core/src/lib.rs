//! # Coinfeed Core
//!
//! 가격 수집 파이프라인 전반에서 공유하는 핵심 타입을 제공합니다.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 정규화된 가격 행(`Row`)과 컬럼 정의
//! - 심볼 → coin_id 고정 매핑 (`Coin`)
//! - 캔들/티커 원본 레코드 파서
//! - 분 단위 샘플링(decimation) 규칙
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
