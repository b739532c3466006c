//! 수집 파이프라인의 핵심 에러 타입.
//!
//! 파싱과 심볼 조회 단계에서 발생하는 에러를 정의합니다.
//! 이 에러들은 운영 장애가 아니라 설정/프로그래밍 오류로 취급되어 호출자에게 그대로 전파됩니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 매핑되지 않은 심볼
    #[error("알 수 없는 심볼: {0}")]
    UnknownSymbol(String),

    /// 밀리초 타임스탬프를 시각으로 변환할 수 없음
    #[error("잘못된 타임스탬프: {0}")]
    InvalidTimestamp(i64),

    /// 숫자 문자열 파싱 실패
    #[error("잘못된 숫자 ({field}): {value}")]
    InvalidNumber { field: &'static str, value: String },

    /// 잘못된 타임프레임 문자열
    #[error("잘못된 타임프레임: {0}")]
    InvalidTimeframe(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 조회/스키마 계열 에러인지 확인합니다.
    ///
    /// 이 계열은 재시도해도 결과가 바뀌지 않습니다.
    pub fn is_lookup(&self) -> bool {
        matches!(self, CoreError::UnknownSymbol(_))
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
