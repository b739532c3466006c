//! 에러 타입 정의.

use coinfeed_core::CoreError;
use coinfeed_data::DataError;
use coinfeed_exchange::ExchangeError;
use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 파싱/심볼 조회 에러
    Core(CoreError),
    /// 거래소 에러
    Exchange(ExchangeError),
    /// 저장소 에러
    Data(DataError),
    /// 설정 에러
    Config(String),
    /// 증분 수집 결과가 비어 있음
    NoData { symbol: String },
    /// 저장된 행이 없어 재개 지점을 알 수 없음 (backfill 먼저 필요)
    NoWatermark { symbol: String },
    /// 파일 입출력 에러
    Io(std::io::Error),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(e) => write!(f, "Core error: {}", e),
            Self::Exchange(e) => write!(f, "Exchange error: {}", e),
            Self::Data(e) => write!(f, "Storage error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::NoData { symbol } => write!(f, "No new data for {}", symbol),
            Self::NoWatermark { symbol } => {
                write!(f, "No stored rows for {}; run a backfill first", symbol)
            }
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Core(e) => Some(e),
            Self::Exchange(e) => Some(e),
            Self::Data(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl CollectorError {
    /// 실시간 리스너를 멈춰야 하는 에러인지 확인합니다.
    pub fn is_fatal_for_listener(&self) -> bool {
        match self {
            Self::Core(e) => e.is_lookup(),
            Self::Exchange(_) => true,
            _ => false,
        }
    }
}

impl From<CoreError> for CollectorError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<ExchangeError> for CollectorError {
    fn from(err: ExchangeError) -> Self {
        Self::Exchange(err)
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CollectorError {
    fn from(err: csv::Error) -> Self {
        Self::Data(DataError::SerializationError(err.to_string()))
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CollectorError::NoData {
            symbol: "BTCUSDT".to_string(),
        };
        assert_eq!(err.to_string(), "No new data for BTCUSDT");

        let err = CollectorError::NoWatermark {
            symbol: "ETHUSDT".to_string(),
        };
        assert!(err.to_string().contains("backfill"));
    }

    #[test]
    fn test_listener_fatal_kinds() {
        assert!(CollectorError::from(CoreError::UnknownSymbol("X".into())).is_fatal_for_listener());
        assert!(CollectorError::from(ExchangeError::Disconnected("eof".into())).is_fatal_for_listener());
        assert!(!CollectorError::from(DataError::QueryError("x".into())).is_fatal_for_listener());
    }
}
