//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드/테이블을 찾을 수 없음
    #[error("Not found: {0}")]
    NotFound(String),

    /// 잘못된 데이터 형식 (컬럼 불일치, 잘못된 식별자 등)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// CSV 직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 외부 적재 도구 실패
    #[error("External tool error: {0}")]
    ExternalTool(String),

    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DataError {
    /// 연결 계열 오류인지 확인합니다.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, DataError::ConnectionError(_) | DataError::PoolExhausted)
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::Tls(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::PoolClosed => DataError::ConnectionError("pool closed".to_string()),
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
