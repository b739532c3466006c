//! 데이터베이스 연결 제공자.
//!
//! 풀에서 빌린 연결(`PoolConnection`)은 스코프를 벗어나면 에러 경로를 포함해
//! 항상 풀로 반환됩니다.

use crate::error::{DataError, Result};
use coinfeed_core::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::time::Duration;
use tracing::{debug, info};

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 설정된 자격 증명으로 연결 풀을 생성합니다.
    ///
    /// 첫 연결에 실패하면 `DataError::ConnectionError`를 반환합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(url = %config.redacted_url(), "Connecting to database...");

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose_secret())
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// URL로 연결합니다 (`DATABASE_URL` 기반 테스트용).
    pub async fn connect_url(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        Ok(Self { pool })
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 작업 하나 동안 사용할 연결을 빌립니다.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        let conn = self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            other => DataError::ConnectionError(other.to_string()),
        })?;
        debug!("Connection acquired");
        Ok(conn)
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DataError::MigrationError(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }

    /// 풀을 닫습니다.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
