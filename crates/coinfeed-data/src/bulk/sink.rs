//! 행 적재 대상.
//!
//! 수집기는 `RowSink`만 알고, 어느 연결에 어떤 전략으로 쓰는지는 구현체가 결정합니다.

use crate::bulk::loader::{BulkLoader, Notification};
use crate::error::Result;
use crate::storage::database::Database;
use crate::storage::schema::TableRef;
use async_trait::async_trait;
use coinfeed_core::Row;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

/// 행 묶음을 저장하는 대상.
#[async_trait]
pub trait RowSink: Send {
    /// 행을 저장하고 저장된 행 수를 반환합니다.
    async fn write_rows(&mut self, rows: &[Row], notify: Option<&Notification>) -> Result<u64>;
}

/// 쓰기마다 풀에서 연결을 빌려 적재하는 writer.
///
/// 연결은 쓰기가 끝나면 (실패해도) 풀로 돌아갑니다.
pub struct BulkWriter {
    db: Database,
    table: TableRef,
    loader: Box<dyn BulkLoader>,
}

impl BulkWriter {
    pub fn new(db: Database, table: TableRef, loader: Box<dyn BulkLoader>) -> Self {
        Self { db, table, loader }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

#[async_trait]
impl RowSink for BulkWriter {
    async fn write_rows(&mut self, rows: &[Row], notify: Option<&Notification>) -> Result<u64> {
        let mut conn = self.db.acquire().await?;
        self.loader.load(&mut conn, &self.table, rows, notify).await
    }
}

/// 연결 하나를 계속 붙잡고 적재하는 writer (실시간 리스너용).
pub struct ConnectionWriter {
    conn: PoolConnection<Postgres>,
    table: TableRef,
    loader: Box<dyn BulkLoader>,
}

impl ConnectionWriter {
    pub fn new(conn: PoolConnection<Postgres>, table: TableRef, loader: Box<dyn BulkLoader>) -> Self {
        Self { conn, table, loader }
    }

    /// 풀에서 연결을 빌려 writer를 만듭니다.
    pub async fn acquire(db: &Database, table: TableRef, loader: Box<dyn BulkLoader>) -> Result<Self> {
        let conn = db.acquire().await?;
        Ok(Self::new(conn, table, loader))
    }
}

#[async_trait]
impl RowSink for ConnectionWriter {
    async fn write_rows(&mut self, rows: &[Row], notify: Option<&Notification>) -> Result<u64> {
        self.loader.load(&mut self.conn, &self.table, rows, notify).await
    }
}
