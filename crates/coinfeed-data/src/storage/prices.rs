//! 가격 테이블 조회 저장소.

use crate::error::Result;
use crate::storage::database::Database;
use crate::storage::schema::TableRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coinfeed_core::Row;
use tracing::{debug, instrument};

const ROW_SELECT: &str = r#"
    "timestamp", open, high, low, close, volume, close_time, quote_av, trades,
    tb_base_av, tb_quote_av, "ignore", coin_id, datasource_id, dumptime
"#;

/// 증분 수집 재개 지점(워터마크) 조회.
#[async_trait]
pub trait WatermarkSource: Send + Sync {
    /// 코인의 가장 최근 저장 시각. 저장된 행이 없으면 `None`.
    async fn latest_timestamp(&self, coin_id: i32) -> Result<Option<DateTime<Utc>>>;
}

/// 가격 테이블 저장소.
#[derive(Clone)]
pub struct PriceRepository {
    db: Database,
    table: TableRef,
}

impl PriceRepository {
    pub fn new(db: Database, table: TableRef) -> Self {
        Self { db, table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// 코인의 가장 최근 행.
    #[instrument(skip(self))]
    pub async fn latest_row(&self, coin_id: i32) -> Result<Option<Row>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE coin_id = $1 ORDER BY \"timestamp\" DESC LIMIT 1",
            ROW_SELECT,
            self.table.quoted()
        );

        let row = sqlx::query_as::<_, Row>(&sql)
            .bind(coin_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row)
    }

    /// `since` 이후(포함)의 모든 행을 시간순으로 조회합니다.
    #[instrument(skip(self))]
    pub async fn rows_since(&self, coin_id: i32, since: DateTime<Utc>) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE coin_id = $1 AND \"timestamp\" >= $2 ORDER BY \"timestamp\" ASC",
            ROW_SELECT,
            self.table.quoted()
        );

        let rows = sqlx::query_as::<_, Row>(&sql)
            .bind(coin_id)
            .bind(since)
            .fetch_all(self.db.pool())
            .await?;

        debug!(count = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// `[from, to)` 구간의 행을 시간순으로 조회합니다.
    #[instrument(skip(self))]
    pub async fn rows_between(
        &self,
        coin_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE coin_id = $1 AND \"timestamp\" >= $2 AND \"timestamp\" < $3 \
             ORDER BY \"timestamp\" ASC",
            ROW_SELECT,
            self.table.quoted()
        );

        let rows = sqlx::query_as::<_, Row>(&sql)
            .bind(coin_id)
            .bind(from)
            .bind(to)
            .fetch_all(self.db.pool())
            .await?;

        debug!(count = rows.len(), "Fetched rows");
        Ok(rows)
    }
}

#[async_trait]
impl WatermarkSource for PriceRepository {
    #[instrument(skip(self))]
    async fn latest_timestamp(&self, coin_id: i32) -> Result<Option<DateTime<Utc>>> {
        let sql = format!(
            "SELECT max(\"timestamp\") FROM {} WHERE coin_id = $1",
            self.table.quoted()
        );

        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(&sql)
            .bind(coin_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(latest)
    }
}
