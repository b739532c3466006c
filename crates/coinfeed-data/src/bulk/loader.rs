//! 대량 적재 전략.
//!
//! - `BatchInsertLoader`: 트랜잭션 하나 안에서 multi-row INSERT
//! - `CopyLoader`: 메모리 CSV 버퍼를 `COPY ... FROM STDIN`으로 전송
//! - `ParallelCopyLoader`: 임시 CSV 파일 + 외부 `timescaledb-parallel-copy`
//!
//! 앞의 두 전략은 알림(`pg_notify`)을 적재와 같은 트랜잭션에서 실행하므로
//! 실패 시 행도 알림도 남지 않습니다.

use crate::bulk::encode::{encode_rows, write_csv_file};
use crate::error::{DataError, Result};
use crate::storage::schema::{get_columns, TableRef};
use async_trait::async_trait;
use coinfeed_core::{IngestConfig, Row, ROW_COLUMNS};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Postgres 바인드 파라미터 한도(65535) 안에 들어가는 INSERT 묶음 크기.
const INSERT_BATCH_ROWS: usize = 4000;

/// 적재 후 보낼 알림.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
}

impl Notification {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// 새 데이터 알림: payload `"new <SYMBOL>"`.
    pub fn new_rows(channel: impl Into<String>, symbol: &str) -> Self {
        Self::new(channel, format!("new {}", symbol.to_uppercase()))
    }
}

async fn send_notification(conn: &mut PgConnection, notification: &Notification) -> Result<()> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(&notification.channel)
        .bind(&notification.payload)
        .execute(&mut *conn)
        .await?;
    debug!(channel = %notification.channel, payload = %notification.payload, "Notification sent");
    Ok(())
}

/// 대량 적재 전략.
#[async_trait]
pub trait BulkLoader: Send + Sync {
    /// 로그용 전략 이름.
    fn name(&self) -> &'static str;

    /// 행 전체를 적재하고 적재된 행 수를 반환합니다.
    ///
    /// 실패하면 어떤 행도 보이지 않아야 하며 에러를 호출자에게 돌려줍니다.
    /// 빈 입력은 아무것도 하지 않고 (알림 없이) 0을 반환합니다.
    async fn load(
        &self,
        conn: &mut PgConnection,
        table: &TableRef,
        rows: &[Row],
        notify: Option<&Notification>,
    ) -> Result<u64>;
}

// =============================================================================
// Multi-row INSERT
// =============================================================================

/// multi-row INSERT 적재.
#[derive(Debug, Clone, Default)]
pub struct BatchInsertLoader;

async fn insert_rows(
    conn: &mut PgConnection,
    table: &TableRef,
    rows: &[Row],
    notify: Option<&Notification>,
) -> Result<u64> {
    let column_list = ROW_COLUMNS
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut inserted = 0;

    for chunk in rows.chunks(INSERT_BATCH_ROWS) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", table.quoted(), column_list));

        query_builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.timestamp)
                .push_bind(row.open)
                .push_bind(row.high)
                .push_bind(row.low)
                .push_bind(row.close)
                .push_bind(row.volume)
                .push_bind(row.close_time)
                .push_bind(row.quote_av)
                .push_bind(row.trades)
                .push_bind(row.tb_base_av)
                .push_bind(row.tb_quote_av)
                .push_bind(row.ignore)
                .push_bind(row.coin_id)
                .push_bind(row.datasource_id)
                .push_bind(row.dumptime);
        });

        let result = query_builder.build().execute(&mut *conn).await?;
        inserted += result.rows_affected();
    }

    if let Some(notification) = notify {
        send_notification(conn, notification).await?;
    }

    Ok(inserted)
}

#[async_trait]
impl BulkLoader for BatchInsertLoader {
    fn name(&self) -> &'static str {
        "insert"
    }

    #[instrument(skip(self, conn, table, rows, notify), fields(table = %table, count = rows.len()))]
    async fn load(
        &self,
        conn: &mut PgConnection,
        table: &TableRef,
        rows: &[Row],
        notify: Option<&Notification>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        let mut tx = conn.begin().await?;

        match insert_rows(&mut tx, table, rows, notify).await {
            Ok(inserted) => {
                tx.commit().await?;
                info!(
                    strategy = self.name(),
                    rows = inserted,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Bulk load complete"
                );
                Ok(inserted)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

// =============================================================================
// COPY FROM STDIN
// =============================================================================

/// 메모리 CSV 버퍼를 `COPY ... FROM STDIN`으로 전송하는 적재.
#[derive(Debug, Clone, Default)]
pub struct CopyLoader;

async fn copy_rows(
    conn: &mut PgConnection,
    table: &TableRef,
    buffer: Vec<u8>,
    notify: Option<&Notification>,
) -> Result<u64> {
    let statement = format!("COPY {} FROM STDIN WITH (FORMAT csv, HEADER true)", table.quoted());

    let mut copy = conn.copy_in_raw(&statement).await?;
    copy.send(buffer).await?;
    let copied = copy.finish().await?;

    if let Some(notification) = notify {
        send_notification(conn, notification).await?;
    }

    Ok(copied)
}

#[async_trait]
impl BulkLoader for CopyLoader {
    fn name(&self) -> &'static str {
        "copy"
    }

    #[instrument(skip(self, conn, table, rows, notify), fields(table = %table, count = rows.len()))]
    async fn load(
        &self,
        conn: &mut PgConnection,
        table: &TableRef,
        rows: &[Row],
        notify: Option<&Notification>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();

        let columns = get_columns(conn, table).await?;
        let buffer = encode_rows(rows, &columns)?;

        let mut tx = conn.begin().await?;

        match copy_rows(&mut tx, table, buffer, notify).await {
            Ok(copied) => {
                tx.commit().await?;
                info!(
                    strategy = self.name(),
                    rows = copied,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Bulk load complete"
                );
                Ok(copied)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

// =============================================================================
// External parallel COPY
// =============================================================================

/// 스코프를 벗어나면 파일을 지우는 임시 CSV.
struct TempCsv {
    path: PathBuf,
}

impl TempCsv {
    fn new_in(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.csv", Uuid::new_v4())),
        }
    }
}

impl Drop for TempCsv {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Temporary CSV removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove temporary CSV: {}", e),
        }
    }
}

/// 외부 `timescaledb-parallel-copy` 도구를 사용하는 적재.
///
/// 도구가 자체 연결로 적재하므로 알림은 도구가 성공한 뒤 호출자 연결에서 보냅니다.
pub struct ParallelCopyLoader {
    program: String,
    connection_url: String,
    workers: u32,
    work_dir: PathBuf,
}

impl fmt::Debug for ParallelCopyLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelCopyLoader")
            .field("program", &self.program)
            .field("connection_url", &"[REDACTED]")
            .field("workers", &self.workers)
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl ParallelCopyLoader {
    pub fn new(
        program: impl Into<String>,
        connection_url: impl Into<String>,
        workers: u32,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            connection_url: connection_url.into(),
            workers: workers.max(1),
            work_dir: work_dir.into(),
        }
    }

    /// 도구 인자 목록.
    fn args(&self, table: &TableRef, file: &Path) -> Vec<String> {
        vec![
            "--connection".to_string(),
            self.connection_url.clone(),
            "--schema".to_string(),
            table.schema().to_string(),
            "--table".to_string(),
            table.table().to_string(),
            "--file".to_string(),
            file.to_string_lossy().into_owned(),
            "--workers".to_string(),
            self.workers.to_string(),
            "--reporting-period".to_string(),
            "1s".to_string(),
            "--skip-header".to_string(),
        ]
    }

    async fn run_tool(&self, table: &TableRef, file: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .args(self.args(table, file))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DataError::ExternalTool(format!("{} 실행 실패: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DataError::ExternalTool(format!(
                "{} 종료 코드 {:?}: {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(last) = stdout.lines().last() {
            debug!(output = last, "Parallel copy finished");
        }
        Ok(())
    }
}

#[async_trait]
impl BulkLoader for ParallelCopyLoader {
    fn name(&self) -> &'static str {
        "parallel-copy"
    }

    #[instrument(skip(self, conn, table, rows, notify), fields(table = %table, count = rows.len()))]
    async fn load(
        &self,
        conn: &mut PgConnection,
        table: &TableRef,
        rows: &[Row],
        notify: Option<&Notification>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();

        let columns = get_columns(conn, table).await?;
        let file = TempCsv::new_in(&self.work_dir);
        write_csv_file(&file.path, rows, &columns).await?;

        self.run_tool(table, &file.path).await?;
        drop(file);

        if let Some(notification) = notify {
            send_notification(conn, notification).await?;
        }

        info!(
            strategy = self.name(),
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bulk load complete"
        );
        Ok(rows.len() as u64)
    }
}

// =============================================================================
// 전략 선택
// =============================================================================

/// 호출자가 고르는 적재 전략.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    BatchInsert,
    Copy,
    ParallelCopy,
}

impl LoadStrategy {
    /// 전략 구현체를 만듭니다. 병렬 COPY는 접속 URL과 적재 설정이 필요합니다.
    pub fn loader(&self, connection_url: &str, ingest: &IngestConfig) -> Box<dyn BulkLoader> {
        match self {
            LoadStrategy::BatchInsert => Box::new(BatchInsertLoader),
            LoadStrategy::Copy => Box::new(CopyLoader),
            LoadStrategy::ParallelCopy => Box::new(ParallelCopyLoader::new(
                &ingest.parallel_copy_bin,
                connection_url,
                ingest.workers,
                &ingest.work_dir,
            )),
        }
    }

    /// 과거 데이터 적재 시 묶음 크기.
    pub fn chunk_size(&self, ingest: &IngestConfig) -> usize {
        match self {
            LoadStrategy::ParallelCopy => ingest.parallel_chunk_size,
            _ => ingest.copy_chunk_size,
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStrategy::BatchInsert => "insert",
            LoadStrategy::Copy => "copy",
            LoadStrategy::ParallelCopy => "parallel-copy",
        };
        f.write_str(name)
    }
}

impl FromStr for LoadStrategy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "insert" | "batch-insert" => Ok(LoadStrategy::BatchInsert),
            "copy" => Ok(LoadStrategy::Copy),
            "parallel-copy" | "parallel" => Ok(LoadStrategy::ParallelCopy),
            other => Err(DataError::InvalidData(format!("알 수 없는 적재 전략: {}", other))),
        }
    }
}
