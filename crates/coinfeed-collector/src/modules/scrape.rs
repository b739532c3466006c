//! 과거 캔들 수집 모듈.

use crate::{CollectionStats, Result};
use chrono::{DateTime, Duration, Utc};
use coinfeed_core::{parse_klines, RawKline, Row, Timeframe};
use coinfeed_data::{Notification, RowSink};
use coinfeed_exchange::KlineProvider;
use futures::TryStreamExt;
use std::time::Instant;

/// 기본 수집 종료 시각: 지금부터 하루 뒤.
pub fn tomorrow() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

/// `[start, end]` 구간의 캔들을 한 번에 가져와 `Row`로 변환합니다.
///
/// 거래소 조회 실패는 로그만 남기고 빈 결과로 취급합니다.
/// 심볼 매핑 실패는 조회 결과와 관계없이 에러입니다.
pub async fn scrape<P: KlineProvider + ?Sized>(
    provider: &P,
    symbol: &str,
    interval: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Row>> {
    let started = Instant::now();

    let records = match provider
        .get_historical_klines(symbol, interval, start, end)
        .await
    {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(symbol = symbol, error = %e, "캔들 조회 실패");
            Vec::new()
        }
    };

    let rows = parse_klines(&records, symbol)?;

    tracing::info!(
        symbol = symbol,
        interval = %interval,
        rows = rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "캔들 수집 완료"
    );

    Ok(rows)
}

/// 긴 구간을 묶음 단위로 수집하며 바로 저장합니다.
///
/// 캔들을 `chunk_size`개씩 모아 변환/저장한 뒤 다음 묶음을 읽으므로
/// 메모리에는 한 묶음만 올라갑니다. 묶음 저장 실패는 기록 후 계속 진행하고,
/// 거래소 조회 실패는 즉시 반환합니다.
#[allow(clippy::too_many_arguments)]
pub async fn scrape_historical<P, S>(
    provider: &P,
    sink: &mut S,
    symbol: &str,
    interval: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chunk_size: usize,
    notify: Option<&Notification>,
) -> Result<CollectionStats>
where
    P: KlineProvider + ?Sized,
    S: RowSink + ?Sized,
{
    let started = Instant::now();
    let chunk_size = chunk_size.max(1);
    let mut stats = CollectionStats::new();

    tracing::info!(
        symbol = symbol,
        interval = %interval,
        start = %start,
        end = %end,
        chunk_size = chunk_size,
        "과거 데이터 수집 시작"
    );

    let mut stream = provider.kline_stream(symbol, interval, start, end);
    let mut buffer: Vec<RawKline> = Vec::with_capacity(chunk_size);

    loop {
        let next = stream.try_next().await?;
        let done = next.is_none();

        if let Some(record) = next {
            buffer.push(record);
        }

        if buffer.len() >= chunk_size || (done && !buffer.is_empty()) {
            write_chunk(sink, &buffer, symbol, notify, &mut stats).await?;
            buffer.clear();
        }

        if done {
            break;
        }
    }

    stats.elapsed = started.elapsed();
    Ok(stats)
}

async fn write_chunk<S: RowSink + ?Sized>(
    sink: &mut S,
    records: &[RawKline],
    symbol: &str,
    notify: Option<&Notification>,
    stats: &mut CollectionStats,
) -> Result<()> {
    stats.total += 1;
    let rows = parse_klines(records, symbol)?;

    match sink.write_rows(&rows, notify).await {
        Ok(written) => {
            stats.success += 1;
            stats.total_rows += written;
            tracing::debug!(symbol = symbol, chunk = stats.total, rows = written, "묶음 저장 완료");
        }
        Err(e) => {
            stats.errors += 1;
            tracing::error!(symbol = symbol, chunk = stats.total, error = %e, "묶음 저장 실패");
        }
    }

    Ok(())
}
