//! 증분 수집 모듈.
//!
//! 마지막으로 저장된 시각 다음부터 내일까지를 수집해 저장합니다.

use crate::modules::scrape::{scrape, tomorrow};
use crate::{CollectionStats, CollectorConfig, CollectorError, Result};
use coinfeed_core::{coin_id_for, Timeframe};
use coinfeed_data::{RowSink, WatermarkSource};
use coinfeed_exchange::KlineProvider;
use std::time::Instant;

/// 심볼 하나를 증분 수집합니다.
///
/// 저장된 행이 없으면 `NoWatermark`, 새 캔들이 없으면 `NoData`를 반환하고
/// 아무것도 쓰지 않습니다. 성공하면 저장된 행 수를 반환합니다.
pub async fn scrape_scheduler<P, W, S>(
    provider: &P,
    watermarks: &W,
    sink: &mut S,
    config: &CollectorConfig,
    symbol: &str,
    interval: Timeframe,
) -> Result<u64>
where
    P: KlineProvider + ?Sized,
    W: WatermarkSource + ?Sized,
    S: RowSink + ?Sized,
{
    let coin_id = coin_id_for(symbol)?;

    let latest = watermarks
        .latest_timestamp(coin_id)
        .await?
        .ok_or_else(|| CollectorError::NoWatermark {
            symbol: symbol.to_string(),
        })?;

    let start = latest + config.resume_offset();
    let end = tomorrow();

    tracing::debug!(symbol = symbol, latest = %latest, start = %start, "증분 수집 구간 결정");

    let rows = scrape(provider, symbol, interval, start, end).await?;
    if rows.is_empty() {
        return Err(CollectorError::NoData {
            symbol: symbol.to_string(),
        });
    }

    let notify = config.notification(symbol);
    let written = sink.write_rows(&rows, Some(&notify)).await?;

    tracing::info!(symbol = symbol, rows = written, "증분 수집 저장 완료");
    Ok(written)
}

/// 여러 심볼을 차례로 증분 수집합니다 (데몬 한 주기).
///
/// 한 심볼의 실패는 통계에만 반영하고 다음 심볼로 넘어갑니다.
/// DB 연결 오류가 나면 남은 심볼은 다음 주기로 미룹니다.
pub async fn run_schedules<P, W, S>(
    provider: &P,
    watermarks: &W,
    sink: &mut S,
    config: &CollectorConfig,
    symbols: &[String],
    interval: Timeframe,
) -> CollectionStats
where
    P: KlineProvider + ?Sized,
    W: WatermarkSource + ?Sized,
    S: RowSink + ?Sized,
{
    let started = Instant::now();
    let mut stats = CollectionStats::new();

    for symbol in symbols {
        stats.total += 1;

        match scrape_scheduler(provider, watermarks, sink, config, symbol, interval).await {
            Ok(written) => {
                stats.success += 1;
                stats.total_rows += written;
            }
            Err(CollectorError::NoData { .. }) => {
                stats.empty += 1;
                tracing::debug!(symbol = symbol.as_str(), "새 데이터 없음");
            }
            Err(CollectorError::Data(e)) if e.is_connectivity() => {
                stats.errors += 1;
                tracing::error!(symbol = symbol.as_str(), error = %e, "DB 연결 실패, 이번 주기 중단");
                break;
            }
            Err(e) => {
                stats.errors += 1;
                tracing::error!(symbol = symbol.as_str(), error = %e, "증분 수집 실패");
            }
        }
    }

    stats.elapsed = started.elapsed();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{kline, FakeProvider, FixedWatermarks, RecordingSink};
    use chrono::{TimeZone, Utc};
    use coinfeed_core::CoreError;

    fn watermarks() -> FixedWatermarks {
        let mut marks = FixedWatermarks::default();
        marks
            .0
            .insert(2, Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
        marks
    }

    #[tokio::test]
    async fn test_resumes_one_minute_after_watermark() {
        let provider = FakeProvider::default();
        let mut sink = RecordingSink::default();
        let config = CollectorConfig::default();

        let err = scrape_scheduler(
            &provider,
            &watermarks(),
            &mut sink,
            &config,
            "ETHUSDT",
            Timeframe::M1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CollectorError::NoData { .. }));
        assert!(sink.writes.is_empty());
        assert_eq!(
            provider.requested_starts(),
            vec![Utc.with_ymd_and_hms(2021, 6, 1, 0, 1, 0).unwrap()]
        );

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].2 > Utc::now());
    }

    #[tokio::test]
    async fn test_writes_with_notification() {
        let provider = FakeProvider::with_klines(vec![kline(1_622_505_660_000), kline(1_622_505_720_000)]);
        let mut sink = RecordingSink::default();
        let config = CollectorConfig::default();

        let written = scrape_scheduler(
            &provider,
            &watermarks(),
            &mut sink,
            &config,
            "ethusdt",
            Timeframe::M1,
        )
        .await
        .unwrap();

        assert_eq!(written, 2);
        assert_eq!(sink.writes.len(), 1);
        let notify = sink.writes[0].1.as_ref().unwrap();
        assert_eq!(notify.channel, "test");
        assert_eq!(notify.payload, "new ETHUSDT");
        assert!(sink.writes[0].0.iter().all(|r| r.coin_id == 2));
    }

    #[tokio::test]
    async fn test_missing_watermark() {
        let provider = FakeProvider::with_klines(vec![kline(1_622_505_660_000)]);
        let mut sink = RecordingSink::default();
        let config = CollectorConfig::default();

        let err = scrape_scheduler(
            &provider,
            &watermarks(),
            &mut sink,
            &config,
            "BTCUSDT",
            Timeframe::M1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CollectorError::NoWatermark { .. }));
        assert!(provider.requested_starts().is_empty());
        assert!(sink.writes.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let provider = FakeProvider::default();
        let mut sink = RecordingSink::default();
        let config = CollectorConfig::default();

        let err = scrape_scheduler(
            &provider,
            &watermarks(),
            &mut sink,
            &config,
            "XRPUSDT",
            Timeframe::M1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CollectorError::Core(CoreError::UnknownSymbol(_))));
    }

    #[tokio::test]
    async fn test_run_schedules_counts_outcomes() {
        let provider = FakeProvider::with_klines(vec![kline(1_622_505_660_000)]);
        let mut sink = RecordingSink::default();
        let config = CollectorConfig::default();
        let symbols = vec!["ETHUSDT".to_string(), "BTCUSDT".to_string()];

        let stats = run_schedules(
            &provider,
            &watermarks(),
            &mut sink,
            &config,
            &symbols,
            Timeframe::M1,
        )
        .await;

        assert_eq!(stats.total, 2);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_rows, 1);
    }

    #[tokio::test]
    async fn test_run_schedules_stops_on_lost_connection() {
        let provider = FakeProvider::with_klines(vec![kline(1_622_505_660_000)]);
        let mut sink = RecordingSink {
            disconnected: true,
            ..Default::default()
        };
        let config = CollectorConfig::default();
        let mut marks = watermarks();
        marks
            .0
            .insert(1, Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
        let symbols = vec!["ETHUSDT".to_string(), "BTCUSDT".to_string()];

        let stats = run_schedules(&provider, &marks, &mut sink, &config, &symbols, Timeframe::M1).await;

        assert_eq!(stats.total, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(provider.requested_starts().len(), 1);
    }
}
