//! 실시간 티커 리스너.
//!
//! 결합 스트림의 티커를 받아 분 경계(반올림한 초가 0)인 것만 저장합니다.

use crate::{CollectionStats, CollectorError, Result};
use coinfeed_core::{coin_id_for, is_minute_mark, parse_ticker, TickerEvent};
use coinfeed_data::{Notification, RowSink};
use coinfeed_exchange::ExchangeResult;
use futures::{pin_mut, Stream, StreamExt};
use std::time::Instant;

/// 티커 스트림이 끝날 때까지 분 단위로 샘플링해 저장합니다.
///
/// 소켓 에러, 잘못된 프레임, 알 수 없는 심볼은 리스너를 종료시킵니다.
/// 분 경계 티커의 숫자 변환 실패와 저장 실패는 기록 후 다음 티커를 계속 처리합니다.
/// 분 경계가 아닌 티커는 변환하지 않고 버립니다.
/// 스트림이 정상 종료되면 누적 통계를 반환합니다.
pub async fn run_listener<E, S>(events: E, sink: &mut S, channel: &str) -> Result<CollectionStats>
where
    E: Stream<Item = ExchangeResult<TickerEvent>>,
    S: RowSink + ?Sized,
{
    let started = Instant::now();
    let mut stats = CollectionStats::new();
    pin_mut!(events);

    tracing::info!(channel = channel, "실시간 리스너 시작");

    while let Some(item) = events.next().await {
        let event = item?;
        coin_id_for(&event.symbol)?;

        if !is_minute_mark(event.event_time) {
            stats.skipped += 1;
            continue;
        }

        stats.total += 1;
        let row = match parse_ticker(&event) {
            Ok(row) => row,
            Err(e) => {
                let err = CollectorError::from(e);
                if err.is_fatal_for_listener() {
                    return Err(err);
                }
                stats.errors += 1;
                tracing::warn!(symbol = event.symbol.as_str(), error = %err, "티커 변환 실패");
                continue;
            }
        };
        let notify = Notification::new_rows(channel, &event.symbol);

        match sink.write_rows(std::slice::from_ref(&row), Some(&notify)).await {
            Ok(written) => {
                stats.success += 1;
                stats.total_rows += written;
                tracing::info!(
                    symbol = event.symbol.as_str(),
                    timestamp = %row.timestamp,
                    close = %row.close,
                    "티커 저장"
                );
            }
            Err(e) => {
                stats.errors += 1;
                tracing::error!(symbol = event.symbol.as_str(), error = %e, "티커 저장 실패");
            }
        }
    }

    stats.elapsed = started.elapsed();
    tracing::info!(saved = stats.success, skipped = stats.skipped, "실시간 리스너 종료");
    Ok(stats)
}
