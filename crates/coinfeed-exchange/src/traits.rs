//! 캔들 제공자 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coinfeed_core::{RawKline, Timeframe};
use futures::stream::BoxStream;

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 과거 캔들 제공자.
///
/// 구현체는 `[start, end]` 구간의 캔들을 시간 오름차순으로 돌려줘야 합니다.
#[async_trait]
pub trait KlineProvider: Send + Sync {
    /// 구간 전체를 한 번에 조회합니다.
    async fn get_historical_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ExchangeResult<Vec<RawKline>>;

    /// 구간을 페이지 단위로 가져오며 캔들을 하나씩 내보냅니다.
    ///
    /// 전체를 메모리에 올리지 않고 순회할 때 사용합니다.
    fn kline_stream<'a>(
        &'a self,
        symbol: &'a str,
        interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxStream<'a, ExchangeResult<RawKline>>;
}
