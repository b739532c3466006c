//! 테스트용 가짜 제공자/저장소.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coinfeed_core::{RawKline, Row, Timeframe};
use coinfeed_data::{DataError, Notification, RowSink, WatermarkSource};
use coinfeed_exchange::{ExchangeError, ExchangeResult, KlineProvider};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn kline(open_time: i64) -> RawKline {
    RawKline {
        open_time,
        open: "100.0".to_string(),
        high: "101.0".to_string(),
        low: "99.5".to_string(),
        close: "100.5".to_string(),
        volume: "3.25".to_string(),
        close_time: open_time + 59_999,
        quote_asset_volume: "326.6".to_string(),
        trades: 9,
        taker_buy_base_volume: "1.5".to_string(),
        taker_buy_quote_volume: "150.7".to_string(),
        ignore: "0".to_string(),
    }
}

/// 고정된 캔들을 돌려주고 요청 구간을 기록하는 제공자.
#[derive(Default)]
pub struct FakeProvider {
    pub klines: Vec<RawKline>,
    pub fail: bool,
    pub requests: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
}

impl FakeProvider {
    pub fn with_klines(klines: Vec<RawKline>) -> Self {
        Self {
            klines,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requested_starts(&self) -> Vec<DateTime<Utc>> {
        self.requests.lock().unwrap().iter().map(|r| r.1).collect()
    }
}

#[async_trait]
impl KlineProvider for FakeProvider {
    async fn get_historical_klines(
        &self,
        symbol: &str,
        _interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ExchangeResult<Vec<RawKline>> {
        self.requests
            .lock()
            .unwrap()
            .push((symbol.to_string(), start, end));
        if self.fail {
            return Err(ExchangeError::NetworkError("connection refused".to_string()));
        }
        Ok(self.klines.clone())
    }

    fn kline_stream<'a>(
        &'a self,
        symbol: &'a str,
        _interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxStream<'a, ExchangeResult<RawKline>> {
        self.requests
            .lock()
            .unwrap()
            .push((symbol.to_string(), start, end));
        if self.fail {
            let err = ExchangeError::NetworkError("connection refused".to_string());
            return stream::iter(vec![Err(err)]).boxed();
        }
        stream::iter(self.klines.clone().into_iter().map(Ok)).boxed()
    }
}

/// 쓰기 호출을 기록하는 저장소.
#[derive(Default)]
pub struct RecordingSink {
    pub writes: Vec<(Vec<Row>, Option<Notification>)>,
    /// 이 인덱스의 쓰기는 실패
    pub fail_on: Vec<usize>,
    /// 모든 쓰기가 연결 오류로 실패
    pub disconnected: bool,
}

impl RecordingSink {
    pub fn rows(&self) -> Vec<Row> {
        self.writes.iter().flat_map(|(rows, _)| rows.clone()).collect()
    }
}

#[async_trait]
impl RowSink for RecordingSink {
    async fn write_rows(
        &mut self,
        rows: &[Row],
        notify: Option<&Notification>,
    ) -> coinfeed_data::Result<u64> {
        if self.disconnected {
            return Err(DataError::ConnectionError("connection refused".to_string()));
        }
        let index = self.writes.len();
        self.writes.push((rows.to_vec(), notify.cloned()));
        if self.fail_on.contains(&index) {
            return Err(DataError::QueryError("insert failed".to_string()));
        }
        Ok(rows.len() as u64)
    }
}

/// coin_id별 고정 워터마크.
#[derive(Default)]
pub struct FixedWatermarks(pub HashMap<i32, DateTime<Utc>>);

#[async_trait]
impl WatermarkSource for FixedWatermarks {
    async fn latest_timestamp(&self, coin_id: i32) -> coinfeed_data::Result<Option<DateTime<Utc>>> {
        Ok(self.0.get(&coin_id).copied())
    }
}
