//! 거래소 원본 레코드 → `Row` 변환.
//!
//! - 과거 캔들: 12개 필드 배열 (`RawKline`)
//! - 실시간 티커: 24시간 롤링 티커 이벤트 (`TickerEvent`)
//!
//! 숫자 필드는 문자열로 전달되므로 `Decimal`로 정확하게 파싱합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::row::Row;
use crate::error::{CoreError, CoreResult};
use crate::types::{coin_id_for, BINANCE_DATASOURCE_ID};

/// Binance 캔들 원본 레코드.
///
/// REST 응답에서는 12개 원소의 JSON 배열로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKline {
    /// 시작 시각 (epoch ms)
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    /// 종료 시각 (epoch ms)
    pub close_time: i64,
    pub quote_asset_volume: String,
    pub trades: i64,
    pub taker_buy_base_volume: String,
    pub taker_buy_quote_volume: String,
    pub ignore: String,
}

/// Binance 24시간 티커 이벤트 (`<symbol>@ticker`).
///
/// 사용하지 않는 필드는 무시합니다.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    /// 이벤트 시각 (epoch ms)
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    /// 기준 자산 누적 거래량
    #[serde(rename = "v")]
    pub volume: String,
}

/// 결합 스트림 메시지 봉투: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MultiplexMessage<T> {
    pub stream: String,
    pub data: T,
}

/// 밀리초 타임스탬프를 UTC 시각으로 변환합니다.
pub fn millis_to_utc(ms: i64) -> CoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(CoreError::InvalidTimestamp(ms))
}

fn parse_decimal(field: &'static str, value: &str) -> CoreResult<Decimal> {
    Decimal::from_str(value.trim()).map_err(|_| CoreError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// 캔들 레코드 묶음을 `Row`로 변환합니다.
///
/// 입력 순서를 유지하며, 모든 행이 같은 `dumptime`(변환 시점)을 가집니다.
pub fn parse_klines(records: &[RawKline], symbol: &str) -> CoreResult<Vec<Row>> {
    parse_klines_at(records, symbol, Utc::now())
}

/// `parse_klines`와 같지만 수집 시각을 직접 지정합니다.
pub fn parse_klines_at(
    records: &[RawKline],
    symbol: &str,
    dumptime: DateTime<Utc>,
) -> CoreResult<Vec<Row>> {
    let coin_id = coin_id_for(symbol)?;

    records
        .iter()
        .map(|k| {
            Ok(Row {
                timestamp: millis_to_utc(k.open_time)?,
                open: parse_decimal("open", &k.open)?,
                high: parse_decimal("high", &k.high)?,
                low: parse_decimal("low", &k.low)?,
                close: parse_decimal("close", &k.close)?,
                volume: parse_decimal("volume", &k.volume)?,
                close_time: Some(millis_to_utc(k.close_time)?),
                quote_av: parse_decimal("quote_av", &k.quote_asset_volume)?,
                trades: k.trades,
                tb_base_av: parse_decimal("tb_base_av", &k.taker_buy_base_volume)?,
                tb_quote_av: parse_decimal("tb_quote_av", &k.taker_buy_quote_volume)?,
                ignore: parse_decimal("ignore", &k.ignore)?,
                coin_id,
                datasource_id: BINANCE_DATASOURCE_ID,
                dumptime,
            })
        })
        .collect()
}

/// 티커 이벤트를 `Row` 하나로 변환합니다.
///
/// 티커에 없는 필드(quote_av, trades, tb_base_av, tb_quote_av, ignore)는 0,
/// `close_time`은 비워 둡니다.
pub fn parse_ticker(event: &TickerEvent) -> CoreResult<Row> {
    parse_ticker_at(event, Utc::now())
}

/// `parse_ticker`와 같지만 수집 시각을 직접 지정합니다.
pub fn parse_ticker_at(event: &TickerEvent, dumptime: DateTime<Utc>) -> CoreResult<Row> {
    let coin_id = coin_id_for(&event.symbol)?;

    Ok(Row {
        timestamp: millis_to_utc(event.event_time)?,
        open: parse_decimal("open", &event.open)?,
        high: parse_decimal("high", &event.high)?,
        low: parse_decimal("low", &event.low)?,
        close: parse_decimal("close", &event.close)?,
        volume: parse_decimal("volume", &event.volume)?,
        close_time: None,
        quote_av: Decimal::ZERO,
        trades: 0,
        tb_base_av: Decimal::ZERO,
        tb_quote_av: Decimal::ZERO,
        ignore: Decimal::ZERO,
        coin_id,
        datasource_id: BINANCE_DATASOURCE_ID,
        dumptime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn kline(open_time: i64, close: &str) -> RawKline {
        RawKline {
            open_time,
            open: "35000.00".to_string(),
            high: "35100.00".to_string(),
            low: "34900.00".to_string(),
            close: close.to_string(),
            volume: "12.5".to_string(),
            close_time: open_time + 59_999,
            quote_asset_volume: "437500.0".to_string(),
            trades: 321,
            taker_buy_base_volume: "6.1".to_string(),
            taker_buy_quote_volume: "213500.0".to_string(),
            ignore: "0".to_string(),
        }
    }

    #[test]
    fn test_kline_from_json_array() {
        let json = r#"[1622505600000,"35000.00","35100.00","34900.00","35050.00","12.5",
            1622505659999,"437500.0",321,"6.1","213500.0","0"]"#;
        let raw: RawKline = serde_json::from_str(json).unwrap();
        assert_eq!(raw, kline(1_622_505_600_000, "35050.00"));
    }

    #[test]
    fn test_parse_klines_fields() {
        let now = Utc.with_ymd_and_hms(2021, 6, 1, 1, 0, 0).unwrap();
        let rows = parse_klines_at(&[kline(1_622_505_600_000, "35050.00")], "BTCUSDT", now).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.timestamp, Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(row.close, dec!(35050.00));
        assert_eq!(row.trades, 321);
        assert_eq!(row.tb_quote_av, dec!(213500.0));
        assert_eq!(
            row.close_time,
            Some(Utc.timestamp_millis_opt(1_622_505_659_999).unwrap())
        );
        assert_eq!(row.coin_id, 1);
        assert_eq!(row.datasource_id, 1);
        assert_eq!(row.dumptime, now);
    }

    #[test]
    fn test_parse_klines_empty() {
        assert!(parse_klines(&[], "ETHUSDT").unwrap().is_empty());
    }

    #[test]
    fn test_parse_klines_unknown_symbol() {
        let err = parse_klines(&[kline(0, "1")], "DOGEUSDT").unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn test_parse_klines_bad_number() {
        let err = parse_klines(&[kline(0, "n/a")], "BTCUSDT").unwrap_err();
        assert!(matches!(err, CoreError::InvalidNumber { field: "close", .. }));
    }

    #[test]
    fn test_parse_ticker_zero_fills() {
        let json = r#"{"e":"24hrTicker","E":1633981704662,"s":"BTCUSDT","p":"120.0",
            "o":"55000.00","h":"56000.00","l":"54500.00","c":"55500.00","v":"30000.5","q":"1"}"#;
        let event: TickerEvent = serde_json::from_str(json).unwrap();
        let row = parse_ticker(&event).unwrap();

        assert_eq!(row.timestamp.timestamp_millis(), 1_633_981_704_662);
        assert_eq!(row.open, dec!(55000.00));
        assert_eq!(row.close, dec!(55500.00));
        assert_eq!(row.volume, dec!(30000.5));
        assert_eq!(row.close_time, None);
        assert!(row.has_zeroed_history_fields());
        assert_eq!(row.coin_id, 1);
    }

    #[test]
    fn test_multiplex_envelope() {
        let json = r#"{"stream":"ethusdt@ticker","data":{"e":"24hrTicker","E":1,"s":"ETHUSDT",
            "o":"1","h":"2","l":"0.5","c":"1.5","v":"10"}}"#;
        let msg: MultiplexMessage<TickerEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(msg.stream, "ethusdt@ticker");
        assert_eq!(parse_ticker(&msg.data).unwrap().coin_id, 2);
    }

    proptest! {
        #[test]
        fn prop_kline_count_order_and_dumptime(
            times in prop::collection::vec(0i64..4_000_000_000_000, 0..50)
        ) {
            let records: Vec<RawKline> = times.iter().map(|t| kline(*t, "1.5")).collect();
            let now = Utc::now();
            let rows = parse_klines_at(&records, "LINKUSDT", now).unwrap();

            prop_assert_eq!(rows.len(), records.len());
            for (row, t) in rows.iter().zip(times.iter()) {
                prop_assert_eq!(row.timestamp.timestamp_millis(), *t);
                prop_assert_eq!(row.dumptime, now);
                prop_assert_eq!(row.coin_id, 5);
            }
        }
    }
}
