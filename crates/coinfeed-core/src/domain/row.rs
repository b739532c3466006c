//! 정규화된 가격 행.
//!
//! 과거 캔들과 실시간 티커 모두 이 하나의 형태로 변환되어 저장소까지 이동합니다.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `Row`의 정규 컬럼 순서.
pub const ROW_COLUMNS: [&str; 15] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_av",
    "trades",
    "tb_base_av",
    "tb_quote_av",
    "ignore",
    "coin_id",
    "datasource_id",
    "dumptime",
];

/// 저장 단위가 되는 OHLCV + 메타데이터 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Row {
    /// 캔들 시작 시각 (티커는 이벤트 시각)
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// 캔들 종료 시각 (과거 캔들 전용)
    pub close_time: Option<DateTime<Utc>>,
    /// 호가 자산 거래대금
    pub quote_av: Decimal,
    /// 체결 건수
    pub trades: i64,
    /// Taker 매수 기준 자산 거래량
    pub tb_base_av: Decimal,
    /// Taker 매수 호가 자산 거래량
    pub tb_quote_av: Decimal,
    pub ignore: Decimal,
    pub coin_id: i32,
    pub datasource_id: i32,
    /// 수집 시각
    pub dumptime: DateTime<Utc>,
}

/// 컬럼 하나의 값.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Time(DateTime<Utc>),
    Decimal(Decimal),
    Int(i64),
    Null,
}

impl fmt::Display for Cell {
    /// COPY CSV 형식으로 출력합니다. `Null`은 빈 필드가 됩니다.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Cell::Decimal(d) => write!(f, "{}", d),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Null => Ok(()),
        }
    }
}

impl Row {
    /// 컬럼 이름으로 값을 꺼냅니다. 모르는 컬럼이면 `None`.
    pub fn cell(&self, column: &str) -> Option<Cell> {
        let cell = match column {
            "timestamp" => Cell::Time(self.timestamp),
            "open" => Cell::Decimal(self.open),
            "high" => Cell::Decimal(self.high),
            "low" => Cell::Decimal(self.low),
            "close" => Cell::Decimal(self.close),
            "volume" => Cell::Decimal(self.volume),
            "close_time" => self.close_time.map(Cell::Time).unwrap_or(Cell::Null),
            "quote_av" => Cell::Decimal(self.quote_av),
            "trades" => Cell::Int(self.trades),
            "tb_base_av" => Cell::Decimal(self.tb_base_av),
            "tb_quote_av" => Cell::Decimal(self.tb_quote_av),
            "ignore" => Cell::Decimal(self.ignore),
            "coin_id" => Cell::Int(self.coin_id as i64),
            "datasource_id" => Cell::Int(self.datasource_id as i64),
            "dumptime" => Cell::Time(self.dumptime),
            _ => return None,
        };
        Some(cell)
    }

    /// 스트리밍 피드가 제공하지 않는 다섯 필드가 모두 0인지 확인합니다.
    pub fn has_zeroed_history_fields(&self) -> bool {
        self.quote_av.is_zero()
            && self.trades == 0
            && self.tb_base_av.is_zero()
            && self.tb_quote_av.is_zero()
            && self.ignore.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_row() -> Row {
        Row {
            timestamp: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
            open: dec!(36000.5),
            high: dec!(36100),
            low: dec!(35900),
            close: dec!(36050.25),
            volume: dec!(12.5),
            close_time: None,
            quote_av: dec!(0),
            trades: 0,
            tb_base_av: dec!(0),
            tb_quote_av: dec!(0),
            ignore: dec!(0),
            coin_id: 1,
            datasource_id: 1,
            dumptime: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 1).unwrap(),
        }
    }

    #[test]
    fn test_every_column_resolves() {
        let row = sample_row();
        for column in ROW_COLUMNS {
            assert!(row.cell(column).is_some(), "column {} missing", column);
        }
        assert_eq!(row.cell("id"), None);
    }

    #[test]
    fn test_cell_text() {
        let row = sample_row();
        assert_eq!(row.cell("timestamp").unwrap().to_string(), "2021-06-01T00:00:00Z");
        assert_eq!(row.cell("close").unwrap().to_string(), "36050.25");
        assert_eq!(row.cell("close_time").unwrap().to_string(), "");
        assert_eq!(row.cell("coin_id").unwrap().to_string(), "1");
    }

    #[test]
    fn test_millisecond_timestamp_text() {
        let t = Utc.timestamp_millis_opt(1_633_981_704_662).unwrap();
        assert_eq!(Cell::Time(t).to_string(), "2021-10-11T19:48:24.662Z");
    }
}
