//! 캔들 간격(kline interval) 정의.
//!
//! Binance가 지원하는 간격 문자열("1m", "1h", "1M" 등)과 1:1로 대응합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 캔들 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 3분봉
    M3,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 8시간봉
    H8,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 3일봉
    D3,
    /// 주봉
    W1,
    /// 월봉
    MN1,
}

/// (간격, Binance 문자열) 대응표.
const TABLE: [(Timeframe, &str); 15] = [
    (Timeframe::M1, "1m"),
    (Timeframe::M3, "3m"),
    (Timeframe::M5, "5m"),
    (Timeframe::M15, "15m"),
    (Timeframe::M30, "30m"),
    (Timeframe::H1, "1h"),
    (Timeframe::H2, "2h"),
    (Timeframe::H4, "4h"),
    (Timeframe::H6, "6h"),
    (Timeframe::H8, "8h"),
    (Timeframe::H12, "12h"),
    (Timeframe::D1, "1d"),
    (Timeframe::D3, "3d"),
    (Timeframe::W1, "1w"),
    (Timeframe::MN1, "1M"),
];

impl Timeframe {
    /// Binance 간격 문자열로 변환합니다.
    pub fn to_binance_interval(&self) -> &'static str {
        TABLE
            .iter()
            .find(|(tf, _)| tf == self)
            .map(|(_, name)| *name)
            .unwrap_or(TABLE[0].1)
    }

    /// Binance 간격 문자열에서 파싱합니다. 대소문자를 구분합니다 ("1m" ≠ "1M").
    pub fn from_binance_interval(s: &str) -> Option<Self> {
        TABLE.iter().find(|(_, name)| *name == s).map(|(tf, _)| *tf)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_binance_interval())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_binance_interval(s.trim()).ok_or_else(|| CoreError::InvalidTimeframe(s.to_string()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_binance_interval().to_string()
    }
}
