//! 수집 대상 코인과 coin_id 고정 매핑.
//!
//! 매핑은 닫혀 있습니다: 목록에 없는 심볼은 기본값으로 대체되지 않고 조회 에러가 됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Binance 데이터소스 ID.
pub const BINANCE_DATASOURCE_ID: i32 = 1;

/// 수집 대상 거래쌍.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Coin {
    BtcUsdt,
    EthUsdt,
    LtcUsdt,
    BnbUsdt,
    LinkUsdt,
}

impl Coin {
    /// 지원하는 모든 코인.
    pub const ALL: [Coin; 5] = [
        Coin::BtcUsdt,
        Coin::EthUsdt,
        Coin::LtcUsdt,
        Coin::BnbUsdt,
        Coin::LinkUsdt,
    ];

    /// 거래소 심볼 (예: "BTCUSDT").
    pub fn symbol(&self) -> &'static str {
        match self {
            Coin::BtcUsdt => "BTCUSDT",
            Coin::EthUsdt => "ETHUSDT",
            Coin::LtcUsdt => "LTCUSDT",
            Coin::BnbUsdt => "BNBUSDT",
            Coin::LinkUsdt => "LINKUSDT",
        }
    }

    /// DB의 coin_id.
    pub fn coin_id(&self) -> i32 {
        match self {
            Coin::BtcUsdt => 1,
            Coin::EthUsdt => 2,
            Coin::LtcUsdt => 3,
            Coin::BnbUsdt => 4,
            Coin::LinkUsdt => 5,
        }
    }

    /// 심볼로 코인을 조회합니다. 대소문자는 무시합니다.
    pub fn from_symbol(symbol: &str) -> Result<Self, CoreError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.symbol().eq_ignore_ascii_case(symbol.trim()))
            .ok_or_else(|| CoreError::UnknownSymbol(symbol.to_string()))
    }

    /// coin_id로 코인을 조회합니다.
    pub fn from_coin_id(coin_id: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.coin_id() == coin_id)
    }

    /// 24시간 티커 스트림 이름 (예: "btcusdt@ticker").
    pub fn ticker_stream(&self) -> String {
        format!("{}@ticker", self.symbol().to_lowercase())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Coin {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s)
    }
}

impl TryFrom<String> for Coin {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_symbol(&value)
    }
}

impl From<Coin> for String {
    fn from(coin: Coin) -> Self {
        coin.symbol().to_string()
    }
}

/// 심볼 → coin_id 조회.
pub fn coin_id_for(symbol: &str) -> Result<i32, CoreError> {
    Coin::from_symbol(symbol).map(|c| c.coin_id())
}
