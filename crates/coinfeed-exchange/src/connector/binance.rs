//! Binance 거래소 커넥터.
//!
//! 공개 REST API(`/api/v3/klines`)로 과거 캔들을 페이지 단위로 조회합니다.
//! 메인넷과 테스트넷 모두 지원.

use crate::traits::{ExchangeResult, KlineProvider};
use crate::ExchangeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coinfeed_core::{ExchangeConfig, RawKline, Timeframe};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, error, instrument};

const MAINNET_REST: &str = "https://api.binance.com";
const TESTNET_REST: &str = "https://testnet.binance.vision";
const MAINNET_WS: &str = "wss://stream.binance.com:9443";
const TESTNET_WS: &str = "wss://testnet.binance.vision";

/// Binance가 허용하는 요청당 최대 캔들 수.
pub const MAX_PAGE_LIMIT: u32 = 1000;

// ============================================================================
// 설정
// ============================================================================

/// Binance 클라이언트 설정.
///
/// `Debug` 구현은 API 키와 시크릿을 마스킹합니다.
pub struct BinanceConfig {
    /// 공개 시세 조회에는 필요 없음
    pub api_key: Option<String>,
    pub api_secret: Option<SecretString>,
    pub testnet: bool,
    /// REST 기본 URL 재정의 (테스트용)
    pub rest_url: Option<String>,
    /// WebSocket 기본 URL 재정의
    pub ws_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 요청당 캔들 수
    pub page_limit: u32,
}

impl fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = match &self.api_key {
            Some(key) if key.len() > 8 => {
                format!("{}...{}", &key[..4], &key[key.len() - 4..])
            }
            Some(_) => "***REDACTED***".to_string(),
            None => "none".to_string(),
        };

        f.debug_struct("BinanceConfig")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .field("testnet", &self.testnet)
            .field("rest_url", &self.rest_url)
            .field("ws_url", &self.ws_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            testnet: false,
            rest_url: None,
            ws_url: None,
            timeout_secs: 30,
            page_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl BinanceConfig {
    /// 애플리케이션 설정의 `[exchange]` 섹션에서 생성.
    pub fn from_settings(settings: &ExchangeConfig) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            api_secret: settings
                .api_secret
                .as_ref()
                .map(|s| SecretString::from(s.expose_secret().to_owned())),
            testnet: settings.testnet,
            rest_url: settings.rest_base_url.clone(),
            ws_url: settings.ws_base_url.clone(),
            timeout_secs: settings.timeout_secs,
            page_limit: settings.page_limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// REST 기본 URL을 재정의합니다.
    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = Some(url.into());
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        match &self.rest_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.testnet => TESTNET_REST,
            None => MAINNET_REST,
        }
    }

    /// WebSocket 기본 URL 반환 (`/stream`, `/ws` 경로 제외).
    pub fn ws_base_url(&self) -> &str {
        match &self.ws_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.testnet => TESTNET_WS,
            None => MAINNET_WS,
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

// ============================================================================
// Binance 클라이언트
// ============================================================================

/// Binance 공개 시세 클라이언트.
pub struct BinanceClient {
    config: BinanceConfig,
    client: Client,
}

impl BinanceClient {
    /// 새 Binance 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e))
            })?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 공개 API 요청 (서명 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        let query = Self::build_query(params);

        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let mut request = self.client.get(&full_url);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::ParseError(e.to_string())
            })
        } else if status.as_u16() == 429 || status.as_u16() == 418 {
            Err(ExchangeError::RateLimited)
        } else if let Ok(error) = serde_json::from_str::<BinanceError>(&body) {
            Err(Self::map_error_code(error.code, &error.msg))
        } else {
            Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            })
        }
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        match code {
            -1000 => ExchangeError::Unknown(msg.to_string()),
            -1001 => ExchangeError::Disconnected(msg.to_string()),
            -1002 | -2015 => ExchangeError::Unauthorized(msg.to_string()),
            -1003 => ExchangeError::RateLimited,
            -1121 => ExchangeError::InvalidSymbol(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }

    /// 캔들 한 페이지 조회.
    ///
    /// `[start_ms, end_ms]` 구간에서 시작 시각 기준 최대 `page_limit`개를 반환합니다.
    pub async fn get_klines_page(
        &self,
        symbol: &str,
        interval: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> ExchangeResult<Vec<RawKline>> {
        self.public_get(
            "/api/v3/klines",
            &[
                ("symbol", symbol.to_uppercase()),
                ("interval", interval.to_binance_interval().to_string()),
                ("startTime", start_ms.to_string()),
                ("endTime", end_ms.to_string()),
                ("limit", self.config.page_limit.to_string()),
            ],
        )
        .await
    }
}

/// 다음 페이지의 시작 시각. 마지막 페이지였으면 `None`.
///
/// 마지막 캔들의 종료 시각 다음 밀리초부터 이어 받습니다 (월봉처럼 길이가 가변인 간격 포함).
fn next_page_start(page: &[RawKline], limit: u32, end_ms: i64) -> Option<i64> {
    let last = page.last()?;
    if page.len() < limit as usize {
        return None;
    }
    let next = last.close_time + 1;
    (next <= end_ms).then_some(next)
}

#[async_trait]
impl KlineProvider for BinanceClient {
    #[instrument(skip(self))]
    async fn get_historical_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ExchangeResult<Vec<RawKline>> {
        let klines: Vec<RawKline> = self
            .kline_stream(symbol, interval, start, end)
            .try_collect()
            .await?;

        debug!(count = klines.len(), "Fetched historical klines");
        Ok(klines)
    }

    fn kline_stream<'a>(
        &'a self,
        symbol: &'a str,
        interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxStream<'a, ExchangeResult<RawKline>> {
        let end_ms = end.timestamp_millis();
        let limit = self.config.page_limit;
        let first = Some(start.timestamp_millis()).filter(|s| *s <= end_ms);

        stream::try_unfold(first, move |cursor| async move {
            let Some(start_ms) = cursor else {
                return Ok(None);
            };

            let page = self
                .get_klines_page(symbol, interval, start_ms, end_ms)
                .await?;
            debug!(symbol, start_ms, count = page.len(), "Fetched kline page");

            let next = next_page_start(&page, limit, end_ms);
            Ok::<_, ExchangeError>(Some((page, next)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, ExchangeError>)))
        .try_flatten()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;

    fn kline_json(open_time: i64) -> String {
        format!(
            r#"[{},"1.0","2.0","0.5","1.5","10.0",{},"15.0",7,"4.0","6.0","0"]"#,
            open_time,
            open_time + 59_999
        )
    }

    fn page_body(open_times: &[i64]) -> String {
        let items: Vec<String> = open_times.iter().map(|t| kline_json(*t)).collect();
        format!("[{}]", items.join(","))
    }

    fn client_for(server: &mockito::ServerGuard, limit: u32) -> BinanceClient {
        let config = BinanceConfig::default()
            .with_rest_url(server.url())
            .with_page_limit(limit);
        BinanceClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_paginates_until_short_page() {
        let mut server = mockito::Server::new_async().await;

        let first = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1m".into()),
                Matcher::UrlEncoded("startTime".into(), "0".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_body(page_body(&[0, 60_000]))
            .expect(1)
            .create_async()
            .await;

        let second = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::UrlEncoded("startTime".into(), "120000".into()))
            .with_body(page_body(&[120_000]))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, 2);
        let start = Utc.timestamp_millis_opt(0).unwrap();
        let end = Utc.timestamp_millis_opt(600_000).unwrap();

        let klines = client
            .get_historical_klines("BTCUSDT", Timeframe::M1, start, end)
            .await
            .unwrap();

        let times: Vec<i64> = klines.iter().map(|k| k.open_time).collect();
        assert_eq!(times, vec![0, 60_000, 120_000]);
        assert_eq!(klines[0].trades, 7);

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_range_returns_nothing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, 1000);
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let klines = client
            .get_historical_klines("ETHUSDT", Timeframe::M1, start, start + chrono::Duration::days(1))
            .await
            .unwrap();

        assert!(klines.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_start_after_end_makes_no_request() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server, 1000);
        let end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();

        let klines = client
            .get_historical_klines("ETHUSDT", Timeframe::M1, end + chrono::Duration::minutes(1), end)
            .await
            .unwrap();
        assert!(klines.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_symbol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let client = client_for(&server, 1000);
        let start = Utc.timestamp_millis_opt(0).unwrap();
        let err = client
            .get_historical_klines("NOPE", Timeframe::M1, start, start + chrono::Duration::hours(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::InvalidSymbol(_)));
    }

    #[test]
    fn test_next_page_start() {
        let page: Vec<RawKline> = [0i64, 60_000]
            .iter()
            .map(|t| serde_json::from_str(&kline_json(*t)).unwrap())
            .collect();

        assert_eq!(next_page_start(&page, 2, 1_000_000), Some(120_000));
        assert_eq!(next_page_start(&page, 3, 1_000_000), None);
        assert_eq!(next_page_start(&page, 2, 100_000), None);
        assert_eq!(next_page_start(&[], 2, 1_000_000), None);
    }

    fn month_kline_json(open: DateTime<Utc>, next_open: DateTime<Utc>) -> String {
        format!(
            r#"[{},"1.0","2.0","0.5","1.5","10.0",{},"15.0",7,"4.0","6.0","0"]"#,
            open.timestamp_millis(),
            next_open.timestamp_millis() - 1
        )
    }

    #[tokio::test]
    async fn test_monthly_pages_follow_calendar() {
        let feb = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap();
        let mar = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        let apr = Utc.with_ymd_and_hms(2021, 4, 1, 0, 0, 0).unwrap();

        let mut server = mockito::Server::new_async().await;
        let feb_page = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("interval".into(), "1M".into()),
                Matcher::UrlEncoded("startTime".into(), feb.timestamp_millis().to_string()),
            ]))
            .with_body(format!("[{}]", month_kline_json(feb, mar)))
            .expect(1)
            .create_async()
            .await;
        let mar_page = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::UrlEncoded(
                "startTime".into(),
                mar.timestamp_millis().to_string(),
            ))
            .with_body(format!("[{}]", month_kline_json(mar, apr)))
            .expect(1)
            .create_async()
            .await;
        let apr_page = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::UrlEncoded(
                "startTime".into(),
                apr.timestamp_millis().to_string(),
            ))
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, 1);
        let klines = client
            .get_historical_klines("BTCUSDT", Timeframe::MN1, feb, apr)
            .await
            .unwrap();

        let opens: Vec<i64> = klines.iter().map(|k| k.open_time).collect();
        assert_eq!(opens, vec![feb.timestamp_millis(), mar.timestamp_millis()]);

        feb_page.assert_async().await;
        mar_page.assert_async().await;
        apr_page.assert_async().await;
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = BinanceConfig {
            api_key: Some("vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zv".to_string()),
            api_secret: Some(SecretString::from("NhqPtmdSJYdKjVHj".to_string())),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("vmPU...E2zv"));
        assert!(!debug.contains("NhqPtmdSJYdKjVHj"));
        assert_eq!(config.rest_base_url(), "https://api.binance.com");
        assert_eq!(config.ws_base_url(), "wss://stream.binance.com:9443");
    }
}
