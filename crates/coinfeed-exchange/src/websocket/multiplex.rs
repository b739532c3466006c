//! Binance 결합(multiplex) 티커 스트림.
//!
//! `/stream?streams=a/b` 엔드포인트 하나로 여러 심볼의 24시간 티커를 받습니다.
//! 각 메시지는 `{"stream": "...", "data": {...}}` 봉투에 담겨 옵니다.

use crate::connector::binance::BinanceConfig;
use crate::traits::ExchangeResult;
use crate::ExchangeError;
use coinfeed_core::{MultiplexMessage, TickerEvent};
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TICKER_EVENT: &str = "24hrTicker";

/// 결합 스트림 URL을 만듭니다.
pub fn multiplex_url(base: &str, streams: &[String]) -> String {
    format!("{}/stream?streams={}", base.trim_end_matches('/'), streams.join("/"))
}

/// 텍스트 프레임 하나를 해석합니다.
///
/// - 티커 이벤트 → `Some(Ok(event))`
/// - 다른 종류의 이벤트나 구독 응답 → `None` (무시)
/// - JSON이 아니거나 티커 형식이 깨진 경우 → `Some(Err(..))`
pub fn parse_frame(text: &str) -> Option<ExchangeResult<TickerEvent>> {
    let envelope: MultiplexMessage<Value> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            // 구독 응답 {"result":null,"id":1}는 봉투가 없음
            if serde_json::from_str::<Value>(text).is_ok() {
                return None;
            }
            return Some(Err(ExchangeError::ParseError(e.to_string())));
        }
    };

    if envelope.data.get("e").and_then(Value::as_str) != Some(TICKER_EVENT) {
        debug!(stream = %envelope.stream, "Skipping non-ticker frame");
        return None;
    }

    Some(serde_json::from_value(envelope.data).map_err(ExchangeError::from))
}

/// 결합 티커 스트림 연결.
pub struct TickerStream {
    ws: WsStream,
    streams: Vec<String>,
}

impl TickerStream {
    /// 주어진 스트림들로 WebSocket에 연결합니다.
    pub async fn connect(config: &BinanceConfig, streams: &[String]) -> ExchangeResult<Self> {
        if streams.is_empty() {
            return Err(ExchangeError::Unknown("구독할 스트림이 없습니다".to_string()));
        }

        let url = multiplex_url(config.ws_base_url(), streams);
        info!("Connecting to Binance WebSocket: {}", url);

        let (ws, _) = connect_async(url.as_str()).await?;

        info!(streams = streams.len(), "Connected to Binance WebSocket");
        Ok(Self {
            ws,
            streams: streams.to_vec(),
        })
    }

    pub fn streams(&self) -> &[String] {
        &self.streams
    }

    /// 티커 이벤트 스트림으로 변환합니다.
    ///
    /// 서버가 연결을 닫으면 `Disconnected` 에러를 한 번 내보낸 뒤 끝납니다.
    pub fn into_events(self) -> impl Stream<Item = ExchangeResult<TickerEvent>> + Send {
        stream::unfold(Some(self.ws), |ws| async move {
            let mut ws = ws?;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(item) = parse_frame(&text) {
                            return Some((item, Some(ws)));
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pong 응답은 tungstenite가 읽기 중에 처리
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "WebSocket closed by server");
                        let err = ExchangeError::Disconnected("서버가 연결을 닫았습니다".to_string());
                        return Some((Err(err), None));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        return Some((Err(ExchangeError::from(e)), None));
                    }
                    None => {
                        let err = ExchangeError::Disconnected("스트림 종료".to_string());
                        return Some((Err(err), None));
                    }
                }
            }
        })
    }
}
