//! 수집기 설정.
//!
//! 파일/환경 변수 계층 로딩은 `coinfeed_core::AppConfig`가 담당하고,
//! 여기서는 수집기가 쓰는 파생 값을 제공합니다.

use crate::error::CollectorError;
use crate::Result;
use coinfeed_core::{AppConfig, Timeframe};
use coinfeed_data::{Notification, TableRef};
use std::path::Path;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone, Default)]
pub struct CollectorConfig {
    pub settings: AppConfig,
}

impl CollectorConfig {
    pub fn new(settings: AppConfig) -> Self {
        Self { settings }
    }

    /// `.env`, 지정한 설정 디렉토리, 환경 변수에서 설정 로드
    pub fn load_from(config_dir: &Path) -> Result<Self> {
        let settings = AppConfig::load_detected(config_dir)?;
        Ok(Self::new(settings))
    }

    /// 적재 대상 테이블
    pub fn table(&self) -> Result<TableRef> {
        let storage = &self.settings.storage;
        Ok(TableRef::new(&storage.schema, &storage.table)?)
    }

    /// 새 데이터 알림
    pub fn notification(&self, symbol: &str) -> Notification {
        Notification::new_rows(&self.settings.storage.notify_channel, symbol)
    }

    /// 증분 수집 재개 오프셋
    pub fn resume_offset(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.settings.ingest.resume_offset_minutes)
    }

    /// 데몬 실행 주기
    pub fn daemon_interval(&self) -> Duration {
        Duration::from_secs(self.settings.daemon.interval_minutes.max(1) * 60)
    }

    /// 데몬 수집 캔들 간격
    pub fn daemon_timeframe(&self) -> Result<Timeframe> {
        Ok(self.settings.daemon.interval.parse()?)
    }

    /// 실시간 구독 스트림 목록
    pub fn streams(&self) -> Result<Vec<String>> {
        let streams = &self.settings.stream.streams;
        if streams.is_empty() {
            return Err(CollectorError::Config("stream.streams가 비어 있습니다".to_string()));
        }
        Ok(streams.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let config = CollectorConfig::default();
        assert_eq!(config.table().unwrap().to_string(), "prices.coins");
        assert_eq!(config.notification("ethusdt").payload, "new ETHUSDT");
        assert_eq!(config.notification("ethusdt").channel, "test");
        assert_eq!(config.resume_offset(), chrono::Duration::minutes(1));
        assert_eq!(config.daemon_interval(), Duration::from_secs(60));
        assert_eq!(config.daemon_timeframe().unwrap(), Timeframe::M1);
        assert_eq!(config.streams().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_table_is_error() {
        let mut config = CollectorConfig::default();
        config.settings.storage.table = "coins; drop".to_string();
        assert!(config.table().is_err());
    }
}
