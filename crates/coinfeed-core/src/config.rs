//! 설정 관리.
//!
//! 설정은 다음 순서로 겹쳐 로드됩니다 (뒤가 우선):
//! 1. 내장 기본값
//! 2. `config/common.toml`
//! 3. `config/<env>.toml` (`dev` 또는 `prod`)
//! 4. `COINFEED__` 접두사 환경 변수 (예: `COINFEED__DATABASE__HOST`)
//!
//! 실행 환경은 `COINFEED_ENV`가 있으면 그 값을, 없으면 호스트 이름으로 결정합니다.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// 운영 호스트 이름. 이 호스트에서는 `prod` 설정을 사용합니다.
pub const PROD_HOSTNAME: &str = "postgres";

/// 실행 환경.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Dev,
    Prod,
}

impl AppEnv {
    /// 설정 파일 이름에 쓰이는 환경 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Dev => "dev",
            AppEnv::Prod => "prod",
        }
    }

    /// 호스트 이름으로 환경을 결정합니다.
    pub fn from_hostname(hostname: &str) -> Self {
        if hostname.trim() == PROD_HOSTNAME {
            AppEnv::Prod
        } else {
            AppEnv::Dev
        }
    }

    /// 현재 프로세스의 실행 환경을 감지합니다.
    pub fn detect() -> Self {
        if let Ok(value) = std::env::var("COINFEED_ENV") {
            if let Ok(env) = value.parse() {
                return env;
            }
            tracing::warn!(value = %value, "Unknown COINFEED_ENV, falling back to hostname");
        }

        let hostname = std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
            .unwrap_or_default();

        Self::from_hostname(&hostname)
    }
}

impl std::str::FromStr for AppEnv {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(AppEnv::Dev),
            "prod" | "production" => Ok(AppEnv::Prod),
            other => Err(CoreError::Config(format!("알 수 없는 환경: {}", other))),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.is_empty())
        .map(SecretString::from))
}

fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub exchange: ExchangeConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
    pub daemon: DaemonConfig,
}

/// 데이터베이스 접속 설정.
#[derive(Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// 풀 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: SecretString::from(String::new()),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl Clone for DatabaseConfig {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: clone_secret(&self.password),
            max_connections: self.max_connections,
            acquire_timeout_secs: self.acquire_timeout_secs,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// 비밀번호를 포함한 접속 URL.
    ///
    /// 외부 도구에 넘길 때만 사용하고 로그에 남기지 않습니다.
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database
        )
    }

    /// 비밀번호를 가린 접속 URL (로그용).
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// 거래소 API 설정.
#[derive(Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// 공개 시세 조회에는 필요 없음
    pub api_key: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_secret")]
    pub api_secret: Option<SecretString>,
    pub testnet: bool,
    pub rest_base_url: Option<String>,
    pub ws_base_url: Option<String>,
    /// REST 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 캔들 요청당 최대 개수
    pub page_limit: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            testnet: false,
            rest_base_url: None,
            ws_base_url: None,
            timeout_secs: 30,
            page_limit: 1000,
        }
    }
}

impl Clone for ExchangeConfig {
    fn clone(&self) -> Self {
        Self {
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.as_ref().map(clone_secret),
            testnet: self.testnet,
            rest_base_url: self.rest_base_url.clone(),
            ws_base_url: self.ws_base_url.clone(),
            timeout_secs: self.timeout_secs,
            page_limit: self.page_limit,
        }
    }
}

impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("testnet", &self.testnet)
            .field("rest_base_url", &self.rest_base_url)
            .field("ws_base_url", &self.ws_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

/// 저장 위치 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub schema: String,
    pub table: String,
    /// 적재 후 NOTIFY 채널
    pub notify_channel: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            schema: "prices".to_string(),
            table: "coins".to_string(),
            notify_channel: "test".to_string(),
        }
    }
}

/// 적재 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 과거 데이터 COPY 묶음 크기
    pub copy_chunk_size: usize,
    /// 병렬 COPY 묶음 크기 (backfill)
    pub parallel_chunk_size: usize,
    /// 마지막 저장 시각 이후 재개 오프셋 (분)
    pub resume_offset_minutes: i64,
    /// 병렬 COPY 도구 실행 파일
    pub parallel_copy_bin: String,
    pub workers: u32,
    /// 임시 CSV 파일 디렉토리
    pub work_dir: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            copy_chunk_size: 50_000,
            parallel_chunk_size: 250_000,
            resume_offset_minutes: 1,
            parallel_copy_bin: "timescaledb-parallel-copy".to_string(),
            workers: 1,
            work_dir: std::env::temp_dir().to_string_lossy().into_owned(),
        }
    }
}

/// 실시간 스트림 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 구독할 스트림 이름 (예: "btcusdt@ticker")
    pub streams: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            streams: vec!["btcusdt@ticker".to_string(), "ethusdt@ticker".to_string()],
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// pretty, json, compact
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 데몬 모드 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// 증분 수집 주기 (분)
    pub interval_minutes: u64,
    /// 수집 대상 심볼
    pub symbols: Vec<String>,
    pub interval: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 1,
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            interval: "1m".to_string(),
        }
    }
}

impl AppConfig {
    /// 설정 디렉토리와 환경으로 설정을 로드합니다.
    ///
    /// 파일이 없으면 건너뛰고 기본값을 사용합니다.
    pub fn load<P: AsRef<Path>>(config_dir: P, env: AppEnv) -> CoreResult<Self> {
        let dir = config_dir.as_ref();

        let builder = config::Config::builder()
            .add_source(config::File::from(dir.join("common.toml")).required(false))
            .add_source(config::File::from(dir.join(format!("{}.toml", env.as_str()))).required(false))
            .add_source(
                config::Environment::with_prefix("COINFEED")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("stream.streams")
                    .with_list_parse_key("daemon.symbols")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// `.env`를 읽고 환경을 감지한 뒤 `config_dir`에서 로드합니다.
    pub fn load_detected<P: AsRef<Path>>(config_dir: P) -> CoreResult<Self> {
        dotenvy::dotenv().ok();
        let env = AppEnv::detect();
        tracing::debug!(env = env.as_str(), "Loading configuration");
        Self::load(config_dir, env)
    }


    fn validate(&self) -> CoreResult<()> {
        if self.ingest.copy_chunk_size == 0 || self.ingest.parallel_chunk_size == 0 {
            return Err(CoreError::Config("묶음 크기는 1 이상이어야 합니다".to_string()));
        }
        if self.ingest.workers == 0 {
            return Err(CoreError::Config("workers는 1 이상이어야 합니다".to_string()));
        }
        if self.exchange.page_limit == 0 {
            return Err(CoreError::Config("page_limit은 1 이상이어야 합니다".to_string()));
        }
        Ok(())
    }
}
