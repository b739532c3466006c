//! Binance price collector CLI.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use coinfeed_collector::{modules, CollectorConfig};
use coinfeed_core::{coin_id_for, init_logging, LogConfig, Timeframe};
use coinfeed_data::{
    BatchInsertLoader, BulkWriter, ConnectionWriter, CopyLoader, Database, LoadStrategy,
    PriceRepository,
};
use coinfeed_exchange::{BinanceClient, BinanceConfig, TickerStream};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coinfeed-collector")]
#[command(about = "Binance kline/ticker collector for TimescaleDB", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error). 생략하면 설정 파일 값 사용
    #[arg(long)]
    log_level: Option<String>,

    /// 설정 디렉토리 (common.toml, dev.toml, prod.toml)
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// 구간 캔들을 조회만 하고 저장하지 않음 (CSV 출력 선택)
    Scrape {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "1m")]
        interval: Timeframe,
        /// 시작 시각 (RFC3339 또는 YYYY-MM-DD)
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,
        /// 종료 시각 (기본: 내일)
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,
        /// OHLCV CSV 출력 파일
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// 과거 데이터를 묶음 단위로 수집/저장
    Backfill {
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "1m")]
        interval: Timeframe,
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,
        /// 적재 전략 (insert, copy, parallel-copy)
        #[arg(long, default_value = "copy")]
        strategy: LoadStrategy,
    },

    /// 마지막 저장 시각 이후를 한 번 증분 수집
    Schedule {
        /// 생략하면 daemon.symbols 전체
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<Timeframe>,
    },

    /// 데몬 모드: 주기적으로 증분 수집
    Daemon,

    /// 실시간 티커 스트림을 분 단위로 저장
    Stream,

    /// 심볼의 가장 최근 저장 행 출력
    Latest {
        #[arg(long)]
        symbol: String,
    },

    /// 저장된 OHLCV를 CSV로 내보내기 (`[from, to)` 구간)
    Export {
        #[arg(long)]
        symbol: String,
        #[arg(long, value_parser = parse_time)]
        from: DateTime<Utc>,
        #[arg(long, value_parser = parse_time)]
        to: DateTime<Utc>,
        /// 생략하면 표준 출력
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// 데이터베이스 마이그레이션 실행
    Migrate,
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("시각 형식이 아닙니다: {}", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 설정 로드
    let config = CollectorConfig::load_from(&cli.config_dir).context("설정 로드 실패")?;
    let settings = &config.settings;

    // 로깅 초기화
    let mut log_config = LogConfig::from_settings(&settings.logging);
    if let Some(level) = cli.log_level.clone() {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Coinfeed Collector 시작");
    tracing::debug!(database = %settings.database.redacted_url(), "설정 로드 완료");

    let binance = BinanceClient::new(BinanceConfig::from_settings(&settings.exchange))?;

    // 조회만 하는 명령은 DB 없이 실행
    if let Commands::Scrape {
        symbol,
        interval,
        start,
        end,
        output,
    } = &cli.command
    {
        let end = end.unwrap_or_else(modules::tomorrow);
        let rows = modules::scrape(&binance, symbol, *interval, *start, end).await?;
        tracing::info!(symbol = symbol.as_str(), rows = rows.len(), "조회 완료");

        if let Some(path) = output {
            let file = std::fs::File::create(path)?;
            modules::export_ohlcv(&rows, file)?;
            tracing::info!(path = %path.display(), "CSV 저장 완료");
        }
        return Ok(());
    }

    // DB 연결
    let db = Database::connect(&settings.database).await?;
    tracing::info!("데이터베이스 연결 성공");

    let table = config.table()?;

    match cli.command {
        Commands::Scrape { .. } => {}
        Commands::Backfill {
            symbol,
            interval,
            start,
            end,
            strategy,
        } => {
            let end = end.unwrap_or_else(modules::tomorrow);
            let loader = strategy.loader(&settings.database.connection_url(), &settings.ingest);
            let chunk_size = strategy.chunk_size(&settings.ingest);
            let mut writer = BulkWriter::new(db.clone(), table, loader);
            let notify = config.notification(&symbol);

            tracing::info!(strategy = %strategy, "=== Backfill 시작 ===");
            let stats = modules::scrape_historical(
                &binance,
                &mut writer,
                &symbol,
                interval,
                start,
                end,
                chunk_size,
                Some(&notify),
            )
            .await?;
            stats.log_summary("Backfill");
        }
        Commands::Schedule { symbol, interval } => {
            let interval = match interval {
                Some(tf) => tf,
                None => config.daemon_timeframe()?,
            };
            let symbols = match symbol {
                Some(s) => vec![s],
                None => settings.daemon.symbols.clone(),
            };
            let repo = PriceRepository::new(db.clone(), table.clone());
            let mut writer = BulkWriter::new(db.clone(), table, Box::new(CopyLoader));

            let stats =
                modules::run_schedules(&binance, &repo, &mut writer, &config, &symbols, interval)
                    .await;
            stats.log_summary("증분 수집");
        }
        Commands::Daemon => {
            let interval = config.daemon_timeframe()?;
            let symbols = settings.daemon.symbols.clone();
            let repo = PriceRepository::new(db.clone(), table.clone());
            let mut writer = BulkWriter::new(db.clone(), table, Box::new(CopyLoader));

            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                settings.daemon.interval_minutes
            );

            let mut ticker = tokio::time::interval(config.daemon_interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = ticker.tick() => {
                        let stats = modules::run_schedules(
                            &binance, &repo, &mut writer, &config, &symbols, interval,
                        )
                        .await;
                        stats.log_summary("증분 수집");
                    }
                }
            }
        }
        Commands::Stream => {
            let streams = config.streams()?;
            let channel = settings.storage.notify_channel.clone();
            let mut writer =
                ConnectionWriter::acquire(&db, table, Box::new(BatchInsertLoader)).await?;

            let socket = TickerStream::connect(binance.config(), &streams).await?;
            tracing::info!(streams = ?socket.streams(), "스트림 구독 시작");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("종료 신호 수신, 리스너 종료 중...");
                }
                result = modules::run_listener(socket.into_events(), &mut writer, &channel) => {
                    match result {
                        Ok(stats) => stats.log_summary("실시간 수집"),
                        Err(e) => {
                            tracing::error!(error = %e, "리스너 비정상 종료");
                            db.close().await;
                            return Err(e.into());
                        }
                    }
                }
            }
        }
        Commands::Latest { symbol } => {
            let coin_id = coin_id_for(&symbol)?;
            let repo = PriceRepository::new(db.clone(), table);

            match repo.latest_row(coin_id).await? {
                Some(row) => tracing::info!(
                    symbol = symbol.as_str(),
                    timestamp = %row.timestamp,
                    close = %row.close,
                    volume = %row.volume,
                    "최근 행"
                ),
                None => tracing::warn!(symbol = symbol.as_str(), "저장된 행이 없습니다"),
            }
        }
        Commands::Export {
            symbol,
            from,
            to,
            output,
        } => {
            let coin_id = coin_id_for(&symbol)?;
            let repo = PriceRepository::new(db.clone(), table);
            let rows = repo.rows_between(coin_id, from, to).await?;

            let count = match output {
                Some(path) => modules::export_ohlcv(&rows, std::fs::File::create(&path)?)?,
                None => modules::export_ohlcv(&rows, std::io::stdout().lock())?,
            };
            tracing::info!(symbol = symbol.as_str(), rows = count, "내보내기 완료");
        }
        Commands::Migrate => {
            db.migrate().await?;
            tracing::info!("마이그레이션 완료");
        }
    }

    db.close().await;
    tracing::info!("Coinfeed Collector 종료");

    Ok(())
}
