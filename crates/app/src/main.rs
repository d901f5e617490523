use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use koyomi_api::server::{AppState, start_server};
use koyomi_core::analysis::entity::TodayState;
use koyomi_core::common::Instrument;
use koyomi_core::common::time::{RealTimeProvider, TimeProvider};
use koyomi_core::config::{AppConfig, LogConfig};
use koyomi_feed::binance::BinanceProvider;
use koyomi_market::analyzer::MarketAnalyzer;
use koyomi_market::scope::ScopeSettings;
use koyomi_market::ticker::TickerPoller;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// # Summary
/// 加载配置：内置默认值 < `koyomi.{toml,yaml,json}` < `KOYOMI__*` 环境变量。
///
/// # Examples
/// `KOYOMI__SERVER__PORT=9000`、`KOYOMI__ANALYSIS__WEEK_START=monday`
fn load_config() -> Result<AppConfig, config::ConfigError> {
    Config::builder()
        .add_source(File::with_name("koyomi").required(false))
        .add_source(
            Environment::with_prefix("KOYOMI")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// # Summary
/// 初始化全局日志。`RUST_LOG` 优先于配置中的级别；配置了目录时额外按天滚动写文件。
///
/// # Returns
/// 文件日志的后台写入守卫，必须持有到进程退出。
fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "koyomi.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    guard
}

/// # Summary
/// 应用启动入口，负责组装所有具体实现。
///
/// # Logic
/// 1. 加载配置并初始化日志。
/// 2. 实例化行情源与分析门面。
/// 3. 按配置启动"今日行情"轮询任务。
/// 4. 启动 HTTP 服务，收到 Ctrl-C 后依次停止服务与轮询。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let config = load_config()?;
    let _log_guard = init_tracing(&config.log);
    info!("Koyomi starting, tracking {}", config.feed.symbol);

    // 2. 行情源与分析门面
    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);
    let feed = Arc::new(BinanceProvider::new(&config.feed)?);
    let analyzer = Arc::new(
        MarketAnalyzer::new(
            feed,
            Instrument::new(&config.feed.symbol),
            ScopeSettings::from_config(&config),
        )
        .with_clock(clock.clone()),
    );

    // 3. 今日行情轮询
    let (poller, today) = if config.ticker.enabled {
        let period = Duration::from_secs(config.ticker.poll_interval_secs.max(1));
        let handle = TickerPoller::new(analyzer.clone(), period).spawn();
        let rx = handle.subscribe();
        (Some(handle), rx)
    } else {
        warn!("ticker polling disabled by configuration");
        let (_tx, rx) = watch::channel(TodayState::Unavailable {
            reason: "ticker polling is disabled".to_string(),
            at: clock.now(),
        });
        (None, rx)
    };

    // 4. HTTP 服务
    let state = AppState {
        analyzer,
        today,
        clock,
        first_year: config.analysis.first_year,
    };
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    };
    start_server(state, &bind_addr, shutdown).await?;

    if let Some(handle) = poller {
        handle.stop().await;
    }
    info!("Koyomi stopped");
    Ok(())
}
