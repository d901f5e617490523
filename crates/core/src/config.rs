use crate::common::{DEFAULT_SYMBOL, WeekStart};
use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub analysis: AnalysisConfig,
    pub ticker: TickerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 行情数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub symbol: String,
    pub timeout_secs: u64,
    // 单次 K 线请求的条数上限
    pub page_cap: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com/api/v3".to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            timeout_secs: 10,
            page_cap: 1000,
        }
    }
}

/// 范围分析参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub week_start: WeekStart,
    // 年度视图每个子窗口的条数上限，决定拆分段数
    pub yearly_page_cap: usize,
    // 日视图回溯的日线条数
    pub day_history_len: usize,
    // 日内图表的 15 分钟线条数
    pub intraday_limit: usize,
    // 年份菜单的起始年份
    pub first_year: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::default(),
            yearly_page_cap: 200,
            day_history_len: 30,
            intraday_limit: 96,
            first_year: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    // EnvFilter 指令，RUST_LOG 优先
    pub level: String,
    // 设置后额外按天滚动写入该目录
    pub dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.feed.symbol, "BTCUSDT");
        assert_eq!(config.feed.page_cap, 1000);
        assert_eq!(config.analysis.yearly_page_cap, 200);
        assert_eq!(config.analysis.week_start, WeekStart::Sunday);
        assert_eq!(config.ticker.poll_interval_secs, 15);
        assert!(config.log.dir.is_none());
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let json = r#"{ "server": { "port": 9000 }, "analysis": { "week_start": "monday" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.analysis.week_start, WeekStart::Monday);
        assert_eq!(config.analysis.day_history_len, 30);
    }
}
