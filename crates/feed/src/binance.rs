use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use koyomi_core::common::{Instrument, Interval};
use koyomi_core::config::FeedConfig;
use koyomi_core::market::entity::{Candle, Ticker24h};
use koyomi_core::market::error::MarketError;
use koyomi_core::market::port::{CandleFetcher, CandleQuery};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// 定长 K 线数组中引擎读取的位置
pub const IDX_OPEN_TIME: usize = 0;
pub const IDX_OPEN: usize = 1;
pub const IDX_HIGH: usize = 2;
pub const IDX_LOW: usize = 3;
pub const IDX_CLOSE: usize = 4;
pub const IDX_VOLUME: usize = 5;
pub const IDX_QUOTE_VOLUME: usize = 7;

/// 一条合法记录的最短长度
pub const MIN_ROW_LEN: usize = IDX_QUOTE_VOLUME + 1;

/// Binance 表示"未知交易对"的错误码
const CODE_INVALID_SYMBOL: i64 = -1121;

/// # Summary
/// Binance 现货 REST 行情提供者实现。
///
/// # Invariants
/// - 使用 `reqwest` 异步客户端进行通讯，超时由配置决定。
/// - 不做重试，失败直接映射为 `MarketError`。
#[derive(Clone)]
pub struct BinanceProvider {
    /// 内部使用的 HTTP 客户端
    client: Client,
    // 形如 https://api.binance.com/api/v3，不带结尾斜杠
    base_url: String,
}

/// Binance 错误响应体
#[derive(Deserialize, Debug)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// # Summary
/// `/ticker/24hr` 原始响应，价格均为字符串。
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    last_price: String,
    price_change: String,
    price_change_percent: String,
    open_price: String,
    high_price: String,
    low_price: String,
    volume: String,
    quote_volume: String,
}

impl TryFrom<RawTicker> for Ticker24h {
    type Error = MarketError;

    fn try_from(raw: RawTicker) -> Result<Self, Self::Error> {
        let num = |field: &str, value: &str| -> Result<f64, MarketError> {
            value
                .parse::<Decimal>()
                .ok()
                .and_then(|d| d.to_f64())
                .ok_or_else(|| MarketError::Parse(format!("ticker field {} is not a number: {}", field, value)))
        };
        Ok(Ticker24h {
            last_price: num("lastPrice", &raw.last_price)?,
            price_change: num("priceChange", &raw.price_change)?,
            price_change_pct: num("priceChangePercent", &raw.price_change_percent)?,
            open_price: num("openPrice", &raw.open_price)?,
            high_price: num("highPrice", &raw.high_price)?,
            low_price: num("lowPrice", &raw.low_price)?,
            volume: num("volume", &raw.volume)?,
            quote_volume: num("quoteVolume", &raw.quote_volume)?,
        })
    }
}

impl BinanceProvider {
    /// # Summary
    /// 根据配置创建 BinanceProvider。
    ///
    /// # Logic
    /// 1. 安装 rustls ring 加密后端（已安装时忽略）。
    /// 2. 按配置的超时构建 reqwest 客户端。
    ///
    /// # Arguments
    /// * `config`: 数据源配置。
    ///
    /// # Returns
    /// 客户端构建失败时返回 `MarketError::Network`。
    pub fn new(config: &FeedConfig) -> Result<Self, MarketError> {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MarketError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// 使用外部构建的客户端（测试或自定义代理）
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// # Summary
    /// 发起 GET 请求并解析 JSON。
    ///
    /// # Logic
    /// 1. 429 / 418 视为限流。
    /// 2. 其余非 2xx 尝试解析 Binance 错误体，未知交易对映射为 NotFound。
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, MarketError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            warn!("Binance rate limit hit on {}: HTTP {}", path, status);
            return Err(MarketError::Network(format!("rate limited: HTTP {}", status)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<BinanceErrorBody>(&body) {
                Ok(err) if err.code == CODE_INVALID_SYMBOL => MarketError::NotFound,
                Ok(err) => MarketError::Network(format!("HTTP {} ({}): {}", status, err.code, err.msg)),
                Err(_) => MarketError::Network(format!("HTTP {}", status)),
            });
        }

        resp.json()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))
    }
}

/// # Summary
/// 构建 `/klines` 查询参数。
///
/// # Logic
/// 时间统一为毫秒时间戳，`limit` 取钳制后的有效值。
pub fn kline_params(
    instrument: &Instrument,
    interval: Interval,
    query: &CandleQuery,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", instrument.symbol.clone()),
        ("interval", interval.to_string()),
    ];
    if let Some(start) = query.start {
        params.push(("startTime", start.timestamp_millis().to_string()));
    }
    if let Some(end) = query.end {
        params.push(("endTime", end.timestamp_millis().to_string()));
    }
    params.push(("limit", query.effective_limit().to_string()));
    params
}

/// # Summary
/// 严格解码一条定长 K 线记录。
///
/// # Logic
/// 1. 记录长度不足 8 视为结构漂移。
/// 2. 只读取下标 0、1、2、3、4、5、7；价格可以是 JSON 字符串或数字。
/// 3. 解码后执行 `Candle::validate`。
///
/// # Arguments
/// * `row`: 交易所返回的单条数组记录。
///
/// # Returns
/// 合法 K 线；结构不符返回 `MarketError::Schema`，数值非法返回 `MarketError::Parse`。
pub fn decode_kline(row: &[Value]) -> Result<Candle, MarketError> {
    if row.len() < MIN_ROW_LEN {
        return Err(MarketError::Schema {
            index: row.len(),
            reason: format!("row has {} fields, expected at least {}", row.len(), MIN_ROW_LEN),
        });
    }

    let candle = Candle {
        open_time: timestamp_at(row, IDX_OPEN_TIME)?,
        open: number_at(row, IDX_OPEN)?,
        high: number_at(row, IDX_HIGH)?,
        low: number_at(row, IDX_LOW)?,
        close: number_at(row, IDX_CLOSE)?,
        volume: number_at(row, IDX_VOLUME)?,
        quote_volume: number_at(row, IDX_QUOTE_VOLUME)?,
    };
    candle.validate()?;
    Ok(candle)
}

/// 解码整页记录，任一条失败则整页失败
pub fn decode_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>, MarketError> {
    rows.iter().map(|row| decode_kline(row)).collect()
}

fn timestamp_at(row: &[Value], index: usize) -> Result<DateTime<Utc>, MarketError> {
    let millis = row.get(index).and_then(Value::as_i64).ok_or_else(|| MarketError::Schema {
        index,
        reason: "expected integer millisecond timestamp".into(),
    })?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| MarketError::Schema {
            index,
            reason: format!("timestamp {} out of range", millis),
        })
}

fn decimal_at(row: &[Value], index: usize) -> Result<Decimal, MarketError> {
    let schema = |reason: String| MarketError::Schema { index, reason };
    match row.get(index) {
        Some(Value::String(s)) => s
            .parse::<Decimal>()
            .map_err(|e| schema(format!("invalid decimal {:?}: {}", s, e))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| schema("invalid number".into()))
            .and_then(|f| Decimal::try_from(f).map_err(|e| schema(format!("invalid decimal: {}", e)))),
        Some(other) => Err(schema(format!("expected string or number, got {}", other))),
        None => Err(schema("missing field".into())),
    }
}

fn number_at(row: &[Value], index: usize) -> Result<f64, MarketError> {
    decimal_at(row, index)?
        .to_f64()
        .ok_or_else(|| MarketError::Schema {
            index,
            reason: "decimal not representable as f64".into(),
        })
}

#[async_trait]
impl CandleFetcher for BinanceProvider {
    /// # Summary
    /// 从 Binance `/klines` 抓取 K 线。
    ///
    /// # Logic
    /// 1. 构建 symbol / interval / startTime / endTime / limit 参数。
    /// 2. 以原始 JSON 数组接收，再逐条严格解码。
    ///
    /// # Returns
    /// 成功返回 K 线列表（交易所按开盘时间升序返回）。
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        interval: Interval,
        query: CandleQuery,
    ) -> Result<Vec<Candle>, MarketError> {
        let params = kline_params(instrument, interval, &query);
        let rows: Vec<Vec<Value>> = self.get_json("/klines", &params).await?;
        let candles = decode_klines(&rows)?;
        debug!(
            "fetched {} {} candles for {}",
            candles.len(),
            interval,
            instrument.symbol
        );
        Ok(candles)
    }

    /// # Summary
    /// 从 Binance `/ticker/24hr` 抓取 24 小时行情。
    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<Ticker24h, MarketError> {
        let raw: RawTicker = self
            .get_json("/ticker/24hr", &[("symbol", instrument.symbol.clone())])
            .await?;
        Ticker24h::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample_row() -> Vec<Value> {
        let row = json!([
            1_704_067_200_000_i64,
            "42283.58000000",
            "44184.10000000",
            "42180.77000000",
            "44179.55000000",
            "27174.29903000",
            1_704_153_599_999_i64,
            "1169995682.02416160",
            1_142_140,
            "14007.47628000",
            "603188005.51829480",
            "0"
        ]);
        match row {
            Value::Array(values) => values,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_decode_reads_fixed_positions() {
        let candle = decode_kline(&sample_row()).unwrap();
        assert_eq!(candle.open_time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(candle.open, 42283.58);
        assert_eq!(candle.high, 44184.1);
        assert_eq!(candle.low, 42180.77);
        assert_eq!(candle.close, 44179.55);
        assert_eq!(candle.volume, 27174.29903);
        // 下标 7 是成交额，不是下标 6 的收盘时间
        assert!((candle.quote_volume - 1_169_995_682.024_161_6).abs() < 1e-3);
    }

    #[test]
    fn test_decode_accepts_numeric_prices() {
        let row = json!([1_704_067_200_000_i64, 100.5, 101, 99, 100, 3.25, 0, 325.0]);
        let Value::Array(row) = row else { unreachable!() };
        let candle = decode_kline(&row).unwrap();
        assert_eq!(candle.high, 101.0);
        assert_eq!(candle.quote_volume, 325.0);
    }

    #[test]
    fn test_decimal_precision_is_preserved() {
        let row = sample_row();
        assert_eq!(decimal_at(&row, IDX_OPEN).unwrap(), dec!(42283.58));
        assert_eq!(decimal_at(&row, IDX_QUOTE_VOLUME).unwrap(), dec!(1169995682.0241616));
    }

    #[test]
    fn test_short_row_is_schema_error() {
        let row = sample_row()[..7].to_vec();
        assert!(matches!(
            decode_kline(&row),
            Err(MarketError::Schema { index: 7, .. })
        ));
    }

    #[test]
    fn test_wrong_type_reports_index() {
        let mut row = sample_row();
        row[IDX_QUOTE_VOLUME] = Value::Null;
        assert!(matches!(
            decode_kline(&row),
            Err(MarketError::Schema { index: IDX_QUOTE_VOLUME, .. })
        ));

        let mut row = sample_row();
        row[IDX_OPEN_TIME] = json!("2024-01-01");
        assert!(matches!(
            decode_kline(&row),
            Err(MarketError::Schema { index: IDX_OPEN_TIME, .. })
        ));
    }

    #[test]
    fn test_inconsistent_prices_fail_validation() {
        let mut row = sample_row();
        row[IDX_LOW] = json!("50000.0");
        assert!(matches!(decode_kline(&row), Err(MarketError::Parse(_))));
    }

    #[test]
    fn test_kline_params() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let query = CandleQuery {
            start: Some(start),
            end: None,
            limit: Some(5000),
        };
        let params = kline_params(&Instrument::new("btcusdt"), Interval::Hour1, &query);
        assert_eq!(
            params,
            vec![
                ("symbol", "BTCUSDT".to_string()),
                ("interval", "1h".to_string()),
                ("startTime", "1704067200000".to_string()),
                ("limit", "1000".to_string()),
            ]
        );
    }

    #[test]
    fn test_ticker_decode() {
        let raw: RawTicker = serde_json::from_value(json!({
            "symbol": "BTCUSDT",
            "priceChange": "-94.99999800",
            "priceChangePercent": "-95.960",
            "weightedAvgPrice": "0.29628482",
            "lastPrice": "4.00000200",
            "openPrice": "99.00000000",
            "highPrice": "100.00000000",
            "lowPrice": "0.10000000",
            "volume": "8913.30000000",
            "quoteVolume": "15.30000000",
            "count": 76
        }))
        .unwrap();
        let ticker = Ticker24h::try_from(raw).unwrap();
        assert_eq!(ticker.last_price, 4.000002);
        assert_eq!(ticker.price_change_pct, -95.96);
        assert_eq!(ticker.quote_volume, 15.3);
    }
}
