//! 测试专用的内存行情源，模拟交易所 K 线接口的分页语义。

use crate::common::{Instrument, Interval};
use crate::market::entity::{Candle, Ticker24h};
use crate::market::error::MarketError;
use crate::market::port::{CandleFetcher, CandleQuery};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// # Summary
/// 基于内存序列的 `CandleFetcher` 实现。
///
/// # Invariants
/// - 带 `start` 的查询返回范围内最早的 `limit` 根，否则返回最新的 `limit` 根（与交易所一致）。
/// - 每次调用都会被计数并记录查询参数，便于断言抓取次数。
#[derive(Default)]
pub struct MockCandleFetcher {
    // 各周期的预置 K 线序列（升序）
    series: DashMap<Interval, Vec<Candle>>,
    // 预置的 24 小时行情
    ticker: Mutex<Option<Ticker24h>>,
    // 注入的失败，设置后所有调用均返回该错误
    failure: Mutex<Option<MarketError>>,
    // 模拟网络延迟
    delay: Mutex<Option<Duration>>,
    candle_calls: AtomicUsize,
    ticker_calls: AtomicUsize,
    requests: Mutex<Vec<(Interval, CandleQuery)>>,
}

impl MockCandleFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置某周期的 K 线序列
    pub fn with_series(self, interval: Interval, candles: Vec<Candle>) -> Self {
        self.set_series(interval, candles);
        self
    }

    pub fn set_series(&self, interval: Interval, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.open_time);
        self.series.insert(interval, candles);
    }

    pub fn set_ticker(&self, ticker: Ticker24h) {
        *self.ticker.lock().unwrap_or_else(|e| e.into_inner()) = Some(ticker);
    }

    /// 注入（或清除）失败
    pub fn fail_with(&self, error: Option<MarketError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// K 线接口累计调用次数
    pub fn candle_calls(&self) -> usize {
        self.candle_calls.load(Ordering::SeqCst)
    }

    /// 行情统计接口累计调用次数
    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    /// 所有 K 线调用的查询参数（按调用顺序）
    pub fn requests(&self) -> Vec<(Interval, CandleQuery)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn simulate(&self) -> Result<(), MarketError> {
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn select(&self, interval: Interval, query: &CandleQuery) -> Vec<Candle> {
        let Some(series) = self.series.get(&interval) else {
            return Vec::new();
        };
        let in_range: Vec<Candle> = series
            .iter()
            .filter(|c| query.start.is_none_or(|s| c.open_time >= s))
            .filter(|c| query.end.is_none_or(|e| c.open_time <= e))
            .cloned()
            .collect();

        let limit = query.effective_limit();
        if query.start.is_some() {
            in_range.into_iter().take(limit).collect()
        } else {
            let skip = in_range.len().saturating_sub(limit);
            in_range.into_iter().skip(skip).collect()
        }
    }
}

#[async_trait]
impl CandleFetcher for MockCandleFetcher {
    async fn fetch_candles(
        &self,
        _: &Instrument,
        interval: Interval,
        query: CandleQuery,
    ) -> Result<Vec<Candle>, MarketError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((interval, query));
        self.simulate().await?;
        Ok(self.select(interval, &query))
    }

    async fn fetch_ticker(&self, _: &Instrument) -> Result<Ticker24h, MarketError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        self.ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(MarketError::NotFound)
    }
}

/// # Summary
/// 生成确定性的连续 K 线序列。
///
/// # Logic
/// 每三根中两根上涨 1.0、一根下跌 0.75，上下影线各 0.5，成交量逐根递增。
pub fn candles_from(start: DateTime<Utc>, interval: Interval, count: usize) -> Vec<Candle> {
    let mut out = Vec::with_capacity(count);
    let mut open = 100.0_f64;
    let mut volume = 10.0_f64;
    let mut time = start;
    for i in 0..count {
        let close = if i % 3 == 2 { open - 0.75 } else { open + 1.0 };
        out.push(Candle {
            open_time: time,
            open,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            close,
            volume,
            quote_volume: volume * close,
        });
        open = close;
        volume += 1.0;
        time += interval.duration();
    }
    out
}

/// 从某日 00:00 UTC 起连续生成 `days` 根日线
pub fn daily_candles(from: NaiveDate, days: usize) -> Vec<Candle> {
    candles_from(
        crate::market::entity::start_of_day(from),
        Interval::Day1,
        days,
    )
}

/// 测试用的 24 小时行情样本
pub fn sample_ticker() -> Ticker24h {
    Ticker24h {
        last_price: 67_250.5,
        price_change: 1_250.5,
        price_change_pct: 1.895,
        open_price: 66_000.0,
        high_price: 67_900.0,
        low_price: 65_800.0,
        volume: 18_432.7,
        quote_volume: 1_236_540_112.4,
    }
}
