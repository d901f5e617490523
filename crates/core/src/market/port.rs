use crate::common::{Instrument, Interval};
use crate::market::entity::{Candle, Ticker24h, TimeWindow};
use crate::market::error::MarketError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 交易所单次请求允许返回的最大 K 线条数。
pub const MAX_PAGE_CAP: usize = 1000;

/// 未显式指定 `limit` 时交易所采用的默认条数。
pub const DEFAULT_PAGE_LIMIT: usize = 500;

/// # Summary
/// 单次 K 线抓取的查询参数。
///
/// # Invariants
/// - `start`/`end` 均为可选，缺省时由数据源按"最新数据"语义处理。
/// - 实际请求条数不超过 `MAX_PAGE_CAP`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandleQuery {
    // 起始时间（包含）
    pub start: Option<DateTime<Utc>>,
    // 结束时间（包含）
    pub end: Option<DateTime<Utc>>,
    // 请求条数上限
    pub limit: Option<usize>,
}

impl CandleQuery {
    /// 覆盖整个时间窗口的查询
    pub fn window(window: &TimeWindow) -> Self {
        Self {
            start: Some(window.start()),
            end: Some(window.end()),
            limit: None,
        }
    }

    /// 从某时刻向前回溯 `limit` 根的查询（不设起点）
    pub fn ending_at(end: DateTime<Utc>, limit: usize) -> Self {
        Self {
            start: None,
            end: Some(end),
            limit: Some(limit),
        }
    }

    /// 最新的 `limit` 根 K 线
    pub fn latest(limit: usize) -> Self {
        Self {
            start: None,
            end: None,
            limit: Some(limit),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// # Summary
    /// 计算实际下发给数据源的条数。
    ///
    /// # Logic
    /// 1. 未指定时使用交易所默认值。
    /// 2. 钳制到 `[1, MAX_PAGE_CAP]`。
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_CAP)
    }
}

/// # Summary
/// 行情数据提供者接口（外部协作方边界）。
///
/// # Invariants
/// - 单次调用返回的 K 线条数不超过 `query.effective_limit()`。
/// - 实现方不保证返回数据有序或无缺口，调用方负责排序与去重。
/// - 实现方必须将网络与协议错误映射为 `MarketError`，不得 panic。
#[async_trait]
pub trait CandleFetcher: Send + Sync {
    /// # Summary
    /// 获取指定周期与时间范围内的 K 线。
    ///
    /// # Logic
    /// 1. 按 `query` 构建数据源请求。
    /// 2. 执行网络请求并严格解码定长数组记录。
    ///
    /// # Arguments
    /// * `instrument`: 交易标的。
    /// * `interval`: K 线周期。
    /// * `query`: 时间范围与条数上限。
    ///
    /// # Returns
    /// 成功返回 K 线列表（可能为空），失败返回 MarketError。
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        interval: Interval,
        query: CandleQuery,
    ) -> Result<Vec<Candle>, MarketError>;

    /// # Summary
    /// 获取 24 小时滚动行情统计。
    ///
    /// # Arguments
    /// * `instrument`: 交易标的。
    ///
    /// # Returns
    /// 成功返回 Ticker24h。
    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<Ticker24h, MarketError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit_is_clamped() {
        assert_eq!(CandleQuery::default().effective_limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(CandleQuery::latest(5000).effective_limit(), MAX_PAGE_CAP);
        assert_eq!(CandleQuery::latest(0).effective_limit(), 1);
        assert_eq!(CandleQuery::latest(96).effective_limit(), 96);
    }
}
