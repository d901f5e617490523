use crate::market::error::MarketError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// # Summary
/// 单根 K 线数据实体，记录特定时段内的行情波动。
///
/// # Invariants
/// - 所有数值非负且有限。
/// - `low <= open, close <= high`。
/// - 实体不可变，引擎只读取、不修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candle {
    // K 线开始时间
    pub open_time: DateTime<Utc>,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 成交量 (基础资产)
    pub volume: f64,
    // 成交额 (计价资产)
    pub quote_volume: f64,
}

impl Candle {
    /// # Summary
    /// 校验 K 线数值是否满足不变量。
    ///
    /// # Logic
    /// 1. 检查所有数值有限且非负。
    /// 2. 检查 `low <= high`。
    /// 3. 检查开盘价与收盘价均落在 `[low, high]` 区间内。
    ///
    /// # Returns
    /// 合法返回 Ok，否则返回 `MarketError::Parse`。
    pub fn validate(&self) -> Result<(), MarketError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
            ("quote_volume", self.quote_volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(MarketError::Parse(format!(
                    "candle at {} has invalid {}: {}",
                    self.open_time, name, value
                )));
            }
        }

        if self.low > self.high {
            return Err(MarketError::Parse(format!(
                "candle at {} has low {} above high {}",
                self.open_time, self.low, self.high
            )));
        }

        let in_range = |price: f64| price >= self.low && price <= self.high;
        if !in_range(self.open) || !in_range(self.close) {
            return Err(MarketError::Parse(format!(
                "candle at {} has open/close outside [{}, {}]",
                self.open_time, self.low, self.high
            )));
        }

        Ok(())
    }

    /// 单根 K 线的振幅百分比 `(high - low) / open * 100`，开盘价为 0 时返回 None
    pub fn range_pct(&self) -> Option<f64> {
        if self.open > 0.0 {
            Some((self.high - self.low) / self.open * 100.0)
        } else {
            None
        }
    }
}

/// # Summary
/// 闭区间时间窗口 `[start, end]`。
///
/// # Invariants
/// - `start <= end`，由构造函数保证，字段不对外可写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// # Summary
    /// 构造时间窗口。
    ///
    /// # Arguments
    /// * `start`: 开始时间（包含）。
    /// * `end`: 结束时间（包含）。
    ///
    /// # Returns
    /// 若 `end < start` 返回 `MarketError::InvalidRange`。
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, MarketError> {
        if end < start {
            return Err(MarketError::InvalidRange(format!(
                "end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// # Summary
    /// 覆盖若干完整 UTC 日的窗口：`from` 当日 00:00 至 `to` 当日 23:59:59.999。
    ///
    /// # Returns
    /// 若 `to < from` 返回 `MarketError::InvalidRange`。
    pub fn days(from: NaiveDate, to: NaiveDate) -> Result<Self, MarketError> {
        if to < from {
            return Err(MarketError::InvalidRange(format!(
                "to date {} is before from date {}",
                to, from
            )));
        }
        Self::new(start_of_day(from), end_of_day(to))
    }

    /// 单个 UTC 日的窗口
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: start_of_day(date),
            end: end_of_day(date),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// 时间点是否落在窗口内（两端包含）
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time <= self.end
    }

    /// 窗口覆盖的时长（两端包含，因此额外加 1 毫秒）
    pub fn duration(&self) -> Duration {
        self.end - self.start + Duration::milliseconds(1)
    }
}

/// 某 UTC 日的 00:00:00.000
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// 某 UTC 日的 23:59:59.999，对 `NaiveDate::MAX` 同样成立
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let (last_milli, _) = NaiveTime::MIN.overflowing_sub_signed(Duration::milliseconds(1));
    date.and_time(last_milli).and_utc()
}

/// # Summary
/// 24 小时滚动行情统计，对应"今日行情"面板顶部的价格卡片。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Ticker24h {
    // 最新成交价
    pub last_price: f64,
    // 24 小时价格变动
    pub price_change: f64,
    // 24 小时价格变动百分比
    pub price_change_pct: f64,
    // 24 小时前开盘价
    pub open_price: f64,
    // 24 小时最高价
    pub high_price: f64,
    // 24 小时最低价
    pub low_price: f64,
    // 24 小时成交量 (基础资产)
    pub volume: f64,
    // 24 小时成交额 (计价资产)
    pub quote_volume: f64,
}

impl Ticker24h {
    /// 24 小时振幅百分比，开盘价为 0 时返回 0
    pub fn range_pct(&self) -> f64 {
        if self.open_price > 0.0 {
            (self.high_price - self.low_price) / self.open_price * 100.0
        } else {
            0.0
        }
    }
}
