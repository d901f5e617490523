use crate::market::entity::{Candle, Ticker24h, TimeWindow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// # Summary
/// 一段 K 线序列的汇总统计，每次查询重新计算，不缓存、不持久化。
///
/// # Invariants
/// - 输入为空时所有字段为 0（`Default`），不得出现 NaN 或无穷大。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PeriodSummary {
    // (末根收盘 - 首根开盘) / 首根开盘 * 100
    pub performance_pct: f64,
    // 各 K 线振幅百分比的算术平均
    pub avg_volatility_pct: f64,
    // 成交量合计 (基础资产)
    pub total_volume: f64,
    // 成交额合计 (计价资产)
    pub total_quote_volume: f64,
    // 区间最高价
    pub period_high: f64,
    // 区间最低价
    pub period_low: f64,
    // 参与统计的 K 线数量
    pub candle_count: usize,
}

/// # Summary
/// 技术指标快照。
///
/// # Invariants
/// - `None` 表示历史数据不足（不是错误）。
/// - `rsi14` 取值范围 `[0, 100]`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IndicatorSnapshot {
    pub rsi14: Option<f64>,
    pub sma20: Option<f64>,
}

/// 图表序列中的一个点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub close: f64,
    // 仅月度视图携带（成交额）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl ChartPoint {
    pub fn from_candle(candle: &Candle) -> Self {
        Self {
            time: candle.open_time,
            close: candle.close,
            volume: None,
        }
    }

    pub fn with_volume(candle: &Candle) -> Self {
        Self {
            volume: Some(candle.quote_volume),
            ..Self::from_candle(candle)
        }
    }
}

/// # Summary
/// 面向 UI 的范围选择器。
///
/// # Invariants
/// - `Month::month_index` 从 0 开始（0 = 一月）。
/// - `Week::week` 从 1 开始。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Day { date: NaiveDate },
    Week { year: i32, week: u32 },
    Month { year: i32, month_index: u32 },
    Year { year: i32 },
    Custom { from: NaiveDate, to: NaiveDate },
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Day { date } => write!(f, "day {}", date),
            Scope::Week { year, week } => write!(f, "week {} of {}", week, year),
            Scope::Month { year, month_index } => {
                write!(f, "month {:02} of {}", month_index.saturating_add(1), year)
            }
            Scope::Year { year } => write!(f, "year {}", year),
            Scope::Custom { from, to } => write!(f, "range {} .. {}", from, to),
        }
    }
}

/// # Summary
/// 单次范围分析的结果报告。
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScopeReport {
    pub scope: Scope,
    pub window: TimeWindow,
    pub summary: PeriodSummary,
    // 图表序列：周视图为小时线，日视图为 15 分钟线，其余为日线
    pub chart: Vec<ChartPoint>,
    // 仅日视图计算
    pub indicators: Option<IndicatorSnapshot>,
}

/// # Summary
/// 范围分析对调用方可见的最终状态。
///
/// # Invariants
/// - 抓取失败与无数据都是已定义的状态，绝不以 panic 或空白界面呈现。
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScopeOutcome {
    Ready(ScopeReport),
    NoData { scope: Scope, window: TimeWindow },
    LoadFailed { scope: Scope, reason: String },
}

impl ScopeOutcome {
    pub fn scope(&self) -> &Scope {
        match self {
            ScopeOutcome::Ready(report) => &report.scope,
            ScopeOutcome::NoData { scope, .. } => scope,
            ScopeOutcome::LoadFailed { scope, .. } => scope,
        }
    }

    pub fn report(&self) -> Option<&ScopeReport> {
        match self {
            ScopeOutcome::Ready(report) => Some(report),
            _ => None,
        }
    }
}

/// "今日行情"面板的完整快照
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TodaySnapshot {
    pub ticker: Ticker24h,
    // 最近 96 根 15 分钟线
    pub chart: Vec<ChartPoint>,
    pub indicators: IndicatorSnapshot,
    pub fetched_at: DateTime<Utc>,
}

/// # Summary
/// 轮询任务发布的"今日行情"状态。
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TodayState {
    // 首次抓取尚未完成
    Loading,
    Ready(TodaySnapshot),
    Unavailable { reason: String, at: DateTime<Utc> },
}

/// # Summary
/// 日历格子的波动率分档。
///
/// # Invariants
/// - 振幅 > 5% 为高，> 2.5% 为中，其余为低。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityBand {
    Low,
    Medium,
    High,
}

impl VolatilityBand {
    pub const HIGH_THRESHOLD_PCT: f64 = 5.0;
    pub const MEDIUM_THRESHOLD_PCT: f64 = 2.5;

    pub fn classify(range_pct: f64) -> Self {
        if range_pct > Self::HIGH_THRESHOLD_PCT {
            VolatilityBand::High
        } else if range_pct > Self::MEDIUM_THRESHOLD_PCT {
            VolatilityBand::Medium
        } else {
            VolatilityBand::Low
        }
    }
}

/// 单根 K 线的涨跌方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(candle: &Candle) -> Self {
        if candle.close > candle.open {
            Direction::Up
        } else if candle.close < candle.open {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

/// # Summary
/// 月历中的一个格子。
///
/// # Invariants
/// - 只有 `in_month == true` 的格子才可能携带 K 线数据。
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub candle: Option<Candle>,
    pub volatility_pct: Option<f64>,
    pub band: Option<VolatilityBand>,
    pub direction: Option<Direction>,
    // 当日成交量 / 当月最大成交量，用于绘制成交量柱
    pub volume_ratio: Option<f64>,
}

/// # Summary
/// 整月日历视图：覆盖该月首尾所在的完整周。
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthGrid {
    pub year: i32,
    // 1 = 一月
    pub month: u32,
    pub cells: Vec<DayCell>,
    pub max_volume: f64,
    // 抓取失败时为 false，格子仍然完整但不含行情
    pub available: bool,
}
