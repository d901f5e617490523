use chrono::{Datelike, Days, Duration, NaiveDate};
use koyomi_core::analysis::entity::Scope;
use koyomi_core::common::{Interval, WeekStart};
use koyomi_core::config::AppConfig;
use koyomi_core::market::entity::TimeWindow;
use koyomi_core::market::error::MarketError;
use koyomi_core::market::port::MAX_PAGE_CAP;
use std::ops::RangeInclusive;

/// 周编号的合法上限
pub const MAX_WEEK: u32 = 53;

/// 可分析的年份范围：交易所时间戳以 Unix 纪元为起点
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1970..=9999;

/// # Summary
/// 范围解析所需的参数。
///
/// # Invariants
/// - 各条数上限在使用时被钳制到 `[1, MAX_PAGE_CAP]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSettings {
    pub week_start: WeekStart,
    // 年度视图每个子窗口的条数上限
    pub yearly_page_cap: usize,
    // 自定义区间顺序分页的每页上限
    pub custom_page_cap: usize,
    // 日视图回溯的日线条数（含当日）
    pub day_history_len: usize,
    // 日内 15 分钟线条数
    pub intraday_limit: usize,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Sunday,
            yearly_page_cap: 200,
            custom_page_cap: MAX_PAGE_CAP,
            day_history_len: 30,
            intraday_limit: 96,
        }
    }
}

impl ScopeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            week_start: config.analysis.week_start,
            yearly_page_cap: config.analysis.yearly_page_cap,
            custom_page_cap: config.feed.page_cap,
            day_history_len: config.analysis.day_history_len,
            intraday_limit: config.analysis.intraday_limit,
        }
    }
}

/// 一次抓取的分页方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paging {
    // 单次请求
    Single { limit: usize },
    // 只给结束时间，回溯最近的 `limit` 根
    Trailing { limit: usize },
    // 拆分为若干连续子窗口并发请求
    Split { windows: Vec<TimeWindow>, limit: usize },
    // 以游标顺序分页
    Sequential { page_cap: usize },
}

/// # Summary
/// 单个抓取计划：周期 + 窗口 + 分页方式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub interval: Interval,
    pub window: TimeWindow,
    pub paging: Paging,
}

/// 图表序列的数据来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartSource {
    // 直接复用日线数据
    Daily,
    // 独立抓取的更细周期数据
    Separate(FetchPlan),
}

/// # Summary
/// 一个范围选择器解析后的完整执行计划。
///
/// # Invariants
/// - `window` 是汇总统计的取值窗口，`daily.window` 可能更宽（日视图需要回溯历史）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePlan {
    pub scope: Scope,
    pub window: TimeWindow,
    pub daily: FetchPlan,
    pub chart: ChartSource,
    // 图表点是否携带成交额
    pub chart_volume: bool,
    // 是否基于日线历史计算指标
    pub indicators: bool,
}

/// # Summary
/// 将范围选择器解析为具体的时间窗口与抓取计划。
///
/// # Logic
/// 1. Day：日内 15 分钟线画图，回溯 `day_history_len` 根日线计算指标与汇总。
/// 2. Week：年初 + (n-1) 周所在的整周；日线汇总 + 小时线画图。
/// 3. Month：自然月，日线。
/// 4. Year：自然年，日线，按 `yearly_page_cap` 拆分为若干连续子窗口。
/// 5. Custom：`from` 当日起至 `to` 当日止，日线顺序分页。
///
/// # Arguments
/// * `scope`: 范围选择器。
/// * `settings`: 解析参数。
///
/// # Returns
/// 执行计划；非法输入在任何抓取之前返回错误。
pub fn resolve(scope: Scope, settings: &ScopeSettings) -> Result<ScopePlan, MarketError> {
    match scope {
        Scope::Day { date } => check_year(date.year())?,
        Scope::Week { year, .. } | Scope::Month { year, .. } | Scope::Year { year } => {
            check_year(year)?
        }
        Scope::Custom { from, to } => {
            check_year(from.year())?;
            check_year(to.year())?;
        }
    }

    match scope {
        Scope::Day { date } => {
            let window = TimeWindow::day(date);
            let history_days = i64::try_from(settings.day_history_len.max(1))
                .map_err(|_| MarketError::InvalidScope("history length overflow".into()))?;
            let history_start = shift_days(date, 1 - history_days)?;
            Ok(ScopePlan {
                scope,
                window,
                daily: FetchPlan {
                    interval: Interval::Day1,
                    window: TimeWindow::days(history_start, date)?,
                    paging: Paging::Trailing {
                        limit: settings.day_history_len.max(1),
                    },
                },
                chart: ChartSource::Separate(FetchPlan {
                    interval: Interval::Minute15,
                    window,
                    paging: Paging::Single {
                        limit: settings.intraday_limit,
                    },
                }),
                chart_volume: false,
                indicators: true,
            })
        }
        Scope::Week { year, week } => {
            let window = week_window(year, week, settings.week_start)?;
            Ok(ScopePlan {
                scope,
                window,
                daily: FetchPlan {
                    interval: Interval::Day1,
                    window,
                    paging: Paging::Single { limit: 7 },
                },
                chart: ChartSource::Separate(FetchPlan {
                    interval: Interval::Hour1,
                    window,
                    paging: Paging::Single { limit: 7 * 24 },
                }),
                chart_volume: false,
                indicators: false,
            })
        }
        Scope::Month { year, month_index } => {
            let window = month_window(year, month_index)?;
            Ok(ScopePlan {
                scope,
                window,
                daily: FetchPlan {
                    interval: Interval::Day1,
                    window,
                    paging: Paging::Single { limit: 31 },
                },
                chart: ChartSource::Daily,
                chart_volume: true,
                indicators: false,
            })
        }
        Scope::Year { year } => {
            let window = year_window(year)?;
            let cap = settings.yearly_page_cap.clamp(1, MAX_PAGE_CAP);
            let windows = split_days(year_start(year)?, year_end(year)?, cap)?;
            Ok(ScopePlan {
                scope,
                window,
                daily: FetchPlan {
                    interval: Interval::Day1,
                    window,
                    paging: Paging::Split { windows, limit: cap },
                },
                chart: ChartSource::Daily,
                chart_volume: false,
                indicators: false,
            })
        }
        Scope::Custom { from, to } => {
            let window = TimeWindow::days(from, to)?;
            Ok(ScopePlan {
                scope,
                window,
                daily: FetchPlan {
                    interval: Interval::Day1,
                    window,
                    paging: Paging::Sequential {
                        page_cap: settings.custom_page_cap.clamp(1, MAX_PAGE_CAP),
                    },
                },
                chart: ChartSource::Daily,
                chart_volume: false,
                indicators: false,
            })
        }
    }
}

/// 年份不在 `SUPPORTED_YEARS` 内时返回 `MarketError::InvalidScope`
pub fn check_year(year: i32) -> Result<(), MarketError> {
    if SUPPORTED_YEARS.contains(&year) {
        Ok(())
    } else {
        Err(MarketError::InvalidScope(format!(
            "year {} is outside {}..={}",
            year,
            SUPPORTED_YEARS.start(),
            SUPPORTED_YEARS.end()
        )))
    }
}

/// 日期平移 `days` 天，越过日历边界时返回 `MarketError::InvalidScope`
pub fn shift_days(date: NaiveDate, days: i64) -> Result<NaiveDate, MarketError> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| MarketError::InvalidScope(format!("{} shifted by {} days is out of range", date, days)))
}

/// 某日所在周的第一天
pub fn start_of_week(date: NaiveDate, week_start: WeekStart) -> Result<NaiveDate, MarketError> {
    let offset = match week_start {
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        WeekStart::Monday => date.weekday().num_days_from_monday(),
    };
    date.checked_sub_days(Days::new(u64::from(offset)))
        .ok_or_else(|| MarketError::InvalidScope(format!("week of {} is out of range", date)))
}

/// # Summary
/// 第 `week` 周的时间窗口。
///
/// # Logic
/// 取 1 月 1 日之后 `week - 1` 周的那一天，窗口为其所在的整周（可能始于上一年末）。
///
/// # Returns
/// 周编号不在 `1..=53` 或年份非法时返回 `MarketError::InvalidScope`。
pub fn week_window(year: i32, week: u32, week_start: WeekStart) -> Result<TimeWindow, MarketError> {
    if !(1..=MAX_WEEK).contains(&week) {
        return Err(MarketError::InvalidScope(format!(
            "week {} is outside 1..={}",
            week, MAX_WEEK
        )));
    }
    let anchor = shift_days(year_start(year)?, i64::from(week - 1) * 7)?;
    let first = start_of_week(anchor, week_start)?;
    TimeWindow::days(first, shift_days(first, 6)?)
}

/// 自然月窗口，`month_index` 从 0 开始
pub fn month_window(year: i32, month_index: u32) -> Result<TimeWindow, MarketError> {
    let month = month_index
        .checked_add(1)
        .ok_or_else(|| MarketError::InvalidScope(format!("month index {}", month_index)))?;
    let (first, last) = month_bounds(year, month)?;
    TimeWindow::days(first, last)
}

/// 自然年窗口
pub fn year_window(year: i32) -> Result<TimeWindow, MarketError> {
    TimeWindow::days(year_start(year)?, year_end(year)?)
}

/// 某月（1 = 一月）的首日与末日
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), MarketError> {
    let invalid = || MarketError::InvalidScope(format!("month {} of {} does not exist", month, year));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let last = if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).and_then(|next| next.pred_opt())
    }
    .ok_or_else(invalid)?;
    Ok((first, last))
}

fn year_start(year: i32) -> Result<NaiveDate, MarketError> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| MarketError::InvalidScope(format!("year {} is out of range", year)))
}

fn year_end(year: i32) -> Result<NaiveDate, MarketError> {
    NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| MarketError::InvalidScope(format!("year {} is out of range", year)))
}

/// # Summary
/// 将 `[from, to]` 按天均匀拆分为连续子窗口，每段不超过 `cap` 天。
///
/// # Logic
/// 段数 = ceil(总天数 / cap)，每段天数 = ceil(总天数 / 段数)，最后一段吸收余数。
pub fn split_days(from: NaiveDate, to: NaiveDate, cap: usize) -> Result<Vec<TimeWindow>, MarketError> {
    let total = usize::try_from((to - from).num_days() + 1)
        .map_err(|_| MarketError::InvalidRange(format!("to date {} is before from date {}", to, from)))?;
    let cap = cap.max(1);
    let parts = total.div_ceil(cap);
    let per_part = total.div_ceil(parts.max(1));

    let mut windows = Vec::with_capacity(parts);
    let mut first = from;
    while first <= to {
        let span = i64::try_from(per_part)
            .map_err(|_| MarketError::InvalidRange("split span overflow".into()))?;
        let last = shift_days(first, span - 1).map_or(to, |d| d.min(to));
        windows.push(TimeWindow::days(first, last)?);
        match last.succ_opt() {
            Some(next) => first = next,
            None => break,
        }
    }
    Ok(windows)
}
