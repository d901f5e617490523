//! 日历视图与菜单所需的纯日期计算。

use crate::scope::{check_year, month_bounds, shift_days, start_of_week};
use chrono::{Datelike, Month, NaiveDate};
use koyomi_core::analysis::entity::{DayCell, Direction, MonthGrid, VolatilityBand};
use koyomi_core::common::WeekStart;
use koyomi_core::market::entity::Candle;
use koyomi_core::market::error::MarketError;

/// # Summary
/// 构建整月日历格子。
///
/// # Logic
/// 1. 格子从该月首日所在周的第一天开始，到末日所在周的最后一天结束。
/// 2. 只有本月的格子匹配当天的日线（按 UTC 日期）。
/// 3. 成交量比例以本月最大成交量为分母。
///
/// # Arguments
/// * `year`: 年份。
/// * `month`: 月份，1 = 一月。
/// * `candles`: 本月日线，顺序不限。
/// * `week_start`: 每周起始日。
/// * `available`: 行情是否成功加载。
///
/// # Returns
/// 月历；年份超出支持范围或月份非法时返回 `MarketError::InvalidScope`。
pub fn month_grid(
    year: i32,
    month: u32,
    candles: &[Candle],
    week_start: WeekStart,
    available: bool,
) -> Result<MonthGrid, MarketError> {
    check_year(year)?;
    let (first, last) = month_bounds(year, month)?;
    let grid_start = start_of_week(first, week_start)?;
    let grid_end = shift_days(start_of_week(last, week_start)?, 6)?;

    let in_month = |date: NaiveDate| date >= first && date <= last;
    let max_volume = candles
        .iter()
        .filter(|c| in_month(c.open_time.date_naive()))
        .map(|c| c.volume)
        .fold(0.0_f64, f64::max);

    let cells = grid_start
        .iter_days()
        .take_while(|date| *date <= grid_end)
        .map(|date| {
            let candle = if in_month(date) {
                candles
                    .iter()
                    .find(|c| c.open_time.date_naive() == date)
                    .cloned()
            } else {
                None
            };
            let volatility_pct = candle.as_ref().and_then(Candle::range_pct);
            DayCell {
                date,
                in_month: in_month(date),
                band: volatility_pct.map(VolatilityBand::classify),
                direction: candle.as_ref().map(Direction::of),
                volume_ratio: candle
                    .as_ref()
                    .filter(|_| max_volume > 0.0)
                    .map(|c| c.volume / max_volume),
                volatility_pct,
                candle,
            }
        })
        .collect();

    Ok(MonthGrid {
        year,
        month,
        cells,
        max_volume,
        available,
    })
}

/// # Summary
/// 计算某日在当年的周编号。
///
/// # Logic
/// 第 1 周为包含 1 月 1 日的那一周，之后每 7 天递增；年末不回卷到下一年的第 1 周。
pub fn week_of_year(date: NaiveDate, week_start: WeekStart) -> u32 {
    let jan_first = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
    match (start_of_week(date, week_start), start_of_week(jan_first, week_start)) {
        (Ok(current), Ok(first)) => u32::try_from((current - first).num_weeks())
            .map(|w| w + 1)
            .unwrap_or(1),
        _ => 1,
    }
}

/// 今年截至今天的周编号列表 `1..=当前周`
pub fn weeks_elapsed(today: NaiveDate, week_start: WeekStart) -> Vec<u32> {
    (1..=week_of_year(today, week_start)).collect()
}

/// 今年截至本月的月份列表
pub fn months_elapsed(today: NaiveDate) -> Vec<Month> {
    (1..=today.month())
        .filter_map(|n| u8::try_from(n).ok())
        .filter_map(|n| Month::try_from(n).ok())
        .collect()
}

/// 从 `start_year` 到今年的年份列表（降序）
pub fn years_range(start_year: i32, today: NaiveDate) -> Vec<i32> {
    (start_year..=today.year()).rev().collect()
}
