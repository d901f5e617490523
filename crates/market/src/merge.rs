use chrono::{DateTime, Duration, Utc};
use koyomi_core::common::{Instrument, Interval};
use koyomi_core::market::entity::{Candle, TimeWindow};
use koyomi_core::market::error::MarketError;
use koyomi_core::market::port::{CandleFetcher, CandleQuery, MAX_PAGE_CAP};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use tracing::{debug, trace};

/// # Summary
/// 将多页 / 多次抓取的 K 线合并为唯一的升序序列。
///
/// # Logic
/// 按 `open_time` 建立有序映射，同一时间戳只保留最先出现的记录。
///
/// # Arguments
/// * `pages`: 任意顺序、可能重叠的分页结果。
///
/// # Returns
/// 升序且无重复 `open_time` 的 K 线序列。
pub fn merge(pages: Vec<Vec<Candle>>) -> Vec<Candle> {
    let mut by_time: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();
    for candle in pages.into_iter().flatten() {
        by_time.entry(candle.open_time).or_insert(candle);
    }
    by_time.into_values().collect()
}

/// # Summary
/// 顺序分页抓取的折叠状态。
///
/// # Invariants
/// - 每一步只接收 `open_time` 落在 `[cursor, end]` 内的记录。
/// - 游标单调前进：每次推进到最后接收记录之后一个周期（即下一根 K 线的开盘时间）。
#[derive(Debug, Clone)]
pub struct PageState {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    page_cap: usize,
    collected: Vec<Candle>,
    pages: usize,
}

impl PageState {
    pub fn new(window: &TimeWindow, interval: Interval, page_cap: usize) -> Self {
        Self {
            cursor: window.start(),
            end: window.end(),
            step: interval.duration(),
            page_cap: page_cap.clamp(1, MAX_PAGE_CAP),
            collected: Vec::new(),
            pages: 0,
        }
    }

    /// 下一页的查询参数
    pub fn query(&self) -> CandleQuery {
        CandleQuery {
            start: Some(self.cursor),
            end: Some(self.end),
            limit: Some(self.page_cap),
        }
    }

    pub fn cursor(&self) -> DateTime<Utc> {
        self.cursor
    }

    /// # Summary
    /// 吸收一页数据并决定是否继续。
    ///
    /// # Logic
    /// 1. 过滤出 `[cursor, end]` 内的记录，无可接收记录时结束（同时防止游标停滞）。
    /// 2. 原始页长度小于上限说明数据源已耗尽，结束。
    /// 3. 游标推进到最后接收记录 + 一个周期，越过 `end` 时结束，
    ///    因此窗口内恰好整页结束时不会再发起一次空请求。
    ///
    /// # Returns
    /// `Continue(next_state)` 或 `Break(collected)`。
    pub fn step(mut self, page: Vec<Candle>) -> ControlFlow<Vec<Candle>, PageState> {
        let received = page.len();
        self.pages += 1;

        let accepted: Vec<Candle> = page
            .into_iter()
            .filter(|c| c.open_time >= self.cursor && c.open_time <= self.end)
            .collect();

        let Some(last) = accepted.iter().map(|c| c.open_time).max() else {
            trace!("page {} accepted nothing, stopping", self.pages);
            return ControlFlow::Break(self.collected);
        };
        self.collected.extend(accepted);

        if received < self.page_cap {
            return ControlFlow::Break(self.collected);
        }

        match last.checked_add_signed(self.step) {
            Some(next) if next <= self.end => self.cursor = next,
            _ => return ControlFlow::Break(self.collected),
        }
        ControlFlow::Continue(self)
    }
}

/// # Summary
/// 对一个时间窗口执行顺序分页抓取。
///
/// # Logic
/// 1. 以窗口起点为游标发起第一页请求。
/// 2. 每页结果交给 `PageState::step`，直到折叠结束。
/// 3. 结果再经 `merge` 排序去重。
///
/// # Arguments
/// * `fetcher`: 数据源。
/// * `instrument`: 交易标的。
/// * `interval`: K 线周期。
/// * `window`: 目标窗口。
/// * `page_cap`: 每页条数上限。
///
/// # Returns
/// 窗口内全部 K 线，任一页失败则整体失败。
pub async fn paginate(
    fetcher: &dyn CandleFetcher,
    instrument: &Instrument,
    interval: Interval,
    window: &TimeWindow,
    page_cap: usize,
) -> Result<Vec<Candle>, MarketError> {
    let mut state = PageState::new(window, interval, page_cap);
    let mut calls = 0_usize;
    loop {
        calls += 1;
        let page = fetcher
            .fetch_candles(instrument, interval, state.query())
            .await?;
        match state.step(page) {
            ControlFlow::Continue(next) => state = next,
            ControlFlow::Break(collected) => {
                debug!(
                    "paginated {} {} candles in {} requests",
                    collected.len(),
                    interval,
                    calls
                );
                return Ok(merge(vec![collected]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use koyomi_core::market::mock::{MockCandleFetcher, candles_from};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_merge_is_idempotent_on_sorted_input() {
        let series = candles_from(start(), Interval::Day1, 10);
        assert_eq!(merge(vec![series.clone()]), series);
    }

    #[test]
    fn test_merge_dedupes_overlap_and_sorts() {
        let series = candles_from(start(), Interval::Day1, 6);
        let first = series[..4].to_vec();
        let second = series[3..].to_vec();
        let merged = merge(vec![second, first]);

        assert_eq!(merged.len(), 6);
        assert_eq!(merged, series);
        let shared = series[3].open_time;
        assert_eq!(merged.iter().filter(|c| c.open_time == shared).count(), 1);
    }

    #[test]
    fn test_merge_keeps_first_occurrence() {
        let series = candles_from(start(), Interval::Day1, 1);
        let mut replacement = series[0].clone();
        replacement.volume = 999.0;
        let merged = merge(vec![series.clone(), vec![replacement]]);
        assert_eq!(merged, series);
    }

    #[test]
    fn test_step_stops_on_short_page() {
        let series = candles_from(start(), Interval::Hour1, 3);
        let window = TimeWindow::new(start(), start() + Duration::days(1)).unwrap();
        let state = PageState::new(&window, Interval::Hour1, 5);
        match state.step(series.clone()) {
            ControlFlow::Break(collected) => assert_eq!(collected, series),
            ControlFlow::Continue(_) => panic!("short page must end pagination"),
        }
    }

    #[test]
    fn test_step_advances_cursor_past_last_record() {
        let series = candles_from(start(), Interval::Hour1, 2);
        let window = TimeWindow::new(start(), start() + Duration::days(1)).unwrap();
        let state = PageState::new(&window, Interval::Hour1, 2);
        match state.step(series) {
            ControlFlow::Continue(next) => {
                assert_eq!(next.cursor(), start() + Duration::hours(2));
            }
            ControlFlow::Break(_) => panic!("full page inside window must continue"),
        }
    }

    #[test]
    fn test_step_ignores_records_behind_cursor() {
        let series = candles_from(start(), Interval::Hour1, 4);
        let window = TimeWindow::new(start() + Duration::hours(2), start() + Duration::days(1)).unwrap();
        let state = PageState::new(&window, Interval::Hour1, 4);
        // 数据源无视游标返回旧数据时，只接收窗口内记录
        match state.step(series.clone()) {
            ControlFlow::Continue(next) => {
                assert_eq!(next.cursor(), series[3].open_time + Duration::hours(1));
            }
            ControlFlow::Break(_) => panic!("accepted records should continue"),
        }

        let stalled = PageState::new(&window, Interval::Hour1, 2);
        match stalled.step(series[..2].to_vec()) {
            ControlFlow::Break(collected) => assert!(collected.is_empty()),
            ControlFlow::Continue(_) => panic!("no progress must stop"),
        }
    }

    #[tokio::test]
    async fn test_paginate_call_count_is_ceil_of_records_over_cap() {
        let instrument = Instrument::default();
        for (total, cap) in [(2500_usize, 1000_usize), (2000, 1000), (7, 3), (1, 1000)] {
            let series = candles_from(start(), Interval::Hour1, total);
            let last = series[total - 1].open_time;
            let fetcher = MockCandleFetcher::new().with_series(Interval::Hour1, series.clone());
            let window = TimeWindow::new(start(), last).unwrap();

            let result = paginate(&fetcher, &instrument, Interval::Hour1, &window, cap)
                .await
                .unwrap();

            assert_eq!(result, series);
            assert_eq!(fetcher.candle_calls(), total.div_ceil(cap));
        }
    }

    #[test]
    fn test_full_page_reaching_window_end_stops() {
        // 窗口结束于最后一根 K 线收盘前，整页恰好到达窗口末尾
        let series = candles_from(start(), Interval::Day1, 4);
        let window = TimeWindow::days(
            start().date_naive(),
            series[3].open_time.date_naive(),
        )
        .unwrap();
        let state = PageState::new(&window, Interval::Day1, 4);
        match state.step(series.clone()) {
            ControlFlow::Break(collected) => assert_eq!(collected, series),
            ControlFlow::Continue(_) => panic!("window is exhausted"),
        }
    }

    #[tokio::test]
    async fn test_paginate_whole_day_window_with_exact_multiple_of_cap() {
        let instrument = Instrument::default();
        for (total, cap) in [(200_usize, 100_usize), (2000, 1000), (9, 3)] {
            // 数据源的序列比窗口更长
            let series = candles_from(start(), Interval::Day1, total + 50);
            let last = series[total - 1].open_time;
            let fetcher = MockCandleFetcher::new().with_series(Interval::Day1, series.clone());
            let window = TimeWindow::days(start().date_naive(), last.date_naive()).unwrap();

            let result = paginate(&fetcher, &instrument, Interval::Day1, &window, cap)
                .await
                .unwrap();

            assert_eq!(result, series[..total].to_vec());
            assert_eq!(fetcher.candle_calls(), total.div_ceil(cap), "N={} C={}", total, cap);
        }
    }

    #[tokio::test]
    async fn test_paginate_empty_window() {
        let fetcher = MockCandleFetcher::new();
        let window = TimeWindow::new(start(), start() + Duration::days(30)).unwrap();
        let result = paginate(&fetcher, &Instrument::default(), Interval::Day1, &window, 1000)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(fetcher.candle_calls(), 1);
    }

    #[tokio::test]
    async fn test_paginate_propagates_failure() {
        let fetcher = MockCandleFetcher::new()
            .with_series(Interval::Day1, candles_from(start(), Interval::Day1, 10));
        fetcher.fail_with(Some(MarketError::Network("reset".into())));
        let window = TimeWindow::new(start(), start() + Duration::days(30)).unwrap();
        let result = paginate(&fetcher, &Instrument::default(), Interval::Day1, &window, 3).await;
        assert_eq!(result, Err(MarketError::Network("reset".into())));
    }
}
