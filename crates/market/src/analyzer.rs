use crate::aggregate::summarize;
use crate::calendar;
use crate::indicator::snapshot_from_history;
use crate::merge::{merge, paginate};
use crate::scope::{ChartSource, FetchPlan, Paging, ScopePlan, ScopeSettings, resolve};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use koyomi_core::analysis::entity::{
    ChartPoint, MonthGrid, Scope, ScopeOutcome, ScopeReport, TodaySnapshot,
};
use koyomi_core::common::time::{RealTimeProvider, TimeProvider};
use koyomi_core::common::{Instrument, Interval};
use koyomi_core::market::entity::Candle;
use koyomi_core::market::error::MarketError;
use koyomi_core::market::port::{CandleFetcher, CandleQuery};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// # Summary
/// 范围分析服务：组合范围解析、抓取、合并与汇总。
///
/// # Invariants
/// - 不缓存任何计算结果，每次调用都重新抓取。
/// - 抓取失败只会以 `ScopeOutcome::LoadFailed` 呈现，不向上传播。
pub struct MarketAnalyzer {
    // 行情数据源
    fetcher: Arc<dyn CandleFetcher>,
    // 唯一关注的交易对
    instrument: Instrument,
    settings: ScopeSettings,
    clock: Arc<dyn TimeProvider>,
}

impl MarketAnalyzer {
    pub fn new(
        fetcher: Arc<dyn CandleFetcher>,
        instrument: Instrument,
        settings: ScopeSettings,
    ) -> Self {
        Self {
            fetcher,
            instrument,
            settings,
            clock: Arc::new(RealTimeProvider),
        }
    }

    /// 替换时钟（测试中使用虚拟时钟）
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &ScopeSettings {
        &self.settings
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// # Summary
    /// 分析一个范围选择器。
    ///
    /// # Logic
    /// 1. 解析范围；非法输入直接返回错误，不发起抓取。
    /// 2. 执行计划中的全部抓取（日线与图表并发）。
    /// 3. 抓取失败记录 warn 日志并返回 `LoadFailed`。
    /// 4. 窗口内无数据返回 `NoData`，否则汇总并返回 `Ready`。
    ///
    /// # Arguments
    /// * `scope`: 范围选择器。
    ///
    /// # Returns
    /// 分析结果；仅输入校验失败时返回 Err。
    pub async fn analyze(&self, scope: Scope) -> Result<ScopeOutcome, MarketError> {
        let plan = resolve(scope, &self.settings)?;
        debug!("analyzing {} over {:?}", scope, plan.window);

        match self.execute(&plan).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("failed to load {}: {}", scope, e);
                Ok(ScopeOutcome::LoadFailed {
                    scope,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn execute(&self, plan: &ScopePlan) -> Result<ScopeOutcome, MarketError> {
        let chart_fetch = async {
            match &plan.chart {
                ChartSource::Separate(chart) => self.collect(chart).await.map(Some),
                ChartSource::Daily => Ok(None),
            }
        };
        let (daily, chart) = tokio::try_join!(self.collect(&plan.daily), chart_fetch)?;

        let in_window: Vec<Candle> = daily
            .iter()
            .filter(|c| plan.window.contains(c.open_time))
            .cloned()
            .collect();
        if in_window.is_empty() {
            info!("no candles for {}", plan.scope);
            return Ok(ScopeOutcome::NoData {
                scope: plan.scope,
                window: plan.window,
            });
        }

        let chart = match chart {
            Some(candles) => candles
                .iter()
                .filter(|c| plan.window.contains(c.open_time))
                .map(ChartPoint::from_candle)
                .collect(),
            None if plan.chart_volume => in_window.iter().map(ChartPoint::with_volume).collect(),
            None => in_window.iter().map(ChartPoint::from_candle).collect(),
        };

        let indicators = plan.indicators.then(|| {
            let closes: Vec<f64> = daily.iter().map(|c| c.close).collect();
            snapshot_from_history(&closes)
        });

        Ok(ScopeOutcome::Ready(ScopeReport {
            scope: plan.scope,
            window: plan.window,
            summary: summarize(&in_window),
            chart,
            indicators,
        }))
    }

    /// # Summary
    /// 按分页方式执行一个抓取计划。
    ///
    /// # Logic
    /// - Single：单次请求。
    /// - Trailing：以窗口终点为 `endTime` 回溯固定根数。
    /// - Split：各子窗口并发请求，全部成功后合并。
    /// - Sequential：游标顺序分页。
    async fn collect(&self, plan: &FetchPlan) -> Result<Vec<Candle>, MarketError> {
        match &plan.paging {
            Paging::Single { limit } => {
                let query = CandleQuery::window(&plan.window).with_limit(*limit);
                let page = self.fetch(plan.interval, query).await?;
                Ok(merge(vec![page]))
            }
            Paging::Trailing { limit } => {
                let query = CandleQuery::ending_at(plan.window.end(), *limit);
                let page = self.fetch(plan.interval, query).await?;
                Ok(merge(vec![page]))
            }
            Paging::Split { windows, limit } => {
                let pages = try_join_all(windows.iter().map(|window| {
                    self.fetch(plan.interval, CandleQuery::window(window).with_limit(*limit))
                }))
                .await?;
                Ok(merge(pages))
            }
            Paging::Sequential { page_cap } => {
                paginate(
                    self.fetcher.as_ref(),
                    &self.instrument,
                    plan.interval,
                    &plan.window,
                    *page_cap,
                )
                .await
            }
        }
    }

    async fn fetch(&self, interval: Interval, query: CandleQuery) -> Result<Vec<Candle>, MarketError> {
        self.fetcher
            .fetch_candles(&self.instrument, interval, query)
            .await
    }

    /// # Summary
    /// 抓取"今日行情"快照。
    ///
    /// # Logic
    /// 并发抓取 24 小时行情、最近的 15 分钟线与日线历史，全部成功后组装。
    ///
    /// # Returns
    /// 快照，任一请求失败则返回错误由调用方决定如何呈现。
    pub async fn today(&self) -> Result<TodaySnapshot, MarketError> {
        let (ticker, intraday, history) = tokio::try_join!(
            self.fetcher.fetch_ticker(&self.instrument),
            self.fetch(
                Interval::Minute15,
                CandleQuery::latest(self.settings.intraday_limit)
            ),
            self.fetch(
                Interval::Day1,
                CandleQuery::latest(self.settings.day_history_len)
            ),
        )?;

        let intraday = merge(vec![intraday]);
        let closes: Vec<f64> = merge(vec![history]).iter().map(|c| c.close).collect();

        Ok(TodaySnapshot {
            ticker,
            chart: intraday.iter().map(ChartPoint::from_candle).collect(),
            indicators: snapshot_from_history(&closes),
            fetched_at: self.clock.now(),
        })
    }

    /// # Summary
    /// 生成整月日历视图。
    ///
    /// # Logic
    /// 1. 校验月份（1 = 一月）并解析为月度计划。
    /// 2. 抓取失败时记录 warn，返回不含行情的完整日历（`available = false`）。
    ///
    /// # Returns
    /// 月历；仅月份非法时返回 Err。
    pub async fn month_grid(&self, year: i32, month: u32) -> Result<MonthGrid, MarketError> {
        let month_index = month
            .checked_sub(1)
            .ok_or_else(|| MarketError::InvalidScope(format!("month {} does not exist", month)))?;
        let plan = resolve(Scope::Month { year, month_index }, &self.settings)?;

        let (candles, available) = match self.collect(&plan.daily).await {
            Ok(candles) => (candles, true),
            Err(e) => {
                warn!("failed to load calendar {}-{:02}: {}", year, month, e);
                (Vec::new(), false)
            }
        };

        calendar::month_grid(year, month, &candles, self.settings.week_start, available)
    }
}
