use chrono::{Duration, NaiveDate, TimeZone, Utc};
use koyomi_core::analysis::entity::{Scope, ScopeOutcome};
use koyomi_core::common::{Instrument, Interval};
use koyomi_core::market::mock::{MockCandleFetcher, candles_from, daily_candles};
use koyomi_market::analyzer::MarketAnalyzer;
use koyomi_market::scope::ScopeSettings;
use koyomi_market::slot::ScopeSession;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// # Summary
/// 初始化测试所需的分析环境。
fn setup(settings: ScopeSettings) -> (Arc<MarketAnalyzer>, Arc<MockCandleFetcher>) {
    let fetcher = Arc::new(MockCandleFetcher::new());
    let analyzer = Arc::new(MarketAnalyzer::new(
        fetcher.clone(),
        Instrument::default(),
        settings,
    ));
    (analyzer, fetcher)
}

#[tokio::test]
async fn test_year_halves_merge_to_full_year() -> anyhow::Result<()> {
    for (year, days) in [(2023, 365_usize), (2024, 366)] {
        let (analyzer, fetcher) = setup(ScopeSettings::default());
        // 前后各多出一个月，验证窗口边界
        fetcher.set_series(Interval::Day1, daily_candles(date(year - 1, 12, 1), days + 62));

        let outcome = analyzer.analyze(Scope::Year { year }).await?;
        let report = outcome.report().ok_or_else(|| anyhow::anyhow!("{:?}", outcome))?;

        assert_eq!(report.summary.candle_count, days);
        assert_eq!(report.chart.len(), days);
        assert!(report.chart.windows(2).all(|w| w[0].time < w[1].time));
        assert_eq!(fetcher.candle_calls(), 2);
    }
    Ok(())
}

#[tokio::test]
async fn test_custom_range_paginates_sequentially() -> anyhow::Result<()> {
    let settings = ScopeSettings {
        custom_page_cap: 100,
        ..ScopeSettings::default()
    };
    let (analyzer, fetcher) = setup(settings);
    fetcher.set_series(Interval::Day1, daily_candles(date(2020, 1, 1), 1500));

    // 2020-01-01 .. 2021-12-31 共 731 天
    let outcome = analyzer
        .analyze(Scope::Custom {
            from: date(2020, 1, 1),
            to: date(2021, 12, 31),
        })
        .await?;
    let report = outcome.report().ok_or_else(|| anyhow::anyhow!("{:?}", outcome))?;

    assert_eq!(report.summary.candle_count, 731);
    assert_eq!(fetcher.candle_calls(), 731_usize.div_ceil(100));

    // 每一页都从上一页最后一根之后开始
    let requests = fetcher.requests();
    for pair in requests.windows(2) {
        let (prev, next) = (pair[0].1, pair[1].1);
        assert!(next.start > prev.start);
        assert_eq!(next.limit, Some(100));
    }
    Ok(())
}

#[tokio::test]
async fn test_custom_range_with_exact_multiple_of_page_cap() -> anyhow::Result<()> {
    let settings = ScopeSettings {
        custom_page_cap: 100,
        ..ScopeSettings::default()
    };
    let (analyzer, fetcher) = setup(settings);
    // 序列比请求区间更长，最后一页恰好满页
    fetcher.set_series(Interval::Day1, daily_candles(date(2020, 1, 1), 400));

    let outcome = analyzer
        .analyze(Scope::Custom {
            from: date(2020, 1, 1),
            to: date(2020, 1, 1) + Duration::days(199),
        })
        .await?;
    let report = outcome.report().ok_or_else(|| anyhow::anyhow!("{:?}", outcome))?;

    assert_eq!(report.summary.candle_count, 200);
    assert_eq!(fetcher.candle_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_custom_range_spanning_missing_history() -> anyhow::Result<()> {
    let (analyzer, fetcher) = setup(ScopeSettings::default());
    fetcher.set_series(Interval::Day1, daily_candles(date(2024, 6, 1), 10));

    let outcome = analyzer
        .analyze(Scope::Custom {
            from: date(2024, 1, 1),
            to: date(2024, 12, 31),
        })
        .await?;
    let report = outcome.report().ok_or_else(|| anyhow::anyhow!("{:?}", outcome))?;
    assert_eq!(report.summary.candle_count, 10);
    assert_eq!(fetcher.candle_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_latest_selection_wins() -> anyhow::Result<()> {
    let (analyzer, fetcher) = setup(ScopeSettings::default());
    fetcher.set_series(Interval::Day1, daily_candles(date(2024, 1, 1), 120));
    let hourly_start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    fetcher.set_series(Interval::Hour1, candles_from(hourly_start, Interval::Hour1, 24 * 120));

    let session = ScopeSession::new(analyzer);
    fetcher.set_delay(Some(std::time::Duration::from_millis(120)));

    let slow = session.select(Scope::Week { year: 2024, week: 10 });
    let fast = async {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        fetcher.set_delay(None);
        session.select(Scope::Week { year: 2024, week: 11 }).await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert!(!slow?, "older selection must be discarded");
    assert!(fast?);
    let shown = session.slot().current().ok_or_else(|| anyhow::anyhow!("slot empty"))?;
    assert_eq!(*shown.scope(), Scope::Week { year: 2024, week: 11 });
    Ok(())
}

#[tokio::test]
async fn test_closed_session_discards_in_flight_result() -> anyhow::Result<()> {
    let (analyzer, fetcher) = setup(ScopeSettings::default());
    fetcher.set_series(Interval::Day1, daily_candles(date(2024, 1, 1), 60));
    fetcher.set_delay(Some(std::time::Duration::from_millis(50)));

    let session = ScopeSession::new(analyzer);
    let pending = session.select(Scope::Month {
        year: 2024,
        month_index: 0,
    });
    let close = async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        session.close();
    };
    let (published, _) = tokio::join!(pending, close);

    assert!(!published?);
    assert!(session.slot().current().is_none());
    Ok(())
}

#[tokio::test]
async fn test_failure_then_recovery() -> anyhow::Result<()> {
    let (analyzer, fetcher) = setup(ScopeSettings::default());
    fetcher.set_series(Interval::Day1, daily_candles(date(2024, 1, 1), 60));
    fetcher.fail_with(Some(koyomi_core::market::error::MarketError::Network(
        "connection refused".into(),
    )));

    let scope = Scope::Month {
        year: 2024,
        month_index: 0,
    };
    let failed = analyzer.analyze(scope).await?;
    assert!(matches!(failed, ScopeOutcome::LoadFailed { .. }));

    fetcher.fail_with(None);
    let recovered = analyzer.analyze(scope).await?;
    let report = recovered.report().ok_or_else(|| anyhow::anyhow!("{:?}", recovered))?;
    assert_eq!(report.summary.candle_count, 31);
    assert_eq!(report.window.duration(), Duration::days(31));
    Ok(())
}
