use koyomi_core::analysis::entity::PeriodSummary;
use koyomi_core::market::entity::Candle;
use std::borrow::Cow;
use tracing::debug;

/// # Summary
/// 计算一段 K 线序列的汇总统计。
///
/// # Logic
/// 1. 空输入直接返回全零汇总。
/// 2. 若输入未按 `open_time` 升序排列，先复制并排序，避免涨跌幅符号反转。
/// 3. 涨跌幅取首根开盘与末根收盘；首根开盘为 0 时记为 0。
/// 4. 平均振幅只统计开盘价大于 0 的 K 线。
/// 5. 成交量、成交额求和，最高/最低价取极值。
///
/// # Arguments
/// * `candles`: K 线序列，期望为升序。
///
/// # Returns
/// 汇总结果，所有字段均为有限值。
pub fn summarize(candles: &[Candle]) -> PeriodSummary {
    if candles.is_empty() {
        return PeriodSummary::default();
    }

    let ordered: Cow<'_, [Candle]> = if is_chronological(candles) {
        Cow::Borrowed(candles)
    } else {
        debug!(
            "summarize received {} out-of-order candles, re-sorting",
            candles.len()
        );
        let mut sorted = candles.to_vec();
        sorted.sort_by_key(|c| c.open_time);
        Cow::Owned(sorted)
    };

    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return PeriodSummary::default();
    };

    let performance_pct = if first.open > 0.0 {
        (last.close - first.open) / first.open * 100.0
    } else {
        0.0
    };

    let mut range_sum = 0.0_f64;
    let mut range_count = 0.0_f64;
    let mut total_volume = 0.0_f64;
    let mut total_quote_volume = 0.0_f64;
    let mut period_high = f64::MIN;
    let mut period_low = f64::MAX;

    for candle in ordered.iter() {
        if let Some(pct) = candle.range_pct() {
            range_sum += pct;
            range_count += 1.0;
        }
        total_volume += candle.volume;
        total_quote_volume += candle.quote_volume;
        period_high = period_high.max(candle.high);
        period_low = period_low.min(candle.low);
    }

    PeriodSummary {
        performance_pct,
        avg_volatility_pct: if range_count > 0.0 {
            range_sum / range_count
        } else {
            0.0
        },
        total_volume,
        total_quote_volume,
        period_high,
        period_low,
        candle_count: ordered.len(),
    }
}

/// 序列是否已按开盘时间非降序排列
pub fn is_chronological(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].open_time <= w[1].open_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candle(day: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day),
            open,
            high,
            low,
            close,
            volume,
            quote_volume: volume * close,
        }
    }

    #[test]
    fn test_empty_input_is_zero_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary, PeriodSummary::default());
        assert_eq!(summary.performance_pct, 0.0);
        assert_eq!(summary.avg_volatility_pct, 0.0);
        assert_eq!(summary.total_volume, 0.0);
        assert_eq!(summary.period_low, 0.0);
    }

    #[test]
    fn test_basic_statistics() {
        let candles = vec![
            candle(0, 100.0, 110.0, 90.0, 105.0, 10.0),
            candle(1, 105.0, 120.0, 100.0, 115.0, 20.0),
            candle(2, 115.0, 118.0, 95.0, 110.0, 5.0),
        ];
        let summary = summarize(&candles);

        assert!((summary.performance_pct - 10.0).abs() < 1e-9);
        let expected_vol = (20.0 + 20.0 / 105.0 * 100.0 + 23.0 / 115.0 * 100.0) / 3.0;
        assert!((summary.avg_volatility_pct - expected_vol).abs() < 1e-9);
        assert_eq!(summary.total_volume, 35.0);
        assert_eq!(summary.period_high, 120.0);
        assert_eq!(summary.period_low, 90.0);
        assert_eq!(summary.candle_count, 3);
    }

    #[test]
    fn test_reversed_input_keeps_performance_sign() {
        let mut candles = vec![
            candle(0, 100.0, 101.0, 99.0, 100.5, 1.0),
            candle(1, 100.5, 103.0, 100.0, 102.0, 1.0),
            candle(2, 102.0, 106.0, 101.0, 105.0, 1.0),
        ];
        let forward = summarize(&candles);
        candles.reverse();
        let reversed = summarize(&candles);

        assert!(forward.performance_pct > 0.0);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_performance_sign_matches_price_move() {
        let series = [
            vec![candle(0, 50.0, 52.0, 40.0, 41.0, 1.0)],
            vec![
                candle(0, 50.0, 55.0, 49.0, 54.0, 1.0),
                candle(1, 54.0, 54.0, 45.0, 46.0, 1.0),
            ],
            vec![
                candle(0, 50.0, 51.0, 47.0, 48.0, 1.0),
                candle(1, 48.0, 60.0, 48.0, 59.0, 1.0),
            ],
        ];
        for candles in series {
            let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
                continue;
            };
            let delta = last.close - first.open;
            let summary = summarize(&candles);
            assert_eq!(summary.performance_pct.signum(), delta.signum());
        }
    }

    #[test]
    fn test_zero_open_is_excluded_from_volatility() {
        let candles = vec![
            candle(0, 0.0, 0.0, 0.0, 0.0, 0.0),
            candle(1, 100.0, 110.0, 90.0, 100.0, 1.0),
        ];
        let summary = summarize(&candles);
        assert_eq!(summary.performance_pct, 0.0);
        assert_eq!(summary.avg_volatility_pct, 20.0);
        assert!(summary.avg_volatility_pct.is_finite());
        assert_eq!(summary.period_low, 0.0);
    }
}
