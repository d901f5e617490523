use koyomi_core::analysis::entity::IndicatorSnapshot;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// RSI 计算窗口（价差个数）
pub const RSI_PERIOD: usize = 14;

/// 日视图使用的均线周期
pub const SMA_PERIOD: usize = 20;

/// # Summary
/// 计算 14 周期 RSI（单窗口、非滚动）。
///
/// # Logic
/// 1. 至少需要 15 个收盘价，否则返回 None。
/// 2. 只使用前 15 个收盘价形成的 14 个价差：正价差累加为涨幅，负价差取绝对值累加为跌幅。
/// 3. 平均跌幅为 0 时结果恰为 100。
/// 4. 否则 `100 - 100 / (1 + 平均涨幅 / 平均跌幅)`，四舍五入到 2 位小数。
///
/// # Arguments
/// * `closes`: 由旧到新排列的收盘价，调用方负责截取正确的窗口。
///
/// # Returns
/// RSI 值或 None（历史不足）。
pub fn rsi14(closes: &[f64]) -> Option<f64> {
    let window = closes.get(..=RSI_PERIOD)?;

    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0_f64, 0.0_f64), |(gains, losses), delta| {
            if delta > 0.0 {
                (gains + delta, losses)
            } else {
                (gains, losses - delta)
            }
        });

    let period = 14.0_f64;
    let avg_gain = gains / period;
    let avg_loss = losses / period;
    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(round2(100.0 - 100.0 / (1.0 + rs)))
}

/// # Summary
/// 计算简单移动平均。
///
/// # Logic
/// 取序列的前 `period` 个值求算术平均，不在内部滑动。
///
/// # Arguments
/// * `closes`: 由旧到新排列的收盘价。
/// * `period`: 周期，0 视为无效。
///
/// # Returns
/// 平均值（2 位小数）或 None（历史不足）。
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let window = closes.get(..period)?;
    let divisor = f64::from(u32::try_from(period).ok()?);
    Some(round2(window.iter().sum::<f64>() / divisor))
}

/// # Summary
/// 由完整的历史收盘价生成指标快照。
///
/// # Logic
/// 分别截取末尾 15 个与末尾 20 个收盘价，再交给单窗口计算函数。
///
/// # Arguments
/// * `closes`: 由旧到新排列的收盘价历史。
pub fn snapshot_from_history(closes: &[f64]) -> IndicatorSnapshot {
    IndicatorSnapshot {
        rsi14: rsi14(trailing(closes, RSI_PERIOD + 1)),
        sma20: sma(trailing(closes, SMA_PERIOD), SMA_PERIOD),
    }
}

fn trailing(values: &[f64], len: usize) -> &[f64] {
    &values[values.len().saturating_sub(len)..]
}

/// 四舍五入到 2 位小数（远离零），无法表示的值原样返回
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_reference_value() {
        let closes = [
            100.0, 102.0, 104.0, 106.0, 108.0, 110.0, 112.0, 111.0, 110.0, 109.0, 108.0, 107.0,
            106.0, 105.0, 105.0,
        ];
        assert_eq!(rsi14(&closes), Some(63.16));
    }

    #[test]
    fn test_rsi_without_losses_is_exactly_100() {
        let rising: Vec<f64> = (0..15).map(|i| 100.0 + f64::from(i)).collect();
        assert_eq!(rsi14(&rising), Some(100.0));

        let flat = [42.0; 15];
        assert_eq!(rsi14(&flat), Some(100.0));
    }

    #[test]
    fn test_rsi_needs_fifteen_closes() {
        let closes: Vec<f64> = (0..14).map(f64::from).collect();
        assert_eq!(rsi14(&closes), None);
        assert_eq!(rsi14(&[]), None);
    }

    #[test]
    fn test_rsi_uses_only_first_window() {
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + f64::from(i)).collect();
        closes.extend([50.0, 10.0, 5.0]);
        assert_eq!(rsi14(&closes), Some(100.0));
    }

    #[test]
    fn test_sma_reference_values() {
        assert_eq!(sma(&[10.0, 12.0, 14.0, 11.0, 13.0], 5), Some(12.0));
        assert_eq!(sma(&[10.0, 12.0], 5), None);
        assert_eq!(sma(&[10.0, 12.0], 0), None);
        assert_eq!(sma(&[1.0, 2.0, 2.0, 100.0], 3), Some(1.67));
    }

    #[test]
    fn test_snapshot_uses_trailing_windows() {
        // 前 10 个为噪声，末尾 20 个用于 SMA，末尾 15 个单调上涨
        let mut closes = vec![1.0; 10];
        closes.extend((0..20).map(|i| 200.0 + f64::from(i)));

        let snapshot = snapshot_from_history(&closes);
        assert_eq!(snapshot.rsi14, Some(100.0));
        assert_eq!(snapshot.sma20, Some(209.5));

        let short = snapshot_from_history(&closes[..16]);
        assert!(short.rsi14.is_some());
        assert_eq!(short.sma20, None);
    }
}
