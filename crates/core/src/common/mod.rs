pub mod time;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// 系统唯一关注的交易对。
pub const DEFAULT_SYMBOL: &str = "BTCUSDT";

/// # Summary
/// 交易标的实体，代表系统关注的唯一交易对。
///
/// # Invariants
/// - `symbol` 必须是交易所可识别的大写交易代码。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Instrument {
    // 交易对代码 (例如: BTCUSDT)
    pub symbol: String,
}

impl Instrument {
    /// # Summary
    /// 根据交易代码构造标的，统一转为大写。
    ///
    /// # Arguments
    /// * `symbol`: 交易代码。
    ///
    /// # Returns
    /// 标的实体。
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
        }
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOL)
    }
}

/// # Summary
/// K 线周期枚举，定义单根 K 线覆盖的时间跨度。
///
/// # Invariants
/// - 文本形式必须与交易所 `interval` 参数保持一致。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum Interval {
    // 15分钟
    Minute15,
    // 1小时
    Hour1,
    // 1日
    Day1,
}

impl Interval {
    /// # Summary
    /// 获取单根 K 线的时间跨度。
    ///
    /// # Returns
    /// 对应的 chrono 时长。
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Interval::Minute15 => chrono::Duration::minutes(15),
            Interval::Hour1 => chrono::Duration::hours(1),
            Interval::Day1 => chrono::Duration::days(1),
        }
    }

    /// 单根 K 线跨度的毫秒数
    pub fn millis(&self) -> i64 {
        self.duration().num_milliseconds()
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "15m" | "minute15" => Ok(Interval::Minute15),
            "1h" | "hour1" => Ok(Interval::Hour1),
            "1d" | "day1" => Ok(Interval::Day1),
            _ => Err(format!("Unknown Interval: {}", s)),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::Minute15 => write!(f, "15m"),
            Interval::Hour1 => write!(f, "1h"),
            Interval::Day1 => write!(f, "1d"),
        }
    }
}

/// # Summary
/// 一周的起始日。
///
/// # Invariants
/// - `Sunday` 对应美式日历（周日开始），`Monday` 对应 ISO 8601。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_round_trip_text() {
        for tf in [Interval::Minute15, Interval::Hour1, Interval::Day1] {
            assert_eq!(tf.to_string().parse::<Interval>(), Ok(tf));
        }
        assert!("4h".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_millis() {
        assert_eq!(Interval::Minute15.millis(), 900_000);
        assert_eq!(Interval::Day1.millis(), 86_400_000);
    }

    #[test]
    fn test_instrument_uppercase() {
        assert_eq!(Instrument::new("btcusdt").symbol, "BTCUSDT");
        assert_eq!(Instrument::default().symbol, DEFAULT_SYMBOL);
    }
}
