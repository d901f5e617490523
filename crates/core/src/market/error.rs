use thiserror::Error;

/// # Summary
/// 市场数据域错误枚举，处理网络、解析、数据缺失与输入校验等问题。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - `InvalidRange` / `InvalidScope` 属于输入校验错误，必须在发起任何抓取之前返回。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    // 网络层错误，包含底层 HTTP 客户端错误信息
    #[error("Network error: {0}")]
    Network(String),
    // 数据解析错误，如 JSON 格式不匹配或 K 线数值非法
    #[error("Parse error: {0}")]
    Parse(String),
    // 交易所返回的定长数组结构发生漂移
    #[error("Schema error at index {index}: {reason}")]
    Schema { index: usize, reason: String },
    // 请求的数据未找到 (404 或内容为空)
    #[error("Data not found")]
    NotFound,
    // 时间范围非法 (结束早于开始)
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    // 范围选择器非法 (如第 54 周、第 13 个月)
    #[error("Invalid scope: {0}")]
    InvalidScope(String),
    // 未知或未分类的错误
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl MarketError {
    /// 是否为输入校验类错误（调用方应提示用户修正输入，而不是重试）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MarketError::InvalidRange(_) | MarketError::InvalidScope(_)
        )
    }
}
