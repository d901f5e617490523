//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向前端 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。

use chrono::{DateTime, Month, NaiveDate, Utc};
use koyomi_core::analysis::entity::{Scope, ScopeOutcome, ScopeReport};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

// ============================================================
//  通用响应 DTO
// ============================================================

/// 统一 API 响应包装器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
    /// 错误信息 (失败时)
    pub error: Option<String>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// 构建失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

// ============================================================
//  范围分析 DTO
// ============================================================

/// 范围分析结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    /// 有数据，`report` 必定存在
    Ready,
    /// 窗口内没有任何 K 线
    NoData,
}

/// 范围分析响应 DTO - 对应周/月/年/自定义区间汇总弹窗
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub status: SummaryStatus,
    pub scope: Scope,
    /// 人类可读的范围标签
    #[schema(example = "week 10 of 2024")]
    pub label: String,
    /// 窗口开始 (ISO 8601)
    pub window_start: DateTime<Utc>,
    /// 窗口结束 (ISO 8601，含)
    pub window_end: DateTime<Utc>,
    pub report: Option<ScopeReport>,
}

/// `LoadFailed` 不属于成功响应，转为上游错误
impl TryFrom<ScopeOutcome> for SummaryResponse {
    type Error = ApiError;

    fn try_from(outcome: ScopeOutcome) -> Result<Self, Self::Error> {
        match outcome {
            ScopeOutcome::Ready(report) => Ok(Self {
                status: SummaryStatus::Ready,
                scope: report.scope,
                label: report.scope.to_string(),
                window_start: report.window.start(),
                window_end: report.window.end(),
                report: Some(report),
            }),
            ScopeOutcome::NoData { scope, window } => Ok(Self {
                status: SummaryStatus::NoData,
                scope,
                label: scope.to_string(),
                window_start: window.start(),
                window_end: window.end(),
                report: None,
            }),
            ScopeOutcome::LoadFailed { scope, reason } => {
                Err(ApiError::Upstream(format!("{}: {}", scope, reason)))
            }
        }
    }
}

/// 自定义区间查询参数
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CustomRangeQuery {
    /// 开始日期 (含)
    #[param(example = "2024-01-01")]
    pub from: String,
    /// 结束日期 (含)
    #[param(example = "2024-03-31")]
    pub to: String,
}

// ============================================================
//  菜单 DTO
// ============================================================

/// 月份选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthOption {
    /// 从 0 开始的月份索引
    #[schema(example = 2)]
    pub index: u32,
    /// 从 1 开始的月份编号 (用于路径参数)
    #[schema(example = 3)]
    pub number: u32,
    #[schema(example = "March")]
    pub name: String,
}

impl From<Month> for MonthOption {
    fn from(month: Month) -> Self {
        let number = month.number_from_month();
        Self {
            index: number.saturating_sub(1),
            number,
            name: month.name().to_string(),
        }
    }
}

/// 范围选择菜单 DTO - 对应侧边操作面板
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MenuResponse {
    /// 当前 UTC 日期
    pub today: NaiveDate,
    /// 今年截至本周的周编号
    pub weeks: Vec<u32>,
    /// 今年截至本月的月份
    pub months: Vec<MonthOption>,
    /// 可选年份 (降序)
    pub years: Vec<i32>,
}
