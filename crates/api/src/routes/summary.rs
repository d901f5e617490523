use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::NaiveDate;
use koyomi_core::analysis::entity::Scope;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiErrorResponse, ApiResponse, CustomRangeQuery, SummaryResponse};

/// 解析 `YYYY-MM-DD` 日期参数
pub(crate) fn parse_date(name: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        ApiError::BadRequest(format!("{} must be YYYY-MM-DD, got {:?}: {}", name, value, e))
    })
}

async fn run(state: &AppState, scope: Scope) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    let outcome = state.analyzer.analyze(scope).await?;
    Ok(Json(ApiResponse::ok(SummaryResponse::try_from(outcome)?)))
}

/// 单日分析
///
/// 返回当日汇总、15 分钟线图表以及基于过去 30 根日线的 RSI(14) / SMA(20)。
#[utoipa::path(
    get,
    path = "/api/v1/summary/day/{date}",
    tag = "范围分析 (Summary)",
    params(
        ("date" = String, Path, description = "UTC 日期 YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "分析完成 (可能无数据)", body = ApiResponse<SummaryResponse>),
        (status = 400, description = "参数错误", body = ApiErrorResponse),
        (status = 502, description = "行情数据源不可用", body = ApiErrorResponse)
    )
)]
pub async fn get_day_summary(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    let date = parse_date("date", &date)?;
    run(&state, Scope::Day { date }).await
}

/// 周度分析
///
/// 日线汇总 + 小时线图表，两次抓取并发执行。
#[utoipa::path(
    get,
    path = "/api/v1/summary/week/{year}/{week}",
    tag = "范围分析 (Summary)",
    params(
        ("year" = i32, Path, description = "年份"),
        ("week" = u32, Path, description = "周编号 1..=53")
    ),
    responses(
        (status = 200, description = "分析完成 (可能无数据)", body = ApiResponse<SummaryResponse>),
        (status = 400, description = "参数错误", body = ApiErrorResponse),
        (status = 502, description = "行情数据源不可用", body = ApiErrorResponse)
    )
)]
pub async fn get_week_summary(
    State(state): State<AppState>,
    Path((year, week)): Path<(i32, u32)>,
) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    run(&state, Scope::Week { year, week }).await
}

/// 月度分析
#[utoipa::path(
    get,
    path = "/api/v1/summary/month/{year}/{month}",
    tag = "范围分析 (Summary)",
    params(
        ("year" = i32, Path, description = "年份"),
        ("month" = u32, Path, description = "月份 1..=12")
    ),
    responses(
        (status = 200, description = "分析完成 (可能无数据)", body = ApiResponse<SummaryResponse>),
        (status = 400, description = "参数错误", body = ApiErrorResponse),
        (status = 502, description = "行情数据源不可用", body = ApiErrorResponse)
    )
)]
pub async fn get_month_summary(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    let month_index = month
        .checked_sub(1)
        .ok_or_else(|| ApiError::BadRequest(format!("month must be 1..=12, got {}", month)))?;
    run(&state, Scope::Month { year, month_index }).await
}

/// 年度分析
///
/// 按页数上限拆分为若干子窗口并发抓取后合并。
#[utoipa::path(
    get,
    path = "/api/v1/summary/year/{year}",
    tag = "范围分析 (Summary)",
    params(
        ("year" = i32, Path, description = "年份")
    ),
    responses(
        (status = 200, description = "分析完成 (可能无数据)", body = ApiResponse<SummaryResponse>),
        (status = 400, description = "参数错误", body = ApiErrorResponse),
        (status = 502, description = "行情数据源不可用", body = ApiErrorResponse)
    )
)]
pub async fn get_year_summary(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    run(&state, Scope::Year { year }).await
}

/// 自定义区间分析
///
/// 区间可跨年，按交易所单页上限顺序分页。
#[utoipa::path(
    get,
    path = "/api/v1/summary/custom",
    tag = "范围分析 (Summary)",
    params(CustomRangeQuery),
    responses(
        (status = 200, description = "分析完成 (可能无数据)", body = ApiResponse<SummaryResponse>),
        (status = 400, description = "参数错误或结束早于开始", body = ApiErrorResponse),
        (status = 502, description = "行情数据源不可用", body = ApiErrorResponse)
    )
)]
pub async fn get_custom_summary(
    State(state): State<AppState>,
    Query(query): Query<CustomRangeQuery>,
) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    let from = parse_date("from", &query.from)?;
    let to = parse_date("to", &query.to)?;
    run(&state, Scope::Custom { from, to }).await
}
