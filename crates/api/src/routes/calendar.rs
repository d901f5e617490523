use axum::Json;
use axum::extract::{Path, State};
use koyomi_core::analysis::entity::MonthGrid;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiErrorResponse, ApiResponse};

/// 月历视图
///
/// 覆盖整月所在的完整周；行情加载失败时仍返回完整格子，`available` 为 false。
#[utoipa::path(
    get,
    path = "/api/v1/calendar/{year}/{month}",
    tag = "日历 (Calendar)",
    params(
        ("year" = i32, Path, description = "年份"),
        ("month" = u32, Path, description = "月份 1..=12")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<MonthGrid>),
        (status = 400, description = "参数错误", body = ApiErrorResponse)
    )
)]
pub async fn get_month_calendar(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<ApiResponse<MonthGrid>>, ApiError> {
    let grid = state.analyzer.month_grid(year, month).await?;
    Ok(Json(ApiResponse::ok(grid)))
}
