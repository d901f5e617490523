use axum::Json;
use axum::extract::State;
use koyomi_market::calendar::{months_elapsed, weeks_elapsed, years_range};

use crate::server::AppState;
use crate::types::{ApiResponse, MenuResponse, MonthOption};

/// 范围选择菜单
///
/// 周、月列表截至今天，年份列表从配置的起始年份到今年（降序）。
#[utoipa::path(
    get,
    path = "/api/v1/menu",
    tag = "日历 (Calendar)",
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<MenuResponse>)
    )
)]
pub async fn get_menu(State(state): State<AppState>) -> Json<ApiResponse<MenuResponse>> {
    let today = state.clock.today();
    let week_start = state.analyzer.settings().week_start;
    Json(ApiResponse::ok(MenuResponse {
        today,
        weeks: weeks_elapsed(today, week_start),
        months: months_elapsed(today)
            .into_iter()
            .map(MonthOption::from)
            .collect(),
        years: years_range(state.first_year, today),
    }))
}
