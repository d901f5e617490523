use axum::Json;
use axum::extract::State;
use koyomi_core::analysis::entity::TodayState;

use crate::server::AppState;
use crate::types::ApiResponse;

/// 今日行情
///
/// 返回后台轮询任务最近一次发布的状态，本接口不会触发抓取。
#[utoipa::path(
    get,
    path = "/api/v1/today",
    tag = "今日行情 (Today)",
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<TodayState>)
    )
)]
pub async fn get_today(State(state): State<AppState>) -> Json<ApiResponse<TodayState>> {
    let latest = state.today.borrow().clone();
    Json(ApiResponse::ok(latest))
}
