//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 组装依赖后调用。

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use koyomi_core::analysis::entity::TodayState;
use koyomi_core::common::time::TimeProvider;
use koyomi_market::analyzer::MarketAnalyzer;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use crate::routes::{calendar, menu, summary, today};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - `today` 由后台轮询任务独占写入，Handler 只读。
/// - `clock` 与 `analyzer` 内部使用的时钟为同一实例。
#[derive(Clone)]
pub struct AppState {
    /// 范围分析门面
    pub analyzer: Arc<MarketAnalyzer>,
    /// 今日行情的最新状态
    pub today: watch::Receiver<TodayState>,
    /// 菜单计算所用时钟
    pub clock: Arc<dyn TimeProvider>,
    /// 年份菜单的起始年份
    pub first_year: i32,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Koyomi 行情日历 API",
        version = "0.1.0",
        description = "按日/周/月/年/自定义区间汇总 BTCUSDT 行情，提供月历视图与今日实时行情。",
        contact(name = "Koyomi Team"),
        license(name = "MIT")
    ),
    tags(
        (name = "范围分析 (Summary)", description = "日/周/月/年/自定义区间的涨跌、波动与指标汇总"),
        (name = "日历 (Calendar)", description = "月历格子与范围选择菜单"),
        (name = "今日行情 (Today)", description = "24 小时行情与当日图表，后台定时刷新")
    )
)]
pub struct ApiDoc;

// ============================================================
//  服务构建与启动
// ============================================================

/// # Summary
/// 构建完整的 axum 应用路由树 (含 Swagger UI 与 CORS)。
///
/// # Arguments
/// * `state` - 由外部组装的共享状态
pub fn build_router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(summary::get_day_summary))
        .routes(routes!(summary::get_week_summary))
        .routes(routes!(summary::get_month_summary))
        .routes(routes!(summary::get_year_summary))
        .routes(routes!(summary::get_custom_summary))
        .routes(routes!(calendar::get_month_calendar))
        .routes(routes!(menu::get_menu))
        .routes(routes!(today::get_today))
        .with_state(state)
        .split_for_parts();

    // 只读接口，允许所有来源
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// # Summary
/// 绑定端口并启动 HTTP 监听，直到 `shutdown` 完成后优雅退出。
///
/// # Arguments
/// * `state` - 共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:8080"`
/// * `shutdown` - 停机信号
pub async fn start_server<F>(
    state: AppState,
    bind_addr: &str,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Koyomi API server listening on {}", listener.local_addr()?);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Koyomi API server stopped");
    Ok(())
}
