//! # `koyomi-api` - HTTP API 网关
//!
//! 本 crate 是 Koyomi 行情日历分析引擎的 HTTP/REST 服务入口。
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 接收来自日历前端或浏览器的 HTTP 请求
//! - 将路径参数转换为范围选择器，调用下层 `MarketAnalyzer` 完成分析
//! - 读取后台轮询任务发布的"今日行情"状态
//! - 将分析结果包装为统一响应结构返回给前端

pub mod error;
pub mod routes;
pub mod server;
pub mod types;
