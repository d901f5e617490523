//! # API 统一错误处理
//!
//! 将下层各 crate 的错误类型统一映射到 HTTP 状态码与 JSON 响应体。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use koyomi_core::market::error::MarketError;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// API 层统一错误枚举
#[derive(Error, Debug)]
pub enum ApiError {
    /// 资源未找到 (404)
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 请求参数错误 (400)
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    /// 行情数据源不可用 (502)
    #[error("行情数据源不可用: {0}")]
    Upstream(String),

    /// 服务尚未就绪 (503)
    #[error("服务暂不可用: {0}")]
    Unavailable(String),

    /// 下层业务错误 (500)
    #[error("内部服务错误: {0}")]
    Internal(String),
}

/// 将 `ApiError` 转换为 axum 的 HTTP 响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Upstream(msg) => {
                tracing::warn!("upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::Internal(msg) => {
                // 内部错误只记录日志，不向客户端透传细节
                tracing::error!("内部服务错误: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "服务器内部错误".to_string(),
                )
            }
        };

        let body = Json(ApiErrorResponse::from_msg(message));
        (status, body).into_response()
    }
}

/// 从 `MarketError` 转换
impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match &err {
            MarketError::InvalidRange(_) | MarketError::InvalidScope(_) => {
                ApiError::BadRequest(err.to_string())
            }
            MarketError::NotFound => ApiError::NotFound(err.to_string()),
            MarketError::Network(_) | MarketError::Parse(_) | MarketError::Schema { .. } => {
                ApiError::Upstream(err.to_string())
            }
            MarketError::Unknown(_) => ApiError::Internal(err.to_string()),
        }
    }
}
