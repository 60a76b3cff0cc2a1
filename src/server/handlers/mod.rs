// API处理器模块

pub mod files;
pub mod transfer;

pub use files::*;
pub use transfer::*;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::filesystem::{FsError, FsErrorCode};
use crate::server::state::{not_configured, AppState, StorageStatus};

/// 存储未就绪时拦截所有 /api 请求
pub async fn require_storage(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match &state.storage {
        StorageStatus::Ready(_) => next.run(request).await,
        StorageStatus::Unavailable(reason) => not_configured(reason).into_response(),
    }
}

/// 未知的 /api 路径
pub async fn api_not_found(uri: axum::http::Uri) -> FsError {
    FsError::new(FsErrorCode::NotFound)
        .with_message("接口不存在")
        .with_path(uri.path().to_string())
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// 当前存储后端，未就绪时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<&'static str>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = match &state.storage {
        StorageStatus::Ready(service) => Some(service.backend_name()),
        StorageStatus::Unavailable(_) => None,
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "file-manager-rust".to_string(),
        backend,
    })
}
