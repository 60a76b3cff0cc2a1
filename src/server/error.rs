// API 响应与错误转换

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::filesystem::{FsError, FsErrorCode, FsErrorKind};

/// 统一成功响应
///
/// 业务数据平铺在顶层，与 `success` / `message` 并列
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

/// 无附加数据
#[derive(Debug, Default, Serialize)]
pub struct NoData {}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<NoData> {
    /// 仅包含提示消息的成功响应
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(NoData {}).with_message(message)
    }
}

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error_type: &'static str,
    /// 错误码
    pub error: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_message: Option<String>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, FsError>;

/// 错误码对应的 HTTP 状态码
pub fn status_for(code: FsErrorCode) -> StatusCode {
    match code {
        FsErrorCode::MissingField => StatusCode::BAD_REQUEST,
        FsErrorCode::PathEscapesRoot | FsErrorCode::RootProtected => StatusCode::FORBIDDEN,
        FsErrorCode::NotFound => StatusCode::NOT_FOUND,
        FsErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        FsErrorCode::FingerprintConflict => StatusCode::CONFLICT,
        FsErrorCode::Unsupported => StatusCode::NOT_IMPLEMENTED,
        FsErrorCode::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        FsErrorCode::NotADirectory
        | FsErrorCode::NotAFile
        | FsErrorCode::InvalidUtf8
        | FsErrorCode::IoFailure
        | FsErrorCode::RemoteFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for FsError {
    fn into_response(self) -> Response {
        let status = status_for(self.code);

        match self.kind() {
            FsErrorKind::Client | FsErrorKind::Confinement => {
                warn!("请求被拒绝: {} (status={})", self, status.as_u16())
            }
            FsErrorKind::Configuration => warn!("存储未就绪: {}", self),
            FsErrorKind::Backend => error!("文件操作失败: {} (status={})", self, status.as_u16()),
        }

        let body = ErrorBody {
            success: false,
            message: self.message,
            error_type: self.code.error_type(),
            error: self.code.code(),
            path: self.path,
            internal_message: self.internal_message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_success_flattens_data() {
        #[derive(Serialize)]
        struct Payload {
            count: usize,
        }

        let value = serde_json::to_value(ApiResponse::success(Payload { count: 2 })).unwrap();
        assert_eq!(value, json!({ "success": true, "count": 2 }));

        let value = serde_json::to_value(ApiResponse::message("已保存")).unwrap();
        assert_eq!(value, json!({ "success": true, "message": "已保存" }));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(FsErrorCode::MissingField), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(FsErrorCode::PathEscapesRoot), StatusCode::FORBIDDEN);
        assert_eq!(status_for(FsErrorCode::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(FsErrorCode::FingerprintConflict), StatusCode::CONFLICT);
        assert_eq!(status_for(FsErrorCode::Unsupported), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(status_for(FsErrorCode::NotConfigured), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(FsErrorCode::IoFailure), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let err = FsError::new(FsErrorCode::NotFound)
            .with_path("/missing.txt")
            .with_internal("No such file or directory (os error 2)");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error_type"], "not_found");
        assert_eq!(value["error"], 50003);
        assert_eq!(value["path"], "/missing.txt");
        assert!(value["internal_message"].as_str().unwrap().contains("os error 2"));
    }
}
