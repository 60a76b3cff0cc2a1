// 远程仓库内容存储 API 数据类型

use serde::{Deserialize, Serialize};

use crate::filesystem::{FsError, FsErrorCode};

/// 内容条目（目录列表项或单个文件）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntry {
    /// 文件名
    pub name: String,
    /// 仓库内路径
    pub path: String,
    /// 内容指纹
    pub sha: String,
    /// 条目类型："file" / "dir" / "symlink" / "submodule"
    #[serde(rename = "type")]
    pub kind: String,
    /// 大小（字节）
    #[serde(default)]
    pub size: u64,
    /// base64 内容（仅单文件请求返回）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// 内容编码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl ContentEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }
}

/// 内容查询响应：目录返回数组，文件返回对象
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
    Directory(Vec<ContentEntry>),
    File(ContentEntry),
}

/// 创建 / 更新文件请求体
#[derive(Debug, Serialize)]
pub struct PutContentRequest<'a> {
    pub message: String,
    /// base64 编码后的内容
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<&'a str>,
}

/// 删除文件请求体
#[derive(Debug, Serialize)]
pub struct DeleteContentRequest<'a> {
    pub message: String,
    pub sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<&'a str>,
}

/// API 错误响应体
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// 远程仓库错误
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("资源不存在: {0}")]
    NotFound(String),
    #[error("内容指纹冲突: {0}")]
    Conflict(String),
    #[error("认证失败: {0}")]
    Unauthorized(String),
    #[error("API 错误 {status}: {message}")]
    Api { status: u16, message: String },
    #[error("请求失败: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("响应解析失败: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// 根据 HTTP 状态码归类错误
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => Self::NotFound(message),
            // 409: 指纹不匹配
            409 => Self::Conflict(message),
            // 422 只有提到 sha 时才是覆盖已有文件却未提供指纹
            422 if message.contains("sha") => Self::Conflict(message),
            401 | 403 => Self::Unauthorized(message),
            _ => Self::Api { status, message },
        }
    }
}

impl From<RepositoryError> for FsError {
    fn from(err: RepositoryError) -> Self {
        let code = match &err {
            RepositoryError::NotFound(_) => FsErrorCode::NotFound,
            RepositoryError::Conflict(_) => FsErrorCode::FingerprintConflict,
            RepositoryError::Unauthorized(_) => FsErrorCode::PermissionDenied,
            RepositoryError::Decode(_)
            | RepositoryError::Api { .. }
            | RepositoryError::Transport(_) => FsErrorCode::RemoteFailure,
        };
        FsError::new(code).with_internal(err.to_string())
    }
}
