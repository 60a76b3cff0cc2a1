// 文件操作核心数据类型定义

use serde::{Deserialize, Serialize};

// 重新导出配置模块中的路径约束策略
pub use crate::config::ConfinementPolicy;

/// 文件操作错误码
/// 错误码范围：50001 - 50099
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorCode {
    /// 缺少必填字段
    MissingField = 50001,
    /// 路径越过根目录
    PathEscapesRoot = 50002,
    /// 目标不存在
    NotFound = 50003,
    /// 权限不足
    PermissionDenied = 50004,
    /// 不是目录
    NotADirectory = 50005,
    /// 不是文件
    NotAFile = 50006,
    /// 内容不是合法的 UTF-8
    InvalidUtf8 = 50007,
    /// 存储读写失败
    IoFailure = 50008,
    /// 内容指纹已过期
    FingerprintConflict = 50009,
    /// 后端不支持该操作
    Unsupported = 50010,
    /// 远程仓库返回错误
    RemoteFailure = 50011,
    /// 拒绝对根目录本身执行破坏性操作
    RootProtected = 50012,
    /// 存储未配置
    NotConfigured = 50013,
}

/// 错误归类，决定 HTTP 状态码和日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    /// 客户端错误（请求缺字段等），不触碰存储
    Client,
    /// 路径约束违规（仅 reject 策略下出现）
    Confinement,
    /// 后端错误
    Backend,
    /// 配置缺失
    Configuration,
}

impl FsErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingField => "缺少必填字段",
            Self::PathEscapesRoot => "路径超出允许访问的根目录",
            Self::NotFound => "文件或目录不存在",
            Self::PermissionDenied => "没有权限访问该路径",
            Self::NotADirectory => "指定路径不是目录",
            Self::NotAFile => "指定路径不是文件",
            Self::InvalidUtf8 => "文件内容不是有效的 UTF-8 文本",
            Self::IoFailure => "存储读写失败",
            Self::FingerprintConflict => "文件已被修改，请重新读取后再提交",
            Self::Unsupported => "当前存储后端不支持该操作",
            Self::RemoteFailure => "远程仓库请求失败",
            Self::RootProtected => "不允许对根目录执行该操作",
            Self::NotConfigured => "存储后端未配置",
        }
    }

    /// 对外暴露的错误类型标识
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::PathEscapesRoot => "path_escapes_root",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::NotADirectory => "not_a_directory",
            Self::NotAFile => "not_a_file",
            Self::InvalidUtf8 => "invalid_utf8",
            Self::IoFailure => "io_error",
            Self::FingerprintConflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::RemoteFailure => "remote_error",
            Self::RootProtected => "root_protected",
            Self::NotConfigured => "configuration",
        }
    }

    pub fn kind(&self) -> FsErrorKind {
        match self {
            Self::MissingField => FsErrorKind::Client,
            Self::PathEscapesRoot | Self::RootProtected => FsErrorKind::Confinement,
            Self::NotConfigured => FsErrorKind::Configuration,
            _ => FsErrorKind::Backend,
        }
    }
}

/// 文件操作错误
#[derive(Debug)]
pub struct FsError {
    pub code: FsErrorCode,
    pub message: String,
    pub path: Option<String>,
    /// 后端原始错误信息（诊断用）
    pub internal_message: Option<String>,
}

impl FsError {
    pub fn new(code: FsErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            path: None,
            internal_message: None,
        }
    }

    /// 缺少必填字段
    pub fn missing_field(field: &str) -> Self {
        Self::new(FsErrorCode::MissingField).with_message(format!("缺少必填字段: {}", field))
    }

    /// 将 IO 错误归类为文件操作错误
    pub fn from_io(err: &std::io::Error, path: impl Into<String>) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => FsErrorCode::NotFound,
            std::io::ErrorKind::PermissionDenied => FsErrorCode::PermissionDenied,
            std::io::ErrorKind::NotADirectory => FsErrorCode::NotADirectory,
            std::io::ErrorKind::IsADirectory => FsErrorCode::NotAFile,
            std::io::ErrorKind::InvalidData => FsErrorCode::InvalidUtf8,
            _ => FsErrorCode::IoFailure,
        };
        Self::new(code)
            .with_path(path)
            .with_internal(err.to_string())
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    pub fn kind(&self) -> FsErrorKind {
        self.code.kind()
    }
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.path, &self.internal_message) {
            (Some(path), Some(internal)) => write!(f, "{}: {} ({})", self.message, path, internal),
            (Some(path), None) => write!(f, "{}: {}", self.message, path),
            (None, Some(internal)) => write!(f, "{} ({})", self.message, internal),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for FsError {}

/// 目录条目（列目录时的快照）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
}

/// 条目类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
        }
    }
}

/// 列目录结果
#[derive(Debug, Clone)]
pub struct Listing {
    pub entries: Vec<DirEntry>,
    /// 被列出目录的显示路径（以 / 开头）
    pub relative_dir: String,
}

/// 文件内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub content: String,
    /// 内容指纹（仅远程仓库后端提供）
    pub sha: Option<String>,
}

/// 单个上传文件
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// 客户端声明的文件名
    pub file_name: String,
    pub data: bytes::Bytes,
}

/// 目录查询参数
#[derive(Debug, Default, Deserialize)]
pub struct DirectoryQuery {
    #[serde(default)]
    pub directory: Option<String>,
}

/// 文件查询参数（读取 / 下载）
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// 删除查询参数
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    /// 远程仓库后端必填
    #[serde(default)]
    pub sha: Option<String>,
}

/// 保存文件请求
#[derive(Debug, Default, Deserialize)]
pub struct SaveFileRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    /// 可以是空字符串，但不能缺失
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
}

/// 新建文件夹请求
#[derive(Debug, Default, Deserialize)]
pub struct CreateFolderRequest {
    #[serde(default)]
    pub new_folder: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
}

/// 重命名请求
#[derive(Debug, Default, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
}
