// 配置管理模块
//
// 启动时只读取一次：先加载 config/app.toml（不存在则使用默认值），再应用环境变量覆盖。

pub mod path_validator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub use path_validator::{PathValidationResult, RootValidator};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS允许的源（包含 "*" 表示任意源）
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// 前端静态资源目录（可选）
    #[serde(default)]
    pub public_dir: Option<PathBuf>,
    /// 单次上传请求体上限（字节）
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024 // 100MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            public_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 本地目录
    #[default]
    Local,
    /// 远程仓库内容存储
    Repository,
}

impl BackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "repository" | "repo" | "remote" => Some(Self::Repository),
            _ => None,
        }
    }
}

/// 越界路径的处理策略（进程级，对所有操作一致）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfinementPolicy {
    /// 静默回退到根目录
    #[default]
    FallbackToRoot,
    /// 返回 PathEscapesRoot 错误
    Reject,
}

impl ConfinementPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "fallback_to_root" | "fallback" => Some(Self::FallbackToRoot),
            "reject" | "strict" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 后端类型
    #[serde(default)]
    pub backend: BackendKind,
    /// 本地后端的根目录（必须是绝对路径）
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// 越界路径处理策略
    #[serde(default)]
    pub confinement: ConfinementPolicy,
    /// 远程仓库配置
    #[serde(default)]
    pub repository: Option<RepositoryConfig>,
}

/// 远程仓库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// API 地址
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// 仓库所有者
    #[serde(default)]
    pub owner: String,
    /// 仓库名
    #[serde(default)]
    pub name: String,
    /// 分支（为空使用仓库默认分支）
    #[serde(default)]
    pub branch: Option<String>,
    /// 访问令牌
    #[serde(default)]
    pub token: String,
    /// 仓库内的根目录（为空表示仓库根）
    #[serde(default)]
    pub base_path: Option<String>,
    /// 提交信息前缀
    #[serde(default = "default_commit_prefix")]
    pub commit_message_prefix: String,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_commit_prefix() -> String {
    "file-manager:".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            owner: String::new(),
            name: String::new(),
            branch: None,
            token: String::new(),
            base_path: None,
            commit_message_prefix: default_commit_prefix(),
        }
    }
}

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("未配置根目录，请设置 FILE_MANAGER_ROOT_DIR 或 storage.root_dir")]
    MissingRootDir,
    #[error("根目录必须是绝对路径: {0:?}")]
    RootDirNotAbsolute(PathBuf),
    #[error("根目录不可用: {path:?}，{reason}")]
    RootDirInvalid { path: PathBuf, reason: String },
    #[error("远程仓库配置缺少字段: {0}")]
    MissingRepositoryField(&'static str),
}

impl StorageConfig {
    /// 校验存储配置
    ///
    /// 本地后端返回规范化后的根目录
    pub fn validate(&self) -> Result<Option<PathBuf>, ConfigError> {
        match self.backend {
            BackendKind::Local => {
                let root = self.root_dir.as_ref().ok_or(ConfigError::MissingRootDir)?;
                if !root.is_absolute() {
                    return Err(ConfigError::RootDirNotAbsolute(root.clone()));
                }

                let result = RootValidator::validate(root);
                if !result.exists || !result.is_directory {
                    return Err(ConfigError::RootDirInvalid {
                        path: root.clone(),
                        reason: result.message,
                    });
                }
                if !result.is_writable {
                    tracing::warn!("根目录不可写，写入类操作将失败: {:?}", root);
                }

                let canonical =
                    dunce::canonicalize(root).map_err(|e| ConfigError::RootDirInvalid {
                        path: root.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(canonical))
            }
            BackendKind::Repository => {
                let repo = self
                    .repository
                    .as_ref()
                    .ok_or(ConfigError::MissingRepositoryField("repository"))?;
                if repo.owner.trim().is_empty() {
                    return Err(ConfigError::MissingRepositoryField("owner"));
                }
                if repo.name.trim().is_empty() {
                    return Err(ConfigError::MissingRepositoryField("name"));
                }
                if repo.token.trim().is_empty() {
                    return Err(ConfigError::MissingRepositoryField("token"));
                }
                Ok(None)
            }
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 加载配置文件（失败使用默认值），然后应用环境变量覆盖
    pub async fn load(path: &str) -> Self {
        let mut config = match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// 应用环境变量覆盖
    ///
    /// `lookup` 抽象出来便于测试，生产环境传入 `std::env::var`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("FILE_MANAGER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("FILE_MANAGER_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("FILE_MANAGER_PORT 无效，忽略: {}", port),
            }
        }
        if let Some(dir) = get("FILE_MANAGER_PUBLIC_DIR") {
            self.server.public_dir = Some(PathBuf::from(dir));
        }
        if let Some(backend) = get("FILE_MANAGER_BACKEND") {
            match BackendKind::parse(&backend) {
                Some(kind) => self.storage.backend = kind,
                None => tracing::warn!("FILE_MANAGER_BACKEND 无效，忽略: {}", backend),
            }
        }
        if let Some(root) = get("FILE_MANAGER_ROOT_DIR") {
            self.storage.root_dir = Some(PathBuf::from(root));
        }
        if let Some(policy) = get("FILE_MANAGER_CONFINEMENT") {
            match ConfinementPolicy::parse(&policy) {
                Some(p) => self.storage.confinement = p,
                None => tracing::warn!("FILE_MANAGER_CONFINEMENT 无效，忽略: {}", policy),
            }
        }

        let repo_keys = [
            "REPOSITORY_API_BASE",
            "REPOSITORY_OWNER",
            "REPOSITORY_NAME",
            "REPOSITORY_BRANCH",
            "REPOSITORY_TOKEN",
            "REPOSITORY_BASE_PATH",
        ];
        if repo_keys.iter().any(|k| get(k).is_some()) {
            let repo = self.storage.repository.get_or_insert_with(RepositoryConfig::default);
            if let Some(v) = get("REPOSITORY_API_BASE") {
                repo.api_base = v;
            }
            if let Some(v) = get("REPOSITORY_OWNER") {
                repo.owner = v;
            }
            if let Some(v) = get("REPOSITORY_NAME") {
                repo.name = v;
            }
            if let Some(v) = get("REPOSITORY_BRANCH") {
                repo.branch = Some(v);
            }
            if let Some(v) = get("REPOSITORY_TOKEN") {
                repo.token = v;
            }
            if let Some(v) = get("REPOSITORY_BASE_PATH") {
                repo.base_path = Some(v);
            }
        }
    }
}
