// 应用状态

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{AppConfig, BackendKind};
use crate::filesystem::{FileService, FsError, FsErrorCode, LocalBackend, StorageBackend};
use crate::repository::RepositoryBackend;

/// 存储就绪状态
#[derive(Clone)]
pub enum StorageStatus {
    Ready(Arc<FileService>),
    /// 配置缺失或无效，附带诊断信息
    Unavailable(Arc<str>),
}

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置（启动时读取一次，之后只读）
    pub config: Arc<AppConfig>,
    pub storage: StorageStatus,
}

impl AppState {
    /// 根据配置构建存储后端
    ///
    /// 配置无效时服务照常启动，所有 /api 请求返回诊断信息
    pub fn new(config: AppConfig) -> Self {
        let storage = match Self::build_service(&config) {
            Ok(service) => {
                info!(
                    "存储后端已就绪: backend={}, root={:?}, policy={:?}",
                    service.backend_name(),
                    service.guard().root(),
                    service.guard().policy()
                );
                StorageStatus::Ready(Arc::new(service))
            }
            Err(e) => {
                error!("存储后端配置无效: {:#}", e);
                StorageStatus::Unavailable(Arc::from(format!("{:#}", e)))
            }
        };

        Self {
            config: Arc::new(config),
            storage,
        }
    }

    /// 使用现成的文件服务（测试用）
    pub fn with_service(config: AppConfig, service: FileService) -> Self {
        Self {
            config: Arc::new(config),
            storage: StorageStatus::Ready(Arc::new(service)),
        }
    }

    fn build_service(config: &AppConfig) -> anyhow::Result<FileService> {
        let storage = &config.storage;
        let validated_root = storage.validate()?;

        let backend: Arc<dyn StorageBackend> = match (storage.backend, validated_root) {
            (BackendKind::Local, Some(root)) => Arc::new(LocalBackend::new(root)),
            (BackendKind::Local, None) => anyhow::bail!("本地后端缺少根目录"),
            (BackendKind::Repository, _) => {
                let repo = storage
                    .repository
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("缺少远程仓库配置"))?;
                Arc::new(RepositoryBackend::new(repo)?)
            }
        };

        Ok(FileService::new(backend, storage.confinement))
    }

    /// 获取文件服务，未就绪时返回配置错误
    pub fn service(&self) -> Result<&Arc<FileService>, FsError> {
        match &self.storage {
            StorageStatus::Ready(service) => Ok(service),
            StorageStatus::Unavailable(reason) => Err(not_configured(reason)),
        }
    }
}

pub(crate) fn not_configured(reason: &str) -> FsError {
    FsError::new(FsErrorCode::NotConfigured).with_internal(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root_is_unavailable() {
        let state = AppState::new(AppConfig::default());
        let err = state.service().err().unwrap();
        assert_eq!(err.code, FsErrorCode::NotConfigured);
        assert!(err.internal_message.unwrap().contains("FILE_MANAGER_ROOT_DIR"));
    }

    #[test]
    fn test_local_root_is_ready() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            storage: StorageConfig {
                root_dir: Some(temp.path().to_path_buf()),
                ..Default::default()
            },
            ..Default::default()
        };

        let state = AppState::new(config);
        let service = state.service().unwrap();
        assert_eq!(service.backend_name(), "local");
    }

    #[test]
    fn test_repository_missing_token_is_unavailable() {
        let config = AppConfig {
            storage: StorageConfig {
                backend: BackendKind::Repository,
                repository: Some(crate::config::RepositoryConfig {
                    owner: "octo".to_string(),
                    name: "notes".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let state = AppState::new(config);
        assert!(matches!(state.storage, StorageStatus::Unavailable(_)));
    }
}
