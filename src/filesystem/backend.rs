// 存储后端抽象
//
// 本地文件系统和远程仓库内容存储共用同一组能力；
// 远程仓库没有目录和原生重命名，这两项默认返回"不支持"。

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use super::types::{DirEntry, EntryKind, FileContent, FsError, FsErrorCode};

/// 下载数据源
pub struct DownloadSource {
    /// 文件大小（已知时用于 Content-Length）
    pub size: Option<u64>,
    pub stream: BoxStream<'static, std::io::Result<Bytes>>,
}

impl std::fmt::Debug for DownloadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSource")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// 存储后端
///
/// 所有路径参数都是已经过 `PathGuard` 解析的绝对路径。
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// 后端名称（日志用）
    fn name(&self) -> &'static str;

    /// 根边界
    fn root(&self) -> &Path;

    /// 更新 / 删除是否必须携带内容指纹
    fn requires_fingerprint(&self) -> bool {
        false
    }

    /// 列出目录的直接子条目
    async fn list(&self, dir: &Path) -> Result<Vec<DirEntry>, FsError>;

    /// 读取整个文件为 UTF-8 文本
    async fn read(&self, file: &Path) -> Result<FileContent, FsError>;

    /// 创建或覆盖文件
    async fn write(&self, file: &Path, data: Bytes, sha: Option<&str>) -> Result<(), FsError>;

    /// 删除文件或目录（目录递归删除）
    async fn delete(&self, target: &Path, sha: Option<&str>) -> Result<EntryKind, FsError>;

    /// 创建目录及所有缺失的上级目录
    async fn create_dir(&self, dir: &Path) -> Result<(), FsError> {
        Err(unsupported(self.name(), "create_dir", dir))
    }

    /// 在根目录内移动 / 重命名
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let _ = to;
        Err(unsupported(self.name(), "rename", from))
    }

    /// 打开文件用于流式下载
    async fn open_download(&self, file: &Path) -> Result<DownloadSource, FsError>;
}

fn unsupported(backend: &str, operation: &str, path: &Path) -> FsError {
    FsError::new(FsErrorCode::Unsupported)
        .with_path(path.to_string_lossy().to_string())
        .with_internal(format!("{} 后端不支持 {}", backend, operation))
}
