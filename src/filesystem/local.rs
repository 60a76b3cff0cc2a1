// 本地文件系统后端

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::backend::{DownloadSource, StorageBackend};
use super::types::{DirEntry, EntryKind, FileContent, FsError, FsErrorCode};

/// 本地文件系统后端
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 同目录下的临时文件路径，用于原子替换
    fn temp_path_for(file: &Path) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        file.with_file_name(format!(".{}.{}-{}.tmp", name, std::process::id(), nanos))
    }
}

fn io_error(err: std::io::Error, path: &Path) -> FsError {
    FsError::from_io(&err, path.to_string_lossy().to_string())
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn root(&self) -> &Path {
        &self.root
    }

    async fn list(&self, dir: &Path) -> Result<Vec<DirEntry>, FsError> {
        let mut read_dir = fs::read_dir(dir).await.map_err(|e| {
            tracing::error!("读取目录失败: {:?}, 错误: {}", dir, e);
            io_error(e, dir)
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| io_error(e, dir))? {
            let name = entry.file_name().to_string_lossy().to_string();
            // 符号链接按目标类型判断，断链视为文件
            let is_dir = match entry.file_type().await {
                Ok(ft) if ft.is_symlink() => fs::metadata(entry.path())
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false),
                Ok(ft) => ft.is_dir(),
                Err(e) => {
                    tracing::debug!("读取条目类型失败，跳过: {:?}, 错误: {}", entry.path(), e);
                    continue;
                }
            };
            entries.push(DirEntry { name, is_dir });
        }

        Ok(entries)
    }

    async fn read(&self, file: &Path) -> Result<FileContent, FsError> {
        let metadata = fs::metadata(file).await.map_err(|e| io_error(e, file))?;
        if metadata.is_dir() {
            return Err(FsError::new(FsErrorCode::NotAFile)
                .with_path(file.to_string_lossy().to_string()));
        }

        let raw = fs::read(file).await.map_err(|e| io_error(e, file))?;
        let content = String::from_utf8(raw).map_err(|e| {
            FsError::new(FsErrorCode::InvalidUtf8)
                .with_path(file.to_string_lossy().to_string())
                .with_internal(e.utf8_error().to_string())
        })?;

        Ok(FileContent { content, sha: None })
    }

    async fn write(&self, file: &Path, data: Bytes, _sha: Option<&str>) -> Result<(), FsError> {
        if let Ok(metadata) = fs::metadata(file).await {
            if metadata.is_dir() {
                return Err(FsError::new(FsErrorCode::NotAFile)
                    .with_path(file.to_string_lossy().to_string()));
            }
        }

        // 先写临时文件再重命名，保证读者看到的要么是旧内容要么是新内容
        let temp = Self::temp_path_for(file);
        let result = async {
            let mut handle = fs::File::create(&temp).await?;
            handle.write_all(&data).await?;
            handle.sync_all().await?;
            drop(handle);
            fs::rename(&temp, file).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp).await;
            tracing::error!("写入文件失败: {:?}, 错误: {}", file, e);
            return Err(io_error(e, file));
        }

        Ok(())
    }

    async fn delete(&self, target: &Path, _sha: Option<&str>) -> Result<EntryKind, FsError> {
        let metadata = fs::symlink_metadata(target)
            .await
            .map_err(|e| io_error(e, target))?;

        if metadata.is_dir() {
            match fs::remove_dir_all(target).await {
                Ok(()) => Ok(EntryKind::Folder),
                // 递归删除过程中子项被并发移除，视为成功
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EntryKind::Folder),
                Err(e) => Err(io_error(e, target)),
            }
        } else {
            fs::remove_file(target)
                .await
                .map_err(|e| io_error(e, target))?;
            Ok(EntryKind::File)
        }
    }

    async fn create_dir(&self, dir: &Path) -> Result<(), FsError> {
        fs::create_dir_all(dir).await.map_err(|e| io_error(e, dir))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        // 源不存在时给出明确的 NotFound，而不是模糊的目标路径错误
        fs::symlink_metadata(from)
            .await
            .map_err(|e| io_error(e, from))?;
        fs::rename(from, to).await.map_err(|e| io_error(e, to))
    }

    async fn open_download(&self, file: &Path) -> Result<DownloadSource, FsError> {
        let handle = fs::File::open(file).await.map_err(|e| io_error(e, file))?;
        let metadata = handle.metadata().await.map_err(|e| io_error(e, file))?;
        if metadata.is_dir() {
            return Err(FsError::new(FsErrorCode::NotAFile)
                .with_path(file.to_string_lossy().to_string()));
        }

        Ok(DownloadSource {
            size: Some(metadata.len()),
            stream: ReaderStream::new(handle).boxed(),
        })
    }
}
