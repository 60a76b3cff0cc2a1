// 文件操作服务
//
// 所有请求路径先经过 PathGuard 解析，再交给存储后端执行；
// 每个操作只调用一次后端，后端错误统一转换为 FsError。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use super::backend::{DownloadSource, StorageBackend};
use super::guard::PathGuard;
use super::types::*;

/// 删除结果
#[derive(Debug, Clone)]
pub struct Deleted {
    pub kind: EntryKind,
    pub path: String,
}

/// 重命名结果
#[derive(Debug, Clone)]
pub struct Renamed {
    pub from: String,
    pub to: String,
}

/// 上传结果
#[derive(Debug, Clone)]
pub struct Uploaded {
    pub directory: String,
    pub files: Vec<String>,
}

/// 下载结果
#[derive(Debug)]
pub struct Download {
    /// 建议的下载文件名
    pub file_name: String,
    pub source: DownloadSource,
}

/// 文件操作服务
pub struct FileService {
    guard: PathGuard,
    backend: Arc<dyn StorageBackend>,
}

impl FileService {
    /// 创建新的文件操作服务，根边界取自后端
    pub fn new(backend: Arc<dyn StorageBackend>, policy: ConfinementPolicy) -> Self {
        Self {
            guard: PathGuard::new(backend.root(), policy),
            backend,
        }
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 列出目录内容（文件夹在前，按名称排序）
    pub async fn list(&self, directory: Option<&str>) -> Result<Listing, FsError> {
        let dir = self.guard.resolve(directory.unwrap_or(""))?;
        let mut entries = self
            .backend
            .list(&dir)
            .await
            .map_err(|e| self.display_error(e, &dir))?;

        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        tracing::debug!("列出目录 {:?}: {} 个条目", dir, entries.len());

        Ok(Listing {
            entries,
            relative_dir: self.guard.relativize(&dir),
        })
    }

    /// 读取文件内容
    pub async fn read(&self, directory: Option<&str>, file: Option<&str>) -> Result<FileContent, FsError> {
        let name = required("file", file)?;
        let path = self.guard.resolve_child(directory, name)?;
        self.backend
            .read(&path)
            .await
            .map_err(|e| self.display_error(e, &path))
    }

    /// 创建或覆盖文件
    pub async fn save(&self, req: &SaveFileRequest) -> Result<String, FsError> {
        let name = required("file_name", req.file_name.as_deref())?;
        // content 允许为空字符串，但不能缺失
        let content = req
            .content
            .as_ref()
            .ok_or_else(|| FsError::missing_field("content"))?;

        let path = self.guard.resolve_child(req.directory.as_deref(), name)?;
        self.ensure_not_root(&path)?;

        self.backend
            .write(&path, Bytes::from(content.clone()), non_empty(req.sha.as_deref()))
            .await
            .map_err(|e| self.display_error(e, &path))?;

        Ok(self.guard.relativize(&path))
    }

    /// 创建目录（含缺失的上级目录）
    pub async fn create_folder(&self, req: &CreateFolderRequest) -> Result<String, FsError> {
        let name = required("new_folder", req.new_folder.as_deref())?;
        let path = self.guard.resolve_child(req.directory.as_deref(), name)?;

        self.backend
            .create_dir(&path)
            .await
            .map_err(|e| self.display_error(e, &path))?;

        Ok(self.guard.relativize(&path))
    }

    /// 删除文件或目录
    pub async fn delete(&self, query: &DeleteQuery) -> Result<Deleted, FsError> {
        let name = required("file", query.file.as_deref())?;
        let sha = non_empty(query.sha.as_deref());
        if self.backend.requires_fingerprint() && sha.is_none() {
            return Err(FsError::missing_field("sha"));
        }

        let path = self.guard.resolve_child(query.directory.as_deref(), name)?;
        self.ensure_not_root(&path)?;

        let kind = self
            .backend
            .delete(&path, sha)
            .await
            .map_err(|e| self.display_error(e, &path))?;

        Ok(Deleted {
            kind,
            path: self.guard.relativize(&path),
        })
    }

    /// 重命名 / 移动
    pub async fn rename(&self, req: &RenameRequest) -> Result<Renamed, FsError> {
        let old_name = required("old_name", req.old_name.as_deref())?;
        let new_name = required("new_name", req.new_name.as_deref())?;

        let from = self.guard.resolve_child(req.directory.as_deref(), old_name)?;
        let to = self.guard.resolve_child(req.directory.as_deref(), new_name)?;
        self.ensure_not_root(&from)?;
        self.ensure_not_root(&to)?;

        self.backend
            .rename(&from, &to)
            .await
            .map_err(|e| self.display_error(e, &from))?;

        Ok(Renamed {
            from: self.guard.relativize(&from),
            to: self.guard.relativize(&to),
        })
    }

    /// 保存上传的文件到目标目录
    ///
    /// 上传文件名同样经过路径守卫，不直接信任客户端
    pub async fn upload(&self, directory: Option<&str>, parts: Vec<UploadPart>) -> Result<Uploaded, FsError> {
        if parts.is_empty() {
            return Err(FsError::missing_field("files"));
        }

        let dir = self.guard.resolve(directory.unwrap_or(""))?;
        let dir_display = self.guard.relativize(&dir);

        let mut stored = Vec::with_capacity(parts.len());
        for part in parts {
            let name = required("filename", Some(part.file_name.as_str()))?;
            let path = self.upload_target(&dir, &dir_display, name)?;

            self.backend
                .write(&path, part.data, None)
                .await
                .map_err(|e| self.display_error(e, &path))?;

            tracing::debug!("上传文件已保存: {:?}", path);
            stored.push(self.guard.relativize(&path));
        }

        Ok(Uploaded {
            directory: dir_display,
            files: stored,
        })
    }

    /// 上传文件只能落在目标目录下，带路径的文件名只保留最后一段
    fn upload_target(&self, dir: &Path, dir_display: &str, name: &str) -> Result<PathBuf, FsError> {
        let path = self.guard.resolve_child(Some(dir_display), name)?;
        // 越界回退到根目录时按根目录保护处理
        self.ensure_not_root(&path)?;
        if path.parent() == Some(dir) {
            return Ok(path);
        }

        let base = Path::new(name)
            .file_name()
            .ok_or_else(|| FsError::missing_field("filename"))?;
        let confined = dir.join(base);
        tracing::warn!(
            "上传文件名包含路径，已限制在目标目录: {:?} -> {:?}",
            name,
            self.guard.relativize(&confined)
        );
        Ok(confined)
    }

    /// 打开文件用于下载
    pub async fn download(&self, directory: Option<&str>, file: Option<&str>) -> Result<Download, FsError> {
        let name = required("file", file)?;
        let path = self.guard.resolve_child(directory, name)?;
        self.ensure_not_root(&path)?;

        let source = self
            .backend
            .open_download(&path)
            .await
            .map_err(|e| self.display_error(e, &path))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());

        Ok(Download { file_name, source })
    }

    /// 根目录只能作为容器使用：在回退策略下，越界的文件名会解析成根目录
    fn ensure_not_root(&self, path: &Path) -> Result<(), FsError> {
        if self.guard.is_root(path) {
            return Err(FsError::new(FsErrorCode::RootProtected).with_path("/"));
        }
        Ok(())
    }

    /// 把错误中的绝对路径替换为显示路径，避免泄露服务器目录结构
    fn display_error(&self, mut err: FsError, path: &Path) -> FsError {
        err.path = Some(self.guard.relativize(path));
        err
    }
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, FsError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(FsError::missing_field(field)),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
