// 受限文件操作模块
//
// 路径解析（PathGuard）+ 文件操作执行（FileService）+ 存储后端抽象

mod backend;
mod guard;
mod local;
mod service;
mod types;

pub use backend::{DownloadSource, StorageBackend};
pub use guard::{relativize, resolve_path, PathGuard};
pub use local::LocalBackend;
pub use service::{Deleted, Download, FileService, Renamed, Uploaded};
pub use types::*;
