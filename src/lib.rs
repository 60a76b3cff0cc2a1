// File Manager Rust Library
// 受限根目录的远程文件管理服务

// 配置管理模块
pub mod config;

// 路径守卫 + 文件操作执行模块
pub mod filesystem;

// 日志系统
pub mod logging;

// 远程仓库存储后端
pub mod repository;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use config::AppConfig;
pub use filesystem::{FileService, FsError, FsErrorCode, PathGuard, StorageBackend};
pub use repository::RepositoryBackend;
pub use server::{build_router, AppState};
