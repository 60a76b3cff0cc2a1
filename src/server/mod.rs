// Web服务器模块

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ApiResponse, ApiResult};
pub use state::{AppState, StorageStatus};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

/// 构建 API 路由（含 /health），不含静态资源和跨域等外层中间件
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    let api_routes = Router::new()
        // 目录与文件内容
        .route("/files", get(handlers::list_files))
        .route("/file-content", get(handlers::file_content))
        .route("/save-file", post(handlers::save_file))
        .route("/create-folder", post(handlers::create_folder))
        .route("/delete", delete(handlers::delete_entry))
        .route("/rename", put(handlers::rename_entry))
        // 上传下载
        .route("/upload", post(handlers::upload_files))
        .route("/download", get(handlers::download_file))
        // fallback 也要经过存储检查
        .fallback(handlers::api_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_storage,
        ));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
