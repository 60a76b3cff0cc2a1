// 文件 API 处理器：列目录、读写、新建目录、删除、重命名

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::filesystem::{
    CreateFolderRequest, DeleteQuery, DirEntry, DirectoryQuery, EntryKind, FileQuery,
    RenameRequest, SaveFileRequest,
};
use crate::server::error::{ApiResponse, ApiResult, NoData};
use crate::server::state::AppState;

/// 列目录响应
#[derive(Debug, Serialize)]
pub struct FilesData {
    pub files: Vec<DirEntry>,
    #[serde(rename = "relativeDir")]
    pub relative_dir: String,
}

/// 文件内容响应
#[derive(Debug, Serialize)]
pub struct ContentData {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// GET /api/files?directory=/docs
/// 列出目录内容
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<FilesData> {
    info!("API: 列出目录: directory={:?}", query.directory);

    let listing = state.service()?.list(query.directory.as_deref()).await?;
    Ok(Json(ApiResponse::success(FilesData {
        files: listing.entries,
        relative_dir: listing.relative_dir,
    })))
}

/// GET /api/file-content?directory=/docs&file=a.txt
/// 读取文件内容
pub async fn file_content(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> ApiResult<ContentData> {
    info!(
        "API: 读取文件: directory={:?}, file={:?}",
        query.directory, query.file
    );

    let content = state
        .service()?
        .read(query.directory.as_deref(), query.file.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(ContentData {
        content: content.content,
        sha: content.sha,
    })))
}

/// POST /api/save-file
/// 创建或覆盖文件
pub async fn save_file(
    State(state): State<AppState>,
    Json(req): Json<SaveFileRequest>,
) -> ApiResult<NoData> {
    info!(
        "API: 保存文件: directory={:?}, file_name={:?}",
        req.directory, req.file_name
    );

    let path = state.service()?.save(&req).await?;
    Ok(Json(ApiResponse::message(format!("文件已保存: {}", path))))
}

/// POST /api/create-folder
/// 新建目录
pub async fn create_folder(
    State(state): State<AppState>,
    Json(req): Json<CreateFolderRequest>,
) -> ApiResult<NoData> {
    info!(
        "API: 新建目录: directory={:?}, new_folder={:?}",
        req.directory, req.new_folder
    );

    let path = state.service()?.create_folder(&req).await?;
    Ok(Json(ApiResponse::message(format!("目录已创建: {}", path))))
}

/// DELETE /api/delete?directory=/docs&file=a.txt&sha=...
/// 删除文件或目录（目录递归删除）
pub async fn delete_entry(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<NoData> {
    info!(
        "API: 删除: directory={:?}, file={:?}",
        query.directory, query.file
    );

    let deleted = state.service()?.delete(&query).await?;
    let label = match deleted.kind {
        EntryKind::File => "文件",
        EntryKind::Folder => "目录",
    };
    Ok(Json(ApiResponse::message(format!(
        "{}已删除: {}",
        label, deleted.path
    ))))
}

/// PUT /api/rename
/// 重命名 / 移动
pub async fn rename_entry(
    State(state): State<AppState>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<NoData> {
    info!(
        "API: 重命名: directory={:?}, {:?} -> {:?}",
        req.directory, req.old_name, req.new_name
    );

    let renamed = state.service()?.rename(&req).await?;
    Ok(Json(ApiResponse::message(format!(
        "已重命名: {} -> {}",
        renamed.from, renamed.to
    ))))
}
