// 上传 / 下载 API 处理器

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::filesystem::{FileQuery, FsError, FsErrorCode, UploadPart};
use crate::server::error::{ApiResponse, ApiResult};
use crate::server::state::AppState;

/// 上传响应
#[derive(Debug, Serialize)]
pub struct UploadData {
    pub count: usize,
    pub files: Vec<String>,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> FsError {
    FsError::new(FsErrorCode::MissingField)
        .with_message("上传数据解析失败")
        .with_internal(err.to_string())
}

/// POST /api/upload
/// multipart 字段：files[] / files（可多个），directory（可选）
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<UploadData> {
    let service = state.service()?;

    let mut directory: Option<String> = None;
    let mut parts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "files[]" | "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                info!("接收上传文件: {} ({} bytes)", file_name, data.len());
                parts.push(UploadPart { file_name, data });
            }
            "directory" => {
                directory = Some(field.text().await.map_err(multipart_error)?);
            }
            other => {
                warn!("忽略未知上传字段: {}", other);
            }
        }
    }

    info!(
        "API: 上传文件: directory={:?}, count={}",
        directory,
        parts.len()
    );

    let uploaded = service.upload(directory.as_deref(), parts).await?;
    let count = uploaded.files.len();
    Ok(Json(
        ApiResponse::success(UploadData {
            count,
            files: uploaded.files,
        })
        .with_message(format!("已上传 {} 个文件到 {}", count, uploaded.directory)),
    ))
}

/// GET /api/download?directory=/docs&file=a.txt
/// 流式下载文件
pub async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<Response, FsError> {
    info!(
        "API: 下载文件: directory={:?}, file={:?}",
        query.directory, query.file
    );

    let download = state
        .service()?
        .download(query.directory.as_deref(), query.file.as_deref())
        .await?;

    let file_name = download.file_name.clone();
    // 响应头已发出后出错只能中断连接
    let stream = download.source.stream.inspect(move |chunk| {
        if let Err(e) = chunk {
            error!("下载传输中断: {}, 错误: {}", file_name, e);
        }
    });

    let mut response = Body::from_stream(stream).into_response();
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type(&download.file_name));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&download.file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(size) = download.source.size {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    }

    Ok(response)
}

/// 按扩展名推断 Content-Type
fn content_type(file_name: &str) -> HeaderValue {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    HeaderValue::from_str(mime.essence_str())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

/// 附件文件名：ASCII 回退 + RFC 5987 编码
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(content_type("notes.txt"), "text/plain");
        assert_eq!(content_type("photo.JPG"), "image/jpeg");
        assert_eq!(content_type("report.json"), "application/json");
        assert_eq!(content_type("module.wasm"), "application/wasm");
        assert_eq!(content_type("archive"), "application/octet-stream");
        assert_eq!(content_type("data.unknownext"), "application/octet-stream");
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn test_content_disposition_unicode_and_quotes() {
        let value = content_disposition("报告\"v2\".txt");
        assert!(value.starts_with("attachment; filename=\"___v2_.txt\""));
        assert!(value.contains("filename*=UTF-8''%E6%8A%A5%E5%91%8A%22v2%22.txt"));
    }
}
