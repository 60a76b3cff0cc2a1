// 远程仓库存储后端
//
// 仓库内容以虚拟根 "/" 为边界，路径相对化后作为内容 key；
// 写入和删除依赖内容指纹（sha）做乐观并发控制。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info};

use super::client::{decode_content, RepositoryClient};
use super::types::{ContentEntry, ContentsResponse};
use crate::config::RepositoryConfig;
use crate::filesystem::{
    relativize, DirEntry, DownloadSource, EntryKind, FileContent, FsError, FsErrorCode,
    StorageBackend,
};

/// 远程仓库后端
#[derive(Debug, Clone)]
pub struct RepositoryBackend {
    client: RepositoryClient,
    root: PathBuf,
    /// 仓库内根目录（不含首尾斜杠）
    base_path: String,
}

impl RepositoryBackend {
    pub fn new(config: RepositoryConfig) -> anyhow::Result<Self> {
        let base_path = config
            .base_path
            .as_deref()
            .unwrap_or("")
            .trim_matches('/')
            .to_string();
        let client = RepositoryClient::new(config)?;
        Ok(Self {
            client,
            root: PathBuf::from("/"),
            base_path,
        })
    }

    /// 虚拟路径转换为仓库内容 key
    fn key_for(&self, path: &Path) -> String {
        let rel = relativize(&self.root, path);
        let rel = rel.trim_start_matches('/');
        match (self.base_path.is_empty(), rel.is_empty()) {
            (true, _) => rel.to_string(),
            (false, true) => self.base_path.clone(),
            (false, false) => format!("{}/{}", self.base_path, rel),
        }
    }

    /// 获取单个文件条目，目录返回 NotAFile
    async fn fetch_file(&self, path: &Path) -> Result<(ContentEntry, Vec<u8>), FsError> {
        let key = self.key_for(path);
        let entry = match self.client.get_contents(&key).await.map_err(|e| with_path(e, path))? {
            ContentsResponse::File(entry) => entry,
            ContentsResponse::Directory(_) => {
                return Err(FsError::new(FsErrorCode::NotAFile).with_path(display(path)));
            }
        };

        let encoded = match (entry.encoding.as_deref(), entry.content.as_deref()) {
            (Some("base64"), Some(content)) => content,
            (encoding, _) => {
                return Err(FsError::new(FsErrorCode::RemoteFailure)
                    .with_path(display(path))
                    .with_internal(format!(
                        "无法获取文件内容（encoding={}），文件可能过大",
                        encoding.unwrap_or("none")
                    )));
            }
        };

        let data = decode_content(encoded).map_err(|e| with_path(e, path))?;
        Ok((entry, data))
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn with_path(err: super::types::RepositoryError, path: &Path) -> FsError {
    FsError::from(err).with_path(display(path))
}

#[async_trait]
impl StorageBackend for RepositoryBackend {
    fn name(&self) -> &'static str {
        "repository"
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn requires_fingerprint(&self) -> bool {
        true
    }

    async fn list(&self, dir: &Path) -> Result<Vec<DirEntry>, FsError> {
        let key = self.key_for(dir);
        debug!("列出仓库目录: key={:?}", key);

        match self.client.get_contents(&key).await.map_err(|e| with_path(e, dir))? {
            ContentsResponse::Directory(entries) => Ok(entries
                .into_iter()
                .map(|e| DirEntry {
                    is_dir: e.is_dir(),
                    name: e.name,
                })
                .collect()),
            ContentsResponse::File(_) => {
                Err(FsError::new(FsErrorCode::NotADirectory).with_path(display(dir)))
            }
        }
    }

    async fn read(&self, file: &Path) -> Result<FileContent, FsError> {
        let (entry, data) = self.fetch_file(file).await?;
        let content = String::from_utf8(data).map_err(|e| {
            FsError::new(FsErrorCode::InvalidUtf8)
                .with_path(display(file))
                .with_internal(e.to_string())
        })?;

        Ok(FileContent {
            content,
            sha: Some(entry.sha),
        })
    }

    async fn write(&self, file: &Path, data: Bytes, sha: Option<&str>) -> Result<(), FsError> {
        let key = self.key_for(file);
        self.client
            .put_contents(&key, &data, sha)
            .await
            .map_err(|e| with_path(e, file))?;
        info!("仓库文件已写入: {}", key);
        Ok(())
    }

    async fn delete(&self, target: &Path, sha: Option<&str>) -> Result<EntryKind, FsError> {
        let sha = sha.ok_or_else(|| FsError::missing_field("sha"))?;
        let key = self.key_for(target);
        self.client
            .delete_contents(&key, sha)
            .await
            .map_err(|e| with_path(e, target))?;
        info!("仓库文件已删除: {}", key);
        Ok(EntryKind::File)
    }

    async fn open_download(&self, file: &Path) -> Result<DownloadSource, FsError> {
        let (_, data) = self.fetch_file(file).await?;
        let size = data.len() as u64;
        let chunk = Bytes::from(data);
        Ok(DownloadSource {
            size: Some(size),
            stream: futures::stream::once(async move { Ok(chunk) }).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{ConfinementPolicy, DeleteQuery, FileService, SaveFileRequest};
    use axum::extract::{Path as UrlPath, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{json, Value};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    /// 内存中的内容存储，模拟仓库 API 的指纹语义
    #[derive(Default)]
    struct MockRepo {
        files: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
        version: Mutex<u64>,
    }

    impl MockRepo {
        fn next_sha(&self) -> String {
            let mut v = self.version.lock().unwrap();
            *v += 1;
            format!("sha{}", v)
        }

        fn insert(&self, key: &str, data: &[u8]) -> String {
            let sha = self.next_sha();
            self.files
                .lock()
                .unwrap()
                .insert(key.to_string(), (data.to_vec(), sha.clone()));
            sha
        }
    }

    type Mock = Arc<MockRepo>;

    fn key_of(params: &HashMap<String, String>) -> String {
        params
            .get("key")
            .map(|k| k.trim_matches('/').to_string())
            .unwrap_or_default()
    }

    fn err(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
        (status, Json(json!({ "message": message })))
    }

    async fn mock_get(
        State(repo): State<Mock>,
        UrlPath(params): UrlPath<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        let key = key_of(&params);
        let files = repo.files.lock().unwrap();

        if let Some((data, sha)) = files.get(&key) {
            let name = key.rsplit('/').next().unwrap_or(key.as_str());
            return (
                StatusCode::OK,
                Json(json!({
                    "name": name, "path": key, "sha": sha, "type": "file",
                    "size": data.len(), "encoding": "base64",
                    "content": STANDARD.encode(data),
                })),
            );
        }

        let prefix = if key.is_empty() { String::new() } else { format!("{}/", key) };
        let mut children: BTreeMap<String, Value> = BTreeMap::new();
        for (path, (data, sha)) in files.iter() {
            let Some(rest) = path.strip_prefix(&prefix) else { continue };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.entry(dir.to_string()).or_insert_with(|| {
                        json!({"name": dir, "path": format!("{}{}", prefix, dir),
                               "sha": "tree", "type": "dir", "size": 0})
                    });
                }
                None => {
                    children.insert(
                        rest.to_string(),
                        json!({"name": rest, "path": path, "sha": sha,
                               "type": "file", "size": data.len()}),
                    );
                }
            }
        }

        if children.is_empty() {
            return err(StatusCode::NOT_FOUND, "Not Found");
        }
        (StatusCode::OK, Json(Value::Array(children.into_values().collect())))
    }

    async fn mock_put(
        State(repo): State<Mock>,
        UrlPath(params): UrlPath<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let key = key_of(&params);
        let sha = body["sha"].as_str();
        let Some(data) = body["content"].as_str().and_then(|c| STANDARD.decode(c).ok()) else {
            return err(StatusCode::BAD_REQUEST, "bad content");
        };

        let existing = repo.files.lock().unwrap().get(&key).map(|(_, s)| s.clone());
        match (existing, sha) {
            (Some(_), None) => return err(StatusCode::UNPROCESSABLE_ENTITY, "\"sha\" wasn't supplied"),
            (Some(current), Some(given)) if current != given => {
                return err(StatusCode::CONFLICT, "does not match")
            }
            _ => {}
        }

        let new_sha = repo.insert(&key, &data);
        (StatusCode::OK, Json(json!({ "content": { "sha": new_sha } })))
    }

    async fn mock_delete(
        State(repo): State<Mock>,
        UrlPath(params): UrlPath<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let key = key_of(&params);
        let mut files = repo.files.lock().unwrap();
        let current = files.get(&key).map(|(_, sha)| sha.clone());
        match current {
            None => err(StatusCode::NOT_FOUND, "Not Found"),
            Some(sha) if Some(sha.as_str()) != body["sha"].as_str() => {
                err(StatusCode::CONFLICT, "does not match")
            }
            Some(_) => {
                files.remove(&key);
                (StatusCode::OK, Json(json!({ "commit": {} })))
            }
        }
    }

    async fn spawn_mock(repo: Mock) -> String {
        let app = Router::new()
            .route("/repos/:owner/:name/contents", get(mock_get))
            .route(
                "/repos/:owner/:name/contents/*key",
                get(mock_get).put(mock_put).delete(mock_delete),
            )
            .with_state(repo);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn setup(base_path: Option<&str>) -> (Mock, FileService) {
        let repo: Mock = Arc::new(MockRepo::default());
        let api_base = spawn_mock(repo.clone()).await;
        let backend = RepositoryBackend::new(RepositoryConfig {
            api_base,
            owner: "octo".to_string(),
            name: "notes".to_string(),
            token: "test-token".to_string(),
            base_path: base_path.map(str::to_string),
            ..Default::default()
        })
        .unwrap();
        let service = FileService::new(Arc::new(backend), ConfinementPolicy::FallbackToRoot);
        (repo, service)
    }

    #[test]
    fn test_key_mapping() {
        let backend = RepositoryBackend::new(RepositoryConfig {
            owner: "o".to_string(),
            name: "n".to_string(),
            token: "t".to_string(),
            base_path: Some("/site/".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(backend.key_for(Path::new("/")), "site");
        assert_eq!(backend.key_for(Path::new("/docs/a.txt")), "site/docs/a.txt");

        let plain = RepositoryBackend::new(RepositoryConfig {
            owner: "o".to_string(),
            name: "n".to_string(),
            token: "t".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(plain.key_for(Path::new("/")), "");
        assert_eq!(plain.key_for(Path::new("/a.txt")), "a.txt");
    }

    #[tokio::test]
    async fn test_list_root_and_subdir() {
        let (repo, service) = setup(None).await;
        repo.insert("readme.md", b"# hi");
        repo.insert("docs/guide.txt", b"guide");

        let listing = service.list(None).await.unwrap();
        assert_eq!(listing.relative_dir, "/");
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.entries[0].name, "docs");
        assert!(listing.entries[0].is_dir);
        assert_eq!(listing.entries[1].name, "readme.md");

        let listing = service.list(Some("/docs")).await.unwrap();
        assert_eq!(listing.relative_dir, "/docs");
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name, "guide.txt");
    }

    #[tokio::test]
    async fn test_escape_falls_back_to_root() {
        let (repo, service) = setup(None).await;
        repo.insert("a.txt", b"a");

        let listing = service.list(Some("../../etc")).await.unwrap();
        assert_eq!(listing.relative_dir, "/");
        assert_eq!(listing.entries[0].name, "a.txt");
    }

    #[tokio::test]
    async fn test_list_file_is_not_a_directory() {
        let (repo, service) = setup(None).await;
        repo.insert("a.txt", b"a");

        let err = service.list(Some("/a.txt")).await.unwrap_err();
        assert_eq!(err.code, FsErrorCode::NotADirectory);
    }

    #[tokio::test]
    async fn test_read_returns_fingerprint() {
        let (repo, service) = setup(None).await;
        let sha = repo.insert("notes.txt", "你好".as_bytes());

        let content = service.read(Some("/"), Some("notes.txt")).await.unwrap();
        assert_eq!(content.content, "你好");
        assert_eq!(content.sha, Some(sha));
    }

    #[tokio::test]
    async fn test_read_directory_is_not_a_file() {
        let (repo, service) = setup(None).await;
        repo.insert("docs/a.txt", b"a");

        let err = service.read(None, Some("docs")).await.unwrap_err();
        assert_eq!(err.code, FsErrorCode::NotAFile);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let (_repo, service) = setup(None).await;
        let err = service.read(None, Some("missing.txt")).await.unwrap_err();
        assert_eq!(err.code, FsErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_create_then_update_with_fingerprint() {
        let (repo, service) = setup(None).await;

        service
            .save(&SaveFileRequest {
                file_name: Some("new.txt".to_string()),
                content: Some("v1".to_string()),
                directory: Some("/".to_string()),
                sha: None,
            })
            .await
            .unwrap();

        let read = service.read(None, Some("new.txt")).await.unwrap();
        service
            .save(&SaveFileRequest {
                file_name: Some("new.txt".to_string()),
                content: Some("v2".to_string()),
                directory: None,
                sha: read.sha,
            })
            .await
            .unwrap();

        let files = repo.files.lock().unwrap();
        assert_eq!(files.get("new.txt").unwrap().0, b"v2");
    }

    #[tokio::test]
    async fn test_stale_fingerprint_conflict() {
        let (repo, service) = setup(None).await;
        repo.insert("shared.txt", b"original");

        let first = service.read(None, Some("shared.txt")).await.unwrap();
        // 其他客户端在此期间更新了文件
        repo.insert("shared.txt", b"external edit");

        let err = service
            .save(&SaveFileRequest {
                file_name: Some("shared.txt".to_string()),
                content: Some("mine".to_string()),
                directory: None,
                sha: first.sha,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, FsErrorCode::FingerprintConflict);
        assert_eq!(err.path.as_deref(), Some("/shared.txt"));

        let files = repo.files.lock().unwrap();
        assert_eq!(files.get("shared.txt").unwrap().0, b"external edit");
    }

    #[tokio::test]
    async fn test_overwrite_without_fingerprint_conflicts() {
        let (repo, service) = setup(None).await;
        repo.insert("a.txt", b"a");

        let err = service
            .save(&SaveFileRequest {
                file_name: Some("a.txt".to_string()),
                content: Some("b".to_string()),
                directory: None,
                sha: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, FsErrorCode::FingerprintConflict);
    }

    #[tokio::test]
    async fn test_delete_requires_fingerprint() {
        let (repo, service) = setup(None).await;
        let sha = repo.insert("old.txt", b"bye");

        let err = service
            .delete(&DeleteQuery {
                directory: None,
                file: Some("old.txt".to_string()),
                sha: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, FsErrorCode::MissingField);

        let deleted = service
            .delete(&DeleteQuery {
                directory: Some("/".to_string()),
                file: Some("old.txt".to_string()),
                sha: Some(sha),
            })
            .await
            .unwrap();
        assert_eq!(deleted.kind, EntryKind::File);
        assert_eq!(deleted.path, "/old.txt");
        assert!(repo.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_folder_unsupported() {
        let (_repo, service) = setup(None).await;
        let err = service
            .create_folder(&crate::filesystem::CreateFolderRequest {
                new_folder: Some("docs".to_string()),
                directory: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, FsErrorCode::Unsupported);
    }

    #[tokio::test]
    async fn test_base_path_prefix() {
        let (repo, service) = setup(Some("site")).await;
        repo.insert("site/index.html", b"<html></html>");
        repo.insert("other.txt", b"hidden");

        let listing = service.list(None).await.unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name, "index.html");
    }

    #[tokio::test]
    async fn test_download_single_chunk() {
        let (repo, service) = setup(None).await;
        repo.insert("bin.dat", &[0u8, 159, 146, 150]);

        let download = service.download(None, Some("bin.dat")).await.unwrap();
        assert_eq!(download.file_name, "bin.dat");
        assert_eq!(download.source.size, Some(4));

        let chunks: Vec<_> = download.source.stream.collect().await;
        let data: Vec<u8> = chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect();
        assert_eq!(data, vec![0u8, 159, 146, 150]);
    }
}
