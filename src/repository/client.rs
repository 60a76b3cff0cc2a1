// 远程仓库内容存储客户端

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use super::types::{
    ApiErrorBody, ContentsResponse, DeleteContentRequest, PutContentRequest, RepositoryError,
};
use crate::config::RepositoryConfig;

/// 客户端标识
const CLIENT_USER_AGENT: &str = concat!("file-manager-rust/", env!("CARGO_PKG_VERSION"));

/// 远程仓库客户端
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    /// HTTP客户端
    client: Client,
    /// 仓库配置
    config: RepositoryConfig,
}

impl RepositoryClient {
    /// 创建新的仓库客户端
    pub fn new(config: RepositoryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .context("访问令牌包含非法字符")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "初始化仓库客户端成功: {}/{}, 分支={}",
            config.owner,
            config.name,
            config.branch.as_deref().unwrap_or("(默认)")
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// 构造内容接口 URL，路径逐段编码
    pub fn contents_url(&self, key: &str) -> String {
        let base = format!(
            "{}/repos/{}/{}/contents",
            self.config.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.config.owner),
            urlencoding::encode(&self.config.name),
        );
        let encoded: Vec<String> = key
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        if encoded.is_empty() {
            base
        } else {
            format!("{}/{}", base, encoded.join("/"))
        }
    }

    fn commit_message(&self, action: &str, key: &str) -> String {
        format!("{} {} {}", self.config.commit_message_prefix, action, key)
    }

    /// 查询目录或文件
    pub async fn get_contents(&self, key: &str) -> Result<ContentsResponse, RepositoryError> {
        debug!("获取仓库内容: key={}", key);

        let mut request = self.client.get(self.contents_url(key));
        if let Some(branch) = self.config.branch.as_deref() {
            request = request.query(&[("ref", branch)]);
        }

        let response = Self::check_status(request.send().await?).await?;
        response
            .json::<ContentsResponse>()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    /// 创建或更新文件（更新时必须提供指纹）
    pub async fn put_contents(
        &self,
        key: &str,
        data: &[u8],
        sha: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let action = if sha.is_some() { "update" } else { "create" };
        info!("写入仓库文件: key={}, action={}", key, action);

        let body = PutContentRequest {
            message: self.commit_message(action, key),
            content: STANDARD.encode(data),
            sha,
            branch: self.config.branch.as_deref(),
        };

        let response = self
            .client
            .put(self.contents_url(key))
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// 删除文件
    pub async fn delete_contents(&self, key: &str, sha: &str) -> Result<(), RepositoryError> {
        info!("删除仓库文件: key={}", key);

        let body = DeleteContentRequest {
            message: self.commit_message("delete", key),
            sha,
            branch: self.config.branch.as_deref(),
        };

        let response = self
            .client
            .delete(self.contents_url(key))
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// 非 2xx 响应转换为错误
    async fn check_status(response: Response) -> Result<Response, RepositoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        warn!("仓库 API 返回错误: status={}, message={}", status, message);
        Err(RepositoryError::from_status(status.as_u16(), message))
    }
}

/// 解码 base64 内容（API 返回的内容每 60 字符带换行）
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, RepositoryError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RepositoryClient {
        RepositoryClient::new(RepositoryConfig {
            api_base: "https://api.example.com/".to_string(),
            owner: "octo".to_string(),
            name: "notes".to_string(),
            token: "secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_contents_url() {
        let c = client();
        assert_eq!(
            c.contents_url(""),
            "https://api.example.com/repos/octo/notes/contents"
        );
        assert_eq!(
            c.contents_url("docs/my file.txt"),
            "https://api.example.com/repos/octo/notes/contents/docs/my%20file.txt"
        );
        assert_eq!(
            c.contents_url("/a//b/"),
            "https://api.example.com/repos/octo/notes/contents/a/b"
        );
    }

    #[test]
    fn test_commit_message() {
        let c = client();
        assert_eq!(
            c.commit_message("update", "a.txt"),
            "file-manager: update a.txt"
        );
    }

    #[test]
    fn test_decode_content_with_newlines() {
        assert_eq!(decode_content("aGVs\nbG8=\n").unwrap(), b"hello");
        assert!(decode_content("!!!").is_err());
    }
}
