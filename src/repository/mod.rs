// 远程仓库内容存储模块

mod backend;
mod client;
mod types;

pub use backend::RepositoryBackend;
pub use client::{decode_content, RepositoryClient};
pub use types::{ContentEntry, ContentsResponse, RepositoryError};
