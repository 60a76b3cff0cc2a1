// 路径安全守卫
//
// 把客户端提交的任意路径字符串解析为限定在根目录内的绝对路径，防止路径穿越攻击。
// 解析过程是纯词法的，不访问文件系统。

use std::path::{is_separator, Component, Path, PathBuf};

use super::types::{ConfinementPolicy, FsError, FsErrorCode};

/// 把用户路径按词法拼接到根目录上
///
/// 规则：
/// 1. 开头的一个分隔符被去掉（视为相对根目录，而不是绝对路径覆盖）
/// 2. 逐段拼接，`.` 和空段忽略，`..` 回退一级
/// 3. 拼接结果不在根目录之内时返回 None
pub fn resolve_path(root: &Path, user_path: &str) -> Option<PathBuf> {
    let relative = match user_path.chars().next() {
        Some(first) if is_separator(first) => &user_path[first.len_utf8()..],
        _ => user_path,
    };

    let mut joined = root.to_path_buf();
    for segment in relative.split(is_separator) {
        match segment {
            "" | "." => {}
            ".." => {
                joined.pop();
            }
            other => {
                // 单段内出现盘符等前缀时，PathBuf::push 会替换整个路径
                let mut components = Path::new(other).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(part)), None) => joined.push(part),
                    _ => return None,
                }
            }
        }
    }

    if joined.starts_with(root) {
        Some(joined)
    } else {
        None
    }
}

/// 把根目录内的绝对路径转换为以 `/` 开头、`/` 分隔的显示路径
///
/// 根目录本身显示为 `/`；不在根目录内的路径同样显示为 `/`。
pub fn relativize(root: &Path, absolute: &Path) -> String {
    let relative = match absolute.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => return "/".to_string(),
    };

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    format!("/{}", parts.join("/"))
}

/// 词法规范化根目录（去掉 `.` 与 `..`）
fn normalize_root(root: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in root.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// 路径安全守卫
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    policy: ConfinementPolicy,
}

impl PathGuard {
    /// 创建新的路径守卫
    ///
    /// `root` 必须是绝对路径，进程生命周期内不可变
    pub fn new(root: impl Into<PathBuf>, policy: ConfinementPolicy) -> Self {
        Self {
            root: normalize_root(&root.into()),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> ConfinementPolicy {
        self.policy
    }

    /// 解析用户路径
    ///
    /// 越界时按策略处理：`FallbackToRoot` 返回根目录，`Reject` 返回 `PathEscapesRoot`
    pub fn resolve(&self, user_path: &str) -> Result<PathBuf, FsError> {
        match resolve_path(&self.root, user_path) {
            Some(resolved) => Ok(resolved),
            None => match self.policy {
                ConfinementPolicy::FallbackToRoot => {
                    tracing::warn!("路径越界，回退到根目录: {:?}", user_path);
                    Ok(self.root.clone())
                }
                ConfinementPolicy::Reject => {
                    tracing::warn!("路径越界，拒绝请求: {:?}", user_path);
                    Err(FsError::new(FsErrorCode::PathEscapesRoot).with_path(user_path))
                }
            },
        }
    }

    /// 解析目录下的某个条目（文件名同样经过路径守卫）
    pub fn resolve_child(&self, directory: Option<&str>, name: &str) -> Result<PathBuf, FsError> {
        let combined = match directory {
            Some(dir) if !dir.is_empty() => format!("{}/{}", dir.trim_end_matches(is_separator), name),
            _ => name.to_string(),
        };
        self.resolve(&combined)
    }

    /// 转换为显示路径
    pub fn relativize(&self, absolute: &Path) -> String {
        relativize(&self.root, absolute)
    }

    /// 是否为根目录本身
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }
}
