// 根目录验证模块

use std::fs;
use std::path::Path;

/// 路径验证结果
#[derive(Debug, Clone)]
pub struct PathValidationResult {
    /// 路径是否存在
    pub exists: bool,
    /// 路径是否可写
    pub is_writable: bool,
    /// 是否是目录
    pub is_directory: bool,
    /// 验证消息
    pub message: String,
}

/// 根目录验证器
pub struct RootValidator;

impl RootValidator {
    /// 验证根目录是否可用
    ///
    /// 执行以下检查：
    /// 1. 路径是否存在
    /// 2. 路径是否为目录
    /// 3. 路径是否可写（只读部署仍可启动）
    pub fn validate(path: &Path) -> PathValidationResult {
        let mut result = PathValidationResult {
            exists: path.exists(),
            is_writable: false,
            is_directory: path.is_dir(),
            message: "路径验证通过".to_string(),
        };

        if !result.exists {
            result.message = "路径不存在".to_string();
        } else if !result.is_directory {
            result.message = "路径不是目录".to_string();
        } else {
            result.is_writable = Self::check_writable(path);
            if !result.is_writable {
                result.message = "路径不可写".to_string();
            }
        }
        result
    }

    /// 通过创建临时文件的方式检测写入权限
    fn check_writable(path: &Path) -> bool {
        let test_file = path.join(format!(".write_test_{}", std::process::id()));

        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = RootValidator::validate(temp_dir.path());

        assert!(result.exists);
        assert!(result.is_directory);
        assert!(result.is_writable);
        assert_eq!(result.message, "路径验证通过");
        // 探测文件不应残留
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_validate_non_existing_path() {
        let temp_dir = TempDir::new().unwrap();
        let result = RootValidator::validate(&temp_dir.path().join("missing"));

        assert!(!result.exists);
        assert!(!result.is_directory);
        assert_eq!(result.message, "路径不存在");
    }

    #[test]
    fn test_validate_file_instead_of_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_file.txt");
        fs::write(&file_path, "test").unwrap();

        let result = RootValidator::validate(&file_path);

        assert!(result.exists);
        assert!(!result.is_directory);
        assert!(!result.is_writable);
        assert_eq!(result.message, "路径不是目录");
    }
}
