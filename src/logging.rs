//! 日志系统
//!
//! 控制台 + 可选的文件输出。日志文件按启动时间命名、按大小滚动：
//! `file-manager.YYYY-MM-DD-HHMMSS.log`、`file-manager.YYYY-MM-DD-HHMMSS_N.log`，
//! 启动时清理超过保留天数的旧文件。

use crate::config::LogConfig;
use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "file-manager.";
const LOG_FILE_SUFFIX: &str = ".log";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 按大小滚动的日志文件
struct RotatingFile {
    log_dir: PathBuf,
    /// 启动时间戳（YYYY-MM-DD-HHMMSS）
    started_at: String,
    /// 滚动序号，0 为首个文件
    index: u32,
    max_size: u64,
    written: u64,
    file: File,
}

impl RotatingFile {
    fn open(log_dir: PathBuf, max_size: u64) -> io::Result<Self> {
        let started_at = Local::now().format("%Y-%m-%d-%H%M%S").to_string();
        let file = Self::open_file(&log_dir, &started_at, 0)?;
        Ok(Self {
            log_dir,
            started_at,
            index: 0,
            max_size,
            written: 0,
            file,
        })
    }

    fn file_path(log_dir: &Path, started_at: &str, index: u32) -> PathBuf {
        let name = if index == 0 {
            format!("{}{}{}", LOG_FILE_PREFIX, started_at, LOG_FILE_SUFFIX)
        } else {
            format!("{}{}_{}{}", LOG_FILE_PREFIX, started_at, index, LOG_FILE_SUFFIX)
        };
        log_dir.join(name)
    }

    fn open_file(log_dir: &Path, started_at: &str, index: u32) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::file_path(log_dir, started_at, index))
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 空文件不滚动，避免单条超大日志导致无限滚动
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.file.flush()?;
            self.index += 1;
            self.file = Self::open_file(&self.log_dir, &self.started_at, self.index)?;
            self.written = 0;
        }

        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

/// 日志文件写入器，可在线程间共享
#[derive(Clone)]
pub struct LogFileWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl LogFileWriter {
    pub fn new(log_dir: PathBuf, max_file_size: u64) -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RotatingFile::open(log_dir, max_file_size)?)),
        })
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, RotatingFile>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "日志文件锁已损坏"))
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write_chunk(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.file.flush()
    }
}

/// 日志守卫，drop 时刷新文件写入线程
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于配置中的级别；文件输出初始化失败时退回仅控制台输出。
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_ansi(true);

    let (file_layer, file_guard) = if config.enabled {
        match open_log_writer(config) {
            Ok(writer) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(writer);
                let layer = fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                    .with_ansi(false)
                    .with_writer(non_blocking);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("日志文件初始化失败，仅输出到控制台: {:?}, 错误: {}", config.log_dir, e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let file_enabled = file_layer.is_some();
    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("日志系统已初始化，跳过: {}", e);
    }

    if file_enabled {
        info!(
            "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}, 单文件最大={:.1}MB",
            config.log_dir,
            config.retention_days,
            config.level,
            config.max_file_size as f64 / 1024.0 / 1024.0
        );
        let removed = cleanup_old_logs(&config.log_dir, config.retention_days);
        if removed > 0 {
            info!("已清理 {} 个过期日志文件", removed);
        }
    } else {
        info!("日志系统初始化完成（仅控制台输出）");
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

fn open_log_writer(config: &LogConfig) -> io::Result<LogFileWriter> {
    fs::create_dir_all(&config.log_dir)?;
    LogFileWriter::new(config.log_dir.clone(), config.max_file_size)
}

/// 删除过期日志文件，返回删除数量
fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> usize {
    let today = Local::now().date_naive();
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("读取日志目录失败: {:?}, 错误: {}", log_dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !name.starts_with(LOG_FILE_PREFIX) || !name.ends_with(LOG_FILE_SUFFIX) {
            continue;
        }

        // 文件名里没有日期时按修改时间判断
        let file_date = log_file_date(name).or_else(|| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(modified_date)
        });
        let Some(file_date) = file_date else { continue };

        if (today - file_date).num_days() > retention_days as i64 {
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!("已删除过期日志文件: {:?}", path);
                }
                Err(e) => tracing::warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e),
            }
        }
    }
    removed
}

/// 从日志文件名解析日期
///
/// `file-manager.2024-05-01-093000_2.log` -> 2024-05-01
fn log_file_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_SUFFIX)?;
    let date = stem.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn modified_date(modified: SystemTime) -> NaiveDate {
    chrono::DateTime::<Local>::from(modified).date_naive()
}
