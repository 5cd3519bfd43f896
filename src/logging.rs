//! 日志模块 - 控制台输出与按大小轮转的文件日志

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

const LOG_FILE_NAME: &str = "objectsync.log";

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否写入日志文件（控制台输出始终开启）
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 日志目录，默认 `./logs`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5 // 默认 5MB
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
            dir: None,
        }
    }
}

impl LogConfig {
    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| PathBuf::from("logs"))
    }
}

/// 初始化日志系统；`verbose` 时至少输出 debug 级别
pub fn init(config: &LogConfig, verbose: bool) {
    let level = if verbose {
        config.tracing_level().max(tracing::Level::DEBUG)
    } else {
        config.tracing_level()
    };

    // 隐藏 HTTP 与 SDK 内部的噪声日志
    let env_filter = ["hyper=warn", "aws_smithy_runtime=warn", "opendal=warn"]
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
            |filter, directive| filter.add_directive(directive),
        );

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let file_writer = if config.enabled {
        match SizeRotatingWriter::new(&config.log_dir(), config.max_size_mb) {
            Ok(writer) => Some(writer),
            Err(e) => {
                eprintln!("无法创建日志文件，仅输出到控制台: {}", e);
                None
            }
        }
    } else {
        None
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let result = match file_writer {
        Some(writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            tracing::subscriber::set_global_default(registry.with(file_layer))
        }
        None => tracing::subscriber::set_global_default(registry),
    };

    if let Err(e) = result {
        eprintln!("日志系统已初始化: {}", e);
    }
}

struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    written: u64,
    writer: BufWriter<File>,
}

impl RotatingFile {
    fn open(path: &Path, max_size: u64) -> io::Result<Self> {
        // 启动时已超过限制则先轮转
        let existing = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if existing > max_size {
            rotate_log(path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_size,
            written,
            writer: BufWriter::new(file),
        })
    }

    fn write_record(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.writer.flush()?;
        self.written += n as u64;

        if self.written > self.max_size {
            rotate_log(&self.path)?;
            *self = Self::open(&self.path, self.max_size)?;
        }
        Ok(n)
    }
}

/// 当前日志重命名为 `.log.old`，覆盖旧的备份
fn rotate_log(path: &Path) -> io::Result<()> {
    let backup_path = path.with_extension("log.old");
    if backup_path.exists() {
        fs::remove_file(&backup_path)?;
    }
    fs::rename(path, &backup_path)
}

/// 带大小限制的日志写入器
#[derive(Clone)]
pub struct SizeRotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let max_size = (max_size_mb.max(1) as u64) * 1024 * 1024;
        let file = RotatingFile::open(&log_dir.join(LOG_FILE_NAME), max_size)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingFile> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 单条日志记录的写入句柄
pub struct LogWriter {
    inner: SizeRotatingWriter,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write_record(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().writer.flush()
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.clone(),
        }
    }
}
