//! 应用配置模块
//!
//! 配置文件只在启动时加载一次，得到的 [`AppConfig`] 显式传递给编排器，
//! 默认值通过 serde 的 `default` 属性在反序列化时填充。

use crate::core::{Direction, JobSpec};
use crate::error::SyncError;
use crate::logging::LogConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置模板中的占位值，未修改时视为未配置
const PLACEHOLDER_ENDPOINT: &str = "http://192.168.1.100:7480";
const PLACEHOLDER_ACCESS_KEY: &str = "your-access-key";
const PLACEHOLDER_SECRET_KEY: &str = "your-secret-key";
const PLACEHOLDER_BUCKET: &str = "your-bucket-name";

const TEMPLATE: &str = r#"{
  "store": {
    "endpoint": "http://192.168.1.100:7480",
    "access_key": "your-access-key",
    "secret_key": "your-secret-key",
    "region": "us-east-1"
  },
  "buckets": [
    { "name": "documents", "local_dir": "./backup/documents", "state_file": ".state_documents.json" },
    { "name": "photos", "local_dir": "./backup/photos", "workers": 8 }
  ],
  "defaults": {
    "incremental": true,
    "workers": 5,
    "verbose": false
  },
  "log": {
    "enabled": true,
    "level": "info",
    "max_size_mb": 5
  }
}
"#;

/// 对象存储连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Ceph 等兼容存储通常使用 us-east-1
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// 单个存储桶的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    pub name: String,
    pub local_dir: PathBuf,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub verbose: Option<bool>,
}

/// 全局默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDefaults {
    #[serde(default = "default_incremental")]
    pub incremental: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub verbose: bool,
    /// 单桶模式下的本地目录
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
    /// 单桶模式下的状态文件
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_incremental() -> bool {
    true
}

fn default_workers() -> usize {
    5
}

fn default_local_dir() -> PathBuf {
    PathBuf::from("./backup")
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".backup_state.json")
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            incremental: default_incremental(),
            workers: default_workers(),
            verbose: false,
            local_dir: default_local_dir(),
            state_file: default_state_file(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreSettings,
    /// 单桶模式（`buckets` 为空时使用）
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub buckets: Vec<BucketConfig>,
    #[serde(default)]
    pub defaults: SyncDefaults,
    #[serde(default)]
    pub log: LogConfig,
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub incremental: Option<bool>,
    pub workers: Option<usize>,
    pub verbose: bool,
}

impl AppConfig {
    /// 从配置文件加载；文件不存在时写出模板并返回错误
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::write_template(path)?;
            anyhow::bail!(
                "配置文件 {} 不存在，已创建模板，请填写连接信息后重新运行",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, TEMPLATE)
            .with_context(|| format!("创建默认配置文件失败: {}", path.display()))
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(endpoint) = &overrides.endpoint {
            self.store.endpoint = endpoint.clone();
        }
        if let Some(access_key) = &overrides.access_key {
            self.store.access_key = access_key.clone();
        }
        if let Some(secret_key) = &overrides.secret_key {
            self.store.secret_key = secret_key.clone();
        }
        if let Some(incremental) = overrides.incremental {
            self.defaults.incremental = incremental;
        }
        if let Some(workers) = overrides.workers {
            self.defaults.workers = workers;
            for bucket in &mut self.buckets {
                bucket.workers = Some(workers);
            }
        }
        if overrides.verbose {
            self.defaults.verbose = true;
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let missing = |value: &str, placeholder: &str| value.is_empty() || value == placeholder;

        if missing(&self.store.endpoint, PLACEHOLDER_ENDPOINT) {
            return Err(SyncError::Config("请设置正确的 store.endpoint".into()));
        }
        if missing(&self.store.access_key, PLACEHOLDER_ACCESS_KEY) {
            return Err(SyncError::Config("请设置正确的 store.access_key".into()));
        }
        if missing(&self.store.secret_key, PLACEHOLDER_SECRET_KEY) {
            return Err(SyncError::Config("请设置正确的 store.secret_key".into()));
        }

        let single = self
            .bucket
            .as_deref()
            .is_some_and(|b| !missing(b, PLACEHOLDER_BUCKET));
        if self.buckets.is_empty() && !single {
            return Err(SyncError::Config(
                "请配置要同步的桶：使用 bucket（单桶）或 buckets（多桶）".into(),
            ));
        }

        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.name.is_empty() {
                return Err(SyncError::Config(format!("buckets[{}] 缺少桶名称", i)));
            }
            if bucket.local_dir.as_os_str().is_empty() {
                return Err(SyncError::Config(format!("buckets[{}] 缺少本地目录", i)));
            }
            if bucket.workers == Some(0) {
                return Err(SyncError::Config(format!("buckets[{}] 并发数必须大于 0", i)));
            }
        }
        if self.defaults.workers == 0 {
            return Err(SyncError::Config("defaults.workers 必须大于 0".into()));
        }

        Ok(())
    }

    /// 按配置生成每个桶的任务，顺序与配置文件一致
    pub fn job_specs(&self, direction: Direction) -> Vec<JobSpec> {
        if self.buckets.is_empty() {
            return self
                .bucket
                .iter()
                .map(|name| JobSpec {
                    remote_name: name.clone(),
                    local_dir: self.defaults.local_dir.clone(),
                    state_path: match direction {
                        Direction::Download => self.defaults.state_file.clone(),
                        Direction::Upload => default_state_path(name, direction),
                    },
                    worker_count: self.defaults.workers,
                    incremental: self.defaults.incremental,
                    verbose: self.defaults.verbose,
                    direction,
                })
                .collect();
        }

        self.buckets
            .iter()
            .map(|bucket| JobSpec {
                remote_name: bucket.name.clone(),
                local_dir: bucket.local_dir.clone(),
                state_path: match (&bucket.state_file, direction) {
                    (Some(path), Direction::Download) => path.clone(),
                    _ => default_state_path(&bucket.name, direction),
                },
                worker_count: bucket.workers.unwrap_or(self.defaults.workers),
                incremental: self.defaults.incremental,
                verbose: bucket.verbose.unwrap_or(false) || self.defaults.verbose,
                direction,
            })
            .collect()
    }
}

/// 按桶名推导状态文件路径，上传与下载使用不同的文件
pub fn default_state_path(name: &str, direction: Direction) -> PathBuf {
    match direction {
        Direction::Download => PathBuf::from(format!(".backup_state_{}.json", name)),
        Direction::Upload => PathBuf::from(format!(".upload_{}_state.json", name)),
    }
}
