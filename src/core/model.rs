//! 同步过程中流转的数据类型

use crate::storage::{LocalEntry, RemoteObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 对象的内容标识：存储返回的元数据三元组，不是内容哈希
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFingerprint {
    #[serde(rename = "etag")]
    pub content_tag: String,
    #[serde(rename = "last_modified")]
    pub modified_at: DateTime<Utc>,
    #[serde(rename = "size")]
    pub size_bytes: u64,
}

/// 源端列举出的一个条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: String,
    pub fingerprint: ObjectFingerprint,
    /// 以 `/` 结尾且大小为 0 的目录占位
    pub is_container_marker: bool,
}

impl CatalogEntry {
    pub fn new(key: impl Into<String>, fingerprint: ObjectFingerprint) -> Self {
        let key = key.into();
        let is_container_marker = is_container_key(&key, fingerprint.size_bytes);
        Self {
            key,
            fingerprint,
            is_container_marker,
        }
    }

    pub fn size(&self) -> u64 {
        self.fingerprint.size_bytes
    }
}

impl From<RemoteObject> for CatalogEntry {
    fn from(object: RemoteObject) -> Self {
        CatalogEntry::new(
            object.key,
            ObjectFingerprint {
                content_tag: object.etag,
                modified_at: object.last_modified,
                size_bytes: object.size,
            },
        )
    }
}

impl From<LocalEntry> for CatalogEntry {
    fn from(entry: LocalEntry) -> Self {
        // 本地文件没有 ETag，只比较修改时间和大小
        CatalogEntry::new(
            entry.key,
            ObjectFingerprint {
                content_tag: String::new(),
                modified_at: entry.modified,
                size_bytes: entry.size,
            },
        )
    }
}

pub fn is_container_key(key: &str, size: u64) -> bool {
    key.ends_with('/') && size == 0
}

/// 一次待执行的传输
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub entry: CatalogEntry,
    pub local_path: PathBuf,
}

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 存储桶 -> 本地目录
    Download,
    /// 本地目录 -> 存储桶
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => write!(f, "备份"),
            Direction::Upload => write!(f, "上传"),
        }
    }
}

/// 单个桶的同步任务定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub remote_name: String,
    pub local_dir: PathBuf,
    pub state_path: PathBuf,
    pub worker_count: usize,
    pub incremental: bool,
    pub verbose: bool,
    pub direction: Direction,
}
