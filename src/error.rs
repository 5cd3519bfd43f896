//! 同步错误类型

use std::io;
use std::path::PathBuf;

/// 错误类别，供调用方按类别处理而不必匹配错误文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Enumeration,
    Transfer,
    Filesystem,
    State,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("连接对象存储失败 ({bucket}): {source}")]
    Connection {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("存储桶不存在: {0}")]
    BucketNotFound(String),

    #[error("列举 {side} 失败: {source}")]
    Enumeration {
        side: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("传输 {key} 失败: {source}")]
    Transfer {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("文件系统操作失败 {key}: {source}")]
    Filesystem {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("状态文件读写失败 {}: {source}", .path.display())]
    StateIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("状态文件格式错误 {}: {source}", .path.display())]
    StateFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} 个对象传输失败, {pending} 个未开始: {}", .errors.len(), summarize(.errors))]
    TransferBatch {
        errors: Vec<SyncError>,
        pending: usize,
    },

    #[error("配置错误: {0}")]
    Config(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Connection { .. } | SyncError::BucketNotFound(_) => ErrorKind::Connection,
            SyncError::Enumeration { .. } => ErrorKind::Enumeration,
            SyncError::Transfer { .. } | SyncError::TransferBatch { .. } => ErrorKind::Transfer,
            SyncError::Filesystem { .. } => ErrorKind::Filesystem,
            SyncError::StateIo { .. } | SyncError::StateFormat { .. } => ErrorKind::State,
            SyncError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn filesystem(key: impl Into<String>, source: io::Error) -> Self {
        SyncError::Filesystem {
            key: key.into(),
            source,
        }
    }

    pub fn transfer(key: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        SyncError::Transfer {
            key: key.into(),
            source: source.into(),
        }
    }
}

/// 汇总错误只展示前几条
fn summarize(errors: &[SyncError]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = errors.iter().take(SHOWN).map(|e| e.to_string()).collect();
    if errors.len() > SHOWN {
        parts.push(format!("... 另有 {} 个错误", errors.len() - SHOWN));
    }
    parts.join("; ")
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
