pub mod local;
#[cfg(test)]
pub mod memory;
pub mod s3;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;

pub use local::{LocalEntry, LocalTree};
pub use s3::{S3Connector, S3Storage};

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;
/// 每页列举的最大对象数（与 S3 ListObjectsV2 默认一致）
pub const LIST_PAGE_SIZE: usize = 1000;

/// 对象存储中的一个对象（来自列举结果）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// 去掉引号后的 ETag，可能为空
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// 一页列举结果
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    pub is_truncated: bool,
    /// 下一页的起始游标，仅在 `is_truncated` 时有意义
    pub next_cursor: Option<String>,
}

/// 对象内容的字节流
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// 对象存储抽象接口（单个存储桶）
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 分页列举对象，`cursor` 为上一页返回的游标
    async fn list_page(&self, cursor: Option<&str>) -> Result<ObjectPage>;

    /// 获取对象元数据，不存在时返回 None
    async fn stat(&self, key: &str) -> Result<Option<RemoteObject>>;

    /// 以流的方式读取对象
    async fn get_object(&self, key: &str) -> Result<ObjectReader>;

    /// 以流的方式写入对象
    async fn put_object(&self, key: &str, body: ObjectReader, size: u64) -> Result<()>;

    /// 检查存储桶是否存在
    async fn bucket_exists(&self) -> Result<bool>;

    /// 创建存储桶
    async fn create_bucket(&self) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 按存储桶名称建立对象存储连接
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;
}

/// 去掉 ETag 两侧的引号
pub fn normalize_etag(etag: Option<&str>) -> String {
    etag.map(|s| s.trim_matches('"').to_string())
        .unwrap_or_default()
}
