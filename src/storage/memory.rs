//! 内存对象存储，仅用于测试

use super::{ObjectPage, ObjectReader, ObjectStore, RemoteObject, StoreConnector};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    bucket_exists: bool,
    failing_keys: HashSet<String>,
    broken_keys: HashSet<String>,
    fail_listing: bool,
    gets: Vec<String>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    page_size: usize,
    name: String,
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Mutex::new(Inner {
                bucket_exists: true,
                ..Default::default()
            }),
            page_size: 2,
            name: format!("mem://{}", name),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn without_bucket(self) -> Self {
        self.inner.lock().unwrap().bucket_exists = false;
        self
    }

    pub fn insert(&self, key: &str, data: &[u8], etag: &str, modified: DateTime<Utc>) {
        self.inner.lock().unwrap().objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                etag: etag.to_string(),
                last_modified: modified,
            },
        );
    }

    pub fn fail_on(&self, key: &str) {
        self.inner.lock().unwrap().failing_keys.insert(key.to_string());
    }

    /// 读取该键时只返回前一半数据，随后报错
    pub fn break_stream(&self, key: &str) {
        self.inner.lock().unwrap().broken_keys.insert(key.to_string());
    }

    /// 取消对该键注入的故障
    pub fn recover(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_keys.remove(key);
        inner.broken_keys.remove(key);
    }

    pub fn fail_listing(&self) {
        self.inner.lock().unwrap().fail_listing = true;
    }

    pub fn data(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().objects.get(key).map(|o| o.data.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn has_bucket(&self) -> bool {
        self.inner.lock().unwrap().bucket_exists
    }

    /// 被读取过的对象键（按调用顺序）
    pub fn gets(&self) -> Vec<String> {
        self.inner.lock().unwrap().gets.clone()
    }

    fn to_remote(key: &str, object: &StoredObject) -> RemoteObject {
        RemoteObject {
            key: key.to_string(),
            etag: object.etag.clone(),
            last_modified: object.last_modified,
            size: object.data.len() as u64,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, cursor: Option<&str>) -> Result<ObjectPage> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_listing {
            anyhow::bail!("列举被拒绝");
        }
        let mut objects: Vec<RemoteObject> = inner
            .objects
            .iter()
            .filter(|(key, _)| cursor.map_or(true, |c| key.as_str() > c))
            .map(|(key, object)| Self::to_remote(key, object))
            .collect();
        let is_truncated = objects.len() > self.page_size;
        objects.truncate(self.page_size);
        let next_cursor = if is_truncated {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ObjectPage {
            objects,
            is_truncated,
            next_cursor,
        })
    }

    async fn stat(&self, key: &str) -> Result<Option<RemoteObject>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.objects.get(key).map(|o| Self::to_remote(key, o)))
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        let mut inner = self.inner.lock().unwrap();
        inner.gets.push(key.to_string());
        if inner.failing_keys.contains(key) {
            anyhow::bail!("读取被拒绝: {}", key);
        }
        let object = inner
            .objects
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("对象不存在: {}", key))?;
        if inner.broken_keys.contains(key) {
            let half = object.data[..object.data.len() / 2].to_vec();
            return Ok(Box::pin(std::io::Cursor::new(half).chain(BrokenStream)));
        }
        Ok(Box::pin(std::io::Cursor::new(object.data.clone())))
    }

    async fn put_object(&self, key: &str, mut body: ObjectReader, _size: u64) -> Result<()> {
        if self.inner.lock().unwrap().failing_keys.contains(key) {
            anyhow::bail!("写入被拒绝: {}", key);
        }
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        let etag = format!("etag-{}", data.len());
        self.insert(key, &data, &etag, Utc::now());
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        Ok(self.inner.lock().unwrap().bucket_exists)
    }

    async fn create_bucket(&self) -> Result<()> {
        self.inner.lock().unwrap().bucket_exists = true;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 读到这里就连接中断
struct BrokenStream;

impl AsyncRead for BrokenStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "连接中断")))
    }
}

/// 按桶名返回预先注册的内存存储，未注册的桶连接失败
#[derive(Default)]
pub struct MemoryConnector {
    stores: BTreeMap<String, Arc<MemoryStore>>,
}

impl MemoryConnector {
    pub fn with(mut self, bucket: &str, store: Arc<MemoryStore>) -> Self {
        self.stores.insert(bucket.to_string(), store);
        self
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let store = self
            .stores
            .get(bucket)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("认证失败: {}", bucket))?;
        Ok(store as Arc<dyn ObjectStore>)
    }
}
