//! 目标端写入：下载写本地目录，上传写存储桶

use super::model::TransferTask;
use crate::error::{SyncError, SyncResult};
use crate::storage::{local, LocalTree, ObjectStore};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// 传输目标
#[async_trait]
pub trait SinkWriter: Send + Sync {
    /// 键对应的本地路径（下载时是写入位置，上传时是读取位置）
    fn local_path(&self, key: &str) -> SyncResult<PathBuf>;

    /// 目标端是否已存在该键
    async fn exists(&self, key: &str) -> SyncResult<bool>;

    /// 执行一次传输，返回传输的字节数
    async fn write(&self, task: &TransferTask) -> SyncResult<u64>;
}

/// 下载：对象 -> 本地文件
pub struct LocalSink {
    store: Arc<dyn ObjectStore>,
    tree: LocalTree,
}

impl LocalSink {
    pub fn new(store: Arc<dyn ObjectStore>, tree: LocalTree) -> Self {
        Self { store, tree }
    }
}

#[async_trait]
impl SinkWriter for LocalSink {
    fn local_path(&self, key: &str) -> SyncResult<PathBuf> {
        self.tree
            .resolve(key)
            .map_err(|e| SyncError::filesystem(key, e))
    }

    async fn exists(&self, key: &str) -> SyncResult<bool> {
        self.tree
            .exists(key)
            .await
            .map_err(|e| SyncError::filesystem(key, e))
    }

    async fn write(&self, task: &TransferTask) -> SyncResult<u64> {
        let key = task.entry.key.as_str();
        let modified = task.entry.fingerprint.modified_at;

        if task.entry.is_container_marker {
            let path = self
                .tree
                .create_dir(key)
                .await
                .map_err(|e| SyncError::filesystem(key, e))?;
            if let Err(e) = local::set_modified(&path, modified) {
                warn!("设置目录修改时间失败 {}: {}", path.display(), e);
            }
            return Ok(0);
        }

        // 先拿到对象流，再写临时文件，成功后替换目标
        let mut reader = self
            .store
            .get_object(key)
            .await
            .map_err(|e| SyncError::transfer(key, e))?;

        let mut partial = self
            .tree
            .create_partial(key)
            .await
            .map_err(|e| SyncError::filesystem(key, e))?;

        let copied = tokio::io::copy(&mut reader, &mut partial.file).await;
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                partial.discard().await;
                return Err(SyncError::transfer(key, e));
            }
        };
        let temp_path = partial.temp_path.clone();
        let path = match partial.commit().await {
            Ok(path) => path,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(SyncError::filesystem(key, e));
            }
        };

        if let Err(e) = local::set_modified(&path, modified) {
            warn!("设置文件修改时间失败 {}: {}", path.display(), e);
        }

        debug!("下载完成: {} ({} 字节)", key, bytes);
        Ok(bytes)
    }
}

/// 上传：本地文件 -> 对象
pub struct RemoteSink {
    store: Arc<dyn ObjectStore>,
    tree: LocalTree,
}

impl RemoteSink {
    pub fn new(store: Arc<dyn ObjectStore>, tree: LocalTree) -> Self {
        Self { store, tree }
    }
}

#[async_trait]
impl SinkWriter for RemoteSink {
    fn local_path(&self, key: &str) -> SyncResult<PathBuf> {
        self.tree
            .resolve(key)
            .map_err(|e| SyncError::filesystem(key, e))
    }

    async fn exists(&self, key: &str) -> SyncResult<bool> {
        self.store
            .stat(key)
            .await
            .map(|meta| meta.is_some())
            .map_err(|e| SyncError::transfer(key, e))
    }

    async fn write(&self, task: &TransferTask) -> SyncResult<u64> {
        let key = task.entry.key.as_str();

        // 空目录上传为零字节的标记对象
        if task.entry.is_container_marker {
            self.store
                .put_object(key, Box::pin(tokio::io::empty()), 0)
                .await
                .map_err(|e| SyncError::transfer(key, e))?;
            return Ok(0);
        }

        let file = self
            .tree
            .open(key)
            .await
            .map_err(|e| SyncError::filesystem(key, e))?;
        let size = task.entry.size();

        self.store
            .put_object(key, Box::pin(file), size)
            .await
            .map_err(|e| SyncError::transfer(key, e))?;

        debug!("上传完成: {} ({} 字节)", key, size);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{CatalogEntry, ObjectFingerprint};
    use crate::storage::memory::{ts, MemoryStore};
    use tempfile::TempDir;

    fn task(sink: &dyn SinkWriter, key: &str, size: u64, secs: i64) -> TransferTask {
        let entry = CatalogEntry::new(
            key,
            ObjectFingerprint {
                content_tag: "t".into(),
                modified_at: ts(secs),
                size_bytes: size,
            },
        );
        TransferTask {
            local_path: sink.local_path(key).unwrap(),
            entry,
        }
    }

    #[tokio::test]
    async fn test_download_streams_and_sets_mtime() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new("bucket"));
        store.insert("dir/a.txt", b"hello", "t", ts(1_700_000_000));

        let sink = LocalSink::new(store, LocalTree::new(dir.path()));
        let bytes = sink
            .write(&task(&sink, "dir/a.txt", 5, 1_700_000_000))
            .await
            .unwrap();

        assert_eq!(bytes, 5);
        let path = dir.path().join("dir/a.txt");
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        let mtime = filetime::FileTime::from_last_modification_time(&std::fs::metadata(&path).unwrap());
        assert_eq!(mtime.unix_seconds(), 1_700_000_000);
        assert!(sink.exists("dir/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new("bucket"));
        store.insert("a.txt", b"0123456789", "t", ts(1));
        store.insert("b.txt", b"xyz", "t", ts(1));
        store.break_stream("a.txt");
        store.fail_on("b.txt");
        std::fs::write(dir.path().join("b.txt"), b"old").unwrap();

        let sink = LocalSink::new(store, LocalTree::new(dir.path()));
        let err = sink.write(&task(&sink, "a.txt", 10, 1)).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transfer);
        assert!(!sink.exists("a.txt").await.unwrap());
        assert!(!dir.path().join("a.txt.part").exists());

        // 读取失败时原有文件不被截断
        assert!(sink.write(&task(&sink, "b.txt", 3, 1)).await.is_err());
        assert_eq!(std::fs::read(dir.path().join("b.txt")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_download_marker_creates_directory() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new("bucket"));
        let sink = LocalSink::new(store.clone(), LocalTree::new(dir.path()));

        assert!(!sink.exists("photos/").await.unwrap());
        let bytes = sink.write(&task(&sink, "photos/", 0, 1_600_000_000)).await.unwrap();
        assert_eq!(bytes, 0);
        assert!(dir.path().join("photos").is_dir());
        assert!(store.gets().is_empty());
    }

    #[tokio::test]
    async fn test_download_rejects_escaping_key() {
        let dir = TempDir::new().unwrap();
        let sink = LocalSink::new(Arc::new(MemoryStore::new("b")), LocalTree::new(dir.path()));
        assert!(sink.local_path("../outside").is_err());
        assert!(sink.exists("../outside").await.is_err());
    }

    #[tokio::test]
    async fn test_upload_file_and_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"payload").unwrap();

        let store = Arc::new(MemoryStore::new("bucket"));
        let sink = RemoteSink::new(store.clone(), LocalTree::new(dir.path()));

        assert!(!sink.exists("a.txt").await.unwrap());
        assert_eq!(sink.write(&task(&sink, "a.txt", 7, 0)).await.unwrap(), 7);
        assert_eq!(sink.write(&task(&sink, "empty/", 0, 0)).await.unwrap(), 0);

        assert_eq!(store.data("a.txt").unwrap(), b"payload");
        assert_eq!(store.data("empty/").unwrap(), b"");
        assert!(sink.exists("empty/").await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let sink = RemoteSink::new(Arc::new(MemoryStore::new("b")), LocalTree::new(dir.path()));
        let err = sink.write(&task(&sink, "gone.txt", 1, 0)).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Filesystem);
    }
}
