//! 同步状态持久化 - 用于增量同步
//!
//! 每个任务一个 JSON 状态文件，记录上次运行时源端每个键的指纹。

use super::model::{CatalogEntry, ObjectFingerprint};
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 持久化的同步状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(rename = "last_backup", alias = "last_upload")]
    pub last_run_at: DateTime<Utc>,
    #[serde(rename = "files", default)]
    pub entries: BTreeMap<String, ObjectFingerprint>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_run_at: DateTime::<Utc>::UNIX_EPOCH,
            entries: BTreeMap::new(),
        }
    }
}

impl SyncState {
    /// 以本次列举结果重建状态（包括被跳过的条目）
    pub fn from_catalog(catalog: &[CatalogEntry]) -> Self {
        let entries = catalog
            .iter()
            .filter(|entry| !entry.key.is_empty())
            .map(|entry| (entry.key.clone(), entry.fingerprint.clone()))
            .collect();
        Self {
            last_run_at: Utc::now(),
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ObjectFingerprint> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|f| f.size_bytes).sum()
    }
}

/// 状态文件的读写；非增量模式下既不读也不写
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    enabled: bool,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载状态，文件不存在时返回空状态
    pub async fn load(&self) -> SyncResult<SyncState> {
        if !self.enabled {
            return Ok(SyncState::default());
        }
        read_state(&self.path).await.map(Option::unwrap_or_default)
    }

    /// 保存状态：先写临时文件再重命名，避免写到一半留下损坏的状态
    pub async fn save(&self, state: &SyncState) -> SyncResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let state_err = |source: io::Error| SyncError::StateIo {
            path: self.path.clone(),
            source,
        };

        let content = serde_json::to_vec_pretty(state).map_err(|source| SyncError::StateFormat {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(state_err)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await.map_err(state_err)?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(state_err)?;

        debug!("已保存 {} 个条目到状态文件 {}", state.len(), self.path.display());
        Ok(())
    }
}

/// 读取状态文件，不存在时返回 None
pub async fn read_state(path: &Path) -> SyncResult<Option<SyncState>> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SyncError::StateIo {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| SyncError::StateFormat {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::memory::ts;
    use tempfile::TempDir;

    fn fp(tag: &str, secs: i64, size: u64) -> ObjectFingerprint {
        ObjectFingerprint {
            content_tag: tag.into(),
            modified_at: ts(secs),
            size_bytes: size,
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("none.json"), true);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested/state.json"), true);

        let catalog = vec![
            CatalogEntry::new("documents/report.pdf", fp("a1b2c3", 1_718_870_400, 20480)),
            CatalogEntry::new("photos/", fp("", 1_717_200_000, 0)),
            CatalogEntry::new("", fp("x", 0, 1)),
        ];
        let state = SyncState::from_catalog(&catalog);
        assert_eq!(state.len(), 2);

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.total_size(), 20480);
        assert!(!dir.path().join("nested/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_reads_documented_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{
              "last_backup": "2024-06-26T10:00:00Z",
              "files": {
                "documents/report.pdf": { "etag": "a1b2c3", "last_modified": "2024-06-20T08:00:00Z", "size": 20480 },
                "photos/": { "etag": "", "last_modified": "2024-06-01T00:00:00Z", "size": 0 }
              }
            }"#,
        )
        .unwrap();

        let state = StateStore::new(&path, true).load().await.unwrap();
        assert_eq!(state.len(), 2);
        let report = state.get("documents/report.pdf").unwrap();
        assert_eq!(report.content_tag, "a1b2c3");
        assert_eq!(report.size_bytes, 20480);
        assert_eq!(report.modified_at.to_rfc3339(), "2024-06-20T08:00:00+00:00");
        assert_eq!(state.get("photos/").unwrap().size_bytes, 0);
    }

    #[tokio::test]
    async fn test_reads_upload_state_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".upload_state_up.json");
        std::fs::write(
            &path,
            r#"{
              "last_upload": "2024-07-01T12:30:00Z",
              "files": {
                "b.txt": { "etag": "", "last_modified": "2024-06-30T09:00:00Z", "size": 4 }
              }
            }"#,
        )
        .unwrap();

        let state = StateStore::new(&path, true).load().await.unwrap();
        assert_eq!(state.last_run_at.to_rfc3339(), "2024-07-01T12:30:00+00:00");
        assert_eq!(state.get("b.txt").unwrap().size_bytes, 4);
    }

    #[tokio::test]
    async fn test_disabled_store_skips_io() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = StateStore::new(&path, false);
        assert!(store.load().await.unwrap().is_empty());
        store.save(&SyncState::default()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_state_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let err = StateStore::new(&path, true).load().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }
}
