//! 源端列举：远端分页列举或本地目录遍历

use super::model::CatalogEntry;
use crate::error::{SyncError, SyncResult};
use crate::storage::{LocalTree, ObjectStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// 源端对象列举
#[async_trait]
pub trait SourceEnumerator: Send + Sync {
    /// 列出全部条目；任何一页失败都使整个列举失败
    async fn list(&self) -> SyncResult<Vec<CatalogEntry>>;
}

/// 下载方向：分页列举存储桶
pub struct RemoteEnumerator {
    store: Arc<dyn ObjectStore>,
}

impl RemoteEnumerator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SourceEnumerator for RemoteEnumerator {
    async fn list(&self) -> SyncResult<Vec<CatalogEntry>> {
        let mut catalog = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_page(cursor.as_deref())
                .await
                .map_err(|source| SyncError::Enumeration {
                    side: self.store.name().to_string(),
                    source,
                })?;
            pages += 1;
            catalog.extend(page.objects.into_iter().map(CatalogEntry::from));

            match page.next_cursor {
                Some(next) if page.is_truncated => cursor = Some(next),
                _ => break,
            }
        }

        debug!("列举完成: {} 页, {} 个对象", pages, catalog.len());
        Ok(catalog)
    }
}

/// 上传方向：遍历本地目录
pub struct LocalEnumerator {
    tree: LocalTree,
}

impl LocalEnumerator {
    pub fn new(tree: LocalTree) -> Self {
        Self { tree }
    }
}

#[async_trait]
impl SourceEnumerator for LocalEnumerator {
    async fn list(&self) -> SyncResult<Vec<CatalogEntry>> {
        let entries = self
            .tree
            .walk()
            .await
            .map_err(|e| SyncError::Enumeration {
                side: self.tree.base_path().display().to_string(),
                source: e.into(),
            })?;

        debug!("遍历完成: {} 个条目", entries.len());
        Ok(entries.into_iter().map(CatalogEntry::from).collect())
    }
}
