use super::diff;
use super::enumerator::{LocalEnumerator, RemoteEnumerator, SourceEnumerator};
use super::model::{Direction, JobSpec};
use super::progress::{format_duration, format_size, ProgressTracker};
use super::scheduler::TransferScheduler;
use super::sink::{LocalSink, RemoteSink, SinkWriter};
use super::state::{StateStore, SyncState};
use crate::error::{SyncError, SyncResult};
use crate::storage::{LocalTree, ObjectStore, StoreConnector};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 单个任务的执行报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub remote_name: String,
    pub direction: Direction,
    pub scanned: usize,
    pub transferred: usize,
    pub skipped: usize,
    pub bytes_transferred: u64,
    pub duration: Duration,
}

/// 同步引擎：下载与上传共用同一流程，只是源端与目标端不同
pub struct SyncEngine {
    connector: Arc<dyn StoreConnector>,
}

impl SyncEngine {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }

    /// 运行一个任务
    ///
    /// 只有传输全部成功才会写入新的状态；任何错误都让上次的状态文件保持不变。
    pub async fn run_job(&self, spec: &JobSpec) -> SyncResult<JobReport> {
        let started = Instant::now();
        info!(
            "开始{}: {} <-> {}",
            spec.direction,
            spec.remote_name,
            spec.local_dir.display()
        );

        let store = self
            .connector
            .connect(&spec.remote_name)
            .await
            .map_err(|source| SyncError::Connection {
                bucket: spec.remote_name.clone(),
                source,
            })?;

        let tree = LocalTree::new(&spec.local_dir);
        let (enumerator, sink): (Box<dyn SourceEnumerator>, Arc<dyn SinkWriter>) =
            match spec.direction {
                Direction::Download => {
                    prepare_download(store.as_ref(), spec).await?;
                    (
                        Box::new(RemoteEnumerator::new(store.clone())) as Box<dyn SourceEnumerator>,
                        Arc::new(LocalSink::new(store, tree)) as Arc<dyn SinkWriter>,
                    )
                }
                Direction::Upload => {
                    prepare_upload(store.as_ref(), spec).await?;
                    (
                        Box::new(LocalEnumerator::new(tree.clone())) as Box<dyn SourceEnumerator>,
                        Arc::new(RemoteSink::new(store, tree)) as Arc<dyn SinkWriter>,
                    )
                }
            };

        let state_store = StateStore::new(&spec.state_path, spec.incremental);
        let previous = state_store.load().await?;
        if spec.incremental {
            debug!(
                "已加载状态 {}: {} 个条目",
                state_store.path().display(),
                previous.len()
            );
        }

        let catalog = enumerator.list().await?;
        info!("扫描到 {} 个条目", catalog.len());

        let (tasks, summary) =
            diff::select(&catalog, &previous, sink.as_ref(), spec.incremental).await?;
        info!(
            "需要传输 {} 个 ({}), 跳过 {} 个",
            summary.selected,
            format_size(summary.selected_bytes),
            summary.skipped
        );

        let progress = Arc::new(ProgressTracker::new(spec.verbose));
        progress.set_total(summary.selected as u64, summary.selected_bytes);

        TransferScheduler::new(spec.worker_count)
            .run(tasks, sink, progress.clone())
            .await?;

        // 以本次列举结果重建状态，不论条目是否被传输
        state_store.save(&SyncState::from_catalog(&catalog)).await?;

        if spec.verbose {
            info!("{}", progress.final_summary());
        }

        let snapshot = progress.snapshot();
        let report = JobReport {
            remote_name: spec.remote_name.clone(),
            direction: spec.direction,
            scanned: catalog.len(),
            transferred: snapshot.files_done as usize,
            skipped: summary.skipped,
            bytes_transferred: snapshot.bytes_done,
            duration: started.elapsed(),
        };
        info!(
            "{} {}完成: 传输 {} 个, {}, 用时 {}",
            report.remote_name,
            report.direction,
            report.transferred,
            format_size(report.bytes_transferred),
            format_duration(report.duration)
        );
        Ok(report)
    }
}

/// 下载前检查存储桶并创建本地目录
async fn prepare_download(store: &dyn ObjectStore, spec: &JobSpec) -> SyncResult<()> {
    let exists = store
        .bucket_exists()
        .await
        .map_err(|source| SyncError::Connection {
            bucket: spec.remote_name.clone(),
            source,
        })?;
    if !exists {
        return Err(SyncError::BucketNotFound(spec.remote_name.clone()));
    }

    tokio::fs::create_dir_all(&spec.local_dir)
        .await
        .map_err(|e| SyncError::filesystem(spec.local_dir.display().to_string(), e))
}

/// 上传前确认本地目录存在，存储桶不存在时创建
async fn prepare_upload(store: &dyn ObjectStore, spec: &JobSpec) -> SyncResult<()> {
    let connection_err = |source| SyncError::Connection {
        bucket: spec.remote_name.clone(),
        source,
    };

    if !store.bucket_exists().await.map_err(connection_err)? {
        info!("存储桶 {} 不存在，正在创建", spec.remote_name);
        store.create_bucket().await.map_err(connection_err)?;
    }

    let is_dir = tokio::fs::metadata(&spec.local_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(SyncError::filesystem(
            spec.local_dir.display().to_string(),
            io::Error::new(io::ErrorKind::NotFound, "上传目录不存在"),
        ));
    }
    Ok(())
}
