//! 增量比较 - 决定哪些条目需要传输

use super::model::{CatalogEntry, TransferTask};
use super::sink::SinkWriter;
use super::state::SyncState;
use crate::error::SyncResult;
use tracing::debug;

/// 比较结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub selected: usize,
    pub skipped: usize,
    pub selected_bytes: u64,
}

/// 单个条目为什么需要传输
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reason {
    Full,
    MissingContainer,
    New,
    Changed,
    MissingAtDestination,
}

/// 根据上次状态与目标端现状挑选需要传输的条目
///
/// 目标端探测只在状态判断为“未变化”时进行。
pub async fn select(
    catalog: &[CatalogEntry],
    state: &SyncState,
    sink: &dyn SinkWriter,
    incremental: bool,
) -> SyncResult<(Vec<TransferTask>, DiffSummary)> {
    let mut tasks = Vec::new();
    let mut summary = DiffSummary::default();

    for entry in catalog {
        match decide(entry, state, sink, incremental).await? {
            Some(reason) => {
                debug!("需要传输 {} ({:?})", entry.key, reason);
                summary.selected += 1;
                summary.selected_bytes += entry.size();
                tasks.push(TransferTask {
                    local_path: sink.local_path(&entry.key)?,
                    entry: entry.clone(),
                });
            }
            None => summary.skipped += 1,
        }
    }

    Ok((tasks, summary))
}

async fn decide(
    entry: &CatalogEntry,
    state: &SyncState,
    sink: &dyn SinkWriter,
    incremental: bool,
) -> SyncResult<Option<Reason>> {
    if entry.key.is_empty() {
        return Ok(None);
    }
    if !incremental {
        return Ok(Some(Reason::Full));
    }

    // 目录标记只看是否存在
    if entry.is_container_marker {
        return Ok(if sink.exists(&entry.key).await? {
            None
        } else {
            Some(Reason::MissingContainer)
        });
    }

    match state.get(&entry.key) {
        None => return Ok(Some(Reason::New)),
        Some(previous) if previous != &entry.fingerprint => return Ok(Some(Reason::Changed)),
        Some(_) => {}
    }

    if sink.exists(&entry.key).await? {
        Ok(None)
    } else {
        Ok(Some(Reason::MissingAtDestination))
    }
}
