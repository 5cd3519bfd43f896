//! 并发传输调度
//!
//! 固定数量的 worker 从共享队列取任务，出错的 worker 通过错误通道上报后退出，
//! 其余 worker 继续。所有 worker 结束后才返回，汇总全部错误。

use super::model::TransferTask;
use super::progress::ProgressTracker;
use super::sink::SinkWriter;
use crate::error::{SyncError, SyncResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// 共享任务队列
#[derive(Clone)]
struct TaskQueue {
    inner: Arc<Mutex<VecDeque<TransferTask>>>,
}

impl TaskQueue {
    fn new(tasks: Vec<TransferTask>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tasks.into())),
        }
    }

    fn pop(&self) -> Option<TransferTask> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// 传输调度器
pub struct TransferScheduler {
    worker_count: usize,
}

impl TransferScheduler {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// 执行全部任务；返回时不再有进行中的传输
    pub async fn run(
        &self,
        tasks: Vec<TransferTask>,
        sink: Arc<dyn SinkWriter>,
        progress: Arc<ProgressTracker>,
    ) -> SyncResult<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let workers = self.worker_count.min(tasks.len());
        let queue = TaskQueue::new(tasks);
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<SyncError>();

        debug!("启动 {} 个传输 worker", workers);

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let queue = queue.clone();
                let sink = sink.clone();
                let progress = progress.clone();
                let error_tx = error_tx.clone();

                tokio::spawn(async move {
                    while let Some(task) = queue.pop() {
                        match sink.write(&task).await {
                            Ok(bytes) => progress.add_completed(bytes),
                            Err(e) => {
                                error!("worker {} 传输失败: {}", worker_id, e);
                                let _ = error_tx.send(e);
                                break;
                            }
                        }
                    }
                })
            })
            .collect();
        drop(error_tx);

        // 等待所有 worker 结束
        let mut errors = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await {
                errors.push(SyncError::transfer("<worker>", e));
            }
        }
        while let Ok(e) = error_rx.try_recv() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyncError::TransferBatch {
                errors,
                pending: queue.len(),
            })
        }
    }
}
