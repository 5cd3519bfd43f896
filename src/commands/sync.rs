use crate::config::AppConfig;
use crate::core::{Direction, JobReport, Orchestrator, SyncEngine};
use crate::storage::{S3Connector, StoreConnector};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// 按配置执行所有桶的备份或上传
pub async fn run_sync(config: &AppConfig, direction: Direction) -> Result<Vec<JobReport>> {
    config.validate().context("配置验证失败")?;
    let connector = Arc::new(S3Connector::new(config.store.clone()));
    run_with_connector(config, direction, connector).await
}

pub async fn run_with_connector(
    config: &AppConfig,
    direction: Direction,
    connector: Arc<dyn StoreConnector>,
) -> Result<Vec<JobReport>> {
    let jobs = config.job_specs(direction);

    info!("开始{}（共 {} 个桶）", direction, jobs.len());
    info!("连接信息: {}", config.store.endpoint);
    for (i, job) in jobs.iter().enumerate() {
        info!(
            "  {}. {} <-> {} (增量: {}, 并发: {})",
            i + 1,
            job.remote_name,
            job.local_dir.display(),
            job.incremental,
            job.worker_count
        );
    }

    let orchestrator = Orchestrator::new(SyncEngine::new(connector));
    orchestrator.run_all(&jobs).await.into_result()
}
