//! 多桶任务编排：按顺序执行，单个任务失败不影响其余任务

use super::engine::{JobReport, SyncEngine};
use super::model::JobSpec;
use crate::error::SyncError;
use tracing::{error, info};

/// 全部任务的执行汇总
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub reports: Vec<JobReport>,
    /// (桶名, 错误)
    pub failures: Vec<(String, SyncError)>,
}

impl RunSummary {
    /// 有任务失败时返回汇总错误
    pub fn into_result(self) -> anyhow::Result<Vec<JobReport>> {
        if self.failures.is_empty() {
            return Ok(self.reports);
        }
        let names: Vec<&str> = self.failures.iter().map(|(name, _)| name.as_str()).collect();
        anyhow::bail!("{} 个任务失败: {}", self.failed, names.join(", "))
    }
}

pub struct Orchestrator {
    engine: SyncEngine,
}

impl Orchestrator {
    pub fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    /// 依次执行所有任务
    pub async fn run_all(&self, jobs: &[JobSpec]) -> RunSummary {
        let mut summary = RunSummary::default();
        let total = jobs.len();

        for (index, job) in jobs.iter().enumerate() {
            info!("[{}/{}] {}: {}", index + 1, total, job.direction, job.remote_name);
            match self.engine.run_job(job).await {
                Ok(report) => {
                    summary.succeeded += 1;
                    summary.reports.push(report);
                }
                Err(e) => {
                    error!("桶 {} {}失败: {}", job.remote_name, job.direction, e);
                    summary.failed += 1;
                    summary.failures.push((job.remote_name.clone(), e));
                }
            }
        }

        info!("全部完成: 成功 {} 个, 失败 {} 个", summary.succeeded, summary.failed);
        summary
    }
}
