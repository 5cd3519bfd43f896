//! 查看各任务的状态文件

use crate::config::AppConfig;
use crate::core::{format_size, read_state, Direction, ObjectFingerprint};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write as _;
use std::path::PathBuf;

const SAMPLE_COUNT: usize = 5;

/// 单个任务的状态摘要
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub name: String,
    pub state_path: PathBuf,
    /// 状态文件不存在时为 None（首次运行）
    pub summary: Option<StateSummary>,
}

#[derive(Debug, Clone)]
pub struct StateSummary {
    pub last_run_at: DateTime<Utc>,
    pub entries: usize,
    pub total_size: u64,
    pub samples: Vec<(String, ObjectFingerprint)>,
}

pub async fn collect_status(config: &AppConfig, direction: Direction) -> Result<Vec<JobStatus>> {
    let mut statuses = Vec::new();
    for job in config.job_specs(direction) {
        let summary = read_state(&job.state_path).await?.map(|state| StateSummary {
            last_run_at: state.last_run_at,
            entries: state.len(),
            total_size: state.total_size(),
            samples: state
                .entries
                .iter()
                .take(SAMPLE_COUNT)
                .map(|(key, fp)| (key.clone(), fp.clone()))
                .collect(),
        });
        statuses.push(JobStatus {
            name: job.remote_name,
            state_path: job.state_path,
            summary,
        });
    }
    Ok(statuses)
}

/// 渲染为终端输出
pub fn render(statuses: &[JobStatus]) -> String {
    let mut out = String::new();
    for status in statuses {
        let _ = writeln!(out, "桶: {}", status.name);
        let _ = writeln!(out, "  状态文件: {}", status.state_path.display());

        let Some(summary) = &status.summary else {
            let _ = writeln!(out, "  状态文件不存在，可能是首次运行");
            continue;
        };

        let _ = writeln!(
            out,
            "  最后运行时间: {}",
            summary
                .last_run_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "  已同步条目数: {}", summary.entries);
        let _ = writeln!(out, "  总数据大小: {}", format_size(summary.total_size));

        if !summary.samples.is_empty() {
            let _ = writeln!(out, "  最近的条目 (示例):");
            for (key, fp) in &summary.samples {
                let _ = writeln!(
                    out,
                    "    {} ({}, {})",
                    key,
                    format_size(fp.size_bytes),
                    fp.modified_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                );
            }
            if summary.entries > summary.samples.len() {
                let _ = writeln!(out, "    ... 还有 {} 个", summary.entries - summary.samples.len());
            }
        }
    }
    out
}
