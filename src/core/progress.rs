//! 传输进度统计

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::info;

const BAR_WIDTH: usize = 20;

/// 某一时刻的进度快照
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub files_total: u64,
    pub files_done: u64,
    pub bytes_total: u64,
    pub bytes_done: u64,
    pub elapsed: Duration,
    /// 字节/秒
    pub speed: f64,
    /// 速度为 0 时无法估算
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.bytes_total == 0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.bytes_total as f64 * 100.0
    }
}

#[derive(Debug, Default)]
struct Counters {
    files_total: u64,
    files_done: u64,
    bytes_total: u64,
    bytes_done: u64,
}

/// 线程安全的进度计数器，只用于展示，不影响传输
#[derive(Debug)]
pub struct ProgressTracker {
    counters: Mutex<Counters>,
    started: Instant,
    verbose: bool,
}

impl ProgressTracker {
    pub fn new(verbose: bool) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            started: Instant::now(),
            verbose,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_total(&self, files: u64, bytes: u64) {
        {
            let mut counters = self.lock();
            counters.files_total = files;
            counters.bytes_total = bytes;
        }
        if self.verbose {
            info!("开始传输: {} 个对象, 总计 {}", files, format_size(bytes));
        }
    }

    /// 一个对象传输完成
    pub fn add_completed(&self, bytes: u64) {
        {
            let mut counters = self.lock();
            counters.files_done += 1;
            counters.bytes_done += bytes;
        }
        if self.verbose {
            info!("{}", render_line(&self.snapshot()));
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let counters = self.lock();
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let speed = if secs > 0.0 {
            counters.bytes_done as f64 / secs
        } else {
            0.0
        };

        // 计算 ETA
        let eta = if speed > 0.0 {
            let remaining = counters.bytes_total.saturating_sub(counters.bytes_done);
            Some(Duration::from_secs_f64(remaining as f64 / speed))
        } else {
            None
        };

        ProgressSnapshot {
            files_total: counters.files_total,
            files_done: counters.files_done,
            bytes_total: counters.bytes_total,
            bytes_done: counters.bytes_done,
            elapsed,
            speed,
            eta,
        }
    }

    /// 最终统计信息（多行文本）
    pub fn final_summary(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "统计信息:\n  文件数量: {}\n  数据大小: {}\n  用时: {}\n  平均速度: {}/s",
            snapshot.files_done,
            format_size(snapshot.bytes_done),
            format_duration(snapshot.elapsed),
            format_size(snapshot.speed as u64)
        )
    }
}

fn render_line(snapshot: &ProgressSnapshot) -> String {
    let percent = snapshot.percent();
    let filled = ((percent / 100.0) * BAR_WIDTH as f64) as usize;
    let bar: String = (0..BAR_WIDTH)
        .map(|i| if i < filled.min(BAR_WIDTH) { '█' } else { '░' })
        .collect();

    let mut line = format!(
        "[{}] {:.1}% | {}/{} 文件 | {}/{} | {}/s",
        bar,
        percent,
        snapshot.files_done,
        snapshot.files_total,
        format_size(snapshot.bytes_done),
        format_size(snapshot.bytes_total),
        format_size(snapshot.speed as u64)
    );
    if let Some(eta) = snapshot.eta.filter(|eta| !eta.is_zero()) {
        line.push_str(&format!(" | ETA: {}", format_duration(eta)));
    }
    line
}

/// 格式化字节数（1024 进制，保留一位小数）
pub fn format_size(size: u64) -> String {
    const UNIT: u64 = 1024;
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if size < UNIT {
        return format!("{} B", size);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = size / UNIT;
    while n >= UNIT && exp < UNITS.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}", size as f64 / div as f64, UNITS[exp])
}

/// 格式化时长：`42s`、`3m5s`、`2h10m`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}
