pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use crate::config::AppConfig;
pub use crate::core::{Direction, JobSpec, Orchestrator, RunSummary, SyncEngine};
pub use crate::error::{ErrorKind, SyncError, SyncResult};
