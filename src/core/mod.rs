pub mod diff;
pub mod engine;
pub mod enumerator;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod scheduler;
pub mod sink;
pub mod state;

pub use diff::{select, DiffSummary};
pub use engine::{JobReport, SyncEngine};
pub use enumerator::{LocalEnumerator, RemoteEnumerator, SourceEnumerator};
pub use model::{CatalogEntry, Direction, JobSpec, ObjectFingerprint, TransferTask};
pub use orchestrator::{Orchestrator, RunSummary};
pub use progress::{format_duration, format_size, ProgressSnapshot, ProgressTracker};
pub use scheduler::TransferScheduler;
pub use sink::{LocalSink, RemoteSink, SinkWriter};
pub use state::{read_state, StateStore, SyncState};
