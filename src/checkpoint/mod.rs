//! Durable per-job progress log.

mod backend;
mod progress;

pub use backend::{CheckpointBackend, CheckpointDoc, JobEntry, JsonFileBackend, MemoryBackend};
pub use progress::{CheckpointLog, LOG_FILE_NAME};
