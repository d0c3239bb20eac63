use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

/// Worker counts and flush granularity of a batch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// CPU-bound workers (masking, block reduction, path searches); defaults to the core count.
    pub compute_threads: Option<usize>,
    /// Workers that open stores and stage writes.
    pub io_threads: usize,
    /// Features per persisted chunk.
    pub chunk_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { compute_threads: None, io_threads: 4, chunk_size: 10_000 }
    }
}

/// The two worker tiers of a batch.
#[derive(Clone)]
pub struct Pools {
    pub compute: Arc<ThreadPool>,
    pub io: Arc<ThreadPool>,
}

impl Pools {
    pub fn new(config: &BatchConfig) -> Result<Self> {
        if config.io_threads == 0 || config.chunk_size == 0 {
            return Err(Error::configuration("io_threads and chunk_size must be at least 1"))
        }
        let compute = ThreadPoolBuilder::new()
            .num_threads(config.compute_threads.unwrap_or(0))
            .thread_name(|i| format!("compute-{i}"))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build compute pool: {e}")))?;
        let io = ThreadPoolBuilder::new()
            .num_threads(config.io_threads)
            .thread_name(|i| format!("io-{i}"))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build io pool: {e}")))?;
        Ok(Self { compute: Arc::new(compute), io: Arc::new(io) })
    }

    /// Small pools for tests and single-store runs.
    pub fn with_threads(compute: usize, io: usize) -> Result<Self> {
        Self::new(&BatchConfig { compute_threads: Some(compute), io_threads: io, ..Default::default() })
    }
}

impl std::fmt::Debug for Pools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pools")
            .field("compute", &self.compute.current_num_threads())
            .field("io", &self.io.current_num_threads())
            .finish()
    }
}
