//! Worker-pool configuration for batch, divergence and similarity runs.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Upper bound on explicitly configured worker threads.
const MAX_WORKER_THREADS: usize = 1024;

/// Configuration for parallel execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker threads per parallel call. 0 = available hardware parallelism.
    #[serde(default)]
    pub worker_threads: usize,
}

impl BatchConfig {
    /// Number of threads a pool built from this config will use.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// - `EngineError::ConfigError` if worker_threads exceeds 1024
    pub fn validate(&self) -> EngineResult<()> {
        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(EngineError::ConfigError(format!(
                "worker_threads ({}) exceeds maximum of {}",
                self.worker_threads, MAX_WORKER_THREADS
            )));
        }
        Ok(())
    }
}
