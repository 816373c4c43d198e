//! Worker pool and fail-fast task execution for batch, divergence and
//! similarity work.
//!
//! Each call builds its own `rayon` pool. Tasks run under `catch_unwind`, so
//! a panic becomes `EngineError::TaskFailed`; the first failure stops the
//! collection and the caller gets one `EngineError::Aborted`.

use std::any::Any;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{error, warn};

use crate::config::BatchConfig;
use crate::error::{EngineError, EngineResult};

/// Build a pool sized by `config` (0 threads means available parallelism).
pub fn build_pool(config: &BatchConfig) -> EngineResult<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(config.effective_threads())
        .thread_name(|i| format!("cohort-density-{}", i))
        .build()
        .map_err(|e| {
            error!("worker pool build failed: {}", e);
            EngineError::ThreadPool(e.to_string())
        })
}

/// Human-readable text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `f`, converting a panic into `EngineError::TaskFailed`.
pub fn guarded<T>(task: &str, f: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(task, "task panicked: {}", message);
            Err(EngineError::TaskFailed {
                task: task.to_string(),
                message,
            })
        }
    }
}

/// Map `items` through `f` on `pool`, preserving input order.
///
/// The first failing (or panicking) task stops the run; no partial output is
/// returned.
///
/// # Errors
/// `EngineError::Aborted` wrapping the first task failure.
pub fn run_fail_fast<I, T, F>(
    pool: &ThreadPool,
    operation: &str,
    items: Vec<I>,
    f: F,
) -> EngineResult<Vec<T>>
where
    I: Send + Debug,
    T: Send,
    F: Fn(I) -> EngineResult<T> + Sync,
{
    pool.install(|| {
        items
            .into_par_iter()
            .map(|item| {
                let task = format!("{}[{:?}]", operation, item);
                guarded(&task, || f(item))
            })
            .collect::<EngineResult<Vec<T>>>()
    })
    .map_err(|e| {
        error!(operation, "aborted: {}", e);
        EngineError::aborted(operation, e)
    })
}
