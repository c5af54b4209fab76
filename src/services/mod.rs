pub mod recommendation;
pub mod training;

use crate::config::RuntimeConfig;
use anyhow::Result;

/// Worker pool for the per-customer parallel stages (prediction, metrics, top-N).
pub fn thread_pool(runtime: &RuntimeConfig) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(runtime.worker_threads.max(1))
        .build()?)
}
