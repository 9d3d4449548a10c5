use std::sync::atomic::AtomicUsize;
use rayon::prelude::*;
use crate::{MediaError, Result};

pub trait ParallelProcessor {
    /// `jobs == 0` means one thread per CPU core.
    fn build_pool(jobs: usize) -> Result<rayon::ThreadPool> {
        let threads = if jobs == 0 { num_cpus::get() } else { jobs };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| MediaError::Config(format!("failed to build thread pool: {}", e)))?;
        log::info!("Using {} threads for processing", pool.current_num_threads());
        Ok(pool)
    }

    fn get_progress_counter() -> AtomicUsize {
        AtomicUsize::new(0)
    }

    /// Map `f` over `items`, sequentially when `jobs == 1` and on a dedicated
    /// pool otherwise. Results keep the order of `items` either way.
    fn process_in_order<T, F, R>(items: &[T], jobs: usize, f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync,
    {
        if jobs == 1 || items.len() < 2 {
            return Ok(items.iter().map(f).collect());
        }

        let pool = Self::build_pool(jobs)?;
        Ok(pool.install(|| items.par_iter().map(|item| f(item)).collect()))
    }
}
