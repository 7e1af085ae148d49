use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use log::{debug, info};
use crate::{AudioError, Result};

/// Sizes the global rayon pool. Without an explicit count one thread per CPU
/// is used. Calling it again after the pool exists is a no-op; failing to
/// spawn the worker threads is an error.
pub fn configure_thread_pool(threads: Option<usize>) -> Result<usize> {
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Ok(()) => debug!("Configured thread pool with {} threads", threads),
        // Only a spawn failure carries an io::Error source.
        Err(e) if e.source().is_some() => {
            return Err(AudioError::Config(format!("cannot build thread pool: {}", e)))
        }
        Err(e) => debug!("Thread pool already configured: {}", e),
    }
    Ok(rayon::current_num_threads())
}

pub trait ParallelProcessor {
    fn get_progress_counter() -> AtomicUsize {
        AtomicUsize::new(0)
    }

    /// Bumps `counter` and logs every hundredth item plus the last one.
    fn report_progress(counter: &AtomicUsize, total: usize, what: &str) {
        let processed = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if processed % 100 == 0 || processed == total {
            info!(
                "Progress: {}/{} {} ({:.1}%)",
                processed,
                total,
                what,
                (processed as f64 / total as f64) * 100.0
            );
        }
    }
}
