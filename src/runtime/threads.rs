//! Worker pool sizing.
//!
//! A forward pass is single-threaded; parallelism happens one level up,
//! across model instances. The global rayon pool is therefore sized once at
//! process start (default one worker) so that several concurrently running
//! models do not oversubscribe the machine.

use crate::error::{DdrError, DdrResult};

/// Size the global worker pool. Must run before any parallel work; a second
/// call fails with [`DdrError::ThreadPool`].
pub fn configure_threads(num_threads: usize) -> DdrResult<()> {
    if num_threads == 0 {
        return Err(DdrError::InvalidDimension {
            name: "num_threads",
            value: 0,
        });
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("ddr-worker-{}", i))
        .build_global()
        .map_err(|e| {
            tracing::warn!("worker pool already configured: {}", e);
            DdrError::ThreadPool(e.to_string())
        })?;
    tracing::debug!("worker pool sized to {} thread(s)", num_threads);
    Ok(())
}

/// Workers in the current pool.
pub fn current_threads() -> usize {
    rayon::current_num_threads()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            configure_threads(0),
            Err(DdrError::InvalidDimension { name: "num_threads", .. })
        ));
    }

    #[test]
    fn test_second_configuration_fails() {
        // The global pool may already exist from another test; either way
        // at most one of these two calls can succeed.
        let first = configure_threads(2);
        let second = configure_threads(2);
        assert!(!(first.is_ok() && second.is_ok()));
        assert!(matches!(second, Err(DdrError::ThreadPool(_))));
        assert!(current_threads() >= 1);
    }
}
