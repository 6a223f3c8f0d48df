//! Worker-spawning abstraction for the pipeline's active elements
//! (spec.md §5: filler, codec controller, gorger, starvation monitor).
//!
//! Each of those owns one blocking worker thread that loops on `Pull`,
//! so spawning here is a plain blocking closure rather than a future —
//! unlike the async [`TaskSpawner`](https://example.invalid) pattern this
//! is ported from, there is no `.await` point inside a pipeline worker's
//! loop. [`ThreadSpawner`] (a bare `std::thread::spawn`) is the default;
//! [`TokioSpawner`] is available behind the `tokio-runtime` feature for
//! hosts that already run a Tokio runtime and would rather not grow the
//! OS thread count per pipeline instance.

/// Abstraction for starting one of the pipeline's background workers.
pub trait WorkerSpawner: Send + Sync {
    /// Runs `work` to completion on a dedicated thread (or runtime-managed
    /// blocking slot). The worker owns its own loop and exits only when it
    /// pulls a `Quit` message; this call does not wait for that.
    fn spawn(&self, name: &str, work: Box<dyn FnOnce() + Send>);
}

/// Spawns a plain OS thread per worker. The default, and the only option
/// with no `tokio` dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl WorkerSpawner for ThreadSpawner {
    fn spawn(&self, name: &str, work: Box<dyn FnOnce() + Send>) {
        let name = name.to_string();
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(work)
            .unwrap_or_else(|e| panic!("failed to spawn pipeline worker {name}: {e}"));
    }
}

#[cfg(feature = "tokio-runtime")]
mod tokio_spawner {
    use super::WorkerSpawner;

    /// Runs each worker via `spawn_blocking` on a Tokio runtime handle,
    /// so a host already running Tokio doesn't also pay for raw OS
    /// threads outside its pool.
    #[derive(Clone)]
    pub struct TokioSpawner {
        handle: tokio::runtime::Handle,
    }

    impl TokioSpawner {
        #[must_use]
        pub fn new(handle: tokio::runtime::Handle) -> Self {
            Self { handle }
        }

        /// # Panics
        /// Panics if called outside of a Tokio runtime context.
        #[must_use]
        pub fn current() -> Self {
            Self {
                handle: tokio::runtime::Handle::current(),
            }
        }
    }

    impl WorkerSpawner for TokioSpawner {
        fn spawn(&self, name: &str, work: Box<dyn FnOnce() + Send>) {
            let name = name.to_string();
            self.handle.spawn_blocking(move || {
                tracing::debug!(worker = %name, "pipeline worker started");
                work();
            });
        }
    }
}

#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn thread_spawner_runs_work() {
        let spawner = ThreadSpawner;
        let flag = Arc::new(AtomicBool::new(false));
        let f2 = flag.clone();
        spawner.spawn("test-worker", Box::new(move || f2.store(true, Ordering::SeqCst)));
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(flag.load(Ordering::SeqCst));
    }
}
