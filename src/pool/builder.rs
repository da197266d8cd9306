use crate::pool::ThreadPool;
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

pub(super) type ThreadNameFn = Arc<dyn Fn() -> String + Send + Sync + 'static>;

fn default_thread_name_fn() -> ThreadNameFn {
    let counter = Arc::new(AtomicUsize::new(0));

    Arc::new(move || {
        let prev = counter.fetch_add(1, Ordering::Relaxed);
        format!("taskmill-worker-{}", prev)
    })
}

/// One worker per core, minus the submitter thread that is expected to sit
/// in a drain loop alongside the pool.
pub(super) fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Configures and builds a [`ThreadPool`].
pub struct Builder {
    /// The number of worker threads.
    ///
    /// Defaults to one per CPU core, minus one for the submitting thread.
    pub(super) worker_threads: Option<usize>,

    /// Name fn used for threads spawned by the pool.
    pub(super) thread_name: ThreadNameFn,

    /// Stack size used for threads spawned by the pool.
    pub(super) thread_stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            worker_threads: None,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
        }
    }

    /// Sets the number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `val` is 0.
    pub fn worker_threads(&mut self, val: usize) -> &mut Self {
        assert!(val > 0, "Worker threads cannot be set to 0");
        self.worker_threads = Some(val);
        self
    }

    /// Sets the name of threads spawned by the pool.
    ///
    /// The default name is "taskmill-worker-{N}".
    pub fn thread_name(&mut self, val: impl Into<String>) -> &mut Self {
        let val = val.into();
        self.thread_name = Arc::new(move || val.clone());
        self
    }

    /// Sets a function used to generate the name of threads spawned by the
    /// pool.
    ///
    /// The default yields names with a monotonically increasing N,
    /// "taskmill-worker-{N}".
    pub fn thread_name_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.thread_name = Arc::new(f);
        self
    }

    /// Sets the stack size (in bytes) for worker threads.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// specifies a minimal stack size.
    pub fn thread_stack_size(&mut self, val: usize) -> &mut Self {
        self.thread_stack_size = Some(val);
        self
    }

    /// Spawns the workers and hands back the running pool.
    ///
    /// Fails if a worker thread cannot be spawned; any workers spawned
    /// before the failure are shut down and joined first.
    pub fn try_build(&mut self) -> Result<ThreadPool> {
        ThreadPool::build(self)
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}
