use crate::pool::builder::{Builder, default_worker_count};
use crate::pool::scheduler::Scheduler;
use crate::pool::worker::Worker;
use crate::task::{self, JoinHandle, Task};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// A work-stealing pool for short-lived compute tasks.
///
/// Tasks can be submitted to it, from worker or external threads, to be done
/// concurrently; each submission returns a [`JoinHandle`] carrying the
/// eventual result. Once a worker picks a task up it runs to completion;
/// nothing interrupts it.
///
/// # Fork/join
///
/// A task may submit further tasks and collect their results. It must not
/// block on a nested handle: with every worker doing the same, nobody would
/// be left to run the nested tasks and the pool would deadlock. While the
/// handle is not ready, run other tasks in place:
///
/// ```
/// use taskmill::ThreadPool;
/// use std::sync::Arc;
///
/// let pool = Arc::new(ThreadPool::new(4)?);
///
/// let inner_pool = Arc::clone(&pool);
/// let outer = pool.submit(move || {
///     let fork = inner_pool.submit(|| 6 * 7);
///     // Drain the pool until the fork is done, instead of blocking.
///     inner_pool.join(fork).expect("fork neither panics nor is dropped")
/// });
///
/// assert_eq!(pool.join(outer).unwrap(), 42);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct ThreadPool {
    pub(super) scheduler: Arc<Scheduler>,

    handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPool {
    /// Builds a pool with `num_workers` workers, floored at one.
    ///
    /// Use [`builder`] to configure more than the worker count.
    ///
    /// [`builder`]: ThreadPool::builder
    pub fn new(num_workers: usize) -> Result<ThreadPool> {
        Builder::new().worker_threads(num_workers.max(1)).try_build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(super) fn build(builder: &Builder) -> Result<ThreadPool> {
        let num_workers = builder.worker_threads.unwrap_or_else(default_worker_count);

        let scheduler = Arc::new(Scheduler::new(num_workers));
        let pool = ThreadPool {
            scheduler: Arc::clone(&scheduler),
            handles: Mutex::new(Vec::with_capacity(num_workers)),
        };

        for index in 0..num_workers {
            let worker = Worker::new(Arc::clone(&scheduler));

            let mut thread = thread::Builder::new().name((builder.thread_name)());
            if let Some(stack_size) = builder.thread_stack_size {
                thread = thread.stack_size(stack_size);
            }

            match thread.spawn(move || worker.run()) {
                Ok(handle) => {
                    scheduler.register_worker(handle.thread().id(), index);
                    pool.handles.lock().push(handle);
                }
                Err(e) => {
                    // Raise the end flag *before* opening the gate so that
                    // no already-spawned worker enters its main loop, then
                    // let them through and collect them.
                    scheduler.request_end();
                    scheduler.open_gate();
                    pool.join_workers();
                    return Err(e).context("failed to spawn worker thread");
                }
            }
        }

        // Every worker is registered; let them through. The release store
        // in `open_gate` pairs with the workers' acquire loads, so their
        // first reads see the complete identity table.
        scheduler.open_gate();
        debug!(num_workers, "pool started");

        Ok(pool)
    }

    /// Submits a callable; its result will arrive through the returned
    /// handle.
    ///
    /// Called from a worker, the task goes onto that worker's own stack;
    /// called from anywhere else, onto the global queue.
    pub fn submit<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = Task::bind(f);

        if self.scheduler.is_ended() {
            // Nobody would ever run it; dropping the task resolves the
            // handle to the shutdown error right away.
            return handle;
        }

        self.scheduler.submit_task(task);
        handle
    }

    /// Runs one pending task on the calling thread.
    ///
    /// Returns whether a task was run. A false return does not mean the
    /// pool stays idle: another thread may submit right after.
    ///
    /// This is the cooperative half of fork/join: a thread waiting on a
    /// handle calls this in a loop instead of blocking, so the pool keeps
    /// making progress even when every worker is itself waiting on a nested
    /// task.
    pub fn run_pending_task(&self) -> bool {
        self.scheduler.run_pending_task()
    }

    /// Runs pending tasks on the calling thread until the handle is ready.
    pub fn run_pending_tasks_until<T>(&self, handle: &JoinHandle<T>) {
        while !handle.is_ready() {
            if !self.run_pending_task() {
                thread::yield_now();
            }
        }
    }

    /// Drains the pool until the handle is ready, then returns its result.
    pub fn join<T>(&self, handle: JoinHandle<T>) -> task::Result<T> {
        self.run_pending_tasks_until(&handle);
        handle.take()
    }

    pub fn num_workers(&self) -> usize {
        self.scheduler.num_workers()
    }

    /// Stops the workers: raises the end flag and joins every worker
    /// thread. Each worker finishes its current task first. Idempotent.
    ///
    /// Tasks still queued when the pool is dropped never run; their handles
    /// resolve to the shutdown error.
    pub fn shutdown(&self) {
        if self.scheduler.request_end() {
            debug!("pool shutting down");
        }
        self.join_workers();
    }

    fn join_workers(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();

        let panicked = handles
            .into_iter()
            .filter_map(|handle| handle.join().err())
            .count();

        if panicked > 0 {
            // Tasks run under panic capture, so this is a pool bug, not a
            // user-task failure.
            warn!(panicked, "worker thread(s) panicked");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_workers", &self.num_workers())
            .finish()
    }
}
