use crate::task::{JoinError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// One-shot channel carrying a task's eventual result to its submitter.
///
/// `None` means the result has not been produced yet. Exactly one
/// [`Completer`] eventually stores a `Some`, either with the task's output or
/// with the [`JoinError`] describing why there is none.
struct Channel<T> {
    slot: Mutex<Option<Result<T>>>,
    ready: Condvar,
}

/// Creates the two ends of a completion channel.
///
/// The [`Completer`] is moved into the task closure; the [`JoinHandle`] is
/// returned to the submitter. Both hold the same slot, so the submitter and
/// the task share ownership of the channel until each end drops.
pub(crate) fn channel<T>() -> (Completer<T>, JoinHandle<T>) {
    let chan = Arc::new(Channel {
        slot: Mutex::new(None),
        ready: Condvar::new(),
    });

    (
        Completer {
            chan: Arc::clone(&chan),
        },
        JoinHandle { chan },
    )
}

/// The sending end of a completion channel. Owned by the task.
///
/// Consuming it through [`complete`] stores the result at most once. If it is
/// dropped without completing (the task was destroyed unrun during pool
/// shutdown), the slot resolves to [`JoinError::shutdown`] so that no waiter
/// blocks forever.
///
/// [`complete`]: Completer::complete
pub(crate) struct Completer<T> {
    chan: Arc<Channel<T>>,
}

impl<T> Completer<T> {
    pub(crate) fn complete(self, result: Result<T>) {
        self.set(result);
    }

    fn set(&self, result: Result<T>) {
        {
            let mut slot = self.chan.slot.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(result);
        }
        // Notify after releasing the lock so woken waiters can take it
        // immediately.
        self.chan.ready.notify_all();
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        // No-op if the result was already stored by `complete`.
        self.set(Err(JoinError::shutdown()));
    }
}

/// An owned permission to collect the result of a submitted task.
///
/// This is the pool's equivalent of [`std::thread::JoinHandle`]. The task
/// associated with it started life in a queue the moment `submit` returned,
/// even if the handle is never touched.
///
/// Dropping the handle detaches the task: it still runs, its result is
/// discarded.
///
/// A submitter that is itself running on a pool worker must not block on
/// [`wait`]/[`take`] while the result may depend on tasks that are still
/// queued: that is the recipe for every worker sitting in a wait with nobody
/// left to run anything. Poll [`is_ready`] and drain the pool in between, or
/// use [`ThreadPool::run_pending_tasks_until`] / [`ThreadPool::join`].
///
/// [`wait`]: JoinHandle::wait
/// [`take`]: JoinHandle::take
/// [`is_ready`]: JoinHandle::is_ready
/// [`ThreadPool::run_pending_tasks_until`]: crate::pool::ThreadPool::run_pending_tasks_until
/// [`ThreadPool::join`]: crate::pool::ThreadPool::join
pub struct JoinHandle<T> {
    chan: Arc<Channel<T>>,
}

impl<T> JoinHandle<T> {
    /// Checks whether the result has been stored.
    ///
    /// Never blocks. Once this returns true, [`take`] will not block.
    ///
    /// [`take`]: JoinHandle::take
    pub fn is_ready(&self) -> bool {
        self.chan.slot.lock().is_some()
    }

    /// Blocks until the result has been stored.
    pub fn wait(&self) {
        let mut slot = self.chan.slot.lock();
        while slot.is_none() {
            self.chan.ready.wait(&mut slot);
        }
    }

    /// Blocks until the result is available, then returns it.
    ///
    /// Yields the task's output, or the [`JoinError`] recorded when the task
    /// panicked or the pool shut down before running it. Consumes the handle:
    /// there is exactly one consumer for each result.
    pub fn take(self) -> Result<T> {
        let mut slot = self.chan.slot.lock();
        while slot.is_none() {
            self.chan.ready.wait(&mut slot);
        }
        slot.take().expect("result stored while holding the lock")
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}
