use crate::task::handle::{self, JoinHandle};
use crate::task::JoinError;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// A type-erased, run-once unit of work, as stored by the pool's queues and
/// stacks. The callable carries its own completion channel, so running a
/// task produces nothing externally.
pub(crate) struct Task {
    invoke: Box<dyn FnOnce() + Send>,
}

impl Task {
    /// Binds a callable to a fresh completion channel.
    ///
    /// Returns the task (to be queued) and the handle its submitter keeps.
    /// The callable runs under panic capture: a panic is downgraded to a
    /// [`JoinError`] stored in the channel, never unwound into the worker
    /// thread that happens to run the task.
    pub(crate) fn bind<F, T>(f: F) -> (Task, JoinHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (completer, handle) = handle::channel();

        let task = Task {
            // AssertUnwindSafe: the closure's state is never observed again
            // after a panic; the only outlet is the completion channel.
            invoke: Box::new(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(f))
                    .map_err(|payload| JoinError::panic(panic_message(payload)));
                completer.complete(result);
            }),
        };

        (task, handle)
    }

    /// Invokes the wrapped callable. Exactly once, by construction.
    pub(crate) fn run(self) {
        (self.invoke)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
