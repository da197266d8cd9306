use crate::pool::scheduler::Scheduler;
use std::sync::Arc;
use std::thread;
use tracing::trace;

/// A worker thread's side of the pool: wait at the start gate, then loop
/// local → global → stolen until the end flag is raised.
pub(super) struct Worker {
    scheduler: Arc<Scheduler>,
}

impl Worker {
    pub(super) fn new(scheduler: Arc<Scheduler>) -> Worker {
        Worker { scheduler }
    }

    pub(super) fn run(self) {
        self.scheduler.wait_at_gate();

        // The gate opens with the end flag already raised when construction
        // failed partway; this worker may not even be registered yet.
        if self.scheduler.is_ended() {
            return;
        }

        let index = self
            .scheduler
            .worker_index()
            .expect("every worker is registered before the gate opens");

        while !self.scheduler.is_ended() {
            let ran = self.scheduler.run_local_task(index)
                || self.scheduler.run_global_task()
                || self.scheduler.run_stolen_task(index);

            if !ran {
                // Give a thread that does have work a turn.
                thread::yield_now();
            }
        }

        trace!(index, "worker exited");
    }
}
