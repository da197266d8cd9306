use crate::container::{Map, Queue, Stack};
use crate::task::Task;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

/// State shared between the pool handle and every worker: the queues, the
/// worker identity table, and the two lifecycle flags.
///
/// Scheduling order is fixed: a worker drains its own stack, then the global
/// queue, then its neighbours' stacks. Local stacks are LIFO so the task a
/// worker just submitted, whose data is still warm in its cache, runs first;
/// the global queue is FIFO across all pullers collectively. Nothing orders
/// tasks across different containers.
pub(super) struct Scheduler {
    /// Closed until every worker is registered; workers spin at the gate.
    /// Opened with a release store so the acquiring workers see the fully
    /// populated identity table and stacks.
    start_gate: AtomicBool,

    /// Tells workers to exit once their current task is done.
    end: AtomicBool,

    /// Submissions from non-worker threads land here.
    global: Queue<Task>,

    /// One local stack per worker; index `i` belongs to worker `i`. The
    /// owner pushes; the owner and thieves pop, same end.
    locals: Vec<Stack<Task>>,

    /// OS thread id -> index into `locals`. Written only during
    /// construction, before the gate opens; reads during submission take a
    /// bucket's shared lock.
    lookup: Map<ThreadId, usize>,

    /// Successful steals, for observability. Relaxed.
    pub(super) stolen_tasks: AtomicUsize,
}

impl Scheduler {
    pub(super) fn new(num_workers: usize) -> Scheduler {
        Scheduler {
            start_gate: AtomicBool::new(false),
            end: AtomicBool::new(false),
            global: Queue::new(),
            locals: (0..num_workers).map(|_| Stack::new()).collect(),
            lookup: Map::new(),
            stolen_tasks: AtomicUsize::new(0),
        }
    }

    pub(super) fn num_workers(&self) -> usize {
        self.locals.len()
    }

    pub(super) fn register_worker(&self, thread_id: ThreadId, index: usize) {
        self.lookup.insert(thread_id, index);
    }

    pub(super) fn open_gate(&self) {
        self.start_gate.store(true, Ordering::Release);
    }

    pub(super) fn wait_at_gate(&self) {
        while !self.start_gate.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }

    /// Raises the end flag. Returns true the first time.
    pub(super) fn request_end(&self) -> bool {
        !self.end.swap(true, Ordering::AcqRel)
    }

    pub(super) fn is_ended(&self) -> bool {
        self.end.load(Ordering::Acquire)
    }

    /// The calling thread's worker index, if it is one of ours.
    pub(super) fn worker_index(&self) -> Option<usize> {
        self.lookup
            .get(&thread::current().id())
            .map(|index| *index)
    }

    /// Routes a task: a worker pushes onto its own stack, everyone else onto
    /// the global queue.
    pub(super) fn submit_task(&self, task: Task) {
        match self.worker_index() {
            Some(index) => self.locals[index].push(task),
            None => self.global.push(task),
        }
    }

    pub(super) fn run_local_task(&self, index: usize) -> bool {
        match self.locals[index].try_pop() {
            Some(task) => {
                task.run();
                true
            }
            None => false,
        }
    }

    pub(super) fn run_global_task(&self) -> bool {
        match self.global.try_pop() {
            Some(task) => {
                task.run();
                true
            }
            None => false,
        }
    }

    /// Visits the other workers' stacks, nearest ring neighbour first, and
    /// runs the first task found.
    pub(super) fn run_stolen_task(&self, index: usize) -> bool {
        for offset in 1..self.locals.len() {
            let victim = (index + offset) % self.locals.len();
            if let Some(task) = self.locals[victim].try_pop() {
                self.stolen_tasks.fetch_add(1, Ordering::Relaxed);
                task.run();
                return true;
            }
        }
        false
    }

    /// Runs one pending task on the calling thread, wherever one is found.
    ///
    /// A worker looks in its usual order; an external thread drains the
    /// global queue and then worker 0's neighbour ring. A false return only
    /// means nothing was runnable at this instant; another thread may
    /// submit the next moment.
    pub(super) fn run_pending_task(&self) -> bool {
        match self.worker_index() {
            Some(index) => {
                self.run_local_task(index)
                    || self.run_global_task()
                    || self.run_stolen_task(index)
            }
            None => self.run_global_task() || self.run_stolen_task(0),
        }
    }
}
