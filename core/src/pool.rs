use std::collections::VecDeque;
use std::mem;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    tasks: VecDeque<Task>,
    shutting_down: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    task_ready: Condvar,
    barrier: Mutex<usize>,
    barrier_done: Condvar,
}

impl Shared {
    /// Counts one finished task against the current barrier. Decremented
    /// under the mutex so `await_barrier` observes exactly N completions.
    fn complete_one(&self) {
        let mut remaining = self.barrier.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.barrier_done.notify_all();
            }
        }
    }
}

/// Fixed-size pool of blocking worker threads with a countdown barrier.
///
/// Workers are created once, sized to hardware concurrency, and torn down by
/// [`WorkerPool::shutdown`] (or on drop). Every submitted task runs to
/// completion; there is no cancellation.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Pool sized to hardware concurrency, minimum one thread.
    pub fn new() -> Self {
        let threads = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_threads(threads)
    }

    pub fn with_threads(threads: usize) -> Self {
        let threads = threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                shutting_down: false,
            }),
            task_ready: Condvar::new(),
            barrier: Mutex::new(0),
            barrier_done: Condvar::new(),
        });

        let workers = (0..threads)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || worker_loop(shared))
            })
            .collect();

        Self { shared, workers }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues a task and wakes one idle worker.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Box::new(task));
    }

    /// Enqueues a task that borrows caller data.
    ///
    /// # Safety
    ///
    /// The caller must keep everything the task borrows alive and otherwise
    /// untouched until `await_barrier` has observed the task's completion.
    /// The engine satisfies this by sizing a barrier to its dispatch batch
    /// and awaiting it before the borrowed views go out of scope.
    pub unsafe fn submit_borrowed<'a>(&self, task: Box<dyn FnOnce() + Send + 'a>) {
        let task: Task = mem::transmute(task);
        self.push(task);
    }

    fn push(&self, task: Task) {
        {
            let mut state = self.shared.queue.lock().unwrap();
            state.tasks.push_back(task);
        }
        self.shared.task_ready.notify_one();
    }

    /// Resets the countdown to `expected` completed tasks.
    pub fn begin_barrier(&self, expected: usize) {
        *self.shared.barrier.lock().unwrap() = expected;
    }

    /// Blocks until the countdown started by `begin_barrier` reaches zero.
    pub fn await_barrier(&self) {
        let mut remaining = self.shared.barrier.lock().unwrap();
        while *remaining > 0 {
            remaining = self.shared.barrier_done.wait(remaining).unwrap();
        }
    }

    /// Signals termination and joins the workers. Queued tasks still run to
    /// completion before the workers exit. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.queue.lock().unwrap();
            state.shutting_down = true;
        }
        self.shared.task_ready.notify_all();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut state = shared.queue.lock().unwrap();
            loop {
                if let Some(task) = state.tasks.pop_front() {
                    break task;
                }
                if state.shutting_down {
                    return;
                }
                state = shared.task_ready.wait(state).unwrap();
            }
        };

        // A panicking task must still count against the barrier, or the
        // dispatching thread would block forever.
        let _ = panic::catch_unwind(AssertUnwindSafe(task));
        shared.complete_one();
    }
}
