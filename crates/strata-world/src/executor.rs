//! Fork-join worker pool used to run each pipeline stage in parallel.
//!
//! Workers are long-lived threads parked on a condition variable. [`run`]
//! publishes a task under a new generation number, runs index 0 on the
//! calling thread, then blocks until every worker has finished its share.
//!
//! A panicking task does not take its worker down. The panic is caught,
//! every other share still runs to completion, and the first payload is
//! resumed on the thread that called `run`.
//!
//! [`run`]: ParallelExecutor::run

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

type Task = Arc<dyn Fn(usize) + Send + Sync>;

struct State {
    generation: u64,
    task: Option<Task>,
    pending: usize,
    running: bool,
    panic: Option<Box<dyn Any + Send>>,
}

struct Shared {
    state: Mutex<State>,
    start: Condvar,
    done: Condvar,
}

/// Decrements the pending count when a worker finishes its share.
struct Completion<'a>(&'a Shared);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.pending -= 1;
        if state.pending == 0 {
            self.0.done.notify_all();
        }
    }
}

pub struct ParallelExecutor {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    run_lock: Mutex<()>,
}

impl ParallelExecutor {
    /// Spawns `worker_count` threads. With zero workers, [`run`](Self::run)
    /// executes only on the calling thread.
    pub fn new(worker_count: usize) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                generation: 0,
                task: None,
                pending: 0,
                running: true,
                panic: None,
            }),
            start: Condvar::new(),
            done: Condvar::new(),
        });

        let mut executor = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
            run_lock: Mutex::new(()),
        };
        for index in 1..=worker_count {
            let shared = Arc::clone(&executor.shared);
            // On failure, the partially built executor is dropped and joins
            // the threads already spawned.
            let handle = std::thread::Builder::new()
                .name(format!("strata-worker-{index}"))
                .spawn(move || worker_loop(index, &shared))?;
            executor.workers.push(handle);
        }

        tracing::info!(workers = worker_count, "parallel executor started");
        Ok(executor)
    }

    /// Hardware concurrency minus two, leaving room for the simulation and
    /// render threads.
    pub fn default_worker_count() -> usize {
        num_cpus::get().saturating_sub(2)
    }

    pub fn with_default_workers() -> io::Result<Self> {
        Self::new(Self::default_worker_count())
    }

    /// Number of pool threads, not counting the caller.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of threads that execute a task during [`run`](Self::run).
    pub fn thread_count(&self) -> usize {
        self.workers.len() + 1
    }

    /// Runs `task(i)` once for every `i` in `0..thread_count()` and returns
    /// when all calls have finished. Index 0 runs on the calling thread.
    ///
    /// If any call panics, the panic is resumed here after all calls have
    /// finished, and the pool stays usable.
    pub fn run<F>(&self, task: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let _serial = self.run_lock.lock();
        if self.workers.is_empty() {
            task(0);
            return;
        }

        let task: Task = Arc::new(task);
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.task = Some(Arc::clone(&task));
            state.pending = self.workers.len();
            state.generation += 1;
            self.shared.start.notify_all();
        }

        let caller = panic::catch_unwind(AssertUnwindSafe(|| task(0)));

        let worker_panic = {
            let mut state = self.shared.state.lock();
            while state.pending > 0 {
                self.shared.done.wait(&mut state);
            }
            state.task = None;
            state.panic.take()
        };

        if let Err(payload) = caller {
            panic::resume_unwind(payload);
        }
        if let Some(payload) = worker_panic {
            panic::resume_unwind(payload);
        }
    }

    /// Stops and joins all workers. Safe to call more than once.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if !state.running && self.workers.is_empty() {
                return;
            }
            state.running = false;
            self.shared.start.notify_all();
        }
        let count = self.workers.len();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("executor worker panicked");
            }
        }
        tracing::info!(workers = count, "parallel executor stopped");
    }
}

impl Drop for ParallelExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, shared: &Shared) {
    let mut seen = 0;
    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.running && state.generation == seen {
                shared.start.wait(&mut state);
            }
            if !state.running {
                return;
            }
            seen = state.generation;
            state.task.clone()
        };

        let _done = Completion(shared);
        if let Some(task) = task
            && let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(index)))
        {
            tracing::error!(worker = index, "executor task panicked");
            let mut state = shared.state.lock();
            if state.panic.is_none() {
                state.panic = Some(payload);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counters(n: usize) -> Arc<Vec<AtomicUsize>> {
        Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect())
    }

    #[test]
    fn test_run_calls_every_index_once() {
        let executor = ParallelExecutor::new(3).unwrap();
        assert_eq!(executor.thread_count(), 4);
        let hits = counters(4);
        let shared = Arc::clone(&hits);
        executor.run(move |i| {
            shared[i].fetch_add(1, Ordering::SeqCst);
        });
        for hit in hits.iter() {
            assert_eq!(hit.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_run_is_a_barrier() {
        let executor = ParallelExecutor::new(2).unwrap();
        let total = Arc::new(AtomicUsize::new(0));
        for round in 1..=50 {
            let shared = Arc::clone(&total);
            executor.run(move |_| {
                std::thread::sleep(std::time::Duration::from_micros(50));
                shared.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(total.load(Ordering::SeqCst), round * 3);
        }
    }

    #[test]
    fn test_zero_workers_runs_inline() {
        let executor = ParallelExecutor::new(0).unwrap();
        let hits = counters(1);
        let shared = Arc::clone(&hits);
        executor.run(move |i| {
            assert_eq!(i, 0);
            shared[0].fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits[0].load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_workers_are_named() {
        let executor = ParallelExecutor::new(1).unwrap();
        let name = Arc::new(Mutex::new(String::new()));
        let shared = Arc::clone(&name);
        executor.run(move |i| {
            if i == 1 {
                *shared.lock() = std::thread::current().name().unwrap_or("").to_string();
            }
        });
        assert_eq!(*name.lock(), "strata-worker-1");
    }

    #[test]
    fn test_panicking_task_keeps_pool_alive() {
        let executor = ParallelExecutor::new(2).unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.run(|i| {
                if i == 1 {
                    panic!("share {i} failed");
                }
            });
        }));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("share 1 failed"));

        // The worker that panicked still takes its share of the next run.
        let hits = counters(3);
        let shared = Arc::clone(&hits);
        executor.run(move |i| {
            shared[i].fetch_add(1, Ordering::SeqCst);
        });
        for hit in hits.iter() {
            assert_eq!(hit.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_caller_share_panic_waits_for_workers() {
        let executor = ParallelExecutor::new(2).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&finished);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.run(move |i| {
                if i == 0 {
                    panic!("caller share failed");
                }
                std::thread::sleep(std::time::Duration::from_millis(20));
                shared.fetch_add(1, Ordering::SeqCst);
            });
        }));
        assert!(result.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 2);

        executor.run(|_| {});
    }

    #[test]
    fn test_shutdown_twice() {
        let mut executor = ParallelExecutor::new(2).unwrap();
        executor.shutdown();
        executor.shutdown();
        assert_eq!(executor.worker_count(), 0);
    }
}
