//! Worker pool (§4.J).
//!
//! A bounded ring-buffer task queue (depth ≈1024) feeding a fixed set of
//! worker threads. Enqueue blocks while full, dequeue blocks while empty.
//! Shutdown enqueues one [`Task::Terminate`] per worker so each thread's
//! blocking dequeue unblocks and drains on its own turn, rather than
//! having workers poll a flag.
//!
//! A completion barrier (`reset`/enqueue *N*/`wait_for`) lets a driver
//! (the scan and join kernels) fan a batch of tasks out and block until
//! all of them have called [`WorkerPool::mark_completion`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A queued unit of work. `SharedScan`/`HashJoin` carry the same kind of
/// heap-owned closure payload; the tag exists so logging and completion
/// accounting can distinguish which kernel is driving the pool.
enum Task {
    Terminate,
    SharedScan(Job),
    HashJoin(Job),
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    completed: Mutex<usize>,
    completed_cv: Condvar,
}

impl Shared {
    fn enqueue(&self, task: Task) {
        let mut q = self.queue.lock();
        while q.len() >= self.capacity {
            self.not_full.wait(&mut q);
        }
        q.push_back(task);
        self.not_empty.notify_one();
    }

    fn dequeue(&self) -> Task {
        let mut q = self.queue.lock();
        while q.is_empty() {
            self.not_empty.wait(&mut q);
        }
        let t = q.pop_front().expect("queue non-empty under lock");
        self.not_full.notify_one();
        t
    }

    fn mark_completion(&self) {
        let mut c = self.completed.lock();
        *c += 1;
        self.completed_cv.notify_all();
    }
}

/// A fixed-size pool of worker threads draining a bounded task queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<std::thread::JoinHandle<()>>,
    joined: AtomicBool,
}

impl WorkerPool {
    /// Spawn `n_workers` threads sharing a queue of depth `capacity`.
    pub fn new(n_workers: usize, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            completed: Mutex::new(0),
            completed_cv: Condvar::new(),
        });
        let mut workers = Vec::with_capacity(n_workers);
        for id in 0..n_workers {
            let shared = Arc::clone(&shared);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("coldb-worker-{id}"))
                    .spawn(move || loop {
                        match shared.dequeue() {
                            Task::Terminate => break,
                            Task::SharedScan(job) | Task::HashJoin(job) => {
                                job();
                                shared.mark_completion();
                            }
                        }
                    })
                    .expect("failed to spawn worker thread"),
            );
        }
        Self {
            shared,
            workers,
            joined: AtomicBool::new(false),
        }
    }

    /// Construct a pool sized by §6's default formula.
    pub fn with_default_size(cfg: &Config) -> Self {
        Self::new(cfg.default_worker_count(), cfg.task_queue_depth)
    }

    /// Number of live worker threads.
    pub fn n_workers(&self) -> usize {
        self.workers.len()
    }

    /// Reset the completion counter to zero (step (a) of the barrier).
    pub fn reset_completed(&self) {
        *self.shared.completed.lock() = 0;
    }

    /// Enqueue a shared-scan chunk task (step (b)).
    pub fn enqueue_scan<F: FnOnce() + Send + 'static>(&self, job: F) {
        self.shared.enqueue(Task::SharedScan(Box::new(job)));
    }

    /// Enqueue a hash-join partition task (step (b)).
    pub fn enqueue_join<F: FnOnce() + Send + 'static>(&self, job: F) {
        self.shared.enqueue(Task::HashJoin(Box::new(job)));
    }

    /// Block until `n` tasks have completed since the last reset (step
    /// (c)).
    pub fn wait_for(&self, n: usize) {
        let mut c = self.shared.completed.lock();
        while *c < n {
            self.shared.completed_cv.wait(&mut c);
        }
    }

    /// Run a batch of independent scan jobs through the completion
    /// barrier and block until all finish.
    pub fn run_scan_barrier<F: FnOnce() + Send + 'static>(&self, jobs: Vec<F>) {
        self.reset_completed();
        let n = jobs.len();
        for job in jobs {
            self.enqueue_scan(job);
        }
        self.wait_for(n);
    }

    /// Run a batch of independent join-partition jobs through the
    /// completion barrier and block until all finish.
    pub fn run_join_barrier<F: FnOnce() + Send + 'static>(&self, jobs: Vec<F>) {
        self.reset_completed();
        let n = jobs.len();
        for job in jobs {
            self.enqueue_join(job);
        }
        self.wait_for(n);
    }

    /// Cooperative shutdown: push one terminate sentinel per worker and
    /// join every thread. Safe to call at most once.
    pub fn shutdown(&mut self) -> CoreResult<()> {
        if self.joined.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for _ in 0..self.workers.len() {
            self.shared.enqueue(Task::Terminate);
        }
        for w in self.workers.drain(..) {
            w.join().map_err(|_| CoreError::Internal("worker thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_scan_barrier_and_waits_for_all() {
        let pool = WorkerPool::new(4, 16);
        let counter = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..20)
            .map(|_| {
                let counter = Arc::clone(&counter);
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();
        pool.run_scan_barrier(jobs);
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut pool = WorkerPool::new(2, 8);
        pool.shutdown().unwrap();
        pool.shutdown().unwrap();
    }

    #[test]
    fn queue_blocks_past_capacity_without_deadlock() {
        let pool = WorkerPool::new(1, 2);
        let counter = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..10)
            .map(|_| {
                let counter = Arc::clone(&counter);
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();
        pool.run_scan_barrier(jobs);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
