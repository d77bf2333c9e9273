//! Worker pool that drains actor mailboxes.
//!
//! Each job is one scheduling slice of one mailbox. Because a mailbox has at
//! most one pending slice at any time, the job queue is unbounded: its length
//! is bounded by the number of live actors.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, trace};
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;

thread_local! {
    static IN_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Error when submitting a job to the pool
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool is shutting down
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Statistics about the pool
#[derive(Debug, Default, Clone)]
pub struct PoolStats {
    /// Number of jobs queued
    pub jobs_queued: usize,

    /// Number of jobs completed
    pub jobs_completed: usize,

    /// Number of jobs that panicked
    pub jobs_panicked: usize,

    /// Total job execution time (microseconds)
    pub total_execution_time_us: u64,

    /// Total queue wait time (microseconds)
    pub total_queue_time_us: u64,

    /// Maximum job execution time (microseconds)
    pub max_execution_time_us: u64,
}

/// Configuration for the pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub threads: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            thread_name_prefix: "troupe-worker".to_string(),
        }
    }
}

struct Job {
    func: Box<dyn FnOnce() + Send + 'static>,
    enqueued_at: Instant,
}

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
    total_execution_time_us: AtomicUsize,
    total_queue_time_us: AtomicUsize,
    max_execution_time_us: AtomicUsize,
}

impl Counters {
    fn record_execution(&self, exec_time_us: usize) {
        self.total_execution_time_us
            .fetch_add(exec_time_us, Ordering::Relaxed);

        let mut current_max = self.max_execution_time_us.load(Ordering::Relaxed);
        while exec_time_us > current_max {
            match self.max_execution_time_us.compare_exchange(
                current_max,
                exec_time_us,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }
    }
}

/// A fixed-size pool of named worker threads
pub struct WorkerPool {
    sender: RwLock<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    size: usize,
}

impl WorkerPool {
    /// Start a pool with the given configuration
    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        let threads = config.threads.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let counters = Arc::new(Counters::default());

        info!(
            "Starting worker pool '{}' with {} threads",
            config.thread_name_prefix, threads
        );

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let receiver = receiver.clone();
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, id))
                .spawn(move || Self::worker_loop(id, receiver, counters))
                .map_err(|e| PoolError::Spawn(e.to_string()))?;
            workers.push(handle);
        }

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
            size: threads,
        })
    }

    fn worker_loop(id: usize, receiver: Receiver<Job>, counters: Arc<Counters>) {
        IN_WORKER.with(|flag| flag.set(true));
        debug!("Worker {}: Starting", id);

        // Runs until the queue is closed and drained.
        for job in receiver.iter() {
            let queue_time = job.enqueued_at.elapsed();
            counters
                .total_queue_time_us
                .fetch_add(queue_time.as_micros() as usize, Ordering::Relaxed);

            let exec_start = Instant::now();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job.func));
            let exec_time = exec_start.elapsed();
            counters.record_execution(exec_time.as_micros() as usize);

            match result {
                Ok(()) => {
                    trace!(
                        "Worker {}: Job completed in {:.2}ms",
                        id,
                        exec_time.as_micros() as f64 / 1000.0
                    );
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(
                        "Worker {}: Job panicked: {:?}",
                        id,
                        e.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
                    );
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        debug!("Worker {}: Shutting down", id);
    }

    /// Queue a job for execution
    pub fn execute<F>(&self, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.read();
        let sender = guard.as_ref().ok_or(PoolError::ShuttingDown)?;
        let job = Job {
            func: Box::new(f),
            enqueued_at: Instant::now(),
        };
        sender.send(job).map_err(|_| PoolError::ShuttingDown)?;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Current statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            jobs_queued: self.counters.queued.load(Ordering::Relaxed),
            jobs_completed: self.counters.completed.load(Ordering::Relaxed),
            jobs_panicked: self.counters.panicked.load(Ordering::Relaxed),
            total_execution_time_us: self.counters.total_execution_time_us.load(Ordering::Relaxed)
                as u64,
            total_queue_time_us: self.counters.total_queue_time_us.load(Ordering::Relaxed) as u64,
            max_execution_time_us: self.counters.max_execution_time_us.load(Ordering::Relaxed)
                as u64,
        }
    }

    /// Close the queue and wait for the workers to finish what is queued.
    ///
    /// When called from one of the pool's own threads the workers are left to
    /// exit on their own, since a worker cannot join itself.
    pub fn shutdown(&self) {
        if self.sender.write().take().is_none() {
            return;
        }
        info!("Shutting down worker pool");

        if Self::is_worker_thread() {
            debug!("Worker pool shut down from a worker thread; not joining");
            return;
        }

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            worker.join().unwrap_or_else(|e| {
                error!("Worker thread panicked during shutdown: {:?}", e);
            });
        }
        info!("Worker pool shutdown complete");
    }

    /// Whether `shutdown` has been called
    pub fn is_shutting_down(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.size
    }

    /// Whether the calling thread is a worker of some pool
    pub fn is_worker_thread() -> bool {
        IN_WORKER.with(|flag| flag.get())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets the workers exit once it is drained.
        self.sender.write().take();
        debug!("Worker pool dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn pool(threads: usize) -> WorkerPool {
        WorkerPool::with_config(PoolConfig {
            threads,
            thread_name_prefix: "test".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_pool_runs_jobs() {
        let pool = pool(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.stats().jobs_completed, 10);
    }

    #[test]
    fn test_pool_survives_panics() {
        let pool = pool(1);
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();

        pool.execute(|| panic!("This job should panic")).unwrap();
        pool.execute(move || flag_clone.store(true, Ordering::SeqCst))
            .unwrap();

        pool.shutdown();
        assert!(flag.load(Ordering::SeqCst));

        let stats = pool.stats();
        assert_eq!(stats.jobs_queued, 2);
        assert_eq!(stats.jobs_panicked, 1);
        assert_eq!(stats.jobs_completed, 1);
    }

    #[test]
    fn test_pool_rejects_after_shutdown() {
        let pool = pool(1);
        pool.shutdown();
        assert!(pool.is_shutting_down());
        assert!(matches!(pool.execute(|| {}), Err(PoolError::ShuttingDown)));
    }

    #[test]
    fn test_worker_thread_detection() {
        let pool = pool(1);
        let (tx, rx) = bounded(1);
        pool.execute(move || {
            tx.send(WorkerPool::is_worker_thread()).unwrap();
        })
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert!(!WorkerPool::is_worker_thread());
    }
}
