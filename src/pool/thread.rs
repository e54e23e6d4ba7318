//! Bounded thread pool for blocking handlers.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio::sync::oneshot;

use super::error::{PoolError, PoolResult};

/// Default queue capacity multiplier per worker.
const DEFAULT_QUEUE_MULTIPLIER: usize = 100;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A queued job with its enqueue time.
struct WorkItem {
    job: Job,
    queued_at: Instant,
}

/// A fixed set of named OS threads pulling jobs from a bounded queue.
///
/// Jobs are submitted from async code with [`BlockingPool::execute`]; the
/// caller suspends until a worker has run the job.
pub struct BlockingPool {
    /// Sender side of the job queue. `None` once shut down.
    job_tx: Mutex<Option<mpsc::SyncSender<WorkItem>>>,
    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    queue_capacity: usize,
    /// Jobs accepted but not yet picked up by a worker.
    pending: Arc<AtomicUsize>,
    shutdown: AtomicBool,
    /// Pool name, used for thread names and logging.
    name: String,
}

impl BlockingPool {
    /// Create a pool with auto-calculated queue capacity.
    ///
    /// `num_workers == 0` uses the CPU count.
    pub fn new(num_workers: usize, name: impl Into<String>) -> Self {
        let num_workers = if num_workers == 0 {
            num_cpus::get()
        } else {
            num_workers
        };
        Self::with_capacity(num_workers, num_workers * DEFAULT_QUEUE_MULTIPLIER, name)
    }

    /// Create a pool with a custom queue capacity (`0` = auto).
    pub fn with_capacity(num_workers: usize, queue_capacity: usize, name: impl Into<String>) -> Self {
        let name = name.into();
        let num_workers = if num_workers == 0 {
            num_cpus::get()
        } else {
            num_workers
        };
        let queue_capacity = if queue_capacity == 0 {
            num_workers * DEFAULT_QUEUE_MULTIPLIER
        } else {
            queue_capacity
        };

        let (job_tx, job_rx) = mpsc::sync_channel::<WorkItem>(queue_capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let rx = Arc::clone(&job_rx);
            let pending = Arc::clone(&pending);

            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, id))
                .spawn(move || worker_loop(id, rx, pending));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!(pool = %name, worker = id, error = %e, "failed to spawn worker thread");
                }
            }
        }

        let worker_count = workers.len();
        tracing::info!(
            pool = %name,
            workers = worker_count,
            capacity = queue_capacity,
            "blocking pool created"
        );

        Self {
            // without workers nothing would ever drain the queue
            job_tx: Mutex::new((worker_count > 0).then_some(job_tx)),
            workers: Mutex::new(workers),
            worker_count,
            queue_capacity,
            pending,
            shutdown: AtomicBool::new(worker_count == 0),
            name,
        }
    }

    /// Run `f` on a worker thread and wait for its result.
    ///
    /// Fails fast with [`PoolError::QueueFull`] when the queue is at capacity
    /// and with [`PoolError::Shutdown`] after [`BlockingPool::shutdown`]. A
    /// panic inside `f` is caught and returned as [`PoolError::WorkerPanic`].
    pub async fn execute<F, R>(&self, f: F) -> PoolResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::Shutdown);
        }

        let job_tx = self
            .job_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PoolError::Shutdown)?;

        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| PoolError::WorkerPanic(panic_message(payload.as_ref())));
            let _ = result_tx.send(result);
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        let item = WorkItem {
            job,
            queued_at: Instant::now(),
        };

        // try_send so a saturated pool is reported instead of stalling the caller
        if let Err(e) = job_tx.try_send(item) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return match e {
                mpsc::TrySendError::Full(_) => Err(PoolError::QueueFull {
                    capacity: self.queue_capacity,
                    pending: self.pending.load(Ordering::SeqCst),
                }),
                mpsc::TrySendError::Disconnected(_) => Err(PoolError::Shutdown),
            };
        }

        match result_rx.await {
            Ok(result) => result,
            Err(_) => Err(PoolError::ChannelClosed),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Jobs accepted but not yet started.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs. Workers finish the queued jobs and exit.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!(pool = %self.name, "shutting down blocking pool");

        // Dropping the sender ends each worker's recv loop once the queue drains.
        self.job_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Wait for all workers to finish (call after shutdown).
    pub fn join(&self) {
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for BlockingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingPool")
            .field("name", &self.name)
            .field("workers", &self.worker_count)
            .field("capacity", &self.queue_capacity)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Drop for BlockingPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker thread main loop.
fn worker_loop(id: usize, rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>, pending: Arc<AtomicUsize>) {
    tracing::debug!(worker = id, "worker started");

    loop {
        let work = {
            let guard = rx.lock().unwrap_or_else(PoisonError::into_inner);
            guard.recv()
        };

        match work {
            Ok(WorkItem { job, queued_at }) => {
                pending.fetch_sub(1, Ordering::SeqCst);
                tracing::trace!(
                    worker = id,
                    wait_us = queued_at.elapsed().as_micros() as u64,
                    "job started"
                );
                job();
            }
            // queue closed
            Err(_) => break,
        }
    }

    tracing::debug!(worker = id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
