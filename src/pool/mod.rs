//! Bounded worker pool for blocking handlers.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      BlockingPool                          │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐    ┌─────────┐    ┌─────────┐                 │
//! │  │ Worker1 │    │ Worker2 │    │ Worker3 │  ...            │
//! │  └────┬────┘    └────┬────┘    └────┬────┘                 │
//! │       │              │              │                      │
//! │       └──────────────┴──────────────┘                      │
//! │                      │                                     │
//! │              ┌───────▼───────┐                             │
//! │              │ sync_channel  │  (bounded queue)            │
//! │              └───────┬───────┘                             │
//! │                      │                                     │
//! │              ┌───────▼───────┐                             │
//! │              │   execute()   │  (async, result via oneshot)│
//! │              └───────────────┘                             │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod thread;

pub use error::{PoolError, PoolResult};
pub use thread::BlockingPool;

use std::sync::OnceLock;

/// A [`BlockingPool`] whose threads are spawned on first use.
#[derive(Debug)]
pub struct LazyPool {
    workers: usize,
    queue_capacity: usize,
    name: String,
    cell: OnceLock<BlockingPool>,
}

impl LazyPool {
    /// `0` for either size means auto.
    pub fn new(workers: usize, queue_capacity: usize, name: impl Into<String>) -> Self {
        Self {
            workers,
            queue_capacity,
            name: name.into(),
            cell: OnceLock::new(),
        }
    }

    /// The pool, starting it if needed.
    pub fn get(&self) -> &BlockingPool {
        self.cell.get_or_init(|| {
            BlockingPool::with_capacity(self.workers, self.queue_capacity, self.name.clone())
        })
    }

    /// The pool if it has been started.
    pub fn started(&self) -> Option<&BlockingPool> {
        self.cell.get()
    }

    /// Shut the pool down if it was started.
    pub fn shutdown(&self) {
        if let Some(pool) = self.cell.get() {
            pool.shutdown();
        }
    }
}
