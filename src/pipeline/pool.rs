//! Bounded worker pool for page jobs.
//!
//! ## Why a private tokio runtime?
//!
//! Page work is blocking (pdfium FFI, image encoders), so it belongs on
//! blocking threads. A dedicated multi-thread runtime with
//! `max_blocking_threads(n)` gives exactly that: at most `n` jobs run at
//! once and the rest wait in tokio's unbounded queue. The single async
//! worker thread only drives the join handles.
//!
//! The orchestrator blocks on [`WorkerPool::block_on`], so a [`WorkerPool`]
//! must not be used from inside another tokio runtime's async context.
//! Wrap the call in `tokio::task::spawn_blocking` there.

use crate::error::Pdf2ImgError;
use std::future::Future;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

/// A fixed-size pool of blocking threads with an unbounded job queue.
pub struct WorkerPool {
    runtime: Runtime,
    size: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}

impl WorkerPool {
    /// Start a pool running at most `size` jobs concurrently (minimum 1).
    pub fn new(size: usize) -> Result<Self, Pdf2ImgError> {
        let size = size.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name("pdf2img-worker")
            .enable_all()
            .build()
            .map_err(|e| Pdf2ImgError::Internal(format!("could not start worker pool: {e}")))?;
        debug!("Worker pool started with {} threads", size);
        Ok(Self { runtime, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `job`. It starts as soon as a pool thread is free.
    pub fn submit<F, R>(&self, job: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.runtime.spawn_blocking(job)
    }

    /// Block the calling thread until `future` resolves.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
