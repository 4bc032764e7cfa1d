//! Serialized execution lane.
//!
//! # Responsibilities
//! - Run submitted units of work one at a time, in submission order
//! - Apply backpressure through a bounded queue
//! - Contain a panicking unit to its own caller
//!
//! # Design Decisions
//! - One dedicated OS thread for the daemon's lifetime (work may block)
//! - Shutdown policy is drain: units queued before `shutdown` still run
//! - Results travel back over a oneshot channel per unit

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Name of the lane's worker thread.
pub const WORKER_THREAD_NAME: &str = "format-daemon-serial";

/// Errors seen by a caller of the serialized lane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerialError {
    #[error("serialized lane is shut down")]
    Closed,

    #[error("unit of work panicked: {0}")]
    Panicked(String),
}

/// Handle to the single sequential worker.
///
/// Cloning the handle shares the same queue and worker.
#[derive(Clone)]
pub struct SerialExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    queued: Arc<AtomicUsize>,
}

impl SerialExecutor {
    /// Start the worker thread with a queue holding at most `capacity` units.
    pub fn start(capacity: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let queued = Arc::new(AtomicUsize::new(0));

        let worker_queued = Arc::clone(&queued);
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_loop(rx, worker_queued))?;

        tracing::debug!(capacity, "Serialized lane started");
        Ok(Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
                queued,
            }),
        })
    }

    /// Enqueue `work` and wait for its result.
    ///
    /// Waits for queue space when the queue is full.
    pub async fn submit<T, F>(&self, work: F) -> Result<T, SerialError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.lock().clone().ok_or(SerialError::Closed)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "Unit of work panicked on serialized lane");
                SerialError::Panicked(message)
            });
            let _ = reply_tx.send(outcome);
        });

        self.inner.queued.fetch_add(1, Ordering::SeqCst);
        record_depth(&self.inner.queued);
        if sender.send(job).await.is_err() {
            self.inner.queued.fetch_sub(1, Ordering::SeqCst);
            record_depth(&self.inner.queued);
            return Err(SerialError::Closed);
        }
        drop(sender);

        reply_rx.await.map_err(|_| SerialError::Closed)?
    }

    /// Number of units waiting or running.
    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.sender.lock().is_none()
    }

    /// Stop accepting work, let queued units finish, then join the worker.
    pub async fn shutdown(&self) {
        let sender = self.inner.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker {
            let pending = self.queued();
            tracing::info!(pending, "Draining serialized lane");
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => tracing::debug!("Serialized lane stopped"),
                Ok(Err(_)) => tracing::error!("Serialized lane worker panicked"),
                Err(e) => tracing::error!(error = %e, "Failed to join serialized lane worker"),
            }
        }
    }
}

fn run_loop(mut rx: mpsc::Receiver<Job>, queued: Arc<AtomicUsize>) {
    while let Some(job) = rx.blocking_recv() {
        job();
        queued.fetch_sub(1, Ordering::SeqCst);
        record_depth(&queued);
    }
}

fn record_depth(queued: &AtomicUsize) {
    metrics::gauge!("format_daemon_serial_queue_depth").set(queued.load(Ordering::SeqCst) as f64);
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
