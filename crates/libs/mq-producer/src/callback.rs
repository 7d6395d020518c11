use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

type BoxedCallback = Box<dyn FnOnce() + Send + 'static>;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Dedicated executor that runs user-supplied send callbacks off the I/O
/// threads, so user code never blocks a transport call in flight.
///
/// The queue is bounded rather than unbounded, and chooses
/// **drop-with-log**: a full queue means the producer is falling behind its
/// own callbacks, and dropping the newest one (rather than blocking the send
/// path, or the caller, on it) is the only option that can't deadlock an I/O
/// thread.
///
/// `shutdown` takes `&self` (not owned) so a `Producer` can hold this
/// directly and shut it down from `&self` too; a second call finds nothing
/// left to close.
pub struct CallbackExecutor {
    sender: Mutex<Option<mpsc::Sender<BoxedCallback>>>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl CallbackExecutor {
    /// `worker_count` is typically sized to available CPUs.
    pub fn new(worker_count: usize) -> Self {
        Self::with_capacity(worker_count, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(worker_count: usize, queue_capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(AsyncMutex::new(receiver));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let receiver = receiver.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    // Channel closes (recv returns None) only once every
                    // sender has dropped and the queue is empty, so this
                    // naturally drains whatever was already enqueued before
                    // shutdown instead of racing a cancellation signal.
                    let callback = receiver.lock().await.recv().await;
                    match callback {
                        Some(callback) => run_callback(callback),
                        None => break,
                    }
                }
            }));
        }

        Self { sender: Mutex::new(Some(sender)), workers: AsyncMutex::new(workers) }
    }

    /// Enqueues a callback; drops (and logs) it if the queue is full rather
    /// than blocking the caller.
    pub fn submit(&self, callback: BoxedCallback) {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            log::warn!("producer callback executor is shut down; dropping callback");
            return;
        };
        if let Err(err) = sender.try_send(callback) {
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    log::warn!("producer callback executor queue is full; dropping callback");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    log::warn!("producer callback executor is shut down; dropping callback");
                }
            }
        }
    }

    /// Closes the submission channel and waits for workers to exit, letting
    /// whatever was already enqueued finish best-effort rather than
    /// interrupting it. Idempotent.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            let _ = worker.await;
        }
    }
}

fn run_callback(callback: BoxedCallback) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        log::error!("producer send callback panicked; swallowed to protect the executor");
    }
}
