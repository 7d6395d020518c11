use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mq_core::{ClientConfig, ClientError, CredentialsProvider, Message, SendResult};

use crate::callback::CallbackExecutor;
use crate::registry::ClientInstance;
use crate::send::SendPipeline;

const CREATED: u8 = 0;
const READY: u8 = 1;
const STARTED: u8 = 2;
const STOPPING: u8 = 3;

/// `CREATED → READY → STARTED → STOPPING → READY`. Resources
/// (the send pipeline, the callback executor) are allocated at construction,
/// so by the time a caller holds a `Producer` it is already `READY`;
/// `CREATED` exists only as the pre-construction state in the diagram.
///
/// Reaching `READY` again after `STOPPING` is the diagram's stated terminal
/// point, but nothing here stops a caller from calling `start()` again from
/// there — `start()`/`shutdown()` are defined purely by CAS transitions
/// between these four values, not by a one-shot flag, so a stopped producer
/// is restartable. This resolves an otherwise-unstated ambiguity in the
/// source state diagram; see DESIGN.md.
///
/// `send_async`/`send_oneway` spawn background work that outlives the
/// calling stack frame, so they take `self: &Arc<Self>` rather than `&self`
/// — the spawned task holds its own strong reference instead of racing
/// against the caller to decide how long `self` needs to live.
pub struct Producer {
    state: AtomicU8,
    pipeline: SendPipeline,
    callbacks: CallbackExecutor,
    max_attempt_times: u32,
}

impl Producer {
    pub fn new(
        instance: Arc<ClientInstance>,
        config: ClientConfig,
        credentials: Option<Arc<dyn CredentialsProvider>>,
    ) -> Arc<Self> {
        let max_attempt_times = config.max_attempt_times;
        let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Arc::new(Self {
            state: AtomicU8::new(READY),
            pipeline: SendPipeline::new(instance, config, credentials),
            callbacks: CallbackExecutor::new(worker_count),
            max_attempt_times,
        })
    }

    /// Idempotent: a second call while already `STARTED` is a logged no-op.
    pub fn start(&self) {
        match self.state.compare_exchange(READY, STARTED, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => log::info!("producer started"),
            Err(STARTED) => log::debug!("producer already started; start() is a no-op"),
            Err(other) => log::warn!("start() called in unexpected state {other}; ignoring"),
        }
    }

    /// Idempotent; lets queued callbacks drain before settling back at
    /// `READY`. In-flight sends are not actively cancelled — they may
    /// complete, find the producer no longer `STARTED`, and simply have
    /// their result callback delivered if one was registered.
    pub async fn shutdown(&self) {
        match self.state.compare_exchange(STARTED, STOPPING, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => {
                self.callbacks.shutdown().await;
                self.state.store(READY, Ordering::SeqCst);
                log::info!("producer shut down");
            }
            Err(READY) | Err(CREATED) => {
                log::debug!("producer not started; shutdown() is a no-op");
            }
            Err(other) => log::warn!("shutdown() called in unexpected state {other}; ignoring"),
        }
    }

    fn ensure_started(&self) -> Result<(), ClientError> {
        if self.state.load(Ordering::SeqCst) == STARTED {
            Ok(())
        } else {
            Err(ClientError::ProducerNotStarted)
        }
    }

    /// Synchronous send: waits up to `timeout`, unwrapping one layer of the
    /// async error so the inner `ClientError` surfaces directly rather than
    /// through an extra wrapper.
    pub async fn send(&self, message: &Message, timeout: Duration) -> Result<SendResult, ClientError> {
        self.ensure_started()?;
        match tokio::time::timeout(timeout, self.pipeline.send0(message, self.max_attempt_times)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout { elapsed_millis: timeout.as_millis() as u64 }),
        }
    }

    /// Asynchronous send: arms the same timeout, but dispatches the result
    /// to `callback` on the dedicated callback executor instead of blocking
    /// the caller.
    pub fn send_async<F>(self: &Arc<Self>, message: Message, timeout: Duration, callback: F)
    where
        F: FnOnce(Result<SendResult, ClientError>) + Send + 'static,
    {
        if let Err(err) = self.ensure_started() {
            self.callbacks.submit(Box::new(move || callback(Err(err))));
            return;
        }
        let producer = Arc::clone(self);
        tokio::spawn(async move {
            let result =
                match tokio::time::timeout(timeout, producer.pipeline.send0(&message, producer.max_attempt_times))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Timeout { elapsed_millis: timeout.as_millis() as u64 }),
                };
            producer.callbacks.submit(Box::new(move || callback(result)));
        });
    }

    /// `sendOneway`: `send0(msg, 1)`, outcome discarded. Errors
    /// are logged, not surfaced — there is no caller left to surface them
    /// to.
    pub fn send_oneway(self: &Arc<Self>, message: Message) {
        if let Err(err) = self.ensure_started() {
            log::warn!("sendOneway skipped: {err}");
            return;
        }
        let producer = Arc::clone(self);
        tokio::spawn(async move {
            let topic = message.topic().to_string();
            if let Err(err) = producer.pipeline.send0(&message, 1).await {
                log::warn!("sendOneway to '{topic}' failed: {err}");
            }
        });
    }

    /// Not implemented: the broker-side check-back protocol for local
    /// transactions isn't modeled by this client yet.
    pub fn send_transaction(&self) -> Result<SendResult, ClientError> {
        Err(ClientError::Unsupported { operation: "sendTransaction" })
    }
}
