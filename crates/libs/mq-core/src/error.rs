use std::fmt;

/// The producer's error taxonomy. Each variant is one terminal
/// outcome the send pipeline can surface to a caller; retry policy lives in
/// `mq-producer::send`, not here.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// API call made while the producer is not in the `Started` state.
    #[error("producer is not started")]
    ProducerNotStarted,

    /// Credential/HMAC failure while building request metadata (C1).
    /// Immediate, non-retriable: a send never reaches the wire.
    #[error("failed to sign request metadata: {reason}")]
    SigningFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Topic route lookup failed (C3). Retry, if any, is at the caller's layer.
    #[error("failed to resolve route for topic '{topic}'")]
    RouteResolution {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The resolved route has no writable partitions (C5). Immediate,
    /// non-retriable.
    #[error("topic '{topic}' has no writable partitions")]
    NoWritablePartition { topic: String },

    /// Transport I/O failure or deadline elapsed on an attempt (C6). Retried
    /// up to `max_attempts`, then surfaced as the last error.
    #[error("transport failure on attempt {attempt}: {reason}")]
    TransportFailure {
        attempt: u32,
        reason: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// RPC completed but the broker rejected the message with a non-OK
    /// status. Same retry policy as `TransportFailure`.
    #[error("broker rejected send on attempt {attempt}: {code} {message}")]
    BrokerRejected { attempt: u32, code: String, message: String },

    /// The caller-provided deadline elapsed. The in-flight RPC may still
    /// complete in the background; this error does not imply it was
    /// cancelled.
    #[error("send timed out after {elapsed_millis}ms")]
    Timeout { elapsed_millis: u64 },

    /// Feature not implemented in this client (transactional send, selector
    /// send). Immediate, non-retriable.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: &'static str },
}

impl ClientError {
    pub fn signing_failure(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ClientError::SigningFailure { reason: reason.into(), source: Some(Box::new(source)) }
    }

    pub fn route_resolution(
        topic: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ClientError::RouteResolution { topic: topic.into(), source: Box::new(source) }
    }

    pub fn transport_failure(
        attempt: u32,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let reason = source.to_string();
        ClientError::TransportFailure { attempt, reason, source: Box::new(source) }
    }

    /// True for the kinds the attempt loop should retry:
    /// `TransportFailure`/`BrokerRejected`.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ClientError::TransportFailure { .. } | ClientError::BrokerRejected { .. })
    }
}

/// A minimal stand-in for "some error occurred signing or transporting a
/// request" used by call sites that just need to box a string reason without
/// a real source error (e.g. a compressor failure that is logged and
/// swallowed, not propagated). Kept separate from `ClientError` so it never
/// leaks into the public retry/error taxonomy.
#[derive(Debug)]
pub struct Opaque(pub String);

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Opaque {}
