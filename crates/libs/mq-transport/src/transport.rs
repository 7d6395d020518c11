use std::time::Duration;

use async_trait::async_trait;
use mq_core::{Endpoints, SendMessageRequest, SendResult, TopicRouteData};

/// Transport-level failure: the RPC itself did not complete cleanly (I/O
/// error, deadline elapsed, or the broker returned a non-OK status). The
/// send pipeline (C6) turns this into a `ClientError::TransportFailure` or
/// `ClientError::BrokerRejected` as appropriate.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error contacting {target}: {message}")]
    Io { target: String, message: String },

    #[error("deadline of {0:?} elapsed before the RPC completed")]
    DeadlineElapsed(Duration),

    #[error("broker rejected the request: {code} {message}")]
    BrokerRejected { code: String, message: String },
}

/// The gRPC transport boundary: a unary call with a deadline. Everything
/// above this trait — signing, routing, retry — is this crate's and
/// `mq-producer`'s concern; everything below it (channel, codec, TLS) is an
/// external collaborator's.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        target: &Endpoints,
        metadata: &crate::Metadata,
        request: &SendMessageRequest,
        timeout: Duration,
    ) -> Result<SendResult, TransportError>;

    async fn query_route(
        &self,
        topic: &str,
        metadata: &crate::Metadata,
        timeout: Duration,
    ) -> Result<TopicRouteData, TransportError>;

    async fn end_transaction(
        &self,
        target: &Endpoints,
        metadata: &crate::Metadata,
        message_id: &str,
        transaction_id: &str,
        commit: bool,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    async fn heartbeat(
        &self,
        target: &Endpoints,
        metadata: &crate::Metadata,
        timeout: Duration,
    ) -> Result<(), TransportError>;
}
