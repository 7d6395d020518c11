use std::io::Write;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use mq_core::{
    BodyEncoding, ClientConfig, ClientError, CredentialsProvider, Message, MessageType,
    SendMessageRequest, SendResult, SystemAttributes,
};
use mq_transport::{Signer, Transport};

use crate::message_id::MessageIdGenerator;
use crate::publish_info::PublishInfoIndex;
use crate::registry::ClientInstance;
use crate::selector;

/// `1024 * 1024 * 4`: bodies over this size are GZIP-compressed.
const COMPRESSION_THRESHOLD_BYTES: usize = 4 * 1024 * 1024;

/// Drives one user message through the full send pipeline: publish-info
/// lookup (C4), partition selection (C5), and the bounded attempt loop (C6).
/// Owned by a single `Producer`; `instance` is the thing that's actually
/// shared across producers (C7).
pub struct SendPipeline {
    instance: Arc<ClientInstance>,
    publish_info: PublishInfoIndex,
    message_ids: MessageIdGenerator,
    signer: Signer,
    config: ClientConfig,
    credentials: Option<Arc<dyn CredentialsProvider>>,
}

/// Transient per-send state. Not reused across sends; the attempt loop in
/// `send0` is the only place that advances `attempt` or substitutes
/// `request`'s partition id.
struct Attempt {
    request: SendMessageRequest,
    candidates: Vec<mq_core::Partition>,
    attempt: u32,
    max_attempts: u32,
}

impl SendPipeline {
    pub fn new(
        instance: Arc<ClientInstance>,
        config: ClientConfig,
        credentials: Option<Arc<dyn CredentialsProvider>>,
    ) -> Self {
        Self {
            instance,
            publish_info: PublishInfoIndex::new(),
            message_ids: MessageIdGenerator::new(),
            signer: Signer::new(),
            config,
            credentials,
        }
    }

    /// `send0(message, maxAttempts)`. `max_attempts = 1` is how
    /// one-way send is expressed; the caller discards the result.
    pub async fn send0(&self, message: &Message, max_attempts: u32) -> Result<SendResult, ClientError> {
        let max_attempts = max_attempts.max(1);
        let io_timeout = Duration::from_millis(self.config.io_timeout_millis);
        let credentials = self.credentials.as_ref().map(|provider| provider.credentials());

        let metadata_probe = self
            .signer
            .sign(&self.config, credentials.as_ref(), SystemTime::now(), &self.message_ids.next())?;

        let info = self
            .publish_info
            .get_publish_info(
                &self.instance.route_cache,
                self.instance.transport.as_ref(),
                message.topic(),
                &metadata_probe,
                io_timeout,
            )
            .await?;

        let candidates = selector::take_partitions(
            &info,
            &self.instance.isolation,
            message.topic(),
            max_attempts as usize,
        )?;

        let request = self.build_request(message, candidates[0].id)?;
        let mut state = Attempt { request, candidates, attempt: 0, max_attempts };

        loop {
            let partition = &state.candidates[(state.attempt as usize) % state.candidates.len()];
            let request = state.request.with_partition_id(partition.id);

            let request_id = self.message_ids.next();
            let metadata = self
                .signer
                .sign(&self.config, credentials.as_ref(), SystemTime::now(), &request_id)?;

            let outcome = self
                .instance
                .transport
                .send_message(&partition.target, &metadata, &request, io_timeout)
                .await;

            match outcome {
                Ok(result) => return Ok(result),
                Err(transport_error) => {
                    let error = match transport_error {
                        mq_transport::TransportError::BrokerRejected { code, message } => {
                            ClientError::BrokerRejected { attempt: state.attempt, code, message }
                        }
                        other => {
                            // Only I/O-level failures implicate the endpoint's
                            // health; a clean reject from a reachable broker
                            // doesn't belong in the isolation registry.
                            self.instance.isolation.isolate(partition.target.clone());
                            ClientError::transport_failure(state.attempt, other)
                        }
                    };
                    let is_last = state.attempt + 1 >= state.max_attempts;
                    if is_last {
                        return Err(error);
                    }
                    log::warn!(
                        "send attempt {} for topic '{}' failed, rotating to next partition: {error}",
                        state.attempt,
                        message.topic()
                    );
                    state.attempt += 1;
                    state.request = request;
                }
            }
        }
    }

    fn build_request(
        &self,
        message: &Message,
        initial_partition_id: mq_core::PartitionId,
    ) -> Result<SendMessageRequest, ClientError> {
        let (body, encoding) = encode_body(message.body(), self.config.message_compression_level);
        let born_timestamp_millis =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64;

        let (delay_level, delivery_timestamp_millis) = match message.delivery_policy() {
            mq_core::DeliveryPolicy::Immediate => (None, None),
            mq_core::DeliveryPolicy::DelayLevel(level) if level > 0 => (Some(level), None),
            mq_core::DeliveryPolicy::DelayLevel(_) => (None, None),
            mq_core::DeliveryPolicy::DeliveryTimestampMillis(ts) => (None, Some(ts)),
        };

        let trace_context = self.config.message_tracing_enabled.then(|| {
            format!("00-{}-0000000000000001-01", self.message_ids.next())
        });

        let system_attribute = SystemAttributes {
            born_timestamp_millis,
            producer_group: format!("{}%{}", self.config.arn, self.config.group),
            message_id: self.message_ids.next(),
            born_host: local_ipv4(),
            partition_id: initial_partition_id,
            delay_level,
            delivery_timestamp_millis,
            body_encoding: encoding,
            message_type: MessageType::classify(message),
            trace_context,
        };

        Ok(SendMessageRequest {
            arn: self.config.arn.clone(),
            topic: message.topic().to_string(),
            system_attribute,
            user_attribute: message.user_attributes().clone(),
            body,
        })
    }
}

/// GZIP-compresses bodies over the 4 MiB threshold at the configured level
///. Compression failure is non-fatal: fall back to identity
/// encoding with the original bytes and log.
fn encode_body(body: &[u8], level: u32) -> (Vec<u8>, BodyEncoding) {
    if body.len() <= COMPRESSION_THRESHOLD_BYTES {
        return (body.to_vec(), BodyEncoding::Identity);
    }
    match gzip_compress(body, level) {
        Ok(compressed) => (compressed, BodyEncoding::Gzip),
        Err(err) => {
            log::warn!("gzip compression failed, falling back to identity encoding: {err}");
            (body.to_vec(), BodyEncoding::Identity)
        }
    }
}

fn gzip_compress(body: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(body)?;
    encoder.finish()
}

/// Best-effort local IPv4 literal, used as `born_host`. No outbound packet
/// is actually sent — `connect` on a UDP socket only consults the routing
/// table to pick a source address.
fn local_ipv4() -> String {
    (|| -> std::io::Result<String> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip().to_string())
    })()
    .unwrap_or_else(|_| "127.0.0.1".to_string())
}
