use crate::message::{DeliveryPolicy, Message, UserAttributes};
use crate::partition::PartitionId;

/// Wire-visible body transfer encoding. Kept as a plain enum rather
/// than protobuf-generated code: protobuf encoding details beyond these
/// semantic fields are out of scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyEncoding {
    Identity,
    Gzip,
    Snappy,
}

/// Broker-side message classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Normal,
    Fifo,
    Delay,
    Transaction,
}

impl MessageType {
    pub fn classify(message: &Message) -> Self {
        if message.is_transaction_prepared() {
            return MessageType::Transaction;
        }
        match message.delivery_policy() {
            DeliveryPolicy::DelayLevel(level) if level > 0 => MessageType::Delay,
            DeliveryPolicy::DeliveryTimestampMillis(_) => MessageType::Delay,
            _ => MessageType::Normal,
        }
    }
}

/// System-set attributes on a `SendMessageRequest`. Rebuilt per attempt with
/// only `partition_id` changing: updating just the partition id yields a
/// request that re-serializes byte-equal except at that one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemAttributes {
    pub born_timestamp_millis: i64,
    pub producer_group: String,
    pub message_id: String,
    pub born_host: String,
    pub partition_id: PartitionId,
    pub delay_level: Option<u8>,
    pub delivery_timestamp_millis: Option<i64>,
    pub body_encoding: BodyEncoding,
    pub message_type: MessageType,
    pub trace_context: Option<String>,
}

/// The semantic fields of a `SendMessageRequest`, minus protobuf-wire
/// framing, which is out of scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub arn: String,
    pub topic: String,
    pub system_attribute: SystemAttributes,
    pub user_attribute: UserAttributes,
    pub body: Vec<u8>,
}

impl SendMessageRequest {
    /// Returns a copy of this request with only `partition_id` (and the
    /// partition-dependent target selection, done by the caller) changed;
    /// `message_id` and every other field are preserved verbatim rather than
    /// regenerated.
    pub fn with_partition_id(&self, partition_id: PartitionId) -> Self {
        let mut next = self.clone();
        next.system_attribute.partition_id = partition_id;
        next
    }
}

/// The broker's response to a successful send: message id, partition id,
/// queue offset if present, transaction id if present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendResult {
    pub message_id: String,
    pub partition_id: PartitionId,
    pub queue_offset: Option<i64>,
    pub transaction_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_partition_id_preserves_message_id() {
        let request = SendMessageRequest {
            arn: "arn:test".into(),
            topic: "orders".into(),
            system_attribute: SystemAttributes {
                born_timestamp_millis: 0,
                producer_group: "g".into(),
                message_id: "fixed-id".into(),
                born_host: "10.0.0.1".into(),
                partition_id: 0,
                delay_level: None,
                delivery_timestamp_millis: None,
                body_encoding: BodyEncoding::Identity,
                message_type: MessageType::Normal,
                trace_context: None,
            },
            user_attribute: UserAttributes::new(),
            body: vec![1, 2, 3],
        };
        let retried = request.with_partition_id(2);
        assert_eq!(retried.system_attribute.message_id, "fixed-id");
        assert_eq!(retried.system_attribute.partition_id, 2);
        assert_eq!(retried.body, request.body);
    }
}
