use std::collections::BTreeMap;

/// User-supplied `string -> string` attributes. `BTreeMap` over `HashMap` so
/// that building and re-serializing a request is deterministic, not because
/// ordering is semantically required.
pub type UserAttributes = BTreeMap<String, String>;

/// Well-known user-attribute key signalling a transaction-prepared message.
/// Presence with a truthy value selects `MessageType::Transaction`.
pub const TRANSACTION_PREPARED_ATTRIBUTE: &str = "__TRANSACTION_PREPARED__";

/// At most one of delay level or an absolute delivery timestamp may be set.
/// Delay level takes precedence if both would otherwise apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryPolicy {
    Immediate,
    DelayLevel(u8),
    DeliveryTimestampMillis(i64),
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy::Immediate
    }
}

/// A user-level message handed to the send pipeline. Immutable once built:
/// there is no setter surface, only `MessageBuilder`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    topic: String,
    body: Vec<u8>,
    tag: Option<String>,
    keys: Vec<String>,
    user_attributes: UserAttributes,
    delivery: DeliveryPolicyKey,
}

/// `DeliveryPolicy` isn't `Eq` (no float fields, actually it is, but kept as
/// a distinct type to avoid leaking the enum's constructors into equality
/// semantics callers might rely on).
type DeliveryPolicyKey = DeliveryPolicy;

impl Message {
    pub fn builder(topic: impl Into<String>, body: impl Into<Vec<u8>>) -> MessageBuilder {
        MessageBuilder::new(topic, body)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn user_attributes(&self) -> &UserAttributes {
        &self.user_attributes
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        self.delivery
    }

    pub fn is_transaction_prepared(&self) -> bool {
        self.user_attributes
            .get(TRANSACTION_PREPARED_ATTRIBUTE)
            .is_some_and(|value| value == "true" || value == "1")
    }
}

/// Fluent `with_x` builder; `Message` itself stays immutable once built.
#[derive(Clone, Debug, Default)]
pub struct MessageBuilder {
    topic: String,
    body: Vec<u8>,
    tag: Option<String>,
    keys: Vec<String>,
    user_attributes: UserAttributes,
    delivery: DeliveryPolicy,
}

impl MessageBuilder {
    pub fn new(topic: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { topic: topic.into(), body: body.into(), ..Default::default() }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn with_user_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_attributes.insert(key.into(), value.into());
        self
    }

    /// Delay level takes precedence over a delivery timestamp if both are
    /// set; calling this after `with_delivery_timestamp_millis`
    /// simply overwrites the policy, matching "at most one set" rather than
    /// silently combining them.
    pub fn with_delay_level(mut self, level: u8) -> Self {
        self.delivery = DeliveryPolicy::DelayLevel(level);
        self
    }

    pub fn with_delivery_timestamp_millis(mut self, timestamp_millis: i64) -> Self {
        self.delivery = DeliveryPolicy::DeliveryTimestampMillis(timestamp_millis);
        self
    }

    pub fn with_transaction_prepared(mut self, prepared: bool) -> Self {
        self.user_attributes
            .insert(TRANSACTION_PREPARED_ATTRIBUTE.to_string(), prepared.to_string());
        self
    }

    pub fn build(self) -> Message {
        Message {
            topic: self.topic,
            body: self.body,
            tag: self.tag,
            keys: self.keys,
            user_attributes: self.user_attributes,
            delivery: self.delivery,
        }
    }
}
