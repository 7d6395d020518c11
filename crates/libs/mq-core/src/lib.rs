//! Data model, configuration surface, and error taxonomy shared by the
//! producer send pipeline. No transport, no protobuf codec: those are the
//! concern of `mq-transport` and the host binary respectively.

pub mod config;
pub mod error;
pub mod message;
pub mod partition;
pub mod wire;

pub use config::{ClientConfig, Credentials, CredentialsProvider, StaticCredentialsProvider};
pub use error::ClientError;
pub use message::{Message, MessageBuilder, UserAttributes};
pub use partition::{Endpoints, Partition, PartitionId, TopicRouteData};
pub use wire::{BodyEncoding, MessageType, SendMessageRequest, SendResult, SystemAttributes};
