use serde::{Deserialize, Serialize};

/// Access key / secret / optional session token, as handed out by a
/// `CredentialsProvider`. Absence of a provider, or blank keys,
/// is not an error: the signer simply emits unsigned metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub access_secret: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn is_usable(&self) -> bool {
        !self.access_key.is_empty() && !self.access_secret.is_empty()
    }
}

/// Credential provider implementations are external collaborators; this
/// crate only defines the seam.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Credentials;
}

/// The simplest possible provider: fixed credentials handed in at
/// construction. Good enough for tests and for callers who manage rotation
/// themselves.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentialsProvider(Credentials);

impl StaticCredentialsProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl CredentialsProvider for StaticCredentialsProvider {
    fn credentials(&self) -> Credentials {
        self.0.clone()
    }
}

/// The recognized configuration surface. Not a file format — out
/// of scope — just a plain struct a host can build however it
/// likes, including via `serde` from whatever format it already uses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Authentication/tenant realm identifier; the key for the Client
    /// Instance Registry (C7).
    pub arn: String,
    pub group: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub region_id: String,
    pub service_name: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default = "default_io_timeout_millis")]
    pub io_timeout_millis: u64,
    #[serde(default = "default_send_message_timeout_millis")]
    pub send_message_timeout_millis: u64,
    #[serde(default = "default_max_attempt_times")]
    pub max_attempt_times: u32,
    #[serde(default = "default_message_compression_level")]
    pub message_compression_level: u32,
    #[serde(default)]
    pub message_tracing_enabled: bool,
}

fn default_io_timeout_millis() -> u64 {
    3_000
}

fn default_send_message_timeout_millis() -> u64 {
    10_000
}

fn default_max_attempt_times() -> u32 {
    3
}

fn default_message_compression_level() -> u32 {
    5
}

impl ClientConfig {
    pub fn new(arn: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            group: group.into(),
            namespace: None,
            region_id: String::new(),
            service_name: String::new(),
            tenant_id: None,
            io_timeout_millis: default_io_timeout_millis(),
            send_message_timeout_millis: default_send_message_timeout_millis(),
            max_attempt_times: default_max_attempt_times(),
            message_compression_level: default_message_compression_level(),
            message_tracing_enabled: false,
        }
    }

    pub fn with_region(mut self, region_id: impl Into<String>, service_name: impl Into<String>) -> Self {
        self.region_id = region_id.into();
        self.service_name = service_name.into();
        self
    }

    pub fn with_max_attempt_times(mut self, max_attempt_times: u32) -> Self {
        self.max_attempt_times = max_attempt_times.max(1);
        self
    }

    pub fn with_io_timeout_millis(mut self, io_timeout_millis: u64) -> Self {
        self.io_timeout_millis = io_timeout_millis;
        self
    }
}
