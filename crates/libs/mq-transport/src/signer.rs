use std::collections::BTreeMap;
use std::time::SystemTime;

use hmac::{Hmac, Mac};
use mq_core::{ClientConfig, ClientError, Credentials};
use sha1::Sha1;
use time::format_description::FormatItem;
use time::OffsetDateTime;

/// Wire-protocol quirk: the broker identifies client language by this exact
/// string. Preserved literally for interoperability; substitute
/// only in coordination with the broker side.
const LANGUAGE_KEY: &str = "JAVA";
const PROTOCOL_VERSION: &str = "2.0.0";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const HEADER_TENANT_ID: &str = "x-mq-tenant-id";
const HEADER_NAMESPACE: &str = "x-mq-namespace";
const HEADER_LANGUAGE: &str = "x-mq-language";
const HEADER_PROTOCOL_VERSION: &str = "x-mq-protocol-version";
const HEADER_CLIENT_VERSION: &str = "x-mq-client-version";
const HEADER_REQUEST_ID: &str = "x-mq-request-id";
const HEADER_DATE_TIME: &str = "x-mq-date-time";
const HEADER_SESSION_TOKEN: &str = "x-mq-session-token";
const HEADER_AUTHORIZATION: &str = "authorization";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = time::macros::format_description!(
    "[year][month][day]T[hour][minute][second]Z"
);

/// Request metadata: a header-name to header-value mapping. `BTreeMap` so
/// that two calls with identical inputs produce byte-identical iteration
/// order: metadata produced by `sign()` is deterministic byte-for-byte.
pub type Metadata = BTreeMap<String, String>;

/// Builds per-request authentication metadata from config, credentials, and
/// clock (C1). Stateless: every call is independent.
#[derive(Debug, Default)]
pub struct Signer;

impl Signer {
    pub fn new() -> Self {
        Self
    }

    /// `request_id` is supplied by the caller rather than generated here so
    /// that `sign()` itself stays a pure function of its inputs; the send
    /// pipeline (C6) is responsible for minting a fresh id per attempt.
    pub fn sign(
        &self,
        config: &ClientConfig,
        credentials: Option<&Credentials>,
        now: SystemTime,
        request_id: &str,
    ) -> Result<Metadata, ClientError> {
        let timestamp = format_timestamp(now)?;

        let mut metadata = Metadata::new();
        if let Some(tenant_id) = &config.tenant_id {
            metadata.insert(HEADER_TENANT_ID.to_string(), tenant_id.clone());
        }
        if let Some(namespace) = &config.namespace {
            metadata.insert(HEADER_NAMESPACE.to_string(), namespace.clone());
        }
        metadata.insert(HEADER_LANGUAGE.to_string(), LANGUAGE_KEY.to_string());
        metadata.insert(HEADER_PROTOCOL_VERSION.to_string(), PROTOCOL_VERSION.to_string());
        metadata.insert(HEADER_CLIENT_VERSION.to_string(), CLIENT_VERSION.to_string());
        metadata.insert(HEADER_REQUEST_ID.to_string(), request_id.to_string());
        metadata.insert(HEADER_DATE_TIME.to_string(), timestamp.clone());

        if let Some(credentials) = credentials.filter(|c| c.is_usable()) {
            if let Some(session_token) = &credentials.session_token {
                metadata.insert(HEADER_SESSION_TOKEN.to_string(), session_token.clone());
            }
            let signature = sign_timestamp(&timestamp, &credentials.access_secret)?;
            let authorization = format!(
                "MQv2-HMAC-SHA1 Credential={}/{}/{}, SignedHeaders={}, Signature={}",
                credentials.access_key, config.region_id, config.service_name, HEADER_DATE_TIME, signature
            );
            metadata.insert(HEADER_AUTHORIZATION.to_string(), authorization);
        }

        Ok(metadata)
    }
}

fn format_timestamp(now: SystemTime) -> Result<String, ClientError> {
    let datetime: OffsetDateTime = now.into();
    datetime
        .to_offset(time::UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map_err(|err| ClientError::signing_failure("failed to format timestamp", err))
}

fn sign_timestamp(timestamp: &str, access_secret: &str) -> Result<String, ClientError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(access_secret.as_bytes())
        .map_err(|err| ClientError::signing_failure("invalid HMAC key length", err))?;
    mac.update(timestamp.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fixed_clock() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn unsigned_when_no_credentials() {
        let config = ClientConfig::new("arn:test", "group").with_region("cn-hangzhou", "mq");
        let metadata = Signer::new().sign(&config, None, fixed_clock(), "req-1").unwrap();
        assert!(!metadata.contains_key(HEADER_AUTHORIZATION));
        assert_eq!(metadata.get(HEADER_LANGUAGE).unwrap(), LANGUAGE_KEY);
    }

    #[test]
    fn unsigned_when_credentials_blank() {
        let config = ClientConfig::new("arn:test", "group");
        let credentials = Credentials::default();
        let metadata = Signer::new().sign(&config, Some(&credentials), fixed_clock(), "req-1").unwrap();
        assert!(!metadata.contains_key(HEADER_AUTHORIZATION));
    }

    #[test]
    fn authorization_header_has_exact_shape() {
        let config = ClientConfig::new("arn:test", "group").with_region("cn-hangzhou", "mq");
        let credentials = Credentials {
            access_key: "AK".into(),
            access_secret: "SECRET".into(),
            session_token: None,
        };
        let metadata = Signer::new().sign(&config, Some(&credentials), fixed_clock(), "req-1").unwrap();
        let authorization = metadata.get(HEADER_AUTHORIZATION).unwrap();
        assert!(authorization.starts_with("MQv2-HMAC-SHA1 Credential=AK/cn-hangzhou/mq, SignedHeaders=x-mq-date-time, Signature="));
    }

    #[test]
    fn sign_is_deterministic_for_fixed_inputs() {
        let config = ClientConfig::new("arn:test", "group").with_region("cn-hangzhou", "mq");
        let credentials = Credentials {
            access_key: "AK".into(),
            access_secret: "SECRET".into(),
            session_token: None,
        };
        let signer = Signer::new();
        let first = signer.sign(&config, Some(&credentials), fixed_clock(), "req-1").unwrap();
        let second = signer.sign(&config, Some(&credentials), fixed_clock(), "req-1").unwrap();
        assert_eq!(first, second);
    }
}
