use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use mq_core::{
    ClientConfig, Credentials, Endpoints, Message, Partition, SendMessageRequest, SendResult,
    StaticCredentialsProvider, TopicRouteData,
};
use mq_producer::{producer, ClientInstanceRegistry};
use mq_transport::{Metadata, Transport, TransportError};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "mq", about = "Producer client operator CLI", version)]
struct Cli {
    #[arg(long, default_value = "arn:local:mq:cn-hangzhou:demo")]
    arn: String,

    #[arg(long, default_value = "demo-group")]
    group: String,

    #[arg(long, default_value = "cn-hangzhou")]
    region: String,

    #[arg(long, default_value = "mq")]
    service: String,

    #[arg(long)]
    access_key: Option<String>,

    #[arg(long)]
    access_secret: Option<String>,

    #[arg(long)]
    session_token: Option<String>,

    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    #[arg(long, default_value_t = 3_000)]
    io_timeout_ms: u64,

    #[arg(long, default_value_t = 10_000)]
    send_timeout_ms: u64,

    #[arg(long, default_value_t = 5)]
    compression_level: u32,

    #[arg(long)]
    tracing: bool,

    /// Candidate broker endpoints for the topic, `host:port`. Repeat for a
    /// multi-partition route. Defaults to a single loopback partition when
    /// none are given.
    #[arg(long = "broker")]
    brokers: Vec<String>,

    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send and block until the broker acknowledges (or the send fails).
    Send(SendArgs),
    /// Send in the background, printing the result once the callback fires.
    SendAsync(SendArgs),
    /// Fire and forget; does not wait for, or report, the outcome.
    SendOneway(SendArgs),
}

#[derive(clap::Args, Debug)]
struct SendArgs {
    #[arg(long)]
    topic: String,

    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    #[arg(long, conflicts_with = "body")]
    body_file: Option<String>,

    #[arg(long)]
    tag: Option<String>,

    #[arg(long = "key")]
    keys: Vec<String>,

    /// Repeatable `key=value` user attribute.
    #[arg(long = "attr")]
    attributes: Vec<String>,

    #[arg(long, conflicts_with = "delivery_timestamp_millis")]
    delay_level: Option<u8>,

    #[arg(long, conflicts_with = "delay_level")]
    delivery_timestamp_millis: Option<i64>,
}

/// A non-networked stand-in for the wire transport — the actual RPC codec is
/// out of scope for this client; see `mq-transport::Transport`'s doc
/// comment. Reports every send as successful against whichever brokers the
/// route carries, so the CLI can exercise the full producer pipeline
/// without a broker.
struct LoopbackTransport {
    route: TopicRouteData,
}

impl LoopbackTransport {
    fn new(brokers: &[String]) -> Self {
        let partitions = if brokers.is_empty() {
            vec![Partition::new(0, Endpoints::single("127.0.0.1:9876"), "loopback-0")]
        } else {
            brokers
                .iter()
                .enumerate()
                .map(|(id, address)| {
                    Partition::new(id as i32, Endpoints::single(address.clone()), format!("broker-{id}"))
                })
                .collect()
        };
        Self { route: TopicRouteData::new(partitions) }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send_message(
        &self,
        target: &Endpoints,
        _metadata: &Metadata,
        request: &SendMessageRequest,
        _timeout: Duration,
    ) -> Result<SendResult, TransportError> {
        log::info!(
            "loopback send: topic={} partition={} target={:?} bytes={}",
            request.topic,
            request.system_attribute.partition_id,
            target.primary(),
            request.body.len()
        );
        Ok(SendResult {
            message_id: request.system_attribute.message_id.clone(),
            partition_id: request.system_attribute.partition_id,
            queue_offset: Some(0),
            transaction_id: None,
        })
    }

    async fn query_route(
        &self,
        _topic: &str,
        _metadata: &Metadata,
        _timeout: Duration,
    ) -> Result<TopicRouteData, TransportError> {
        Ok(self.route.clone())
    }

    async fn end_transaction(
        &self,
        _target: &Endpoints,
        _metadata: &Metadata,
        _message_id: &str,
        _transaction_id: &str,
        _commit: bool,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn heartbeat(
        &self,
        _target: &Endpoints,
        _metadata: &Metadata,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(value) => {
            emit(&cli, &value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli) -> Result<serde_json::Value, mq_core::ClientError> {
    let config = build_config(cli);
    let credentials = build_credentials(cli);
    let brokers = cli.brokers.clone();

    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config, credentials, move || {
        Arc::new(LoopbackTransport::new(&brokers)) as Arc<dyn Transport>
    });
    p.start();

    let result = match &cli.command {
        Command::Send(args) => {
            let message = build_message(args)?;
            let timeout = Duration::from_millis(cli.send_timeout_ms);
            let result = p.send(&message, timeout).await?;
            json!({ "mode": "send", "result": send_result_json(&result) })
        }
        Command::SendAsync(args) => {
            let message = build_message(args)?;
            let timeout = Duration::from_millis(cli.send_timeout_ms);
            let (tx, rx) = tokio::sync::oneshot::channel();
            p.send_async(message, timeout, move |result| {
                let _ = tx.send(result);
            });
            let result = rx.await.map_err(|_| mq_core::ClientError::Unsupported {
                operation: "send-async callback dropped before firing",
            })??;
            json!({ "mode": "send-async", "result": send_result_json(&result) })
        }
        Command::SendOneway(args) => {
            let message = build_message(args)?;
            p.send_oneway(message);
            // Give the spawned task a moment to reach the wire before the
            // process exits; sendOneway itself never reports an outcome.
            tokio::time::sleep(Duration::from_millis(50)).await;
            json!({ "mode": "send-oneway", "result": "dispatched, outcome not reported" })
        }
    };

    p.shutdown().await;
    Ok(result)
}

fn build_config(cli: &Cli) -> ClientConfig {
    ClientConfig::new(cli.arn.clone(), cli.group.clone())
        .with_region(cli.region.clone(), cli.service.clone())
        .with_max_attempt_times(cli.max_attempts)
        .with_io_timeout_millis(cli.io_timeout_ms)
}

fn build_credentials(cli: &Cli) -> Option<Arc<dyn mq_core::CredentialsProvider>> {
    let access_key = cli.access_key.clone()?;
    let access_secret = cli.access_secret.clone()?;
    Some(Arc::new(StaticCredentialsProvider::new(Credentials {
        access_key,
        access_secret,
        session_token: cli.session_token.clone(),
    })))
}

fn build_message(args: &SendArgs) -> Result<Message, mq_core::ClientError> {
    let body = match (&args.body, &args.body_file) {
        (Some(body), None) => body.clone().into_bytes(),
        (None, Some(path)) => std::fs::read(path).map_err(|err| {
            mq_core::ClientError::signing_failure(format!("failed to read --body-file: {err}"), err)
        })?,
        (None, None) => Vec::new(),
        (Some(_), Some(_)) => unreachable!("clap enforces mutual exclusion"),
    };

    let mut builder = Message::builder(args.topic.clone(), body);
    if let Some(tag) = &args.tag {
        builder = builder.with_tag(tag.clone());
    }
    for key in &args.keys {
        builder = builder.with_key(key.clone());
    }
    for attribute in &args.attributes {
        let (key, value) = attribute.split_once('=').ok_or_else(|| mq_core::ClientError::Unsupported {
            operation: "malformed --attr; expected key=value",
        })?;
        builder = builder.with_user_attribute(key, value);
    }
    if let Some(level) = args.delay_level {
        builder = builder.with_delay_level(level);
    }
    if let Some(timestamp) = args.delivery_timestamp_millis {
        builder = builder.with_delivery_timestamp_millis(timestamp);
    }

    Ok(builder.build())
}

fn send_result_json(result: &SendResult) -> serde_json::Value {
    json!({
        "message_id": result.message_id,
        "partition_id": result.partition_id,
        "queue_offset": result.queue_offset,
        "transaction_id": result.transaction_id,
    })
}

fn emit(cli: &Cli, value: &serde_json::Value) {
    if cli.json {
        match serde_json::to_string_pretty(value) {
            Ok(serialized) => println!("{serialized}"),
            Err(err) => eprintln!("failed to serialize output: {err}"),
        }
        return;
    }

    if let Some(result) = value.get("result") {
        println!("{}: {}", value["mode"].as_str().unwrap_or("send"), result);
    } else {
        println!("{value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("cli args should parse")
    }

    #[test]
    fn send_requires_topic() {
        let err = Cli::try_parse_from(["mq", "send", "--body", "hi"]).unwrap_err();
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn body_and_body_file_are_mutually_exclusive() {
        let err = Cli::try_parse_from([
            "mq", "send", "--topic", "orders", "--body", "a", "--body-file", "x.bin",
        ])
        .unwrap_err();
        assert!(err.to_string().to_lowercase().contains("cannot be used"));
    }

    #[test]
    fn malformed_attribute_is_rejected() {
        let cli = parse(&["mq", "send", "--topic", "orders", "--attr", "no-equals-sign"]);
        let Command::Send(args) = &cli.command else { unreachable!() };
        let err = build_message(args).unwrap_err();
        assert!(matches!(err, mq_core::ClientError::Unsupported { .. }));
    }

    #[test]
    fn delay_level_and_delivery_timestamp_are_mutually_exclusive() {
        let err = Cli::try_parse_from([
            "mq",
            "send",
            "--topic",
            "orders",
            "--delay-level",
            "1",
            "--delivery-timestamp-millis",
            "123",
        ])
        .unwrap_err();
        assert!(err.to_string().to_lowercase().contains("cannot be used"));
    }

    #[test]
    fn credentials_require_both_key_and_secret() {
        let cli = parse(&["mq", "--access-key", "ak", "send", "--topic", "orders"]);
        assert!(build_credentials(&cli).is_none());
    }

    #[test]
    fn loopback_transport_defaults_to_one_partition() {
        let transport = LoopbackTransport::new(&[]);
        assert_eq!(transport.route.partitions().len(), 1);
    }

    #[test]
    fn loopback_transport_honors_explicit_brokers() {
        let transport = LoopbackTransport::new(&["10.0.0.1:9000".into(), "10.0.0.2:9000".into()]);
        assert_eq!(transport.route.partitions().len(), 2);
    }
}
