use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mq_core::{ClientConfig, ClientError, Endpoints, Message, Partition, SendMessageRequest, SendResult, TopicRouteData};
use mq_producer::{producer, ClientInstanceRegistry};
use mq_transport::{Metadata, Transport, TransportError};
use test_support::MockTransport;

fn three_partition_route() -> TopicRouteData {
    TopicRouteData::new(vec![
        Partition::new(0, Endpoints::single("10.0.0.1:9000"), "broker-0"),
        Partition::new(1, Endpoints::single("10.0.0.2:9000"), "broker-1"),
        Partition::new(2, Endpoints::single("10.0.0.3:9000"), "broker-2"),
    ])
}

fn config() -> ClientConfig {
    ClientConfig::new("arn:test", "group").with_region("cn-hangzhou", "mq").with_max_attempt_times(3)
}

#[tokio::test]
async fn first_attempt_success_yields_exactly_one_rpc() {
    let transport = Arc::new(MockTransport::new().with_route("orders", three_partition_route()));
    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || transport.clone());
    p.start();

    let message = Message::builder("orders", b"payload".to_vec()).build();
    let result = p.send(&message, Duration::from_millis(5000)).await.unwrap();
    assert_eq!(transport.send_log().len(), 1);
    assert!((0..3).contains(&result.partition_id));
}

#[tokio::test]
async fn three_broker_rejections_exhaust_attempts_and_rotate_partitions() {
    let transport = Arc::new(
        MockTransport::new()
            .with_route("orders", three_partition_route())
            .with_send_result(
                "10.0.0.1:9000",
                Err(TransportError::BrokerRejected { code: "INTERNAL_ERROR".into(), message: "boom".into() }),
            )
            .with_send_result(
                "10.0.0.2:9000",
                Err(TransportError::BrokerRejected { code: "INTERNAL_ERROR".into(), message: "boom".into() }),
            )
            .with_send_result(
                "10.0.0.3:9000",
                Err(TransportError::BrokerRejected { code: "INTERNAL_ERROR".into(), message: "boom".into() }),
            ),
    );
    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || transport.clone());
    p.start();

    let message = Message::builder("orders", b"payload".to_vec()).build();
    let err = p.send(&message, Duration::from_millis(5000)).await.unwrap_err();
    assert!(matches!(err, ClientError::BrokerRejected { attempt: 2, .. }));

    let log = transport.send_log();
    assert_eq!(log.len(), 3);
    let mut partition_ids: Vec<_> = log.iter().map(|entry| entry.partition_id).collect();
    partition_ids.sort();
    assert_eq!(partition_ids, vec![0, 1, 2], "each partition should be attempted exactly once");
}

#[tokio::test]
async fn all_isolated_endpoints_still_get_a_best_effort_attempt() {
    let io_error = || TransportError::Io { target: "broker".into(), message: "connection reset".into() };
    let transport = Arc::new(
        MockTransport::new()
            .with_route("orders", three_partition_route())
            .with_send_result("10.0.0.1:9000", Err(io_error()))
            .with_send_result("10.0.0.2:9000", Err(io_error()))
            .with_send_result("10.0.0.3:9000", Err(io_error())),
    );
    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || transport.clone());
    p.start();

    // Every partition's endpoint fails once, isolating all three (I/O
    // failures isolate; broker rejections don't — see send.rs).
    let message = Message::builder("orders", b"payload".to_vec()).build();
    let first = p.send(&message, Duration::from_millis(5000)).await;
    assert!(first.is_err());

    // With every endpoint isolated, the selector must still hand back a
    // full candidate list rather than deadlock.
    let message = Message::builder("orders", b"payload".to_vec()).build();
    let second = p.send(&message, Duration::from_millis(5000)).await;
    assert!(second.is_ok(), "selector must not deadlock when every endpoint is isolated");
}

#[tokio::test]
async fn concurrent_sends_single_flight_the_route_fetch() {
    let transport = Arc::new(
        MockTransport::new().with_route_delay("orders", three_partition_route(), Duration::from_millis(50)),
    );
    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || transport.clone());
    p.start();

    let message_a = Message::builder("orders", b"a".to_vec()).build();
    let message_b = Message::builder("orders", b"b".to_vec()).build();
    let (a, b) = tokio::join!(
        p.send(&message_a, Duration::from_millis(5000)),
        p.send(&message_b, Duration::from_millis(5000)),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.route_call_count("orders"), 1);
}

#[tokio::test]
async fn sync_send_times_out_while_transport_hangs() {
    struct HangingTransport;

    #[async_trait]
    impl Transport for HangingTransport {
        async fn send_message(
            &self,
            _target: &Endpoints,
            _metadata: &Metadata,
            _request: &SendMessageRequest,
            _timeout: Duration,
        ) -> Result<SendResult, TransportError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            unreachable!("test timeout should fire first")
        }

        async fn query_route(
            &self,
            _topic: &str,
            _metadata: &Metadata,
            _timeout: Duration,
        ) -> Result<TopicRouteData, TransportError> {
            Ok(three_partition_route())
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

    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || Arc::new(HangingTransport));
    p.start();

    let message = Message::builder("orders", b"payload".to_vec()).build();
    let started = tokio::time::Instant::now();
    let result = p.send(&message, Duration::from_millis(100)).await;
    assert!(matches!(result, Err(ClientError::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn large_body_is_gzip_compressed_and_broker_receives_it() {
    let transport = Arc::new(MockTransport::new().with_route("orders", three_partition_route()));
    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || transport.clone());
    p.start();

    let body = vec![0u8; 8 * 1024 * 1024];
    let message = Message::builder("orders", body).build();
    let result = p.send(&message, Duration::from_millis(5000)).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn send_before_start_is_rejected() {
    let transport = Arc::new(MockTransport::new().with_route("orders", three_partition_route()));
    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || transport.clone());

    let message = Message::builder("orders", b"payload".to_vec()).build();
    let err = p.send(&message, Duration::from_millis(5000)).await.unwrap_err();
    assert!(matches!(err, ClientError::ProducerNotStarted));
}

#[tokio::test]
async fn send_after_shutdown_is_rejected() {
    let transport = Arc::new(MockTransport::new().with_route("orders", three_partition_route()));
    let registry = ClientInstanceRegistry::new();
    let p = producer(&registry, config(), None, || transport.clone());
    p.start();
    p.shutdown().await;

    let message = Message::builder("orders", b"payload".to_vec()).build();
    let err = p.send(&message, Duration::from_millis(5000)).await.unwrap_err();
    assert!(matches!(err, ClientError::ProducerNotStarted));
}
