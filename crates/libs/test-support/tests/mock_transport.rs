use std::time::Duration;

use mq_core::{Endpoints, Partition, SendMessageRequest, SystemAttributes, TopicRouteData};
use mq_core::{BodyEncoding, MessageType};
use mq_transport::{Metadata, Transport, TransportError};
use test_support::MockTransport;

fn request(partition_id: i32) -> SendMessageRequest {
    SendMessageRequest {
        arn: "arn:test".into(),
        topic: "orders".into(),
        system_attribute: SystemAttributes {
            born_timestamp_millis: 0,
            producer_group: "arn:test%group".into(),
            message_id: "fixed".into(),
            born_host: "127.0.0.1".into(),
            partition_id,
            delay_level: None,
            delivery_timestamp_millis: None,
            body_encoding: BodyEncoding::Identity,
            message_type: MessageType::Normal,
            trace_context: None,
        },
        user_attribute: Default::default(),
        body: vec![],
    }
}

#[tokio::test]
async fn unscripted_send_falls_back_to_a_generic_success() {
    let transport = MockTransport::new();
    let target = Endpoints::single("10.0.0.1:9000");
    let result = transport
        .send_message(&target, &Metadata::new(), &request(0), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(result.partition_id, 0);
    assert_eq!(result.message_id, "fixed");
}

#[tokio::test]
async fn scripted_send_results_are_consumed_in_order() {
    let transport = MockTransport::new()
        .with_send_result("10.0.0.1:9000", Err(TransportError::Io { target: "b0".into(), message: "x".into() }))
        .with_send_result(
            "10.0.0.1:9000",
            Ok(mq_core::SendResult {
                message_id: "fixed".into(),
                partition_id: 0,
                queue_offset: Some(7),
                transaction_id: None,
            }),
        );
    let target = Endpoints::single("10.0.0.1:9000");
    let first = transport.send_message(&target, &Metadata::new(), &request(0), Duration::from_secs(1)).await;
    assert!(first.is_err());
    let second =
        transport.send_message(&target, &Metadata::new(), &request(0), Duration::from_secs(1)).await.unwrap();
    assert_eq!(second.queue_offset, Some(7));
}

#[tokio::test]
async fn route_calls_are_counted_per_topic() {
    let route = TopicRouteData::new(vec![Partition::new(0, Endpoints::single("10.0.0.1:9000"), "b0")]);
    let transport = MockTransport::new().with_route("orders", route);
    assert_eq!(transport.route_call_count("orders"), 0);
    let _ = transport.query_route("orders", &Metadata::new(), Duration::from_secs(1)).await;
    assert_eq!(transport.route_call_count("orders"), 1);
}
