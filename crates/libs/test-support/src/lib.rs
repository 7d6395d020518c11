//! Scripted `Transport` double for exercising the send pipeline without a
//! real broker.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use mq_core::{Endpoints, SendMessageRequest, SendResult, TopicRouteData};
use mq_transport::{Metadata, Transport, TransportError};
use parking_lot::Mutex;

struct RouteScript {
    result: Result<TopicRouteData, TransportError>,
    delay: Duration,
}

/// One logged `send_message` call: the endpoint it targeted and the
/// partition id the request carried, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendLogEntry {
    pub target: String,
    pub partition_id: i32,
}

/// A scripted double for `Transport`. Route responses are queued per topic;
/// send responses are queued per target endpoint (since a send pipeline
/// retry targets a different endpoint each attempt). An exhausted queue
/// falls back to a generic success so tests only need to script the
/// outcomes they care about.
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<RouteScript>>>,
    sends: Mutex<HashMap<String, VecDeque<Result<SendResult, TransportError>>>>,
    route_calls: Mutex<HashMap<String, usize>>,
    send_log: Mutex<Vec<SendLogEntry>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            sends: Mutex::new(HashMap::new()),
            route_calls: Mutex::new(HashMap::new()),
            send_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_route(self, topic: impl Into<String>, route: TopicRouteData) -> Self {
        self.routes
            .lock()
            .entry(topic.into())
            .or_default()
            .push_back(RouteScript { result: Ok(route), delay: Duration::ZERO });
        self
    }

    pub fn with_route_delay(self, topic: impl Into<String>, route: TopicRouteData, delay: Duration) -> Self {
        self.routes
            .lock()
            .entry(topic.into())
            .or_default()
            .push_back(RouteScript { result: Ok(route), delay });
        self
    }

    pub fn with_send_result(
        self,
        target: impl Into<String>,
        result: Result<SendResult, TransportError>,
    ) -> Self {
        self.sends.lock().entry(target.into()).or_default().push_back(result);
        self
    }

    pub fn route_call_count(&self, topic: &str) -> usize {
        *self.route_calls.lock().get(topic).unwrap_or(&0)
    }

    pub fn send_log(&self) -> Vec<SendLogEntry> {
        self.send_log.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(
        &self,
        target: &Endpoints,
        _metadata: &Metadata,
        request: &SendMessageRequest,
        _timeout: Duration,
    ) -> Result<SendResult, TransportError> {
        let address = target.primary().unwrap_or_default().to_string();
        self.send_log.lock().push(SendLogEntry {
            target: address.clone(),
            partition_id: request.system_attribute.partition_id,
        });

        let scripted = self.sends.lock().get_mut(&address).and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| {
            Ok(SendResult {
                message_id: request.system_attribute.message_id.clone(),
                partition_id: request.system_attribute.partition_id,
                queue_offset: None,
                transaction_id: None,
            })
        })
    }

    async fn query_route(
        &self,
        topic: &str,
        _metadata: &Metadata,
        _timeout: Duration,
    ) -> Result<TopicRouteData, TransportError> {
        *self.route_calls.lock().entry(topic.to_string()).or_insert(0) += 1;
        let scripted = self.routes.lock().get_mut(topic).and_then(VecDeque::pop_front);
        match scripted {
            Some(RouteScript { result, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Err(TransportError::Io { target: topic.to_string(), message: "no route scripted".into() }),
        }
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
