//! Queue implementations.
//!
//! `SqsQueue` speaks the SQS JSON protocol over plain HTTP, which is what
//! LocalStack and ElasticMQ accept. `InMemoryQueue` backs the consumer
//! tests with the same lease/delete semantics.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mozaika_core::{Error, MessageQueue, ReceivedMessage, Result, Settings};

/// Connection settings for an SQS-compatible queue.
#[derive(Debug, Clone)]
pub struct SqsConfig {
    pub queue_url: String,
    pub region: String,
    /// Override endpoint for LocalStack / ElasticMQ. When absent,
    /// requests go to the queue URL itself.
    pub endpoint_url: Option<String>,
    /// Long-poll wait passed to ReceiveMessage.
    pub wait_time_secs: u64,
    /// Lease duration; undeleted messages reappear after this.
    pub visibility_timeout_secs: u64,
}

impl SqsConfig {
    /// Build the queue config from application settings.
    ///
    /// Returns `None` when no queue URL is configured (API-only mode).
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings.sqs_queue_url.as_ref().map(|url| Self {
            queue_url: url.clone(),
            region: settings.aws_region.clone(),
            endpoint_url: settings.aws_endpoint_url.clone(),
            wait_time_secs: settings.queue_poll_wait_secs,
            visibility_timeout_secs: settings.queue_visibility_timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct ReceiveMessageRequest<'a> {
    #[serde(rename = "QueueUrl")]
    queue_url: &'a str,
    #[serde(rename = "MaxNumberOfMessages")]
    max_number_of_messages: usize,
    #[serde(rename = "WaitTimeSeconds")]
    wait_time_seconds: u64,
    #[serde(rename = "VisibilityTimeout")]
    visibility_timeout: u64,
}

#[derive(Deserialize)]
struct ReceiveMessageResponse {
    #[serde(rename = "Messages", default)]
    messages: Vec<SqsMessage>,
}

#[derive(Deserialize)]
struct SqsMessage {
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: String,
    #[serde(rename = "Body")]
    body: String,
}

#[derive(Serialize)]
struct DeleteMessageBatchRequest<'a> {
    #[serde(rename = "QueueUrl")]
    queue_url: &'a str,
    #[serde(rename = "Entries")]
    entries: Vec<DeleteEntry<'a>>,
}

#[derive(Serialize)]
struct DeleteEntry<'a> {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: &'a str,
}

#[derive(Deserialize)]
struct DeleteMessageBatchResponse {
    #[serde(rename = "Failed", default)]
    failed: Vec<BatchResultError>,
}

#[derive(Deserialize)]
struct BatchResultError {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// SQS-compatible queue client.
///
/// Requests are unsigned; point `endpoint_url` at LocalStack or ElasticMQ,
/// or put a signing proxy in front for real AWS.
pub struct SqsQueue {
    client: reqwest::Client,
    config: SqsConfig,
}

impl SqsQueue {
    pub fn new(config: SqsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> &str {
        self.config
            .endpoint_url
            .as_deref()
            .unwrap_or(&self.config.queue_url)
    }

    async fn call<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        target: &str,
        request: &Req,
    ) -> Result<Resp> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/x-amz-json-1.0")
            .header("X-Amz-Target", target)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Queue(format!(
                "{} failed with status {}: {}",
                target, status, body
            )));
        }

        // ElasticMQ answers an empty body when there is nothing to say.
        let body = response.text().await?;
        if body.trim().is_empty() {
            return serde_json::from_str("{}")
                .map_err(|e| Error::Queue(format!("{} returned no body: {}", target, e)));
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::Queue(format!("{} returned a malformed body: {}", target, e)))
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>> {
        let request = ReceiveMessageRequest {
            queue_url: &self.config.queue_url,
            max_number_of_messages: max_messages.clamp(1, 10),
            wait_time_seconds: self.config.wait_time_secs,
            visibility_timeout: self.config.visibility_timeout_secs,
        };
        let response: ReceiveMessageResponse =
            self.call("AmazonSQS.ReceiveMessage", &request).await?;

        debug!(
            subsystem = "ingest",
            component = "queue",
            op = "receive",
            result_count = response.messages.len(),
            "Messages received"
        );
        Ok(response
            .messages
            .into_iter()
            .map(|m| ReceivedMessage {
                receipt_handle: m.receipt_handle,
                body: m.body,
            })
            .collect())
    }

    async fn delete_batch(&self, receipt_handles: &[String]) -> Result<()> {
        if receipt_handles.is_empty() {
            return Ok(());
        }

        let request = DeleteMessageBatchRequest {
            queue_url: &self.config.queue_url,
            entries: receipt_handles
                .iter()
                .enumerate()
                .map(|(i, handle)| DeleteEntry {
                    id: i.to_string(),
                    receipt_handle: handle,
                })
                .collect(),
        };
        let response: DeleteMessageBatchResponse =
            self.call("AmazonSQS.DeleteMessageBatch", &request).await?;

        // Failed deletes are not fatal: the messages reappear after the
        // visibility timeout and the pipeline is idempotent.
        for failure in &response.failed {
            warn!(
                subsystem = "ingest",
                component = "queue",
                op = "delete_batch",
                entry_id = %failure.id,
                error_msg = %failure.message,
                "Message delete failed"
            );
        }
        Ok(())
    }
}

/// In-process queue with the same lease semantics as SQS.
///
/// Received messages move to an in-flight set and stay invisible until
/// either deleted or put back with [`InMemoryQueue::redeliver_inflight`].
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<String>,
    inflight: HashMap<String, String>,
    next_handle: u64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw message body.
    pub fn push(&self, body: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.ready.push_back(body.into());
    }

    /// Simulate visibility-timeout expiry: every in-flight message goes
    /// back to the front of the queue.
    pub fn redeliver_inflight(&self) {
        let mut state = self.state.lock().unwrap();
        let bodies: Vec<String> = state.inflight.drain().map(|(_, body)| body).collect();
        for body in bodies {
            state.ready.push_front(body);
        }
    }

    pub fn ready_len(&self) -> usize {
        self.state.lock().unwrap().ready.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.state.lock().unwrap().inflight.len()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>> {
        let mut state = self.state.lock().unwrap();
        let mut messages = Vec::new();
        while messages.len() < max_messages {
            let Some(body) = state.ready.pop_front() else {
                break;
            };
            state.next_handle += 1;
            let receipt_handle = format!("handle-{}", state.next_handle);
            state.inflight.insert(receipt_handle.clone(), body.clone());
            messages.push(ReceivedMessage {
                receipt_handle,
                body,
            });
        }
        Ok(messages)
    }

    async fn delete_batch(&self, receipt_handles: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for handle in receipt_handles {
            state.inflight.remove(handle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_queue_leases_and_deletes() {
        let queue = InMemoryQueue::new();
        queue.push("a");
        queue.push("b");
        queue.push("c");

        let batch = queue.receive(2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.ready_len(), 1);
        assert_eq!(queue.inflight_len(), 2);

        queue
            .delete_batch(&[batch[0].receipt_handle.clone()])
            .await
            .unwrap();
        assert_eq!(queue.inflight_len(), 1);

        queue.redeliver_inflight();
        assert_eq!(queue.inflight_len(), 0);
        assert_eq!(queue.ready_len(), 2);
    }

    #[tokio::test]
    async fn in_memory_queue_returns_empty_batch_when_drained() {
        let queue = InMemoryQueue::new();
        assert!(queue.receive(10).await.unwrap().is_empty());
    }
}
