//! SQS protocol tests against a mock HTTP server.

use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mozaika_core::MessageQueue;
use mozaika_ingest::{SqsConfig, SqsQueue};

fn config(queue_url: String) -> SqsConfig {
    SqsConfig {
        queue_url,
        region: "us-east-1".to_string(),
        endpoint_url: None,
        wait_time_secs: 0,
        visibility_timeout_secs: 300,
    }
}

#[tokio::test]
async fn receive_parses_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSQS.ReceiveMessage"))
        .and(body_partial_json(serde_json::json!({
            "MaxNumberOfMessages": 2,
            "VisibilityTimeout": 300,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Messages": [
                {
                    "MessageId": "m-1",
                    "ReceiptHandle": "rh-1",
                    "Body": "{\"external_id\":\"1\",\"text\":\"hello\"}"
                },
                {
                    "MessageId": "m-2",
                    "ReceiptHandle": "rh-2",
                    "Body": "{\"external_id\":\"2\",\"text\":\"world\"}"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let queue = SqsQueue::new(config(server.uri()));
    let messages = queue.receive(2).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].receipt_handle, "rh-1");
    assert!(messages[1].body.contains("world"));
}

#[tokio::test]
async fn receive_clamps_batch_size_to_sqs_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "MaxNumberOfMessages": 10,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let queue = SqsQueue::new(config(server.uri()));
    let messages = queue.receive(25).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn receive_handles_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let queue = SqsQueue::new(config(server.uri()));
    let messages = queue.receive(10).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn receive_reports_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("AccessDeniedException"),
        )
        .mount(&server)
        .await;

    let queue = SqsQueue::new(config(server.uri()));
    let err = queue.receive(10).await.unwrap_err();
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn delete_batch_sends_numbered_entries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSQS.DeleteMessageBatch"))
        .and(body_partial_json(serde_json::json!({
            "Entries": [
                { "Id": "0", "ReceiptHandle": "rh-1" },
                { "Id": "1", "ReceiptHandle": "rh-2" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Successful": [{ "Id": "0" }, { "Id": "1" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let queue = SqsQueue::new(config(server.uri()));
    queue
        .delete_batch(&["rh-1".to_string(), "rh-2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_batch_skips_request_for_empty_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let queue = SqsQueue::new(config(server.uri()));
    queue.delete_batch(&[]).await.unwrap();
}

#[tokio::test]
async fn delete_batch_tolerates_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Successful": [{ "Id": "0" }],
            "Failed": [{ "Id": "1", "Message": "ReceiptHandleIsInvalid" }]
        })))
        .mount(&server)
        .await;

    let queue = SqsQueue::new(config(server.uri()));
    // Failed entries redeliver via the visibility timeout, so no error.
    queue
        .delete_batch(&["rh-1".to_string(), "rh-2".to_string()])
        .await
        .unwrap();
}
