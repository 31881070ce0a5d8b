// tests/integration/protocol_errors_test.rs

//! Integration tests for framing and protocol errors. None of them may end
//! the connection.

use super::test_helpers::{TestServer, test_config};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_unknown_method_returns_method_not_found() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.request(5, "mining.bogus", json!([])).await;
    assert_eq!(
        client.recv().await,
        json!({"id": 5, "result": null, "error": [-32601, "Method not found", null]})
    );

    client.request(6, "mining.ping", json!([])).await;
    assert_eq!(client.recv().await["result"], "pong");
}

#[tokio::test]
async fn test_short_submit_returns_invalid_params() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client
        .request(3, "mining.submit", json!(["addr1.worker1", "job_000001", "00000001"]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 3, "result": null, "error": [-1, "Invalid params", null]})
    );
}

#[tokio::test]
async fn test_authorize_without_username_returns_invalid_params() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.request(2, "mining.authorize", json!([])).await;
    assert_eq!(client.recv().await["error"][0], json!(-1));
    assert!(server.handle.state().connections.sessions()[0].worker_name.is_empty());
}

#[tokio::test]
async fn test_non_array_params_return_invalid_params() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client
        .send_raw(b"{\"id\":5,\"method\":\"mining.submit\",\"params\":{\"worker\":\"w\"}}\n")
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 5, "result": null, "error": [-1, "Invalid params", null]})
    );

    client
        .send_raw(b"{\"id\":6,\"method\":\"mining.authorize\",\"params\":\"addr1.worker1\"}\n")
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 6, "result": null, "error": [-1, "Invalid params", null]})
    );
    assert!(!server.handle.state().connections.sessions()[0].authorized);

    client.request(7, "mining.ping", json!([])).await;
    assert_eq!(client.recv().await["result"], "pong");
}

#[tokio::test]
async fn test_malformed_json_is_ignored() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.send_raw(b"{not json at all\n").await;
    assert_eq!(client.try_recv(Duration::from_millis(200)).await, None);

    client.request(1, "mining.ping", json!([])).await;
    assert_eq!(
        client.recv().await,
        json!({"id": 1, "result": "pong", "error": null})
    );
}

#[tokio::test]
async fn test_blank_lines_and_crlf_are_tolerated() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client
        .send_raw(b"\r\n\n{\"id\":1,\"method\":\"mining.ping\",\"params\":[]}\r\n")
        .await;
    assert_eq!(client.recv().await["result"], "pong");
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    let mut batch = Vec::new();
    for id in 1..=3 {
        batch.extend_from_slice(
            format!("{{\"id\":{id},\"method\":\"mining.ping\",\"params\":[]}}\n").as_bytes(),
        );
    }
    client.send_raw(&batch).await;

    for id in 1..=3 {
        assert_eq!(client.recv().await["id"], json!(id));
    }
}

#[tokio::test]
async fn test_oversized_line_is_rejected_and_connection_survives() {
    let mut config = test_config();
    config.mining.max_request_size = 128;
    let server = TestServer::with_config(config).await;
    let mut client = server.connect().await;

    let mut line = vec![b'x'; 512];
    line.push(b'\n');
    client.send_raw(&line).await;
    assert_eq!(
        client.recv().await,
        json!({"id": null, "result": null, "error": [-32600, "Request too large", null]})
    );

    client.request(9, "mining.ping", json!([])).await;
    assert_eq!(
        client.recv().await,
        json!({"id": 9, "result": "pong", "error": null})
    );
}
