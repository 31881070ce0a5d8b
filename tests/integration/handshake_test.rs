// tests/integration/handshake_test.rs

//! Integration tests for the subscribe / authorize / submit handshake.

use super::test_helpers::TestServer;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use stratumd::core::work::{MOCK_BASE_HEIGHT, MOCK_TARGET, MockWorkSource};

#[tokio::test]
async fn test_full_miner_session() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client
        .request(1, "mining.subscribe", json!(["testminer/1.0"]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({
            "id": 1,
            "result": [[["mining.notify", "1"], ["mining.set_difficulty", "1"]], "00000001", 4],
            "error": null
        })
    );
    assert_eq!(
        client.recv().await,
        json!({"id": null, "method": "mining.set_difficulty", "params": [1_000_000]})
    );

    client
        .request(2, "mining.authorize", json!(["addr1.worker1"]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 2, "result": true, "error": null})
    );
    let notify = client.recv().await;
    assert_eq!(notify["id"], json!(null));
    assert_eq!(notify["method"], "mining.notify");
    assert_eq!(
        notify["params"],
        json!([
            "job_000001",
            MockWorkSource::header_for(1),
            MOCK_TARGET,
            MOCK_BASE_HEIGHT + 1,
            true
        ])
    );

    client
        .request(
            3,
            "mining.submit",
            json!(["addr1.worker1", "job_000001", "00000001", "0102030405060708"]),
        )
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 3, "result": true, "error": null})
    );
}

#[tokio::test]
async fn test_authorize_pushes_exactly_one_job() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.subscribe(1).await;
    client.authorize(2, "addr1.worker1").await;

    // Nothing else arrives before the (far away) broadcast tick.
    assert_eq!(client.try_recv(Duration::from_millis(200)).await, None);
}

#[tokio::test]
async fn test_authorize_records_worker_identity() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.subscribe(1).await;
    client.authorize(2, "addrX.workerY").await;

    let sessions = server.handle.state().connections.sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].authorized);
    assert_eq!(sessions[0].worker_address, "addrX");
    assert_eq!(sessions[0].worker_name, "workerY");
    assert_eq!(sessions[0].miner_software.as_deref(), Some("testminer/1.0"));
}

#[tokio::test]
async fn test_authorize_without_worker_uses_default_name() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.authorize(1, "addrX").await;

    let sessions = server.handle.state().connections.sessions();
    assert_eq!(sessions[0].worker_address, "addrX");
    assert_eq!(sessions[0].worker_name, "default");
}

#[tokio::test]
async fn test_extranonce1_unique_across_open_sessions() {
    let server = TestServer::start().await;
    let mut clients = Vec::new();
    let mut seen = HashSet::new();

    for _ in 0..5 {
        let mut client = server.connect().await;
        let result = client.subscribe(1).await;
        let extranonce1 = result[1].as_str().expect("extranonce1 is a string").to_string();
        assert_eq!(extranonce1.len(), 8);
        assert!(extranonce1.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(seen.insert(extranonce1), "extranonce1 repeated");
        clients.push(client);
    }
}

#[tokio::test]
async fn test_repeated_subscribe_keeps_extranonce() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    let first = client.subscribe(1).await;
    let second = client.subscribe(2).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ping_and_extranonce_subscribe() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.request(7, "mining.ping", json!([])).await;
    assert_eq!(
        client.recv().await,
        json!({"id": 7, "result": "pong", "error": null})
    );

    client
        .request(8, "mining.extranonce.subscribe", json!([]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 8, "result": true, "error": null})
    );
}

#[tokio::test]
async fn test_submit_accepts_both_layouts() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    client.subscribe(1).await;
    client.authorize(2, "addr1.worker1").await;

    client
        .request(
            3,
            "mining.submit",
            json!(["addr1.worker1", "job_000001", "00000001", "5f5e1000", "0102030405060708"]),
        )
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 3, "result": true, "error": null})
    );

    let sessions = server.handle.state().connections.sessions();
    assert_eq!(sessions[0].valid_shares, 1);
    assert_eq!(server.handle.state().stats.get_shares_accepted(), 1);
}
