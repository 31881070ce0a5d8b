// tests/integration/submit_policy_test.rs

//! Integration tests for `mining.submit` under both submit policies.

use super::test_helpers::{ScriptedWorkSource, SubmitBehavior, TestServer, test_config};
use serde_json::json;
use stratumd::config::SubmitPolicy;
use stratumd::core::tasks::job_broadcaster::JobBroadcaster;

fn strict_config() -> stratumd::config::Config {
    let mut config = test_config();
    config.mining.submit_policy = SubmitPolicy::Strict;
    config
}

#[tokio::test]
async fn test_lenient_accepts_unauthorized_unknown_job() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client
        .request(1, "mining.submit", json!(["anyone", "job_999999", "00", "ff"]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 1, "result": true, "error": null})
    );
}

#[tokio::test]
async fn test_strict_rejects_unauthorized_submit() {
    let server = TestServer::with_config(strict_config()).await;
    let mut client = server.connect().await;
    client.subscribe(1).await;

    client
        .request(2, "mining.submit", json!(["addr1.w", "job_000001", "00", "ff"]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 2, "result": null, "error": [24, "Unauthorized", null]})
    );
}

#[tokio::test]
async fn test_strict_rejects_unknown_job() {
    let server = TestServer::with_config(strict_config()).await;
    let mut client = server.connect().await;
    client.subscribe(1).await;
    client.authorize(2, "addr1.w").await;

    client
        .request(3, "mining.submit", json!(["addr1.w", "job_424242", "00", "ff"]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 3, "result": null, "error": [21, "Job not found", null]})
    );

    client
        .request(4, "mining.submit", json!(["addr1.w", "job_000001", "00", "ff"]))
        .await;
    assert_eq!(client.recv().await["result"], json!(true));

    let sessions = server.handle.state().connections.sessions();
    assert_eq!(sessions[0].valid_shares, 1);
    assert_eq!(sessions[0].invalid_shares, 1);
}

#[tokio::test]
async fn test_strict_broadcast_job_survives_a_wave_of_logins() {
    let server = TestServer::with_config(strict_config()).await;
    let mut miner = server.connect().await;
    miner.subscribe(1).await;
    miner.authorize(2, "addr1.w").await;

    JobBroadcaster::new(server.handle.state().clone()).tick().await;
    let notify = miner.recv().await;
    assert_eq!(notify["params"][0], "job_000002");

    // More logins than the history holds, each minting a job of its own.
    let history = server.handle.state().config.mining.job_history;
    let mut others = Vec::new();
    for i in 0..history + 2 {
        let mut other = server.connect().await;
        other.subscribe(1).await;
        other.authorize(2, &format!("addr2.w{i}")).await;
        others.push(other);
    }

    miner
        .request(3, "mining.submit", json!(["addr1.w", "job_000002", "00", "ff"]))
        .await;
    assert_eq!(
        miner.recv().await,
        json!({"id": 3, "result": true, "error": null})
    );

    // A job minted for one miner's login is not valid for another.
    others[0]
        .request(3, "mining.submit", json!(["addr2.w0", "job_000001", "00", "ff"]))
        .await;
    assert_eq!(others[0].recv().await["error"][0], json!(21));
}

#[tokio::test]
async fn test_rejected_share_is_reported() {
    let source = ScriptedWorkSource::new();
    source.set_submit_behavior(SubmitBehavior::Reject);
    let server = TestServer::with_work_source(test_config(), source.clone()).await;
    let mut client = server.connect().await;
    client.subscribe(1).await;
    client.authorize(2, "addr1.rig7").await;

    client
        .request(
            3,
            "mining.submit",
            json!(["addr1.rig7", "job_000001", "0000000a", "5f5e1000", "deadbeef"]),
        )
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 3, "result": null, "error": [23, "Share rejected", null]})
    );

    let submitted = source.submitted.lock().clone();
    assert_eq!(submitted.len(), 1);
    let share = &submitted[0];
    assert_eq!(share.address, "addr1");
    assert_eq!(share.worker, "addr1.rig7");
    assert_eq!(share.job_id, "job_000001");
    assert_eq!(share.extranonce1, "00000001");
    assert_eq!(share.extranonce2, "0000000a");
    assert_eq!(share.ntime.as_deref(), Some("5f5e1000"));
    assert_eq!(share.nonce, "deadbeef");
}

#[tokio::test]
async fn test_submission_failure_is_reported_not_dropped() {
    let source = ScriptedWorkSource::new();
    source.set_submit_behavior(SubmitBehavior::Fail);
    let server = TestServer::with_work_source(test_config(), source).await;
    let mut client = server.connect().await;

    client
        .request(4, "mining.submit", json!(["addr1", "job_000001", "00", "ff"]))
        .await;
    assert_eq!(
        client.recv().await,
        json!({"id": 4, "result": null, "error": [20, "Work submission failed", null]})
    );
    assert_eq!(server.handle.state().stats.get_shares_rejected(), 1);

    client.request(5, "mining.ping", json!([])).await;
    assert_eq!(client.recv().await["result"], "pong");
}
