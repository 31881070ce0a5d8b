// tests/integration/broadcast_test.rs

//! Integration tests for periodic job broadcast over real sockets.

use super::test_helpers::{ScriptedWorkSource, TestServer, test_config};
use serde_json::json;
use std::time::Duration;
use stratumd::core::tasks::job_broadcaster::{BroadcastOutcome, JobBroadcaster};

fn job_seq(notify: &serde_json::Value) -> u64 {
    let id = notify["params"][0].as_str().expect("job id is a string");
    id.trim_start_matches("job_").parse().expect("numeric job id")
}

#[tokio::test]
async fn test_tick_delivers_same_job_to_every_connection() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    a.subscribe(1).await;
    b.subscribe(1).await;

    let broadcaster = JobBroadcaster::new(server.handle.state().clone());
    let outcome = broadcaster.tick().await;
    match &outcome {
        BroadcastOutcome::Delivered { job_id, report } => {
            assert_eq!(job_id, "job_000001");
            assert_eq!(report.delivered, 2);
            assert_eq!(report.removed, 0);
        }
        other => panic!("Expected a delivery, got {:?}", other),
    }

    let from_a = a.recv().await;
    let from_b = b.recv().await;
    assert_eq!(from_a["method"], "mining.notify");
    assert_eq!(from_a, from_b);
    assert_eq!(from_a["params"][4], json!(true));
}

#[tokio::test]
async fn test_job_ids_increase_tick_over_tick() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    let first_job = client.authorize(1, "addr1").await;

    let broadcaster = JobBroadcaster::new(server.handle.state().clone());
    let mut last = job_seq(&first_job);
    for _ in 0..3 {
        broadcaster.tick().await;
        let notify = client.recv().await;
        let seq = job_seq(&notify);
        assert!(seq > last, "job id went from {last} to {seq}");
        last = seq;
    }
}

#[tokio::test]
async fn test_closed_connection_is_dropped_from_broadcast() {
    let server = TestServer::start().await;
    let mut stays = server.connect().await;
    let leaves = server.connect().await;
    stays.subscribe(1).await;
    server.wait_for_connections(2).await;

    drop(leaves);
    server.wait_for_connections(1).await;

    let broadcaster = JobBroadcaster::new(server.handle.state().clone());
    match broadcaster.tick().await {
        BroadcastOutcome::Delivered { report, .. } => {
            assert_eq!(report.delivered, 1);
        }
        other => panic!("Expected a delivery, got {:?}", other),
    }
    assert_eq!(stays.recv().await["method"], "mining.notify");
}

#[tokio::test]
async fn test_tick_without_miners_is_idle() {
    let server = TestServer::start().await;
    let broadcaster = JobBroadcaster::new(server.handle.state().clone());
    assert_eq!(broadcaster.tick().await, BroadcastOutcome::Idle);
    assert_eq!(server.handle.state().jobs.last_seq(), 0);
}

#[tokio::test]
async fn test_work_source_outage_skips_tick_and_keeps_serving() {
    let source = ScriptedWorkSource::new();
    let server = TestServer::with_work_source(test_config(), source.clone()).await;
    let mut client = server.connect().await;
    let first_job = client.authorize(1, "addr1.rig").await;

    source.set_fail_fetch(true);
    let broadcaster = JobBroadcaster::new(server.handle.state().clone());
    assert_eq!(broadcaster.tick().await, BroadcastOutcome::Skipped);
    assert_eq!(client.try_recv(Duration::from_millis(100)).await, None);

    // A new login during the outage still gets the last known job.
    let mut late = server.connect().await;
    let fallback_job = late.authorize(1, "addr2.rig").await;
    assert_eq!(fallback_job, first_job);

    source.set_fail_fetch(false);
    assert!(matches!(
        broadcaster.tick().await,
        BroadcastOutcome::Delivered { .. }
    ));
    assert!(job_seq(&client.recv().await) > job_seq(&first_job));
}

#[tokio::test]
async fn test_periodic_broadcast_reaches_miner() {
    let mut config = test_config();
    config.mining.broadcast_interval = Duration::from_millis(100);
    let server = TestServer::with_config(config).await;
    let mut client = server.connect().await;
    server.wait_for_connections(1).await;

    // No request is sent, so the only thing that can arrive is a broadcast.
    let notify = client.recv().await;
    assert_eq!(notify["method"], "mining.notify");
    assert_eq!(notify["id"], json!(null));
    assert!(server.handle.state().stats.get_jobs_broadcast() >= 1);
}
