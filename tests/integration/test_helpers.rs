// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use stratumd::config::Config;
use stratumd::core::StratumError;
use stratumd::core::protocol::{Inbound, JsonLineCodec};
use stratumd::core::work::{MockWorkSource, Share, WorkSource, WorkTemplate};
use stratumd::server::{self, ServerHandle};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing_subscriber::EnvFilter;

/// How long a test waits for a line before failing.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a quiet subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

/// A configuration bound to an ephemeral localhost port, with the periodic
/// broadcast pushed far enough out that it never fires during a test.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.mining.broadcast_interval = Duration::from_secs(3600);
    config
}

/// TestServer wraps a running server bound to an ephemeral port.
pub struct TestServer {
    pub handle: ServerHandle,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        init_tracing();
        let handle = server::start(config)
            .await
            .expect("Failed to start test server");
        Self { handle }
    }

    pub async fn with_work_source(config: Config, source: Arc<dyn WorkSource>) -> Self {
        init_tracing();
        let handle = server::start_with_work_source(config, source)
            .await
            .expect("Failed to start test server");
        Self { handle }
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr()).await
    }

    /// Polls until the registry holds exactly `expected` connections.
    pub async fn wait_for_connections(&self, expected: usize) {
        let state = self.handle.state().clone();
        tokio::time::timeout(READ_TIMEOUT, async move {
            while state.connections.len() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("registry never reached {expected} connections"));
    }
}

/// A line-oriented miner speaking JSON over a real socket.
pub struct TestClient {
    framed: Framed<TcpStream, JsonLineCodec<Value>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect to test server");
        Self {
            framed: Framed::new(stream, JsonLineCodec::new(64 * 1024)),
        }
    }

    pub async fn send(&mut self, message: Value) {
        self.framed
            .send(message)
            .await
            .expect("Failed to send request");
    }

    /// Writes raw bytes, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let stream = self.framed.get_mut();
        stream.write_all(bytes).await.expect("Failed to write");
        stream.flush().await.expect("Failed to flush");
    }

    pub async fn request(&mut self, id: u64, method: &str, params: Value) {
        self.send(json!({"id": id, "method": method, "params": params}))
            .await;
    }

    /// Reads the next JSON line, failing the test on timeout or disconnect.
    pub async fn recv(&mut self) -> Value {
        match tokio::time::timeout(READ_TIMEOUT, self.framed.next()).await {
            Ok(Some(Ok(Inbound::Message(value)))) => value,
            Ok(other) => panic!("Expected a JSON line, got {:?}", other),
            Err(_) => panic!("Timed out waiting for a line from the server"),
        }
    }

    /// Returns the next line if one arrives within `wait`.
    pub async fn try_recv(&mut self, wait: Duration) -> Option<Value> {
        match tokio::time::timeout(wait, self.framed.next()).await {
            Ok(Some(Ok(Inbound::Message(value)))) => Some(value),
            _ => None,
        }
    }

    /// Waits for the server to close the connection.
    pub async fn expect_closed(&mut self) {
        loop {
            match tokio::time::timeout(READ_TIMEOUT, self.framed.next()).await {
                Ok(None) | Ok(Some(Err(_))) => return,
                Ok(Some(Ok(_))) => continue,
                Err(_) => panic!("Server did not close the connection"),
            }
        }
    }

    /// Subscribes and returns the subscribe result, consuming the
    /// difficulty push that follows it.
    pub async fn subscribe(&mut self, id: u64) -> Value {
        self.request(id, "mining.subscribe", json!(["testminer/1.0"]))
            .await;
        let response = self.recv().await;
        assert_eq!(response["id"], json!(id));
        let push = self.recv().await;
        assert_eq!(push["method"], "mining.set_difficulty");
        response["result"].clone()
    }

    /// Authorizes and returns the job pushed right after the reply.
    pub async fn authorize(&mut self, id: u64, username: &str) -> Value {
        self.request(id, "mining.authorize", json!([username])).await;
        let response = self.recv().await;
        assert_eq!(response, json!({"id": id, "result": true, "error": null}));
        let push = self.recv().await;
        assert_eq!(push["method"], "mining.notify");
        push
    }
}

/// How a [`ScriptedWorkSource`] answers `submit_work`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBehavior {
    Accept,
    Reject,
    Fail,
}

/// A work source whose failures tests can switch on and off. Work itself is
/// delegated to the mock source.
#[derive(Debug)]
pub struct ScriptedWorkSource {
    pub fail_fetch: AtomicBool,
    pub submit_behavior: Mutex<SubmitBehavior>,
    pub submitted: Mutex<Vec<Share>>,
    pub fetches: AtomicUsize,
}

impl ScriptedWorkSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_fetch: AtomicBool::new(false),
            submit_behavior: Mutex::new(SubmitBehavior::Accept),
            submitted: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_submit_behavior(&self, behavior: SubmitBehavior) {
        *self.submit_behavior.lock() = behavior;
    }
}

#[async_trait]
impl WorkSource for ScriptedWorkSource {
    async fn fetch_work(&self, job_seq: u64) -> Result<WorkTemplate, StratumError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StratumError::WorkSource("node unreachable".to_string()));
        }
        MockWorkSource::new().fetch_work(job_seq).await
    }

    async fn submit_work(&self, share: &Share) -> Result<bool, StratumError> {
        self.submitted.lock().push(share.clone());
        match *self.submit_behavior.lock() {
            SubmitBehavior::Accept => Ok(true),
            SubmitBehavior::Reject => Ok(false),
            SubmitBehavior::Fail => Err(StratumError::WorkSource("node unreachable".to_string())),
        }
    }
}
