// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a miner connection.

use super::guard::ConnectionGuard;
use super::session::{SessionSnapshot, SessionState};
use crate::core::handler::command_router::{RouteResponse, Router};
use crate::core::metrics;
use crate::core::protocol::{Inbound, Message, Request, Response, StratumCodec};
use crate::core::state::{ConnectionEntry, OUTBOUND_QUEUE_CAPACITY, PolicyVerdict, ServerState};
use crate::core::{Command, StratumError};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Manages the full lifecycle of a miner connection.
///
/// The handler is the only writer on its socket. Replies, the pushes that
/// follow them, and messages queued by other tasks are all written from
/// its loop, so lines never interleave.
pub struct ConnectionHandler<S> {
    framed: Framed<S, StratumCodec>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    session: SessionState,
    /// The copy of `session` visible through the connection registry.
    snapshot: Arc<Mutex<SessionSnapshot>>,
    outbound_rx: mpsc::Receiver<Message>,
    kill_rx: broadcast::Receiver<()>,
    global_shutdown_rx: broadcast::Receiver<()>,
    _guard: ConnectionGuard,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a handler and registers the connection so broadcasts reach it.
    pub fn new(
        socket: S,
        addr: SocketAddr,
        state: Arc<ServerState>,
        session_id: u64,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let mining = &state.config.mining;
        let session = SessionState::new(
            session_id,
            mining.extranonce2_size,
            state.jobs.difficulty(),
        );
        let framed = Framed::new(socket, StratumCodec::new(mining.max_request_size));

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (kill_tx, kill_rx) = broadcast::channel(1);
        let snapshot = Arc::new(Mutex::new(session.snapshot(addr)));
        state.connections.register(
            session_id,
            ConnectionEntry {
                addr,
                outbound: outbound_tx,
                kill: kill_tx,
                session: snapshot.clone(),
            },
        );
        let guard = ConnectionGuard::new(state.clone(), session_id, addr);

        Self {
            framed,
            addr,
            state,
            session,
            snapshot,
            outbound_rx,
            kill_rx,
            global_shutdown_rx,
            _guard: guard,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session.id
    }

    /// The main event loop for the connection. Returns when the peer leaves,
    /// the connection idles out, or a shutdown signal arrives.
    pub async fn run(mut self) -> Result<(), StratumError> {
        let idle_timeout = self.state.config.mining.idle_timeout;
        let idle = sleep(idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = self.global_shutdown_rx.recv() => {
                    debug!("Session {} received global shutdown signal.", self.session.id);
                    break;
                }
                _ = self.kill_rx.recv() => {
                    info!("Session {} ({}) received kill signal.", self.session.id, self.addr);
                    break;
                }
                Some(message) = self.outbound_rx.recv() => {
                    self.framed.send(message).await?;
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(inbound)) => {
                            idle.as_mut().reset(Instant::now() + idle_timeout);
                            if self.process_inbound(inbound).await?.is_break() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("Connection from {} closed by peer: {}", self.addr, e);
                            } else {
                                warn!("Connection error for {}: {}", self.addr, e);
                            }
                            break;
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break;
                        }
                    }
                }
                _ = &mut idle => {
                    info!(
                        "Session {} ({}) idle for {:?}; closing.",
                        self.session.id, self.addr, idle_timeout
                    );
                    break;
                }
            }
        }

        info!(
            "Session {} ({}) disconnected after {:?}: {} valid / {} invalid shares.",
            self.session.id,
            self.addr,
            self.session.connected_at.elapsed(),
            self.session.valid_shares,
            self.session.invalid_shares
        );
        Ok(())
    }

    async fn process_inbound(
        &mut self,
        inbound: Inbound<Request>,
    ) -> Result<ControlFlow<()>, StratumError> {
        let e = match inbound {
            Inbound::Message(request) => return self.process_request(request).await,
            Inbound::Malformed(e) => e,
        };
        metrics::MALFORMED_LINES_TOTAL.inc();
        if self.state.policy.record_malformed(self.addr.ip()) == PolicyVerdict::Banned {
            warn!("Session {}: {}", self.session.id, e);
            return Ok(self.ban_peer("too many malformed lines"));
        }

        if let StratumError::RequestTooLarge { .. } = e {
            warn!("Session {}: {}", self.session.id, e);
            let reply = Response::error(Value::Null, e.to_rpc_error());
            self.framed.send(Message::from(reply)).await?;
        } else {
            // No usable id to answer with, so the line is only logged.
            warn!("Session {}: dropping line: {}", self.session.id, e);
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Routes one request and writes its reply, then any pushes it produced.
    async fn process_request(&mut self, request: Request) -> Result<ControlFlow<()>, StratumError> {
        debug!(
            "Session {}: Received request {} (id {})",
            self.session.id, request.method, request.id
        );

        let shares_before = (self.session.valid_shares, self.session.invalid_shares);
        let outcome = match Command::try_from(&request) {
            Ok(command) => {
                let mut router = Router::new(self.state.clone(), &mut self.session);
                router.route(command).await
            }
            Err(e) => Err(e),
        };
        // Publish before replying, so a miner that sees the reply also sees
        // the registry reflect it.
        *self.snapshot.lock() = self.session.snapshot(self.addr);

        match outcome {
            Ok(RouteResponse { result, pushes }) => {
                self.framed
                    .feed(Message::from(Response::result(request.id, result)))
                    .await?;
                for push in pushes {
                    self.framed.feed(Message::from(push)).await?;
                }
                SinkExt::<Message>::flush(&mut self.framed).await?;
            }
            Err(e) => {
                debug!(
                    "Session {}: '{}' failed: {}",
                    self.session.id, request.method, e
                );
                let reply = Response::error(request.id, e.to_rpc_error());
                self.framed.send(Message::from(reply)).await?;
            }
        }

        // A request carries at most one share.
        let share = if self.session.valid_shares > shares_before.0 {
            Some(true)
        } else if self.session.invalid_shares > shares_before.1 {
            Some(false)
        } else {
            None
        };
        if let Some(accepted) = share
            && self.state.policy.record_share(self.addr.ip(), accepted) == PolicyVerdict::Banned
        {
            return Ok(self.ban_peer("invalid share ratio too high"));
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Bans this connection's address and closes every connection from it.
    fn ban_peer(&self, reason: &str) -> ControlFlow<()> {
        let ip = self.addr.ip();
        match self.state.ban_peer(ip) {
            Some(closed) => warn!(
                "Banned {} for {:?} ({}); closing {} connection(s).",
                ip, self.state.config.policy.ban_duration, reason, closed
            ),
            None => debug!("Address {} hit a policy limit but cannot be banned.", ip),
        }
        ControlFlow::Break(())
    }
}

/// Whether an error is just the peer going away.
pub fn is_normal_disconnect(e: &StratumError) -> bool {
    matches!(e, StratumError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
