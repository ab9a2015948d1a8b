//! # Correlation Client
//!
//! Owns the one long-lived connection to the ledger node and multiplexes any
//! number of concurrent request/response exchanges over it.
//!
//! ## Architecture
//!
//! ```text
//!   callers ──send()──▶ writer (tokio Mutex) ──────────▶ node
//!      │                                                  │
//!      │ register() → ResponseWaiter                      │
//!      ▼                                                  ▼
//!   PendingRequests ◀──complete()── dispatch task ◀── read_frame
//!         ▲                              │
//!         └──────sweep_expired()─────────┘ (interval tick)
//! ```
//!
//! - **Connection state**: `Disconnected → Connecting → Connected →
//!   Disconnected`. Only `Connected` may send.
//! - **Dispatch task**: spawned per connection. It drains inbound frames,
//!   drops envelopes that aren't signed by the configured node key, and
//!   routes the rest to the pending table by correlation id. It never waits
//!   on a caller.
//! - **Waiting**: [`ResponseWaiter::wait`] suspends only the calling task,
//!   until the response arrives or the deadline passes. Dropping a waiter
//!   cancels its entry.
//!
//! The client never retries. A timed-out submission is reported to the
//! caller, who decides whether to resubmit.

pub mod connector;
pub mod metrics;
pub mod pending;

use futures::StreamExt;
use parking_lot::{Mutex as SyncMutex, RwLock};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{split, AsyncRead, AsyncWriteExt, WriteHalf};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ValidatedConfig;
use crate::crypto::{NetworkType, StampKeypair, StampPublicKey};
use crate::transaction::StampTransaction;
use crate::wire::{
    read_frame, write_frame, CorrelationId, MessageBody, ProtocolMessage, ResponseCode, WireError,
};

pub use connector::{Connector, MemoryConnector, MemoryListener, TcpConnector, TlsConnector};
pub use metrics::ClientMetrics;
pub use pending::{Completion, PendingRequests};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to ledger node: {0}")]
    Connection(#[source] io::Error),

    #[error("not connected to ledger node")]
    NotConnected,

    #[error("failed to send to ledger node: {0}")]
    Send(#[source] WireError),

    #[error("timed out waiting for response from node after {timeout_ms} ms (correlation id {correlation_id})")]
    Timeout {
        correlation_id: CorrelationId,
        timeout_ms: u64,
    },

    #[error("request {correlation_id} was cancelled")]
    Cancelled { correlation_id: CorrelationId },

    #[error("connection to ledger node was lost")]
    Disconnected,

    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    #[error("correlation id {0} is already pending")]
    DuplicateCorrelationId(CorrelationId),

    #[error("metrics registry error: {0}")]
    Metrics(String),
}

// ---------------------------------------------------------------------------
// Configuration & state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Inbound envelopes must be signed by this key.
    pub node_public_key: StampPublicKey,
    pub network: NetworkType,
    /// Default deadline for [`CorrelationClient::broadcast_transaction`].
    pub request_timeout: Duration,
    pub sweep_interval: Duration,
    pub connect_timeout: Duration,
}

impl From<&ValidatedConfig> for ClientConfig {
    fn from(config: &ValidatedConfig) -> Self {
        Self {
            node_public_key: config.node_public_key,
            network: config.network,
            request_timeout: config.submission_timeout,
            sweep_interval: config.sweep_interval,
            connect_timeout: config.connect_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Connection state plus a generation counter. A dispatch task only
/// touches the state if its generation is still current, so a task left
/// over from an earlier connection can't knock a newer one offline.
#[derive(Debug)]
struct StateCell {
    state: ConnectionState,
    generation: u64,
}

/// Decodes a response body into what the caller asked for.
pub trait FromResponseBody: Sized {
    fn from_body(body: MessageBody) -> Result<Self, ClientError>;
}

impl FromResponseBody for MessageBody {
    fn from_body(body: MessageBody) -> Result<Self, ClientError> {
        Ok(body)
    }
}

impl FromResponseBody for ResponseCode {
    fn from_body(body: MessageBody) -> Result<Self, ClientError> {
        match body {
            MessageBody::BroadcastTransactionResponse { response_code } => Ok(response_code),
            other => Err(ClientError::UnexpectedResponse {
                expected: "BroadcastTransactionResponse",
                got: other.kind(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// CorrelationClient
// ---------------------------------------------------------------------------

pub struct CorrelationClient<C: Connector> {
    connector: C,
    keypair: StampKeypair,
    config: ClientConfig,
    state: Arc<RwLock<StateCell>>,
    writer: Mutex<Option<WriteHalf<C::Io>>>,
    dispatch: SyncMutex<Option<JoinHandle<()>>>,
    pending: Arc<PendingRequests>,
    metrics: ClientMetrics,
}

impl<C: Connector> CorrelationClient<C> {
    /// Creates a disconnected client. `keypair` signs outbound envelopes.
    pub fn new(connector: C, keypair: StampKeypair, config: ClientConfig) -> Result<Self, ClientError> {
        let metrics = ClientMetrics::new().map_err(|e| ClientError::Metrics(e.to_string()))?;
        Ok(Self {
            connector,
            keypair,
            config,
            state: Arc::new(RwLock::new(StateCell {
                state: ConnectionState::Disconnected,
                generation: 0,
            })),
            writer: Mutex::new(None),
            dispatch: SyncMutex::new(None),
            pending: Arc::new(PendingRequests::new(metrics.clone())),
            metrics,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.read().state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.contains(id)
    }

    /// Opens the connection and starts the dispatch task. A no-op when
    /// already connected.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        if self.state() == ConnectionState::Connected && writer.is_some() {
            return Ok(());
        }

        self.state.write().state = ConnectionState::Connecting;
        let target = self.connector.describe();
        info!(node = %target, "connecting to ledger node");

        let io = match timeout(self.config.connect_timeout, self.connector.connect()).await {
            Ok(Ok(io)) => io,
            Ok(Err(e)) => {
                self.state.write().state = ConnectionState::Disconnected;
                warn!(node = %target, error = %e, "connection to ledger node failed");
                return Err(ClientError::Connection(e));
            }
            Err(_) => {
                self.state.write().state = ConnectionState::Disconnected;
                warn!(node = %target, "connection to ledger node timed out");
                return Err(ClientError::Connection(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timed out",
                )));
            }
        };

        if let Some(stale) = self.dispatch.lock().take() {
            stale.abort();
        }

        let (reader, write_half) = split(io);
        *writer = Some(write_half);
        let generation = {
            let mut cell = self.state.write();
            cell.generation += 1;
            cell.state = ConnectionState::Connected;
            cell.generation
        };

        let dispatcher = Dispatcher {
            pending: Arc::clone(&self.pending),
            state: Arc::clone(&self.state),
            generation,
            node_public_key: self.config.node_public_key,
            network: self.config.network,
            sweep_interval: self.config.sweep_interval,
            metrics: self.metrics.clone(),
        };
        *self.dispatch.lock() = Some(tokio::spawn(dispatcher.run(reader)));

        info!(node = %target, generation, "connected to ledger node");
        Ok(())
    }

    /// Signs `body` into an envelope tagged with `correlation_id` and writes
    /// it to the node.
    pub async fn send(
        &self,
        body: MessageBody,
        correlation_id: CorrelationId,
    ) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let kind = body.kind();
        let message = ProtocolMessage::sign(body, correlation_id, &self.keypair, self.config.network)
            .map_err(ClientError::Send)?;

        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        if let Err(e) = write_frame(stream, &message).await {
            warn!(correlation_id = %correlation_id, error = %e, "write to ledger node failed");
            *writer = None;
            self.state.write().state = ConnectionState::Disconnected;
            return Err(ClientError::Send(e));
        }
        self.metrics.requests_sent_total.inc();
        debug!(correlation_id = %correlation_id, kind, "envelope sent");
        Ok(())
    }

    /// Adds a pending entry for `id` that expires after `timeout`.
    ///
    /// Register *before* sending, or a fast response can arrive while
    /// nothing is waiting for it.
    pub fn register(
        &self,
        id: CorrelationId,
        timeout: Duration,
    ) -> Result<ResponseWaiter, ClientError> {
        let (receiver, deadline) = self.pending.register(id, timeout)?;
        Ok(ResponseWaiter {
            id,
            receiver,
            deadline,
            pending: Arc::clone(&self.pending),
            finished: false,
        })
    }

    /// Registers `id` and waits for its response or its deadline.
    ///
    /// The entry exists only once this future has been polled, so a caller
    /// that sends `id` itself must start waiting first (spawn this, wait for
    /// [`is_pending`](Self::is_pending), then [`send`](Self::send)). A
    /// response that arrives before registration is dropped. [`register`]
    /// followed by [`ResponseWaiter::wait`] avoids the ordering problem.
    ///
    /// [`register`]: Self::register
    pub async fn await_response<T: FromResponseBody>(
        &self,
        id: CorrelationId,
        timeout: Duration,
    ) -> Result<T, ClientError> {
        self.register(id, timeout)?.wait().await
    }

    /// Register, send, wait. The usual way to talk to the node.
    pub async fn request<T: FromResponseBody>(
        &self,
        body: MessageBody,
        timeout: Duration,
    ) -> Result<T, ClientError> {
        let id = CorrelationId::new();
        let waiter = self.register(id, timeout)?;
        self.send(body, id).await?;
        waiter.wait().await
    }

    /// Broadcasts a signed transaction and returns the node's response code.
    pub async fn broadcast_transaction(
        &self,
        transaction: StampTransaction,
    ) -> Result<ResponseCode, ClientError> {
        self.request(
            MessageBody::BroadcastTransactionRequest { transaction },
            self.config.request_timeout,
        )
        .await
    }

    /// Closes the connection and completes every pending request as
    /// cancelled.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        {
            let mut cell = self.state.write();
            cell.state = ConnectionState::Disconnected;
            cell.generation += 1;
        }
        if let Some(task) = self.dispatch.lock().take() {
            task.abort();
        }
        if let Some(mut stream) = writer.take() {
            let _ = stream.shutdown().await;
        }
        let cancelled = self.pending.cancel_all();
        info!(cancelled, "correlation client shut down");
    }
}

impl<C: Connector> Drop for CorrelationClient<C> {
    fn drop(&mut self) {
        if let Some(task) = self.dispatch.get_mut().take() {
            task.abort();
        }
        self.pending.cancel_all();
    }
}

// ---------------------------------------------------------------------------
// ResponseWaiter
// ---------------------------------------------------------------------------

/// A registered request. Call [`ResponseWaiter::wait`] to get its outcome;
/// drop it to cancel.
pub struct ResponseWaiter {
    id: CorrelationId,
    receiver: oneshot::Receiver<Completion>,
    deadline: Instant,
    pending: Arc<PendingRequests>,
    finished: bool,
}

impl ResponseWaiter {
    pub fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Suspends until the response arrives or the deadline passes.
    pub async fn wait<T: FromResponseBody>(mut self) -> Result<T, ClientError> {
        let completion = match timeout_at(self.deadline, &mut self.receiver).await {
            Ok(Ok(completion)) => completion,
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => {
                // Whoever removed the entry (us, or a response that got there
                // first) has already put the outcome in the channel.
                self.pending.expire(self.id);
                (&mut self.receiver)
                    .await
                    .unwrap_or(Err(ClientError::Disconnected))
            }
        };
        self.finished = true;
        completion.and_then(T::from_body)
    }
}

impl Drop for ResponseWaiter {
    fn drop(&mut self) {
        if !self.finished && self.pending.cancel(self.id) {
            debug!(correlation_id = %self.id, "waiter dropped, request abandoned");
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

struct Dispatcher {
    pending: Arc<PendingRequests>,
    state: Arc<RwLock<StateCell>>,
    generation: u64,
    node_public_key: StampPublicKey,
    network: NetworkType,
    sweep_interval: Duration,
    metrics: ClientMetrics,
}

impl Dispatcher {
    async fn run<R>(self, reader: R)
    where
        R: AsyncRead + Unpin + Send,
    {
        // The unfold keeps an in-progress read alive across sweep ticks, so
        // a frame is never abandoned halfway through.
        let frames = futures::stream::unfold(reader, |mut reader| async move {
            let frame = read_frame(&mut reader).await;
            Some((frame, reader))
        });
        tokio::pin!(frames);

        let mut sweep = interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(Some(message))) => self.route(message),
                    Some(Ok(None)) | None => {
                        info!("ledger node closed the connection");
                        break;
                    }
                    Some(Err(e @ (WireError::Encoding(_) | WireError::UnsupportedVersion(_)))) => {
                        // The frame was fully consumed, so the stream is still in sync.
                        warn!(error = %e, "dropping undecodable frame");
                        self.metrics.responses_dropped_total.inc();
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "read from ledger node failed");
                        break;
                    }
                },
                _ = sweep.tick() => {
                    self.pending.sweep_expired(Instant::now());
                }
            }
        }

        self.disconnect();
    }

    fn route(&self, message: ProtocolMessage) {
        if !message.verify(&self.node_public_key, self.network) {
            warn!(
                correlation_id = %message.correlation_id,
                sender = %message.sender,
                "dropping envelope not signed by the ledger node"
            );
            self.metrics.responses_dropped_total.inc();
            return;
        }
        debug!(
            correlation_id = %message.correlation_id,
            kind = message.body.kind(),
            "envelope received"
        );
        self.pending.complete(message.correlation_id, message.body);
    }

    fn disconnect(&self) {
        let current = {
            let mut cell = self.state.write();
            if cell.generation == self.generation {
                cell.state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        };
        if current {
            let failed = self.pending.fail_all_disconnected();
            if failed > 0 {
                warn!(failed, "failed pending requests after disconnect");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
