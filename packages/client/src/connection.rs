//! Connection manager: one channel to the relay per active session.
//!
//! Owns the WebSocket lifecycle for a (room, identity) pair and exposes
//! fire-and-forget send primitives plus a single inbound event stream.
//! Reconnection is bounded: a fixed delay between attempts and a fixed
//! maximum attempt count, after which the manager parks in `Failed` until
//! the caller builds a new one.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite,
    tungstenite::protocol::Message,
};

use atelier_shared::protocol::{
    CanvasCursorPayload, ClientFrame, EditorChangePayload, EditorCursorPayload, SelfInfo,
    Selection, ServerFrame,
};
use atelier_shared::time::now_millis;
use atelier_shared::types::{BufferKind, RoomId, UserIdentity};

use crate::error::ClientError;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Configuration for one collaboration session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay endpoint, e.g. `ws://127.0.0.1:8080/ws`
    pub url: String,
    pub group_id: RoomId,
    pub identity: UserIdentity,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, group_id: RoomId, identity: UserIdentity) -> Self {
        Self {
            url: url.into(),
            group_id,
            identity,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Observable lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// Everything the caller can observe from the session, on one stream.
#[derive(Debug)]
pub enum SessionEvent {
    /// Transport is up and the join handshake was accepted.
    Connected,
    /// Transport dropped; a reconnect attempt is scheduled.
    Disconnected,
    /// Terminal failure; no further automatic attempts.
    Failed(ClientError),
    /// A decoded frame from the relay.
    Frame(ServerFrame),
}

enum OutboundCommand {
    Frame(ClientFrame),
    Shutdown,
}

/// Per-buffer monotonically increasing outbound version counters.
#[derive(Debug, Default)]
struct VersionCounters([u64; 3]);

impl VersionCounters {
    /// Pre-increment: the first change for a buffer carries version 1.
    fn next(&mut self, buffer: BufferKind) -> u64 {
        let slot = &mut self.0[buffer.index()];
        *slot += 1;
        *slot
    }

    fn current(&self, buffer: BufferKind) -> u64 {
        self.0[buffer.index()]
    }
}

/// Handle to a managed relay connection.
///
/// Send methods are silent no-ops unless the state is `Connected` and the
/// relay has already assigned a connection id via `current-users`.
pub struct ConnectionManager {
    group_id: RoomId,
    identity: UserIdentity,
    out_tx: mpsc::UnboundedSender<OutboundCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    self_rx: watch::Receiver<Option<SelfInfo>>,
    versions: VersionCounters,
    supervisor: tokio::task::JoinHandle<()>,
}

impl ConnectionManager {
    /// Start a session: spawns the supervisor task and returns the manager
    /// plus the inbound event stream.
    pub fn connect(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (self_tx, self_rx) = watch::channel(None);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let group_id = config.group_id.clone();
        let identity = config.identity.clone();
        let supervisor = tokio::spawn(supervise(config, out_rx, state_tx, self_tx, event_tx));

        (
            Self {
                group_id,
                identity,
                out_tx,
                state_rx,
                self_rx,
                versions: VersionCounters::default(),
                supervisor,
            },
            event_rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch handle for state transitions, for UIs that render a
    /// "disconnected" indicator.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Connection id and color the relay assigned to this session, once
    /// the `current-users` snapshot has arrived.
    pub fn self_info(&self) -> Option<SelfInfo> {
        self.self_rx.borrow().clone()
    }

    /// Send the local pointer position on the shared canvas.
    /// Returns false (and sends nothing) when not connected.
    pub fn send_canvas_cursor(&mut self, x: f64, y: f64) -> bool {
        let Some(me) = self.sendable_self() else {
            return false;
        };
        let frame = ClientFrame::CanvasCursor(CanvasCursorPayload {
            group_id: self.group_id.clone(),
            connection_id: me.connection_id,
            user_id: self.identity.user_id.clone(),
            user_name: self.identity.user_name.clone(),
            color: me.color,
            x,
            y,
            timestamp: now_millis(),
            rest: Map::new(),
        });
        self.out_tx.send(OutboundCommand::Frame(frame)).is_ok()
    }

    /// Send the local caret/selection for one editor buffer.
    pub fn send_editor_cursor(&mut self, buffer: BufferKind, selection: Selection) -> bool {
        let Some(me) = self.sendable_self() else {
            return false;
        };
        let frame = ClientFrame::EditorCursor(EditorCursorPayload {
            group_id: self.group_id.clone(),
            buffer_kind: buffer,
            connection_id: me.connection_id,
            user_id: self.identity.user_id.clone(),
            user_name: self.identity.user_name.clone(),
            color: me.color,
            selection,
            timestamp: now_millis(),
            rest: Map::new(),
        });
        self.out_tx.send(OutboundCommand::Frame(frame)).is_ok()
    }

    /// Send a local content change, stamped with the next version for the
    /// buffer. Returns the stamped version, or None when not connected.
    pub fn send_editor_change(&mut self, buffer: BufferKind, changes: Value) -> Option<u64> {
        let me = self.sendable_self()?;
        let version = self.versions.next(buffer);
        let frame = ClientFrame::EditorChange(EditorChangePayload {
            group_id: self.group_id.clone(),
            buffer_kind: buffer,
            connection_id: me.connection_id,
            user_id: self.identity.user_id.clone(),
            version,
            changes,
            is_acknowledgement: false,
            rest: Map::new(),
        });
        self.out_tx
            .send(OutboundCommand::Frame(frame))
            .ok()
            .map(|_| version)
    }

    /// Send an acknowledgement for a buffer: confirms receipt of prior
    /// changes so peers can clear their pending logs. Advisory, not an RPC.
    pub fn send_editor_ack(&mut self, buffer: BufferKind, changes: Value) -> bool {
        let Some(me) = self.sendable_self() else {
            return false;
        };
        let frame = ClientFrame::EditorChange(EditorChangePayload {
            group_id: self.group_id.clone(),
            buffer_kind: buffer,
            connection_id: me.connection_id,
            user_id: self.identity.user_id.clone(),
            version: self.versions.current(buffer),
            changes,
            is_acknowledgement: true,
            rest: Map::new(),
        });
        self.out_tx.send(OutboundCommand::Frame(frame)).is_ok()
    }

    /// Explicitly leave the room without tearing the manager down.
    pub fn leave(&self) -> bool {
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return false;
        }
        let frame = ClientFrame::LeaveGame {
            group_id: self.group_id.clone(),
        };
        self.out_tx.send(OutboundCommand::Frame(frame)).is_ok()
    }

    /// Caller-initiated disconnect: cancels any pending reconnect and
    /// tears the transport down, then waits for the supervisor to finish.
    pub async fn shutdown(self) {
        let _ = self.out_tx.send(OutboundCommand::Shutdown);
        let _ = self.supervisor.await;
    }

    fn sendable_self(&self) -> Option<SelfInfo> {
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return None;
        }
        self.self_rx.borrow().clone()
    }
}

/// Whether another reconnect attempt is allowed after `failures`
/// consecutive failures.
pub(crate) fn should_attempt_reconnect(failures: u32, max_attempts: u32) -> bool {
    failures < max_attempts
}

/// Build the upgrade URL carrying the join handshake as query parameters.
/// Identity fields are caller-supplied free text, so every value is
/// form-encoded.
fn handshake_url(config: &ClientConfig) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("groupId", config.group_id.as_str())
        .append_pair("userId", config.identity.user_id.as_str())
        .append_pair("userEmail", &config.identity.user_email)
        .append_pair("userName", &config.identity.user_name)
        .append_pair("userImage", &config.identity.user_image);
    format!("{}?{}", config.url, query.finish())
}

enum SessionEnd {
    /// Caller asked to stop, or the event receiver is gone.
    Shutdown,
    /// Relay closed the connection on purpose; do not reconnect.
    ServerClosed,
    /// Transport dropped; reconnection applies.
    Transport,
}

async fn supervise(
    config: ClientConfig,
    mut out_rx: mpsc::UnboundedReceiver<OutboundCommand>,
    state_tx: watch::Sender<ConnectionState>,
    self_tx: watch::Sender<Option<SelfInfo>>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut failures: u32 = 0;

    loop {
        let _ = state_tx.send(ConnectionState::Connecting);
        let url = handshake_url(&config);
        tracing::debug!(
            room = %config.group_id,
            attempt = failures + 1,
            max = config.max_reconnect_attempts,
            "connecting to relay"
        );

        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                failures = 0;
                let _ = state_tx.send(ConnectionState::Connected);
                if event_tx.send(SessionEvent::Connected).is_err() {
                    break;
                }

                let end = run_session(stream, &mut out_rx, &self_tx, &event_tx).await;
                let _ = self_tx.send(None);

                match end {
                    SessionEnd::Shutdown | SessionEnd::ServerClosed => {
                        let _ = state_tx.send(ConnectionState::Idle);
                        break;
                    }
                    SessionEnd::Transport => {}
                }
            }
            Err(tungstenite::Error::Http(response)) => {
                // The relay rejected the handshake; retrying cannot help.
                let status = response.status();
                tracing::error!("handshake rejected with status {status}");
                let _ = state_tx.send(ConnectionState::Failed);
                let _ = event_tx.send(SessionEvent::Failed(ClientError::HandshakeRejected(
                    status.to_string(),
                )));
                break;
            }
            Err(e) => {
                tracing::warn!("connect failed: {e}");
            }
        }

        failures += 1;
        if !should_attempt_reconnect(failures, config.max_reconnect_attempts) {
            tracing::error!(
                "giving up after {} reconnect attempts",
                config.max_reconnect_attempts
            );
            let _ = state_tx.send(ConnectionState::Failed);
            let _ = event_tx.send(SessionEvent::Failed(ClientError::ReconnectExhausted(
                config.max_reconnect_attempts,
            )));
            break;
        }

        let _ = state_tx.send(ConnectionState::Reconnecting);
        let _ = event_tx.send(SessionEvent::Disconnected);

        // Fixed interval, identical after every failure; a shutdown during
        // the wait cancels the pending attempt.
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_interval) => {}
            _ = wait_for_shutdown(&mut out_rx) => {
                let _ = state_tx.send(ConnectionState::Idle);
                break;
            }
        }
    }
}

/// Drain commands while disconnected; resolves on an explicit shutdown or
/// when the manager handle is dropped. Queued sends are discarded, they
/// are defined as no-ops outside `Connected`.
async fn wait_for_shutdown(out_rx: &mut mpsc::UnboundedReceiver<OutboundCommand>) {
    loop {
        match out_rx.recv().await {
            Some(OutboundCommand::Shutdown) | None => return,
            Some(OutboundCommand::Frame(_)) => {}
        }
    }
}

async fn run_session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    out_rx: &mut mpsc::UnboundedReceiver<OutboundCommand>,
    self_tx: &watch::Sender<Option<SelfInfo>>,
    event_tx: &mpsc::UnboundedSender<SessionEvent>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            cmd = out_rx.recv() => match cmd {
                None => return SessionEnd::Shutdown,
                Some(OutboundCommand::Shutdown) => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
                Some(OutboundCommand::Frame(frame)) => {
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("failed to serialize {} frame: {e}", frame.kind());
                            continue;
                        }
                    };
                    if write.send(Message::Text(json.into())).await.is_err() {
                        return SessionEnd::Transport;
                    }
                }
            },
            msg = read.next() => match msg {
                None => return SessionEnd::Transport,
                Some(Err(e)) => {
                    tracing::warn!("websocket read error: {e}");
                    return SessionEnd::Transport;
                }
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(frame) => {
                            if let ServerFrame::CurrentUsers { you, .. } = &frame {
                                let _ = self_tx.send(Some(you.clone()));
                            }
                            if event_tx.send(SessionEvent::Frame(frame)).is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => tracing::warn!("undecodable frame dropped: {e}"),
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("relay closed the connection");
                    return SessionEnd::ServerClosed;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
