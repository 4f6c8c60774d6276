//! obs-websocket connection supervisor.
//!
//! Owns the websocket for the life of the process: connects, runs the
//! identify handshake, syncs initial source state, pumps events, and
//! reconnects with backoff when the link drops. Everything the rest of the
//! daemon sees arrives as [`DaemonEvent`]s on the main channel; the task
//! ends when the channel closes or the reconnect schedule is exhausted.

use std::collections::HashMap;

use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::backoff::{Backoff, DEFAULT_MAX_ATTEMPTS};
use crate::event::DaemonEvent;
use crate::protocol::{
    self, opcode, Envelope, Event, Hello, Identified, Identify, InputActiveStateChanged,
    Request, RequestResponse, SourceActive,
};

/// How long the feed may stay silent before every source is re-polled.
/// Catches events lost while OBS was busy without burdening a healthy feed.
const IDLE_CHECK: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ObsError {
    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed message from server: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("server closed the connection")]
    ConnectionClosed,
    #[error("expected op {expected} during handshake, got op {got}")]
    UnexpectedOp { expected: u8, got: u8 },
    #[error("server requires authentication but no password was configured")]
    PasswordRequired,
}

/// Connection parameters for the supervisor task.
pub struct ObsConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Service mode: reconnect forever instead of the bounded schedule.
    pub unbounded_retry: bool,
}

/// Why a session ended without a connection error.
enum SessionEnd {
    ChannelClosed,
}

/// Runs connect/identify/sync/pump sessions back to back, sleeping out the
/// backoff schedule between failures. Spawned once from `main`.
pub async fn run(config: ObsConfig, sources: Vec<String>, tx: mpsc::Sender<DaemonEvent>) {
    let mut backoff = if config.unbounded_retry {
        Backoff::unbounded()
    } else {
        Backoff::bounded(DEFAULT_MAX_ATTEMPTS)
    };

    loop {
        match session(&config, &sources, &tx, &mut backoff).await {
            Ok(SessionEnd::ChannelClosed) => return,
            Err(e) => tracing::warn!(error = %e, "connection lost"),
        }

        if tx.send(DaemonEvent::Disconnected).await.is_err() {
            return;
        }

        match backoff.next_delay() {
            Some(delay) => {
                tracing::info!(delay_secs = delay.as_secs(), "reconnecting after delay");
                sleep(delay).await;
            }
            None => {
                tracing::error!("reconnect attempts exhausted");
                let _ = tx.send(DaemonEvent::RetriesExhausted).await;
                return;
            }
        }
    }
}

/// One connection lifetime: handshake, sync, then the event pump until the
/// link drops or the channel closes.
async fn session(
    config: &ObsConfig,
    sources: &[String],
    tx: &mpsc::Sender<DaemonEvent>,
    backoff: &mut Backoff,
) -> Result<SessionEnd, ObsError> {
    let url = format!("ws://{}:{}", config.host, config.port);
    tracing::info!(%url, "connecting");
    let (mut ws, _response) = connect_async(url.as_str()).await?;

    // ── Identify handshake ────────────────────────────────────────────────
    let hello: Hello = expect_op(&mut ws, opcode::HELLO).await?;
    let authentication = match (&hello.authentication, config.password.as_deref()) {
        (Some(challenge), Some(password)) => Some(protocol::auth_response(
            password,
            &challenge.salt,
            &challenge.challenge,
        )),
        (Some(_), None) => return Err(ObsError::PasswordRequired),
        (None, _) => None,
    };
    let identify = Identify {
        rpc_version: protocol::RPC_VERSION,
        authentication,
        event_subscriptions: protocol::SUBSCRIPTION_INPUT_ACTIVE_STATE_CHANGED,
    };
    ws.send(Message::Text(protocol::encode(opcode::IDENTIFY, &identify)?))
        .await?;
    let identified: Identified = expect_op(&mut ws, opcode::IDENTIFIED).await?;
    tracing::info!(rpc_version = identified.negotiated_rpc_version, "identified with OBS");

    backoff.reset();
    if tx.send(DaemonEvent::Connected).await.is_err() {
        return Ok(SessionEnd::ChannelClosed);
    }

    // ── Initial state sync ────────────────────────────────────────────────
    // Maps in-flight request ids back to source names; responses surface
    // through the pump below.
    let mut pending: HashMap<String, String> = HashMap::new();
    let mut next_request = 0u64;
    sync_sources(&mut ws, sources, &mut pending, &mut next_request).await?;

    // ── Event pump ────────────────────────────────────────────────────────
    let idle = sleep(IDLE_CHECK);
    tokio::pin!(idle);
    loop {
        tokio::select! {
            message = ws.next() => {
                let message = match message {
                    Some(m) => m?,
                    None => return Err(ObsError::ConnectionClosed),
                };
                idle.as_mut().reset(Instant::now() + IDLE_CHECK);
                match message {
                    Message::Text(text) => {
                        if !handle_message(&text, &mut pending, tx).await? {
                            return Ok(SessionEnd::ChannelClosed);
                        }
                    }
                    Message::Close(_) => return Err(ObsError::ConnectionClosed),
                    // Ping/pong are answered by tungstenite itself.
                    _ => {}
                }
            }
            () = &mut idle => {
                tracing::debug!("feed idle, re-syncing source states");
                sync_sources(&mut ws, sources, &mut pending, &mut next_request).await?;
                idle.as_mut().reset(Instant::now() + IDLE_CHECK);
            }
        }
    }
}

/// Issues one `GetSourceActive` request per assigned source name.
async fn sync_sources(
    ws: &mut WsStream,
    sources: &[String],
    pending: &mut HashMap<String, String>,
    next_request: &mut u64,
) -> Result<(), ObsError> {
    for source in sources {
        let request_id = format!("sync-{}", *next_request);
        *next_request += 1;
        let request = Request::get_source_active(request_id.clone(), source);
        ws.send(Message::Text(protocol::encode(opcode::REQUEST, &request)?))
            .await?;
        pending.insert(request_id, source.clone());
    }
    Ok(())
}

/// Dispatches one text frame from the server. Returns `false` when the event
/// channel has closed and the session should end.
async fn handle_message(
    text: &str,
    pending: &mut HashMap<String, String>,
    tx: &mpsc::Sender<DaemonEvent>,
) -> Result<bool, ObsError> {
    let envelope = Envelope::parse(text)?;
    match envelope.op {
        opcode::EVENT => {
            let event: Event = envelope.payload()?;
            if event.event_type != protocol::EVENT_INPUT_ACTIVE_STATE_CHANGED {
                return Ok(true);
            }
            let Some(data) = event.event_data else {
                return Ok(true);
            };
            let change: InputActiveStateChanged = serde_json::from_value(data)?;
            Ok(tx
                .send(DaemonEvent::SourceActiveChanged {
                    source: change.input_name,
                    active: change.video_active,
                })
                .await
                .is_ok())
        }
        opcode::REQUEST_RESPONSE => {
            let response: RequestResponse = envelope.payload()?;
            let Some(source) = pending.remove(&response.request_id) else {
                return Ok(true);
            };
            if !response.request_status.result {
                // Typically ResourceNotFound: the assigned source does not
                // exist in OBS right now. Non-fatal.
                tracing::debug!(
                    %source,
                    code = response.request_status.code,
                    "source state query failed"
                );
                return Ok(true);
            }
            let Some(data) = response.response_data else {
                return Ok(true);
            };
            let active: SourceActive = serde_json::from_value(data)?;
            Ok(tx
                .send(DaemonEvent::SourceActiveChanged {
                    source,
                    active: active.video_active,
                })
                .await
                .is_ok())
        }
        _ => Ok(true),
    }
}

/// Reads frames until a text message arrives, then requires it to carry
/// `expected`. Used only during the handshake.
async fn expect_op<T: DeserializeOwned>(ws: &mut WsStream, expected: u8) -> Result<T, ObsError> {
    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => {
                let envelope = Envelope::parse(&text)?;
                if envelope.op != expected {
                    return Err(ObsError::UnexpectedOp { expected, got: envelope.op });
                }
                return Ok(envelope.payload()?);
            }
            Message::Close(_) => return Err(ObsError::ConnectionClosed),
            _ => {}
        }
    }
    Err(ObsError::ConnectionClosed)
}
