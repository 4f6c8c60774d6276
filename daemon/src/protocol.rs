//! obs-websocket v5 wire format.
//!
//! Every message is a JSON envelope `{"op": <code>, "d": {...}}`. The daemon
//! speaks the minimum of the protocol it needs: the Hello/Identify/Identified
//! handshake, `InputActiveStateChanged` events, and the `GetSourceActive`
//! request/response pair used for state sync after connect.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// RPC version this client negotiates.
pub const RPC_VERSION: u32 = 1;

/// `EventSubscription::InputActiveStateChanged` — the high-volume event
/// category carrying per-source active state, bit 17.
pub const SUBSCRIPTION_INPUT_ACTIVE_STATE_CHANGED: u32 = 1 << 17;

/// Event type delivered when a source becomes active or inactive in program.
pub const EVENT_INPUT_ACTIVE_STATE_CHANGED: &str = "InputActiveStateChanged";

/// Request type used to query a source's current active state.
pub const REQUEST_GET_SOURCE_ACTIVE: &str = "GetSourceActive";

pub mod opcode {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// The outer `{"op", "d"}` frame wrapping every message in both directions.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub op: u8,
    pub d: Value,
}

impl Envelope {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Deserializes the `d` payload into a typed message.
    pub fn payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.d.clone())
    }
}

/// Wraps `d` in an envelope and serializes the whole frame to JSON text.
pub fn encode<T: Serialize>(op: u8, d: &T) -> serde_json::Result<String> {
    serde_json::to_string(&Envelope { op, d: serde_json::to_value(d)? })
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// First message from the server (op 0).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub rpc_version: u32,
    /// Present when the server is password-protected.
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// Client reply to `Hello` (op 1).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

/// Server confirmation that the session is established (op 2).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

/// Computes the `Identify` authentication string:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use sha2::{Digest, Sha256};

    let secret = STANDARD.encode(Sha256::digest(format!("{password}{salt}")));
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}")))
}

// ── Events ────────────────────────────────────────────────────────────────────

/// An event notification (op 5). `event_data` stays untyped until the event
/// type has been matched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    pub event_data: Option<Value>,
}

/// Payload of an `InputActiveStateChanged` event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputActiveStateChanged {
    pub input_name: String,
    pub video_active: bool,
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A client request (op 6).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: &'static str,
    pub request_id: String,
    pub request_data: Value,
}

impl Request {
    /// Builds a `GetSourceActive` request for `source`.
    pub fn get_source_active(request_id: String, source: &str) -> Self {
        Self {
            request_type: REQUEST_GET_SOURCE_ACTIVE,
            request_id,
            request_data: serde_json::json!({ "sourceName": source }),
        }
    }
}

/// Server reply to a request (op 7).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_id: String,
    pub request_status: RequestStatus,
    pub response_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u32,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `GetSourceActive` response payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceActive {
    pub video_active: bool,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
