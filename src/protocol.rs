use crate::models::MessageView;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Inbound WebSocket events from client to server.
///
/// One variant per event the client may issue; malformed or unknown
/// payloads fail to parse and are rejected at the transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    // ============================================================
    // Messaging
    // ============================================================
    #[serde(rename = "send_message")]
    SendMessage {
        receiver_id: Uuid,
        content: String,
        /// Client-supplied token to reconcile an optimistic local echo.
        #[serde(default)]
        correlation_id: Option<String>,
    },
    #[serde(rename = "chat_opened")]
    ChatOpened { partner_id: Uuid },
    #[serde(rename = "mark_as_seen")]
    MarkAsSeen {
        partner_id: Uuid,
        #[serde(default)]
        message_ids: Option<Vec<Uuid>>,
    },
    #[serde(rename = "typing")]
    Typing { partner_id: Uuid, is_typing: bool },

    // ============================================================
    // Voice-call signaling
    // ============================================================
    #[serde(rename = "call_user")]
    CallUser {
        to: Uuid,
        #[serde(default)]
        caller_name: Option<String>,
    },
    #[serde(rename = "answer_call")]
    AnswerCall { to: Uuid, accept: bool },
    #[serde(rename = "webrtc_offer")]
    WebrtcOffer {
        to: Uuid,
        offer: JsonValue,
        #[serde(default)]
        caller_name: Option<String>,
    },
    #[serde(rename = "webrtc_answer")]
    WebrtcAnswer {
        to: Uuid,
        answer: JsonValue,
        #[serde(default)]
        caller_name: Option<String>,
    },
    #[serde(rename = "webrtc_ice_candidate")]
    WebrtcIceCandidate { to: Uuid, candidate: JsonValue },
    #[serde(rename = "end_call")]
    EndCall { to: Uuid },
}

/// Outbound WebSocket events from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // ============================================================
    // Presence
    // ============================================================
    /// Sent once to a connection right after it registers.
    #[serde(rename = "online_users")]
    OnlineUsers { users: Vec<Uuid> },
    #[serde(rename = "user_online")]
    UserOnline { user_id: Uuid },
    #[serde(rename = "user_offline")]
    UserOffline { user_id: Uuid },

    // ============================================================
    // Messaging
    // ============================================================
    /// Delivery to the receiver and echo to the sender.
    #[serde(rename = "new_message")]
    NewMessage { message: MessageView },
    /// Reconciles an optimistic send with the assigned id.
    #[serde(rename = "message_sent")]
    MessageSent {
        correlation_id: String,
        message_id: Uuid,
    },
    #[serde(rename = "message_error")]
    MessageError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
        error: String,
    },
    /// Read receipt pushed to the author of the now-seen messages.
    #[serde(rename = "message_seen")]
    MessageSeen {
        seen_by: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_ids: Option<Vec<Uuid>>,
    },
    #[serde(rename = "typing")]
    Typing { sender_id: Uuid, is_typing: bool },

    // ============================================================
    // Voice-call signaling
    // ============================================================
    #[serde(rename = "incoming_call")]
    IncomingCall { from: Uuid, caller_name: String },
    #[serde(rename = "call_accepted")]
    CallAccepted { from: Uuid, accept: bool },
    #[serde(rename = "webrtc_offer")]
    WebrtcOffer {
        from: Uuid,
        offer: JsonValue,
        caller_name: String,
    },
    #[serde(rename = "webrtc_answer")]
    WebrtcAnswer {
        from: Uuid,
        answer: JsonValue,
        caller_name: String,
    },
    #[serde(rename = "webrtc_ice_candidate")]
    WebrtcIceCandidate { from: Uuid, candidate: JsonValue },
    #[serde(rename = "end_call")]
    EndCall { from: Uuid },
    #[serde(rename = "call_failed")]
    CallFailed { reason: String },

    // ============================================================
    // Failures
    // ============================================================
    /// Fatal authentication failure during connection setup.
    #[serde(rename = "connection_error")]
    ConnectionError { message: String },
    /// Per-operation validation failure surfaced to the originator only.
    #[serde(rename = "error")]
    Error { message: String },
}
