//! Stateless WebRTC signaling relay.
//!
//! The server keeps no call state; it forwards signals between the two
//! parties and reports a presence miss back to the originator as a
//! `call_failed` with a step-specific reason.

use crate::presence::PresenceRegistry;
use crate::protocol::ServerEvent;
use serde_json::Value as JsonValue;
use uuid::Uuid;

const UNKNOWN_CALLER: &str = "Unknown User";

/// Which leg of the signaling exchange a forward belongs to. Only used to
/// phrase the failure reason when the peer is offline.
#[derive(Debug, Clone, Copy)]
enum SignalStep {
    Initiate,
    Answer,
    Offer,
    AnswerSdp,
    IceCandidate,
    End,
}

impl SignalStep {
    fn offline_reason(self) -> &'static str {
        match self {
            SignalStep::Initiate => "user offline",
            SignalStep::Answer => "caller offline",
            SignalStep::Offer => "peer offline (offer)",
            SignalStep::AnswerSdp => "peer offline (answer)",
            SignalStep::IceCandidate => "peer offline (ice candidate)",
            SignalStep::End => "peer offline (end)",
        }
    }
}

pub struct CallService;

impl CallService {
    async fn forward(
        presence: &PresenceRegistry,
        from: Uuid,
        to: Uuid,
        step: SignalStep,
        event: ServerEvent,
    ) {
        if presence.send_to(to, &event).await {
            return;
        }
        tracing::debug!(%from, %to, ?step, "signal dropped, peer offline");
        presence
            .send_to(
                from,
                &ServerEvent::CallFailed {
                    reason: step.offline_reason().to_string(),
                },
            )
            .await;
    }

    pub async fn call_user(
        presence: &PresenceRegistry,
        caller: Uuid,
        callee: Uuid,
        caller_name: Option<String>,
    ) {
        let caller_name = caller_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string());
        Self::forward(
            presence,
            caller,
            callee,
            SignalStep::Initiate,
            ServerEvent::IncomingCall {
                from: caller,
                caller_name,
            },
        )
        .await;
    }

    /// Relay accept/reject back to the caller. A rejection also tells the
    /// caller to tear the call down.
    pub async fn answer_call(presence: &PresenceRegistry, callee: Uuid, caller: Uuid, accept: bool) {
        Self::forward(
            presence,
            callee,
            caller,
            SignalStep::Answer,
            ServerEvent::CallAccepted {
                from: callee,
                accept,
            },
        )
        .await;
        if !accept {
            presence
                .send_to(caller, &ServerEvent::EndCall { from: callee })
                .await;
        }
    }

    pub async fn relay_offer(
        presence: &PresenceRegistry,
        from: Uuid,
        to: Uuid,
        offer: JsonValue,
        caller_name: Option<String>,
    ) {
        let caller_name = caller_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string());
        Self::forward(
            presence,
            from,
            to,
            SignalStep::Offer,
            ServerEvent::WebrtcOffer {
                from,
                offer,
                caller_name,
            },
        )
        .await;
    }

    pub async fn relay_answer(
        presence: &PresenceRegistry,
        from: Uuid,
        to: Uuid,
        answer: JsonValue,
        caller_name: Option<String>,
    ) {
        let caller_name = caller_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string());
        Self::forward(
            presence,
            from,
            to,
            SignalStep::AnswerSdp,
            ServerEvent::WebrtcAnswer {
                from,
                answer,
                caller_name,
            },
        )
        .await;
    }

    pub async fn relay_candidate(
        presence: &PresenceRegistry,
        from: Uuid,
        to: Uuid,
        candidate: JsonValue,
    ) {
        Self::forward(
            presence,
            from,
            to,
            SignalStep::IceCandidate,
            ServerEvent::WebrtcIceCandidate { from, candidate },
        )
        .await;
    }

    pub async fn end_call(presence: &PresenceRegistry, from: Uuid, to: Uuid) {
        Self::forward(presence, from, to, SignalStep::End, ServerEvent::EndCall { from }).await;
    }
}
