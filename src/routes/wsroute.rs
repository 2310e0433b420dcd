use crate::auth::{bearer_token, verify_token};
use crate::error::AppError;
use crate::presence::ConnectionId;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::services::call_service::CallService;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use futures::StreamExt;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// One frame from the presence registry's outbound channel.
struct OutboundFrame(String);

struct WsSession {
    user_id: Uuid,
    conn_id: ConnectionId,
    state: AppState,
    hb: Instant,
    // Taken in started() when the outbound stream is attached.
    outbound: Option<UnboundedReceiver<String>>,
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(user_id = %act.user_id, "websocket heartbeat timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "websocket session started");
        self.hb(ctx);

        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx).map(OutboundFrame));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "websocket session stopped");

        let presence = self.state.presence.clone();
        let user_id = self.user_id;
        let conn_id = self.conn_id;
        actix::spawn(async move {
            presence.unregister(user_id, conn_id).await;
        });
    }
}

// Outbound frames from the presence channel. The stream finishing means
// the sender was dropped, i.e. this connection was superseded by a newer
// one for the same user.
impl StreamHandler<OutboundFrame> for WsSession {
    fn handle(&mut self, frame: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(frame.0);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        tracing::debug!(user_id = %self.user_id, "outbound channel closed, session superseded");
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    let state = self.state.clone();
                    let user_id = self.user_id;
                    actix::spawn(async move {
                        dispatch(state, user_id, event).await;
                    });
                }
                Err(e) => {
                    tracing::warn!(user_id = %self.user_id, error = %e, "unparseable client event");
                    if let Ok(payload) = serde_json::to_string(&ServerEvent::Error {
                        message: "malformed event".into(),
                    }) {
                        ctx.text(payload);
                    }
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!(user_id = %self.user_id, "binary frames not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(user_id = %self.user_id, ?reason, "close frame received");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// Route one parsed client event to its service.
///
/// Failures go back to the originator only; the peer never sees another
/// user's errors.
async fn dispatch(state: AppState, user_id: Uuid, event: ClientEvent) {
    match event {
        ClientEvent::SendMessage {
            receiver_id,
            content,
            correlation_id,
        } => {
            let result = MessageService::send_message(
                state.conversations.as_ref(),
                state.messages.as_ref(),
                state.directory.as_ref(),
                &state.presence,
                user_id,
                receiver_id,
                &content,
                correlation_id.as_deref(),
            )
            .await;
            if let Err(e) = result {
                tracing::warn!(%user_id, error = %e, "send_message failed");
                state
                    .presence
                    .send_to(
                        user_id,
                        &ServerEvent::MessageError {
                            correlation_id,
                            error: e.to_string(),
                        },
                    )
                    .await;
            }
        }
        ClientEvent::ChatOpened { partner_id } => {
            mark_seen(&state, user_id, partner_id, None).await;
        }
        ClientEvent::MarkAsSeen {
            partner_id,
            message_ids,
        } => {
            mark_seen(&state, user_id, partner_id, message_ids).await;
        }
        ClientEvent::Typing {
            partner_id,
            is_typing,
        } => {
            // Pure presence relay; dropped silently when the partner is offline.
            state
                .presence
                .send_to(
                    partner_id,
                    &ServerEvent::Typing {
                        sender_id: user_id,
                        is_typing,
                    },
                )
                .await;
        }
        ClientEvent::CallUser { to, caller_name } => {
            CallService::call_user(&state.presence, user_id, to, caller_name).await;
        }
        ClientEvent::AnswerCall { to, accept } => {
            CallService::answer_call(&state.presence, user_id, to, accept).await;
        }
        ClientEvent::WebrtcOffer {
            to,
            offer,
            caller_name,
        } => {
            CallService::relay_offer(&state.presence, user_id, to, offer, caller_name).await;
        }
        ClientEvent::WebrtcAnswer {
            to,
            answer,
            caller_name,
        } => {
            CallService::relay_answer(&state.presence, user_id, to, answer, caller_name).await;
        }
        ClientEvent::WebrtcIceCandidate { to, candidate } => {
            CallService::relay_candidate(&state.presence, user_id, to, candidate).await;
        }
        ClientEvent::EndCall { to } => {
            CallService::end_call(&state.presence, user_id, to).await;
        }
    }
}

async fn mark_seen(state: &AppState, user_id: Uuid, partner_id: Uuid, message_ids: Option<Vec<Uuid>>) {
    let result = MessageService::mark_seen(
        state.conversations.as_ref(),
        state.messages.as_ref(),
        &state.presence,
        user_id,
        partner_id,
        message_ids,
    )
    .await;
    if let Err(e) = result {
        tracing::warn!(%user_id, error = %e, "mark_seen failed");
        state
            .presence
            .send_to(
                user_id,
                &ServerEvent::Error {
                    message: e.to_string(),
                },
            )
            .await;
    }
}

/// Session that completes the handshake only to report an authentication
/// failure in-band, then closes.
struct RejectedSession;

impl Actor for RejectedSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if let Ok(payload) = serde_json::to_string(&ServerEvent::ConnectionError {
            message: "authentication failed".into(),
        }) {
            ctx.text(payload);
        }
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some("authentication failed".into()),
        }));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RejectedSession {
    fn handle(&mut self, _msg: Result<ws::Message, ws::ProtocolError>, _ctx: &mut Self::Context) {}
}

#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();
    let token = params
        .token
        .or_else(|| bearer_token(&req).map(str::to_string));

    let user_id = match token
        .ok_or(AppError::Unauthorized)
        .and_then(|t| verify_token(&t, &state.config.jwt_secret))
    {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!("websocket authentication failed");
            return ws::start(RejectedSession, &req, stream);
        }
    };

    let conn_id = ConnectionId::new();
    let rx = state.presence.register(user_id, conn_id).await;

    let started = ws::start(
        WsSession {
            user_id,
            conn_id,
            state: state.as_ref().clone(),
            hb: Instant::now(),
            outbound: Some(rx),
        },
        &req,
        stream,
    );

    // A failed handshake drops the session before the actor starts, so
    // stopped() never runs; roll the registration back here or the user
    // would stay listed as online with a dead sender.
    if started.is_err() {
        state.presence.unregister(user_id, conn_id).await;
    }
    started
}
