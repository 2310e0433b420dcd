//! Relay pipeline: validate, persist, fan out.
//!
//! Delivery is at-most-once to currently-online peers; persistence is the
//! durable record. A message is appended before the conversation pointer
//! moves, so the pointer can lag but never dangle.

use crate::error::{AppError, AppResult};
use crate::models::{MessageView, NewMessage, ParticipantPair};
use crate::presence::PresenceRegistry;
use crate::protocol::ServerEvent;
use crate::storage::{ConversationStore, MessageStore, UserDirectory};
use uuid::Uuid;

pub struct MessageService;

impl MessageService {
    /// Validate, persist and fan out one direct message.
    ///
    /// Fan-out order: receiver delivery, then sender confirmation, then
    /// sender echo. Offline peers are skipped silently; the message is
    /// already durable by the time fan-out starts.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_message(
        conversations: &dyn ConversationStore,
        messages: &dyn MessageStore,
        directory: &dyn UserDirectory,
        presence: &PresenceRegistry,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        correlation_id: Option<&str>,
    ) -> AppResult<MessageView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }
        let pair = ParticipantPair::new(sender_id, receiver_id).ok_or_else(|| {
            AppError::BadRequest("sender and receiver must be different users".into())
        })?;

        let (sender, receiver) =
            futures::try_join!(directory.get(sender_id), directory.get(receiver_id))?;
        let sender = sender.ok_or_else(|| AppError::BadRequest("sender not found".into()))?;
        let receiver = receiver.ok_or_else(|| AppError::BadRequest("receiver not found".into()))?;

        let conversation = conversations.find_or_create(pair).await?;
        let message = messages
            .append(NewMessage {
                conversation_id: conversation.id,
                sender_id,
                receiver_id,
                content: content.to_string(),
            })
            .await?;
        conversations
            .set_last_message(conversation.id, message.id)
            .await?;

        let view = MessageView::new(&message, &sender, &receiver);

        let delivered = presence
            .send_to(receiver_id, &ServerEvent::NewMessage { message: view.clone() })
            .await;
        if !delivered {
            tracing::debug!(%receiver_id, message_id = %message.id, "receiver offline, stored only");
        }

        if let Some(correlation_id) = correlation_id {
            presence
                .send_to(
                    sender_id,
                    &ServerEvent::MessageSent {
                        correlation_id: correlation_id.to_string(),
                        message_id: message.id,
                    },
                )
                .await;
        }
        presence
            .send_to(sender_id, &ServerEvent::NewMessage { message: view.clone() })
            .await;

        Ok(view)
    }

    /// Flip unseen messages from `counterpart` to `owner` and notify the
    /// counterpart with a read receipt.
    ///
    /// No conversation yet means nothing to mark; that is not an error.
    /// The receipt is pushed even when zero rows flipped, so a client that
    /// marked messages over a racing connection still converges.
    pub async fn mark_seen(
        conversations: &dyn ConversationStore,
        messages: &dyn MessageStore,
        presence: &PresenceRegistry,
        owner: Uuid,
        counterpart: Uuid,
        message_ids: Option<Vec<Uuid>>,
    ) -> AppResult<u64> {
        let Some(pair) = ParticipantPair::new(owner, counterpart) else {
            return Err(AppError::BadRequest(
                "sender and receiver must be different users".into(),
            ));
        };
        let Some(conversation) = conversations.find_by_pair(pair).await? else {
            return Ok(0);
        };

        let flipped = messages.mark_seen(conversation.id, owner, counterpart).await?;

        presence
            .send_to(
                counterpart,
                &ServerEvent::MessageSeen {
                    seen_by: owner,
                    message_ids,
                },
            )
            .await;

        Ok(flipped)
    }
}
