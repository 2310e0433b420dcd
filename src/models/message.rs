use crate::models::user::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single directed text message, as persisted.
///
/// `is_seen` transitions false -> true only, in bulk, via seen-marking.
/// The soft-delete flags hide a message from one side's history; nothing
/// is ever hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub is_seen: bool,
    pub is_deleted_by_sender: bool,
    pub is_deleted_by_receiver: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether `viewer` still sees this message in history.
    pub fn visible_to(&self, viewer: Uuid) -> bool {
        if self.sender_id == viewer {
            !self.is_deleted_by_sender
        } else if self.receiver_id == viewer {
            !self.is_deleted_by_receiver
        } else {
            false
        }
    }
}

/// Fields the relay pipeline supplies when appending a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

/// Enriched message payload pushed to live connections and returned from
/// history queries: participant names are resolved from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserProfile,
    pub receiver: UserProfile,
    pub content: String,
    pub is_seen: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    pub fn new(message: &Message, sender: &UserProfile, receiver: &UserProfile) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender: sender.clone(),
            receiver: receiver.clone(),
            content: message.content.clone(),
            is_seen: message.is_seen,
            created_at: message.created_at,
        }
    }
}
