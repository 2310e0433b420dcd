pub mod memory;
pub mod postgres;

use crate::error::AppResult;
use crate::models::{Conversation, Message, NewMessage, ParticipantPair, UserProfile};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Durable conversation records, keyed by the normalized participant pair.
///
/// Implementations must uphold one conversation per pair even under
/// concurrent first contact from both sides.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch the conversation for `pair`, creating it if absent.
    async fn find_or_create(&self, pair: ParticipantPair) -> AppResult<Conversation>;

    async fn find_by_pair(&self, pair: ParticipantPair) -> AppResult<Option<Conversation>>;

    /// Advance the last-message pointer and bump `updated_at`.
    async fn set_last_message(&self, conversation_id: Uuid, message_id: Uuid) -> AppResult<()>;

    /// Every conversation `user_id` participates in.
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>>;
}

/// Append-only message log with bulk seen-marking and per-viewer history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: NewMessage) -> AppResult<Message>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Message>>;

    /// Mark every unseen message sent by `counterpart` to `owner` in this
    /// conversation as seen. Returns the number of rows flipped.
    async fn mark_seen(
        &self,
        conversation_id: Uuid,
        owner: Uuid,
        counterpart: Uuid,
    ) -> AppResult<u64>;

    /// Count of unseen messages from `counterpart` in this conversation.
    async fn unread_from(&self, conversation_id: Uuid, counterpart: Uuid) -> AppResult<i64>;

    /// Newest-first page of messages still visible to `viewer`, plus the
    /// total visible count.
    async fn history_page(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
        page: i64,
        page_size: i64,
    ) -> AppResult<(Vec<Message>, i64)>;
}

/// Read-only lookup into the externally-owned user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<UserProfile>>;
}
