//! Postgres-backed stores. One pool shared across the three trait
//! implementations; schema is applied idempotently at startup.

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, NewMessage, ParticipantPair, UserProfile};
use crate::storage::{ConversationStore, MessageStore, UserDirectory};
use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn connect(database_url: &str) -> AppResult<Self> {
        let mut cfg = PoolConfig::new();
        cfg.url = Some(database_url.to_string());
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Config(format!("postgres pool: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> AppResult<()> {
        let client = self.pool.get().await?;
        client
            .batch_execute(include_str!("../../migrations/0001_initial.sql"))
            .await?;
        tracing::info!("database schema ensured");
        Ok(())
    }
}

fn conversation_from_row(row: &Row) -> AppResult<Conversation> {
    let a: Uuid = row.get("participant_a");
    let b: Uuid = row.get("participant_b");
    let pair = ParticipantPair::new(a, b)
        .ok_or_else(|| AppError::Database("conversation row with identical participants".into()))?;
    Ok(Conversation {
        id: row.get("id"),
        pair,
        last_message_id: row.get("last_message_id"),
        updated_at: row.get("updated_at"),
    })
}

fn message_from_row(row: &Row) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        is_seen: row.get("is_seen"),
        is_deleted_by_sender: row.get("is_deleted_by_sender"),
        is_deleted_by_receiver: row.get("is_deleted_by_receiver"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn find_or_create(&self, pair: ParticipantPair) -> AppResult<Conversation> {
        let client = self.pool.get().await?;
        // The unique constraint on the ordered pair closes the race between
        // concurrent first contacts; the no-op DO UPDATE makes RETURNING
        // yield the surviving row either way.
        let row = client
            .query_one(
                "INSERT INTO conversations (participant_a, participant_b)
                 VALUES ($1, $2)
                 ON CONFLICT (participant_a, participant_b)
                 DO UPDATE SET participant_a = EXCLUDED.participant_a
                 RETURNING id, participant_a, participant_b, last_message_id, updated_at",
                &[&pair.first(), &pair.second()],
            )
            .await?;
        conversation_from_row(&row)
    }

    async fn find_by_pair(&self, pair: ParticipantPair) -> AppResult<Option<Conversation>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, participant_a, participant_b, last_message_id, updated_at
                 FROM conversations
                 WHERE participant_a = $1 AND participant_b = $2",
                &[&pair.first(), &pair.second()],
            )
            .await?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn set_last_message(&self, conversation_id: Uuid, message_id: Uuid) -> AppResult<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE conversations
                 SET last_message_id = $2, updated_at = NOW()
                 WHERE id = $1",
                &[&conversation_id, &message_id],
            )
            .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, participant_a, participant_b, last_message_id, updated_at
                 FROM conversations
                 WHERE participant_a = $1 OR participant_b = $1
                 ORDER BY updated_at DESC",
                &[&user_id],
            )
            .await?;
        rows.iter().map(conversation_from_row).collect()
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append(&self, message: NewMessage) -> AppResult<Message> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO messages (conversation_id, sender_id, receiver_id, content)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, conversation_id, sender_id, receiver_id, content,
                           is_seen, is_deleted_by_sender, is_deleted_by_receiver, created_at",
                &[
                    &message.conversation_id,
                    &message.sender_id,
                    &message.receiver_id,
                    &message.content,
                ],
            )
            .await?;
        Ok(message_from_row(&row))
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Message>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, conversation_id, sender_id, receiver_id, content,
                        is_seen, is_deleted_by_sender, is_deleted_by_receiver, created_at
                 FROM messages
                 WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(message_from_row))
    }

    async fn mark_seen(
        &self,
        conversation_id: Uuid,
        owner: Uuid,
        counterpart: Uuid,
    ) -> AppResult<u64> {
        let client = self.pool.get().await?;
        let flipped = client
            .execute(
                "UPDATE messages
                 SET is_seen = TRUE
                 WHERE conversation_id = $1
                   AND sender_id = $2
                   AND receiver_id = $3
                   AND NOT is_seen",
                &[&conversation_id, &counterpart, &owner],
            )
            .await?;
        Ok(flipped)
    }

    async fn unread_from(&self, conversation_id: Uuid, counterpart: Uuid) -> AppResult<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM messages
                 WHERE conversation_id = $1 AND sender_id = $2 AND NOT is_seen",
                &[&conversation_id, &counterpart],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn history_page(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
        page: i64,
        page_size: i64,
    ) -> AppResult<(Vec<Message>, i64)> {
        let client = self.pool.get().await?;
        let offset = (page - 1).max(0) * page_size;
        let rows = client
            .query(
                "SELECT id, conversation_id, sender_id, receiver_id, content,
                        is_seen, is_deleted_by_sender, is_deleted_by_receiver, created_at
                 FROM messages
                 WHERE conversation_id = $1
                   AND ((sender_id = $2 AND NOT is_deleted_by_sender)
                     OR (receiver_id = $2 AND NOT is_deleted_by_receiver))
                 ORDER BY created_at DESC
                 LIMIT $3 OFFSET $4",
                &[&conversation_id, &viewer, &page_size, &offset],
            )
            .await?;
        let total_row = client
            .query_one(
                "SELECT COUNT(*) FROM messages
                 WHERE conversation_id = $1
                   AND ((sender_id = $2 AND NOT is_deleted_by_sender)
                     OR (receiver_id = $2 AND NOT is_deleted_by_receiver))",
                &[&conversation_id, &viewer],
            )
            .await?;
        let items = rows.iter().map(message_from_row).collect();
        Ok((items, total_row.get(0)))
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT id, name FROM users WHERE id = $1", &[&id])
            .await?;
        Ok(row.map(|r| UserProfile {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }
}
