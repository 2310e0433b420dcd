//! In-memory store used by the test suite. Mirrors the relational
//! semantics of [`super::postgres::PgStore`] closely enough that the
//! services can be exercised without a database.

use crate::error::AppResult;
use crate::models::{Conversation, Message, NewMessage, ParticipantPair, UserProfile};
use crate::storage::{ConversationStore, MessageStore, UserDirectory};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryInner {
    conversations: HashMap<Uuid, Conversation>,
    by_pair: HashMap<ParticipantPair, Uuid>,
    messages: HashMap<Uuid, Message>,
    // Insertion order; history pages walk it in reverse.
    order: Vec<Uuid>,
    users: HashMap<Uuid, UserProfile>,
}

#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, profile: UserProfile) {
        let mut guard = self.inner.write().await;
        guard.users.insert(profile.id, profile);
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_or_create(&self, pair: ParticipantPair) -> AppResult<Conversation> {
        // Single write-lock critical section: lookup and insert are atomic,
        // so concurrent first contact resolves to one conversation.
        let mut guard = self.inner.write().await;
        if let Some(id) = guard.by_pair.get(&pair).copied() {
            if let Some(existing) = guard.conversations.get(&id) {
                return Ok(existing.clone());
            }
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            pair,
            last_message_id: None,
            updated_at: Utc::now(),
        };
        guard.by_pair.insert(pair, conversation.id);
        guard
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_by_pair(&self, pair: ParticipantPair) -> AppResult<Option<Conversation>> {
        let guard = self.inner.read().await;
        Ok(guard
            .by_pair
            .get(&pair)
            .and_then(|id| guard.conversations.get(id))
            .cloned())
    }

    async fn set_last_message(&self, conversation_id: Uuid, message_id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        if let Some(conversation) = guard.conversations.get_mut(&conversation_id) {
            conversation.last_message_id = Some(message_id);
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let guard = self.inner.read().await;
        Ok(guard
            .conversations
            .values()
            .filter(|c| c.pair.contains(user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: NewMessage) -> AppResult<Message> {
        let mut guard = self.inner.write().await;
        let stored = Message {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            is_seen: false,
            is_deleted_by_sender: false,
            is_deleted_by_receiver: false,
            created_at: Utc::now(),
        };
        guard.order.push(stored.id);
        guard.messages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Message>> {
        let guard = self.inner.read().await;
        Ok(guard.messages.get(&id).cloned())
    }

    async fn mark_seen(
        &self,
        conversation_id: Uuid,
        owner: Uuid,
        counterpart: Uuid,
    ) -> AppResult<u64> {
        let mut guard = self.inner.write().await;
        let mut flipped = 0;
        for message in guard.messages.values_mut() {
            if message.conversation_id == conversation_id
                && message.sender_id == counterpart
                && message.receiver_id == owner
                && !message.is_seen
            {
                message.is_seen = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn unread_from(&self, conversation_id: Uuid, counterpart: Uuid) -> AppResult<i64> {
        let guard = self.inner.read().await;
        Ok(guard
            .messages
            .values()
            .filter(|m| {
                m.conversation_id == conversation_id && m.sender_id == counterpart && !m.is_seen
            })
            .count() as i64)
    }

    async fn history_page(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
        page: i64,
        page_size: i64,
    ) -> AppResult<(Vec<Message>, i64)> {
        let guard = self.inner.read().await;
        let visible: Vec<Message> = guard
            .order
            .iter()
            .rev()
            .filter_map(|id| guard.messages.get(id))
            .filter(|m| m.conversation_id == conversation_id && m.visible_to(viewer))
            .cloned()
            .collect();

        let total = visible.len() as i64;
        let offset = ((page - 1).max(0) * page_size) as usize;
        let items = visible
            .into_iter()
            .skip(offset)
            .take(page_size.max(0) as usize)
            .collect();
        Ok((items, total))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let guard = self.inner.read().await;
        Ok(guard.users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(x: Uuid, y: Uuid) -> ParticipantPair {
        ParticipantPair::new(x, y).unwrap()
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent_across_orderings() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let c1 = store.find_or_create(pair(alice, bob)).await.unwrap();
        let c2 = store.find_or_create(pair(bob, alice)).await.unwrap();
        assert_eq!(c1.id, c2.id);
    }

    #[tokio::test]
    async fn concurrent_first_contact_yields_one_conversation() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (left, right) = tokio::join!(
            store.find_or_create(pair(alice, bob)),
            store.find_or_create(pair(bob, alice)),
        );
        assert_eq!(left.unwrap().id, right.unwrap().id);
        assert_eq!(store.list_for_user(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_seen_flips_only_counterpart_messages() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let conv = store.find_or_create(pair(alice, bob)).await.unwrap();

        for (from, to) in [(alice, bob), (bob, alice), (bob, alice)] {
            store
                .append(NewMessage {
                    conversation_id: conv.id,
                    sender_id: from,
                    receiver_id: to,
                    content: "hey".into(),
                })
                .await
                .unwrap();
        }

        // Alice opens the chat: bob's two messages become seen.
        let flipped = store.mark_seen(conv.id, alice, bob).await.unwrap();
        assert_eq!(flipped, 2);
        assert_eq!(store.unread_from(conv.id, bob).await.unwrap(), 0);
        // Alice's own message to bob stays unseen.
        assert_eq!(store.unread_from(conv.id, alice).await.unwrap(), 1);

        // Second pass finds nothing to flip.
        assert_eq!(store.mark_seen(conv.id, alice, bob).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_respects_soft_delete() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let conv = store.find_or_create(pair(alice, bob)).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let msg = store
                .append(NewMessage {
                    conversation_id: conv.id,
                    sender_id: alice,
                    receiver_id: bob,
                    content: format!("msg {i}"),
                })
                .await
                .unwrap();
            ids.push(msg.id);
        }

        let (items, total) = store.history_page(conv.id, alice, 1, 10).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items[0].id, ids[2], "newest first");

        // Sender-side soft delete hides the message from alice only.
        {
            let mut guard = store.inner.write().await;
            if let Some(m) = guard.messages.get_mut(&ids[0]) {
                m.is_deleted_by_sender = true;
            }
        }
        let (items, total) = store.history_page(conv.id, alice, 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|m| m.id != ids[0]));

        let (_, bob_total) = store.history_page(conv.id, bob, 1, 10).await.unwrap();
        assert_eq!(bob_total, 3);
    }

    #[tokio::test]
    async fn history_pages_slice_the_reverse_ordering() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let conv = store.find_or_create(pair(alice, bob)).await.unwrap();

        for i in 0..5 {
            store
                .append(NewMessage {
                    conversation_id: conv.id,
                    sender_id: alice,
                    receiver_id: bob,
                    content: format!("msg {i}"),
                })
                .await
                .unwrap();
        }

        let (page2, total) = store.history_page(conv.id, alice, 2, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[0].content, "msg 2");
        assert_eq!(page2[1].content, "msg 1");
    }
}
