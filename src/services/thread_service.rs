//! Thread aggregation: one item per conversation the user participates
//! in, enriched with the partner profile, last message and unread count.

use crate::error::AppResult;
use crate::models::UserProfile;
use crate::storage::{ConversationStore, MessageStore, UserDirectory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadItem {
    pub conversation_id: Uuid,
    pub partner: UserProfile,
    pub last_message: Option<LastMessage>,
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadPage {
    pub items: Vec<ThreadItem>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

pub struct ThreadService;

impl ThreadService {
    /// Assemble the user's thread list, newest activity first.
    ///
    /// Filtering by partner name happens before pagination, so page counts
    /// reflect the filtered set. Conversations whose partner is missing
    /// from the directory are skipped rather than failing the whole list.
    pub async fn list_threads(
        conversations: &dyn ConversationStore,
        messages: &dyn MessageStore,
        directory: &dyn UserDirectory,
        user_id: Uuid,
        name_filter: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> AppResult<ThreadPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let mut items = Vec::new();
        for conversation in conversations.list_for_user(user_id).await? {
            let Some(partner_id) = conversation.pair.other(user_id) else {
                continue;
            };
            let Some(partner) = directory.get(partner_id).await? else {
                tracing::warn!(%partner_id, conversation_id = %conversation.id, "partner missing from directory, thread skipped");
                continue;
            };

            let last_message = match conversation.last_message_id {
                Some(id) => messages.get(id).await?.map(|m| LastMessage {
                    id: m.id,
                    content: m.content,
                    sender_id: m.sender_id,
                    created_at: m.created_at,
                }),
                None => None,
            };
            let unread_count = messages.unread_from(conversation.id, partner_id).await?;

            items.push(ThreadItem {
                conversation_id: conversation.id,
                partner,
                last_message,
                unread_count,
                updated_at: conversation.updated_at,
            });
        }

        if let Some(filter) = name_filter.map(str::trim).filter(|f| !f.is_empty()) {
            let needle = filter.to_lowercase();
            items.retain(|item| item.partner.name.to_lowercase().contains(&needle));
        }

        items.sort_by_key(|item| {
            Reverse(
                item.last_message
                    .as_ref()
                    .map(|m| m.created_at)
                    .unwrap_or(item.updated_at),
            )
        });

        let total = items.len() as i64;
        let total_pages = (total + page_size - 1) / page_size;
        let offset = ((page - 1) * page_size) as usize;
        let items: Vec<ThreadItem> = items
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok(ThreadPage {
            items,
            total,
            page,
            total_pages,
            has_more: page < total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMessage, ParticipantPair};
    use crate::storage::MemoryStore;

    async fn seed_user(store: &MemoryStore, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        store
            .insert_user(UserProfile {
                id,
                name: name.into(),
            })
            .await;
        id
    }

    async fn seed_message(store: &MemoryStore, from: Uuid, to: Uuid, content: &str) {
        let pair = ParticipantPair::new(from, to).unwrap();
        let conversation = store.find_or_create(pair).await.unwrap();
        let message = store
            .append(NewMessage {
                conversation_id: conversation.id,
                sender_id: from,
                receiver_id: to,
                content: content.into(),
            })
            .await
            .unwrap();
        store
            .set_last_message(conversation.id, message.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn threads_carry_partner_last_message_and_unread() {
        let store = MemoryStore::new();
        let me = seed_user(&store, "Me").await;
        let bob = seed_user(&store, "Bob").await;

        seed_message(&store, bob, me, "first").await;
        seed_message(&store, bob, me, "second").await;

        let page = ThreadService::list_threads(&store, &store, &store, me, None, 1, 20)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let item = &page.items[0];
        assert_eq!(item.partner.name, "Bob");
        assert_eq!(item.unread_count, 2);
        assert_eq!(item.last_message.as_ref().unwrap().content, "second");
    }

    #[tokio::test]
    async fn threads_sort_by_most_recent_activity() {
        let store = MemoryStore::new();
        let me = seed_user(&store, "Me").await;
        let bob = seed_user(&store, "Bob").await;
        let carol = seed_user(&store, "Carol").await;

        seed_message(&store, bob, me, "older").await;
        seed_message(&store, carol, me, "newer").await;

        let page = ThreadService::list_threads(&store, &store, &store, me, None, 1, 20)
            .await
            .unwrap();
        assert_eq!(page.items[0].partner.name, "Carol");
        assert_eq!(page.items[1].partner.name, "Bob");
    }

    #[tokio::test]
    async fn name_filter_narrows_before_pagination() {
        let store = MemoryStore::new();
        let me = seed_user(&store, "Me").await;
        let bob = seed_user(&store, "Bob Marley").await;
        let carol = seed_user(&store, "Carol").await;

        seed_message(&store, bob, me, "hi").await;
        seed_message(&store, carol, me, "hi").await;

        let page = ThreadService::list_threads(&store, &store, &store, me, Some("marl"), 1, 20)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].partner.name, "Bob Marley");
    }

    #[tokio::test]
    async fn pagination_slices_the_sorted_list() {
        let store = MemoryStore::new();
        let me = seed_user(&store, "Me").await;
        let bob = seed_user(&store, "Bob").await;
        let carol = seed_user(&store, "Carol").await;
        let dave = seed_user(&store, "Dave").await;

        seed_message(&store, bob, me, "oldest").await;
        seed_message(&store, carol, me, "middle").await;
        seed_message(&store, dave, me, "newest").await;

        let page = ThreadService::list_threads(&store, &store, &store, me, None, 2, 1)
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_more);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].partner.name, "Carol");

        let last = ThreadService::list_threads(&store, &store, &store, me, None, 3, 1)
            .await
            .unwrap();
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn conversation_without_messages_still_lists() {
        let store = MemoryStore::new();
        let me = seed_user(&store, "Me").await;
        let bob = seed_user(&store, "Bob").await;

        let pair = ParticipantPair::new(me, bob).unwrap();
        store.find_or_create(pair).await.unwrap();

        let page = ThreadService::list_threads(&store, &store, &store, me, None, 1, 20)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items[0].last_message.is_none());
        assert_eq!(page.items[0].unread_count, 0);
    }

    #[tokio::test]
    async fn missing_partner_profile_skips_the_thread() {
        let store = MemoryStore::new();
        let me = seed_user(&store, "Me").await;
        let ghost = Uuid::new_v4(); // no directory entry

        let pair = ParticipantPair::new(me, ghost).unwrap();
        store.find_or_create(pair).await.unwrap();

        let page = ThreadService::list_threads(&store, &store, &store, me, None, 1, 20)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }
}
