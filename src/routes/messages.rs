use crate::auth::AuthedUser;
use crate::error::AppError;
use crate::models::{MessageView, ParticipantPair};
use crate::services::message_service::MessageService;
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub receiver_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Send a message over REST instead of a live socket. Runs the same relay
/// pipeline, so online participants still get the pushed events.
#[post("/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<SendMessageBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let view = MessageService::send_message(
        state.conversations.as_ref(),
        state.messages.as_ref(),
        state.directory.as_ref(),
        &state.presence,
        user.id,
        body.receiver_id,
        &body.content,
        body.correlation_id.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Created().json(view))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub items: Vec<MessageView>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

/// Paged message history with the given partner, newest first, filtered
/// to what the requesting user can still see.
#[get("/conversations/{partner_id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let partner_id = path.into_inner();
    let query = query.into_inner();
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(50).clamp(1, 100);

    let pair = ParticipantPair::new(user.id, partner_id)
        .ok_or_else(|| AppError::BadRequest("cannot fetch history with yourself".into()))?;

    let Some(conversation) = state.conversations.find_by_pair(pair).await? else {
        // No conversation yet is an empty history, not an error.
        return Ok(HttpResponse::Ok().json(HistoryPage {
            items: Vec::new(),
            total: 0,
            page,
            total_pages: 0,
        }));
    };

    let (messages, total) = state
        .messages
        .history_page(conversation.id, user.id, page, page_size)
        .await?;

    let me = state
        .directory
        .get(user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let partner = state
        .directory
        .get(partner_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = messages
        .iter()
        .map(|m| {
            if m.sender_id == user.id {
                MessageView::new(m, &me, &partner)
            } else {
                MessageView::new(m, &partner, &me)
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(HistoryPage {
        items,
        total,
        page,
        total_pages: (total + page_size - 1) / page_size,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use crate::config::Config;
    use crate::models::UserProfile;
    use crate::presence::PresenceRegistry;
    use crate::storage::{ConversationStore, MemoryStore};
    use actix_web::{test, App};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::sync::Arc;

    fn test_state(store: MemoryStore) -> AppState {
        let store = Arc::new(store);
        AppState {
            conversations: store.clone(),
            messages: store.clone(),
            directory: store,
            presence: PresenceRegistry::new(),
            config: Arc::new(Config {
                database_url: String::new(),
                port: 0,
                jwt_secret: "secret".into(),
            }),
        }
    }

    fn bearer(sub: Uuid) -> String {
        let claims = Claims {
            sub,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    #[actix_web::test]
    async fn post_message_persists_and_returns_the_enriched_view() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store
            .insert_user(UserProfile {
                id: alice,
                name: "Alice".into(),
            })
            .await;
        store
            .insert_user(UserProfile {
                id: bob,
                name: "Bob".into(),
            })
            .await;
        let state = test_state(store);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(send_message),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/messages")
            .insert_header(("Authorization", bearer(alice)))
            .set_json(json!({ "receiver_id": bob, "content": "over rest" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);

        let view: MessageView = test::read_body_json(resp).await;
        assert_eq!(view.sender.name, "Alice");
        assert_eq!(view.content, "over rest");

        let pair = ParticipantPair::new(alice, bob).unwrap();
        let conversation = state
            .conversations
            .find_by_pair(pair)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.last_message_id, Some(view.id));
    }

    #[actix_web::test]
    async fn post_message_without_token_is_unauthorized() {
        let state = test_state(MemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(send_message),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/messages")
            .set_json(json!({ "receiver_id": Uuid::new_v4(), "content": "hi" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }
}
