use crate::auth::AuthedUser;
use crate::error::AppError;
use crate::services::thread_service::ThreadService;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// The authenticated user's conversation list, most recent activity first.
#[get("/threads")]
pub async fn list_threads(
    state: web::Data<AppState>,
    user: AuthedUser,
    query: web::Query<ThreadQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = ThreadService::list_threads(
        state.conversations.as_ref(),
        state.messages.as_ref(),
        state.directory.as_ref(),
        user.id,
        query.search.as_deref(),
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(20),
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}
