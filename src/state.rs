use crate::config::Config;
use crate::presence::PresenceRegistry;
use crate::storage::{ConversationStore, MessageStore, UserDirectory};
use std::sync::Arc;

/// Shared application state handed to every handler and session.
#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub presence: PresenceRegistry,
    pub config: Arc<Config>,
}
