use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimal profile of a user as read from the externally-owned directory.
/// The user subsystem owns the full record; the core only needs id and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
}
