pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{Conversation, ParticipantPair};
pub use message::{Message, MessageView, NewMessage};
pub use user::UserProfile;
