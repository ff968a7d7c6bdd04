pub mod conversation;
pub mod tenant;

pub use conversation::{ChatMessage, ConversationTurn, TurnRole};
pub use tenant::Tenant;
