//! Conversation history domain: records, per-mode stores and the registry
//! that hands them out.

pub mod eviction;
pub mod record;
pub mod registry;
pub mod store;

pub use record::{ConversationMode, ConversationRecord, Role, Turn};
pub use registry::{ModeDefinition, ModeRegistry, StorageType};
pub use store::{HistoryLimits, HistoryStore, MAX_CONVERSATIONS, MAX_FAVORITES};
