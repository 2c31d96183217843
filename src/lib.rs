//! Mind-Chat history - local conversation history store
//!
//! This library keeps a bounded, favorite-aware history of conversations
//! per conversation mode and persists each mode to its own file.

mod config;
pub mod error;
pub mod history;
pub mod storage;
pub mod utils;

pub mod cli;

pub use config::{HistoryConfig, LoggingConfig, Settings};
pub use error::{HistoryError, Result};
pub use history::{
    ConversationMode, ConversationRecord, HistoryLimits, HistoryStore, ModeDefinition,
    ModeRegistry, Role, StorageType, Turn,
};
