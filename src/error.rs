//! Error types for the history store.

use std::path::PathBuf;
use thiserror::Error;

/// Every failure the history store can report to its callers.
///
/// Business-rule rejections (`EmptyTurn`, `NotFound`, `FavoriteLimitReached`,
/// `CapacityExhausted`) never change state. `CorruptStore` is produced by the
/// persistence layer on load; `Io` and `Serialization` cover everything else
/// the file system can throw at us.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// A mode string that is not part of the conversation mode enumeration
    #[error("Invalid conversation mode: '{0}'")]
    InvalidMode(String),

    /// A valid mode that the registry was not configured with
    #[error("Unknown mode '{0}': not registered in this configuration")]
    UnknownMode(String),

    #[error("Turn text must not be empty")]
    EmptyTurn,

    #[error("Conversation not found: '{0}'")]
    NotFound(String),

    #[error("Favorite limit reached: at most {limit} favorites per mode")]
    FavoriteLimitReached { limit: usize },

    /// Every record in the mode is a favorite, so nothing can be evicted
    #[error("History is full: all {limit} conversations are favorites")]
    CapacityExhausted { limit: usize },

    #[error("Corrupt history store at {path:?}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptStore { .. })
    }

    /// True for rejections the UI should show to the user as a notice
    /// rather than report as a failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::EmptyTurn
                | Self::FavoriteLimitReached { .. }
                | Self::CapacityExhausted { .. }
                | Self::NotFound(_)
        )
    }
}

/// A type alias for `Result<T, HistoryError>`.
pub type Result<T> = std::result::Result<T, HistoryError>;
