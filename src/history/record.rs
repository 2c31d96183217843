//! Conversation Record Model
//!
//! Information Hiding:
//! - Identifier generation and timestamp bookkeeping hidden behind constructors
//! - Fields are read-only from outside; mutation goes through checked methods
//! - On-disk field names are owned by serde attributes here, not by callers

use crate::error::{HistoryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 30;

/// The fixed set of conversation modes. Each mode owns an isolated history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Counseling conversations with a guiding system prompt
    Counseling,
    /// Plain chat without a system prompt
    Plain,
}

impl ConversationMode {
    pub const ALL: [ConversationMode; 2] = [ConversationMode::Counseling, ConversationMode::Plain];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationMode::Counseling => "counseling",
            ConversationMode::Plain => "plain",
        }
    }
}

impl fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationMode {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "counseling" => Ok(ConversationMode::Counseling),
            "plain" => Ok(ConversationMode::Plain),
            other => Err(HistoryError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A single conversation: its turns plus metadata.
///
/// Invariants upheld by every constructor and mutator:
/// - `messages` is never empty
/// - `updated_at >= created_at`, and `updated_at` is the timestamp of the last turn
/// - `id` and `mode` never change after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    id: String,
    mode: ConversationMode,
    messages: Vec<Turn>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    is_favorite: bool,
}

impl ConversationRecord {
    /// Starts a new conversation from its first turn.
    pub fn new(mode: ConversationMode, first: Turn) -> Result<Self> {
        if first.is_blank() {
            return Err(HistoryError::EmptyTurn);
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            mode,
            created_at: first.timestamp,
            updated_at: first.timestamp,
            messages: vec![first],
            is_favorite: false,
        })
    }

    /// Same as [`ConversationRecord::new`] but takes the mode by its string key,
    /// failing with `InvalidMode` for anything outside the enumeration.
    pub fn for_mode(mode: &str, first: Turn) -> Result<Self> {
        Self::new(mode.parse()?, first)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> ConversationMode {
        self.mode
    }

    pub fn messages(&self) -> &[Turn] {
        &self.messages
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.messages.last()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    /// Appends a turn. A turn stamped earlier than the current `updated_at`
    /// (clock skew) is re-stamped so timestamps never go backwards.
    pub fn append(&mut self, mut turn: Turn) -> Result<()> {
        if turn.is_blank() {
            return Err(HistoryError::EmptyTurn);
        }
        if turn.timestamp < self.updated_at {
            turn.timestamp = self.updated_at;
        }

        self.updated_at = turn.timestamp;
        self.messages.push(turn);
        Ok(())
    }

    /// Sets the favorite flag. Returns whether the flag actually changed.
    pub fn set_favorite(&mut self, favorite: bool) -> bool {
        let changed = self.is_favorite != favorite;
        self.is_favorite = favorite;
        changed
    }

    /// Drops the last turn if it was written by the user and is not the only
    /// turn left. Returns whether anything was removed.
    pub fn remove_trailing_user_turn(&mut self) -> bool {
        let trailing_user = matches!(self.messages.last(), Some(t) if t.role == Role::User);
        if !trailing_user || self.messages.len() < 2 {
            return false;
        }

        self.messages.pop();
        if let Some(last) = self.messages.last() {
            self.updated_at = last.timestamp.max(self.created_at);
        }
        true
    }

    /// Label for history listings: the first user turn, whitespace collapsed
    /// and cut to a fixed width.
    pub fn title(&self) -> String {
        let source = self
            .messages
            .iter()
            .find(|t| t.role == Role::User)
            .or_else(|| self.messages.first())
            .map(|t| t.text.as_str())
            .unwrap_or_default();

        let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= TITLE_MAX_CHARS {
            return collapsed;
        }

        let mut title: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
        title.push('…');
        title
    }

    /// Checks the invariants a record read back from disk must satisfy.
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("record with empty id".to_string());
        }
        if self.messages.is_empty() {
            return Err(format!("record '{}' has no messages", self.id));
        }
        if self.updated_at < self.created_at {
            return Err(format!(
                "record '{}' was updated before it was created",
                self.id
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn with_timestamps(
        mut self,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        for turn in &mut self.messages {
            turn.timestamp = created_at;
        }
        self
    }
}
