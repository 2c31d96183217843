//! In-Memory History Storage
//!
//! Information Hiding:
//! - Vec snapshot hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral histories

use super::HistoryStorage;
use crate::error::Result;
use crate::history::ConversationRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage holding the last saved snapshot.
/// Data is lost when process terminates
#[derive(Clone)]
pub struct InMemoryStorage {
    records: Arc<RwLock<Vec<ConversationRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Storage that starts out holding `records`, as if they had been saved.
    pub fn with_records(records: Vec<ConversationRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Copy of the last saved snapshot.
    pub async fn snapshot(&self) -> Vec<ConversationRecord> {
        self.records.read().await.clone()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStorage for InMemoryStorage {
    async fn load(&self) -> Result<Vec<ConversationRecord>> {
        let records = self.records.read().await.clone();
        tracing::debug!("[InMemoryStorage] Loaded {} conversations", records.len());
        Ok(records)
    }

    async fn save(&self, records: &[ConversationRecord]) -> Result<()> {
        let mut stored = self.records.write().await;
        *stored = records.to_vec();
        tracing::debug!("[InMemoryStorage] Saved {} conversations", records.len());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
