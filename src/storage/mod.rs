//! History Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - Allows swapping between memory and filesystem without API changes
//! - Each backend persists one mode's full collection as a single unit
//!
//! Limitation: backends assume one process owns a store file. There is no
//! cross-process locking.

use crate::error::{HistoryError, Result};
use crate::history::ConversationRecord;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

pub mod filesystem;
pub mod memory;

/// Trait defining the persistence interface for one mode's history.
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    /// Load the full ordered collection.
    /// Returns an empty vector if nothing has been saved yet.
    /// Fails with `CorruptStore` if stored data exists but is not valid.
    async fn load(&self) -> Result<Vec<ConversationRecord>>;

    /// Replace the stored collection with `records`, all or nothing.
    async fn save(&self, records: &[ConversationRecord]) -> Result<()>;

    /// Keep a copy of corrupt stored data before it gets overwritten.
    async fn preserve_corrupt(&self) -> Result<()> {
        Ok(())
    }

    /// Human readable location, for logs and the CLI.
    fn describe(&self) -> String;
}

/// Structural validation applied to every loaded collection.
pub(crate) fn validate_collection(path: &Path, records: &[ConversationRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        record
            .check_invariants()
            .map_err(|reason| HistoryError::corrupt(path, reason))?;

        if !seen.insert(record.id()) {
            return Err(HistoryError::corrupt(
                path,
                format!("duplicate record id '{}'", record.id()),
            ));
        }
    }
    Ok(())
}
