//! Favorite-protected eviction.
//!
//! Only non-favorites are candidates. The victim is the candidate with the
//! oldest `created_at`; equal timestamps fall back to insertion order, which
//! is the position in the collection.

use super::record::ConversationRecord;

/// Outcome of looking for a record to evict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Remove the record at this index in insertion order.
    Evict { index: usize },
    /// Every record is a favorite.
    NoCandidate,
}

pub fn select_victim(records: &[ConversationRecord]) -> Eviction {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| !record.is_favorite())
        .min_by_key(|(index, record)| (record.created_at(), *index))
        .map(|(index, _)| Eviction::Evict { index })
        .unwrap_or(Eviction::NoCandidate)
}
