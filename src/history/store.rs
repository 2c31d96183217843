//! History Store - bounded, favorite-aware conversation history for one mode
//!
//! Information Hiding:
//! - Collection layout and ordering hidden behind query methods
//! - Capacity and favorite rules enforced internally on every mutation
//! - Persistence backend hidden behind `HistoryStorage`
//!
//! Every mutation runs under the store's lock: check, mutate a working copy,
//! save it, and only then replace the in-memory state. A failed save leaves
//! memory exactly as it was before the call.

use super::eviction::{select_victim, Eviction};
use super::record::{ConversationMode, ConversationRecord, Turn};
use crate::error::{HistoryError, Result};
use crate::storage::HistoryStorage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Maximum number of conversations kept per mode.
pub const MAX_CONVERSATIONS: usize = 60;
/// Maximum number of favorites per mode.
pub const MAX_FAVORITES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLimits {
    pub max_conversations: usize,
    pub max_favorites: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_conversations: MAX_CONVERSATIONS,
            max_favorites: MAX_FAVORITES,
        }
    }
}

struct StoreState {
    /// Insertion order, oldest first
    records: Vec<ConversationRecord>,
    /// Set when the backing data failed validation on open and has not been
    /// overwritten yet
    recovered_from_corruption: bool,
}

impl StoreState {
    fn position(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| HistoryError::not_found(id))
    }

    fn favorite_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_favorite()).count()
    }
}

/// Authoritative in-memory history for a single conversation mode.
pub struct HistoryStore {
    mode: ConversationMode,
    limits: HistoryLimits,
    storage: Arc<dyn HistoryStorage>,
    state: Mutex<StoreState>,
}

impl HistoryStore {
    /// Opens the store, loading whatever the backend holds.
    ///
    /// Corrupt data is not fatal: the store starts empty and the backing data
    /// is left alone until the first successful mutation, which first asks the
    /// backend to preserve it. Any other load failure is returned.
    pub async fn open(
        mode: ConversationMode,
        limits: HistoryLimits,
        storage: Arc<dyn HistoryStorage>,
    ) -> Result<Self> {
        let loaded = storage.load().await.and_then(|records| {
            match records.iter().find(|r| r.mode() != mode) {
                Some(stray) => Err(HistoryError::corrupt(
                    storage.describe(),
                    format!(
                        "record '{}' belongs to mode '{}', expected '{}'",
                        stray.id(),
                        stray.mode(),
                        mode
                    ),
                )),
                None => Ok(records),
            }
        });

        let (mut records, recovered_from_corruption) = match loaded {
            Ok(records) => (records, false),
            Err(e) if e.is_corrupt() => {
                tracing::warn!(
                    "[HistoryStore] {} history could not be loaded, starting empty: {}",
                    mode,
                    e
                );
                (Vec::new(), true)
            }
            Err(e) => return Err(e),
        };

        let demoted = enforce_favorite_limit(&mut records, limits.max_favorites);
        if demoted > 0 {
            tracing::warn!(
                "[HistoryStore] Cleared {} oldest favorites in {} history to fit limit {}",
                demoted,
                mode,
                limits.max_favorites
            );
        }

        let evicted = enforce_capacity(&mut records, limits.max_conversations);
        if evicted > 0 {
            tracing::info!(
                "[HistoryStore] Trimmed {} conversations from {} history to fit capacity {}",
                evicted,
                mode,
                limits.max_conversations
            );
        }

        tracing::info!(
            "[HistoryStore] Opened {} history with {} conversations ({})",
            mode,
            records.len(),
            storage.describe()
        );

        Ok(Self {
            mode,
            limits,
            storage,
            state: Mutex::new(StoreState {
                records,
                recovered_from_corruption,
            }),
        })
    }

    pub fn mode(&self) -> ConversationMode {
        self.mode
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn location(&self) -> String {
        self.storage.describe()
    }

    /// All conversations, most recently updated first. Ties list the later
    /// inserted conversation first.
    pub async fn list_all(&self) -> Vec<ConversationRecord> {
        let state = self.state.lock().await;
        let mut indexed: Vec<(usize, &ConversationRecord)> =
            state.records.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| ib.cmp(ia))
        });
        indexed.into_iter().map(|(_, r)| r.clone()).collect()
    }

    pub async fn get(&self, id: &str) -> Result<ConversationRecord> {
        let state = self.state.lock().await;
        let index = state.position(id)?;
        Ok(state.records[index].clone())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn favorite_count(&self) -> usize {
        self.state.lock().await.favorite_count()
    }

    /// Starts a conversation with `first_message` as its first user turn and
    /// returns the new id.
    ///
    /// If the store is full the oldest non-favorite is evicted. If every
    /// conversation is a favorite the call fails with `CapacityExhausted`.
    pub async fn start_new(&self, first_message: impl Into<String>) -> Result<String> {
        let record = ConversationRecord::new(self.mode, Turn::user(first_message))?;
        let id = record.id().to_string();

        let mut state = self.state.lock().await;
        let mut next = state.records.clone();

        // Make room before inserting: the new record is never a candidate
        let mut evicted = Vec::new();
        while next.len() >= self.limits.max_conversations {
            match select_victim(&next) {
                Eviction::Evict { index } => evicted.push(next.remove(index)),
                Eviction::NoCandidate => {
                    tracing::warn!(
                        "[HistoryStore] Rejected new {} conversation: all {} are favorites",
                        self.mode,
                        state.records.len()
                    );
                    return Err(HistoryError::CapacityExhausted {
                        limit: self.limits.max_conversations,
                    });
                }
            }
        }
        next.push(record);

        self.commit(&mut state, next).await?;

        for victim in &evicted {
            tracing::info!(
                "[HistoryStore] Evicted {} conversation '{}' created at {}",
                self.mode,
                victim.id(),
                victim.created_at()
            );
        }
        tracing::debug!("[HistoryStore] Started {} conversation '{}'", self.mode, id);
        Ok(id)
    }

    /// Appends a turn to a conversation and returns the updated record.
    pub async fn append(&self, id: &str, turn: Turn) -> Result<ConversationRecord> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;

        let mut next = state.records.clone();
        next[index].append(turn)?;
        let updated = next[index].clone();

        self.commit(&mut state, next).await?;
        Ok(updated)
    }

    /// Flips the favorite flag and returns the new state.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let target = !state.records[index].is_favorite();
        self.apply_favorite(&mut state, index, target).await
    }

    /// Sets the favorite flag. Setting it to its current value succeeds
    /// without touching storage.
    pub async fn set_favorite(&self, id: &str, favorite: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        if state.records[index].is_favorite() == favorite {
            return Ok(favorite);
        }
        self.apply_favorite(&mut state, index, favorite).await
    }

    async fn apply_favorite(
        &self,
        state: &mut StoreState,
        index: usize,
        favorite: bool,
    ) -> Result<bool> {
        if favorite && state.favorite_count() >= self.limits.max_favorites {
            tracing::warn!(
                "[HistoryStore] Favorite limit {} reached in {} history",
                self.limits.max_favorites,
                self.mode
            );
            return Err(HistoryError::FavoriteLimitReached {
                limit: self.limits.max_favorites,
            });
        }

        let mut next = state.records.clone();
        next[index].set_favorite(favorite);
        self.commit(state, next).await?;
        Ok(favorite)
    }

    /// Removes a conversation regardless of its favorite flag.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;

        let mut next = state.records.clone();
        let removed = next.remove(index);
        self.commit(&mut state, next).await?;

        tracing::debug!("[HistoryStore] Deleted {} conversation '{}'", self.mode, removed.id());
        Ok(())
    }

    /// Drops a trailing user turn left behind by a failed generation.
    /// Nothing is persisted when there is nothing to drop.
    pub async fn remove_trailing_user_turn(&self, id: &str) -> Result<ConversationRecord> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;

        let mut candidate = state.records[index].clone();
        if !candidate.remove_trailing_user_turn() {
            return Ok(candidate);
        }

        let mut next = state.records.clone();
        next[index] = candidate.clone();
        self.commit(&mut state, next).await?;
        Ok(candidate)
    }

    async fn commit(&self, state: &mut StoreState, next: Vec<ConversationRecord>) -> Result<()> {
        if state.recovered_from_corruption {
            self.storage.preserve_corrupt().await?;
        }
        self.storage.save(&next).await?;

        state.records = next;
        state.recovered_from_corruption = false;
        Ok(())
    }
}

/// Clears the favorite flag on the oldest favorites until at most `limit`
/// remain. Returns how many were cleared.
fn enforce_favorite_limit(records: &mut [ConversationRecord], limit: usize) -> usize {
    let mut favorites: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_favorite())
        .map(|(index, _)| index)
        .collect();
    if favorites.len() <= limit {
        return 0;
    }

    favorites.sort_by_key(|&index| (records[index].created_at(), index));
    let excess = favorites.len() - limit;
    for &index in &favorites[..excess] {
        records[index].set_favorite(false);
    }
    excess
}

/// Evicts until `records` fits `capacity`. Non-favorites go first; if only
/// favorites are left the oldest favorite goes, so a loaded store never stays
/// over capacity. Returns how many records were removed.
fn enforce_capacity(records: &mut Vec<ConversationRecord>, capacity: usize) -> usize {
    let mut evicted = 0;
    while records.len() > capacity {
        let index = match select_victim(records) {
            Eviction::Evict { index } => index,
            Eviction::NoCandidate => match oldest(records) {
                Some(index) => index,
                None => break,
            },
        };
        records.remove(index);
        evicted += 1;
    }
    evicted
}

fn oldest(records: &[ConversationRecord]) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .min_by_key(|(index, r)| (r.created_at(), *index))
        .map(|(index, _)| index)
}
