//! Mode Registry - one isolated history store per configured mode
//!
//! Information Hiding:
//! - Lazy store construction hidden behind `store_for`
//! - File path resolution per mode hidden from callers
//! - Each mode has its own once-cell, so opening one mode never waits on another

use super::record::ConversationMode;
use super::store::{HistoryLimits, HistoryStore};
use crate::config::Settings;
use crate::error::{HistoryError, Result};
use crate::storage::{filesystem::FileSystemStorage, memory::InMemoryStorage, HistoryStorage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Storage backend type for mode stores
#[derive(Debug, Clone)]
pub enum StorageType {
    /// In-memory storage (lost on process termination)
    Memory,
    /// One JSON file per mode under this directory
    FileSystem(PathBuf),
}

/// How a mode is presented and where its history lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDefinition {
    pub mode: ConversationMode,
    pub display_name: String,
    /// File name relative to the history data directory
    pub history_file: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

struct ModeSlot {
    definition: ModeDefinition,
    store: OnceCell<Arc<HistoryStore>>,
}

pub struct ModeRegistry {
    storage_type: StorageType,
    limits: HistoryLimits,
    default_mode: ConversationMode,
    slots: Vec<ModeSlot>,
}

impl ModeRegistry {
    pub fn new(
        definitions: Vec<ModeDefinition>,
        default_mode: ConversationMode,
        limits: HistoryLimits,
        storage_type: StorageType,
    ) -> Result<Self> {
        let mut slots: Vec<ModeSlot> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if slots.iter().any(|s| s.definition.mode == definition.mode) {
                return Err(HistoryError::InvalidMode(format!(
                    "{} is configured more than once",
                    definition.mode
                )));
            }
            slots.push(ModeSlot {
                definition,
                store: OnceCell::new(),
            });
        }

        if !slots.iter().any(|s| s.definition.mode == default_mode) {
            return Err(HistoryError::UnknownMode(default_mode.to_string()));
        }

        Ok(Self {
            storage_type,
            limits,
            default_mode,
            slots,
        })
    }

    /// Registry backed by files under the configured data directory.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.modes.clone(),
            settings.history.default_mode,
            settings.limits(),
            StorageType::FileSystem(settings.history.data_dir.clone()),
        )
    }

    /// Ephemeral registry with the configured modes and limits.
    pub fn in_memory(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.modes.clone(),
            settings.history.default_mode,
            settings.limits(),
            StorageType::Memory,
        )
    }

    pub fn default_mode(&self) -> ConversationMode {
        self.default_mode
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// Configured modes in configuration order.
    pub fn modes(&self) -> impl Iterator<Item = &ModeDefinition> {
        self.slots.iter().map(|s| &s.definition)
    }

    pub fn definition(&self, mode: ConversationMode) -> Result<&ModeDefinition> {
        self.slot(mode).map(|s| &s.definition)
    }

    /// History file for `mode`, or `None` for in-memory registries.
    pub fn history_path(&self, mode: ConversationMode) -> Result<Option<PathBuf>> {
        let definition = self.definition(mode)?;
        Ok(match &self.storage_type {
            StorageType::Memory => None,
            StorageType::FileSystem(dir) => Some(dir.join(&definition.history_file)),
        })
    }

    /// The store for `mode`, loading it on first use.
    pub async fn store_for(&self, mode: ConversationMode) -> Result<Arc<HistoryStore>> {
        let slot = self.slot(mode)?;
        let store = slot
            .store
            .get_or_try_init(|| async {
                let storage = self.storage_for(&slot.definition);
                tracing::debug!(
                    "[ModeRegistry] Opening {} history at {}",
                    mode,
                    storage.describe()
                );
                HistoryStore::open(mode, self.limits, storage)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(store.clone())
    }

    /// Same as [`ModeRegistry::store_for`], keyed by the mode's string name.
    pub async fn store_for_key(&self, key: &str) -> Result<Arc<HistoryStore>> {
        let mode = key
            .parse::<ConversationMode>()
            .map_err(|_| HistoryError::UnknownMode(key.to_string()))?;
        self.store_for(mode).await
    }

    fn slot(&self, mode: ConversationMode) -> Result<&ModeSlot> {
        self.slots
            .iter()
            .find(|s| s.definition.mode == mode)
            .ok_or_else(|| HistoryError::UnknownMode(mode.to_string()))
    }

    fn storage_for(&self, definition: &ModeDefinition) -> Arc<dyn HistoryStorage> {
        match &self.storage_type {
            StorageType::Memory => Arc::new(InMemoryStorage::new()),
            StorageType::FileSystem(dir) => {
                Arc::new(FileSystemStorage::new(dir.join(&definition.history_file)))
            }
        }
    }
}
