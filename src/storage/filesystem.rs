//! File System History Storage
//!
//! Information Hiding:
//! - File path, temp-file naming and JSON format hidden from users
//! - Atomic replace (temp file + fsync + rename) hidden behind `save`
//! - Missing files read as empty history; broken files surface as `CorruptStore`

use super::{validate_collection, HistoryStorage};
use crate::error::{HistoryError, Result};
use crate::history::ConversationRecord;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File system storage - one pretty-printed JSON array per mode.
/// Writes go to `.{file_name}.tmp` next to the target and are renamed over it.
pub struct FileSystemStorage {
    path: PathBuf,
}

impl FileSystemStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file used while a save is in flight.
    pub fn temp_path(&self) -> PathBuf {
        self.sibling(|name| format!(".{name}.tmp"))
    }

    /// Where a corrupt store is copied before being overwritten.
    pub fn corrupt_backup_path(&self) -> PathBuf {
        self.numbered_backup_path(0)
    }

    /// `{name}.corrupt`, then `{name}.corrupt.1`, `{name}.corrupt.2`, ...
    fn numbered_backup_path(&self, n: usize) -> PathBuf {
        match n {
            0 => self.sibling(|name| format!("{name}.corrupt")),
            n => self.sibling(|name| format!("{name}.corrupt.{n}")),
        }
    }

    fn sibling(&self, name: impl FnOnce(&str) -> String) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history.json".to_string());
        let sibling = name(&file_name);
        match self.path.parent() {
            Some(parent) => parent.join(sibling),
            None => PathBuf::from(sibling),
        }
    }

    async fn write_temp(&self, tmp_path: &Path, contents: &[u8]) -> Result<()> {
        let mut tmp_file = fs::File::create(tmp_path).await?;
        tmp_file.write_all(contents).await?;
        // Data must be on disk before the rename makes it visible
        tmp_file.sync_all().await?;
        Ok(())
    }

    /// Flushes the directory entry so the rename itself survives a power loss.
    #[cfg(unix)]
    async fn sync_parent(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::File::open(parent).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_parent(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl HistoryStorage for FileSystemStorage {
    async fn load(&self) -> Result<Vec<ConversationRecord>> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    "[FileSystemStorage] No history at {:?}, starting empty",
                    self.path
                );
                return Ok(Vec::new());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(HistoryError::corrupt(
                    &self.path,
                    format!("unreadable contents: {e}"),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        if json.trim().is_empty() {
            return Err(HistoryError::corrupt(&self.path, "file is empty"));
        }

        let records: Vec<ConversationRecord> = serde_json::from_str(&json)
            .map_err(|e| HistoryError::corrupt(&self.path, e.to_string()))?;
        validate_collection(&self.path, &records)?;

        tracing::debug!(
            "[FileSystemStorage] Loaded {} conversations from {:?}",
            records.len(),
            self.path
        );
        Ok(records)
    }

    async fn save(&self, records: &[ConversationRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = self.temp_path();

        if let Err(e) = self.write_temp(&tmp_path, json.as_bytes()).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        // The new content is already in place; a failed directory sync only
        // weakens durability, so it is not reported as a failed save
        if let Err(e) = self.sync_parent().await {
            tracing::warn!(
                "[FileSystemStorage] Could not sync directory of {:?}: {}",
                self.path,
                e
            );
        }

        tracing::debug!(
            "[FileSystemStorage] Saved {} conversations to {:?}",
            records.len(),
            self.path
        );
        Ok(())
    }

    async fn preserve_corrupt(&self) -> Result<()> {
        if !fs::try_exists(&self.path).await? {
            return Ok(());
        }

        let contents = fs::read(&self.path).await?;
        // Earlier backups are never overwritten
        for n in 0.. {
            let backup = self.numbered_backup_path(n);
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&backup)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(&contents).await?;
            file.sync_all().await?;

            tracing::warn!(
                "[FileSystemStorage] Preserved corrupt history {:?} as {:?}",
                self.path,
                backup
            );
            return Ok(());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
