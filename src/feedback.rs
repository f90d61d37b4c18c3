//! User feedback persisted as one JSON array per day.
//!
//! Writes are crash-safe: the new array goes to a `.tmp` file, is read back
//! and validated, the current file is copied to `.bak`, and the temp file is
//! renamed over the original. A damaged daily file is recovered from its
//! backup when possible. Writers are serialised with an exclusive lock on a
//! lock file in the feedback directory.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_FILE: &str = ".feedback.lock";

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("{0}")]
    Validation(String),

    #[error("feedback storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("feedback serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("feedback task failed: {0}")]
    Task(String),
}

/// A stored feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub timestamp: String,
    pub contact: String,
    pub feedback: String,
}

/// What the caller gets back after a successful write.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReceipt {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct FeedbackStore {
    dir: PathBuf,
}

impl FeedbackStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Validate and append one entry to today's file.
    pub async fn store(&self, contact: &str, feedback: &str) -> Result<FeedbackReceipt, FeedbackError> {
        let contact = contact.trim();
        let feedback = feedback.trim();
        if contact.is_empty() {
            return Err(FeedbackError::Validation("Contact information is required".to_string()));
        }
        if feedback.is_empty() {
            return Err(FeedbackError::Validation("Feedback text is required".to_string()));
        }

        let now = Utc::now();
        let entry = FeedbackEntry {
            timestamp: now.to_rfc3339(),
            contact: contact.to_string(),
            feedback: feedback.to_string(),
        };
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || append_entry(&dir, now, entry))
            .await
            .map_err(|e| FeedbackError::Task(e.to_string()))?
    }

    /// Entries stored on the day of `date`.
    pub async fn entries_for(&self, date: DateTime<Utc>) -> Result<Vec<FeedbackEntry>, FeedbackError> {
        let path = self.dir.join(daily_filename(date));
        tokio::task::spawn_blocking(move || read_entries(&path))
            .await
            .map_err(|e| FeedbackError::Task(e.to_string()))?
    }
}

fn daily_filename(date: DateTime<Utc>) -> String {
    format!("feedback_{}.json", date.format("%Y-%m-%d"))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn append_entry(
    dir: &Path,
    now: DateTime<Utc>,
    entry: FeedbackEntry,
) -> Result<FeedbackReceipt, FeedbackError> {
    fs::create_dir_all(dir)?;

    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(dir.join(LOCK_FILE))?;
    lock.lock_exclusive()?;

    let filename = daily_filename(now);
    let path = dir.join(&filename);
    let result = write_with_backup(&path, entry.clone());

    if let Err(e) = FileExt::unlock(&lock) {
        tracing::warn!("Failed to release feedback lock in {}: {}", dir.display(), e);
    }
    result?;

    tracing::info!("Stored feedback from {} in {}", entry.contact, path.display());
    Ok(FeedbackReceipt {
        status: "success".to_string(),
        message: "Feedback saved successfully".to_string(),
        timestamp: entry.timestamp,
        filename,
    })
}

fn write_with_backup(path: &Path, entry: FeedbackEntry) -> Result<(), FeedbackError> {
    let mut entries = read_entries(path)?;
    entries.push(entry);

    let tmp = with_suffix(path, ".tmp");
    let backup = with_suffix(path, ".bak");

    let written = (|| -> Result<(), FeedbackError> {
        let contents = serde_json::to_string_pretty(&entries)?;
        fs::write(&tmp, contents)?;

        // Read back before touching the original.
        let check: Vec<FeedbackEntry> = serde_json::from_str(&fs::read_to_string(&tmp)?)?;
        if check.len() != entries.len() {
            return Err(FeedbackError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "temporary feedback file did not verify",
            )));
        }

        if path.exists() {
            fs::copy(path, &backup)?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if backup.exists() {
        if let Err(e) = fs::remove_file(&backup) {
            tracing::warn!("Could not remove feedback backup {}: {}", backup.display(), e);
        }
    }
    Ok(())
}

/// Existing entries of a daily file. Falls back to the `.bak` copy when the
/// file is damaged, and to an empty list when neither parses.
fn read_entries(path: &Path) -> Result<Vec<FeedbackEntry>, FeedbackError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    match load(path) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            tracing::warn!("Feedback file {} is damaged: {}", path.display(), e);
            let backup = with_suffix(path, ".bak");
            match load(&backup) {
                Ok(entries) => {
                    tracing::info!("Recovered {} feedback entries from {}", entries.len(), backup.display());
                    Ok(entries)
                }
                Err(_) => {
                    tracing::warn!("No usable feedback backup, starting a new list");
                    Ok(Vec::new())
                }
            }
        }
    }
}

fn load(path: &Path) -> Result<Vec<FeedbackEntry>, FeedbackError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_to_daily_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());

        let first = store.store(" ann@example.com ", " Great answers ").await.unwrap();
        store.store("bob", "Could be faster").await.unwrap();

        assert_eq!(first.status, "success");
        assert_eq!(first.message, "Feedback saved successfully");
        assert!(first.filename.starts_with("feedback_") && first.filename.ends_with(".json"));

        let entries = store.entries_for(Utc::now()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].contact, "ann@example.com");
        assert_eq!(entries[0].feedback, "Great answers");
        assert!(DateTime::parse_from_rfc3339(&entries[1].timestamp).is_ok());

        let path = dir.path().join(&first.filename);
        assert!(!with_suffix(&path, ".tmp").exists());
        assert!(!with_suffix(&path, ".bak").exists());
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        assert!(matches!(
            store.store("  ", "text").await,
            Err(FeedbackError::Validation(_))
        ));
        assert!(matches!(
            store.store("me", "").await,
            Err(FeedbackError::Validation(_))
        ));
        assert!(store.entries_for(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn damaged_file_is_recovered_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        let path = dir.path().join(daily_filename(Utc::now()));

        let saved = vec![FeedbackEntry {
            timestamp: "2025-01-01T00:00:00+00:00".to_string(),
            contact: "old".to_string(),
            feedback: "kept".to_string(),
        }];
        fs::write(&path, "[{\"truncated").unwrap();
        fs::write(with_suffix(&path, ".bak"), serde_json::to_string(&saved).unwrap()).unwrap();

        store.store("new", "entry").await.unwrap();

        let entries = store.entries_for(Utc::now()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].feedback, "kept");
        assert_eq!(entries[1].feedback, "entry");
    }

    #[tokio::test]
    async fn damaged_file_without_backup_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());
        let path = dir.path().join(daily_filename(Utc::now()));
        fs::write(&path, "not json").unwrap();

        store.store("me", "hello").await.unwrap();
        assert_eq!(store.entries_for(Utc::now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeedbackStore::new(dir.path());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.store(&format!("user{}", i), "hi").await })
            })
            .collect();
        for handle in handles {
            tokio_test::assert_ok!(handle.await.unwrap());
        }

        assert_eq!(store.entries_for(Utc::now()).await.unwrap().len(), 8);
    }
}
