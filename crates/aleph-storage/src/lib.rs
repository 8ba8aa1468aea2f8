//! Aleph Storage crate - recordings kept for offline review.
//!
//! Captures the game could not recognize, and captures recognized as the
//! wrong letter, are written as WAV files into one folder per kind so the
//! lexicon can be improved later.

pub mod error;
pub mod folder;

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

pub use error::StorageError;
pub use folder::FolderRecordingStore;

/// Which review folder a recording belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingKind {
    /// Nothing usable was recognized.
    Unrecognized,
    /// A known word other than the expected one was recognized.
    Misdetection,
}

impl fmt::Display for RecordingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingKind::Unrecognized => write!(f, "unrecognized"),
            RecordingKind::Misdetection => write!(f, "misdetection"),
        }
    }
}

/// Persistence for labelled recordings.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Save `audio` under `kind`, labelled with the expected `word`.
    /// Returns where it was written.
    async fn save(
        &self,
        kind: RecordingKind,
        word: &str,
        audio: &[u8],
    ) -> Result<PathBuf, StorageError>;
}

/// A recording held by [`MemoryRecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecording {
    pub kind: RecordingKind,
    pub word: String,
    pub audio: Vec<u8>,
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryRecordingStore {
    saved: Mutex<Vec<SavedRecording>>,
    failing: bool,
}

impl MemoryRecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every save fails.
    pub fn failing() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn saved(&self) -> Vec<SavedRecording> {
        self.saved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn saved_of(&self, kind: RecordingKind) -> Vec<SavedRecording> {
        self.saved()
            .into_iter()
            .filter(|recording| recording.kind == kind)
            .collect()
    }
}

#[async_trait]
impl RecordingStore for MemoryRecordingStore {
    async fn save(
        &self,
        kind: RecordingKind,
        word: &str,
        audio: &[u8],
    ) -> Result<PathBuf, StorageError> {
        if self.failing {
            return Err(StorageError::Write("memory store set to fail".to_string()));
        }
        let mut saved = self
            .saved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        saved.push(SavedRecording {
            kind,
            word: word.to_string(),
            audio: audio.to_vec(),
        });
        Ok(PathBuf::from(format!("memory://{}/{}", kind, saved.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(RecordingKind::Unrecognized.to_string(), "unrecognized");
        assert_eq!(RecordingKind::Misdetection.to_string(), "misdetection");
    }

    #[tokio::test]
    async fn test_memory_store_records_saves() {
        let store = MemoryRecordingStore::new();
        store
            .save(RecordingKind::Misdetection, "aleph", b"RIFF")
            .await
            .unwrap();
        store
            .save(RecordingKind::Unrecognized, "bet", b"")
            .await
            .unwrap();

        assert_eq!(store.saved().len(), 2);
        let misdetections = store.saved_of(RecordingKind::Misdetection);
        assert_eq!(misdetections.len(), 1);
        assert_eq!(misdetections[0].word, "aleph");
        assert_eq!(misdetections[0].audio, b"RIFF".to_vec());
    }

    #[tokio::test]
    async fn test_failing_memory_store() {
        let store = MemoryRecordingStore::failing();
        let result = store.save(RecordingKind::Unrecognized, "bet", b"x").await;
        assert!(matches!(result, Err(StorageError::Write(_))));
        assert!(store.saved().is_empty());
    }
}
