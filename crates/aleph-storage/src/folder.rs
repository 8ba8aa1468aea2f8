use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::info;

use aleph_core::config::StorageConfig;

use crate::{RecordingKind, RecordingStore, StorageError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S%.3f";

/// Writes recordings as `<timestamp>_<word>.wav` into one folder per kind.
/// Folders are created on first use.
#[derive(Debug, Clone)]
pub struct FolderRecordingStore {
    unrecognized_dir: PathBuf,
    misdetection_dir: PathBuf,
}

impl FolderRecordingStore {
    pub fn new(unrecognized_dir: impl Into<PathBuf>, misdetection_dir: impl Into<PathBuf>) -> Self {
        Self {
            unrecognized_dir: unrecognized_dir.into(),
            misdetection_dir: misdetection_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.unrecognized_dir, &config.misdetection_dir)
    }

    pub fn folder(&self, kind: RecordingKind) -> &Path {
        match kind {
            RecordingKind::Unrecognized => &self.unrecognized_dir,
            RecordingKind::Misdetection => &self.misdetection_dir,
        }
    }
}

/// File name for a recording of `word` taken at `at`.
pub fn recording_file_name(at: DateTime<Local>, word: &str) -> String {
    let word: String = word
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("{}_{}.wav", at.format(TIMESTAMP_FORMAT), word)
}

#[async_trait]
impl RecordingStore for FolderRecordingStore {
    async fn save(
        &self,
        kind: RecordingKind,
        word: &str,
        audio: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let folder = self.folder(kind);
        tokio::fs::create_dir_all(folder)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: folder.display().to_string(),
                source,
            })?;

        let path = folder.join(recording_file_name(Local::now(), word));
        tokio::fs::write(&path, audio)
            .await
            .map_err(|e| StorageError::Write(format!("{}: {}", path.display(), e)))?;

        info!(%kind, word, path = %path.display(), bytes = audio.len(), "Recording saved");
        Ok(path)
    }
}
