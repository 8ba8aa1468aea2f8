//! Mapping from recognized transcripts to the canonical words they stand for.
//!
//! The recognition service returns whatever it heard, in whatever spelling it
//! prefers, so several transcripts usually map to the same letter name. The
//! lexicon is loaded once at startup from a flat JSON object and is read-only
//! during play.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{AlephError, Result};

/// Read-only transcript -> canonical word mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionLexicon {
    entries: HashMap<String, String>,
}

impl RecognitionLexicon {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Load the lexicon from a JSON object file (`{"transcript": "word", ...}`).
    ///
    /// A missing file is an error: the game cannot score answers without it.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AlephError::Lexicon(format!(
                "lexicon file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let lexicon = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            entries = lexicon.len(),
            "Recognition lexicon loaded"
        );
        Ok(lexicon)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(content)?;
        Ok(Self { entries })
    }

    /// Exact-match lookup of a transcript. `None` means "not a known word".
    pub fn lookup(&self, transcript: &str) -> Option<&str> {
        self.entries.get(transcript).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RecognitionLexicon
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
