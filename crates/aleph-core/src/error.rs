use thiserror::Error;

use crate::types::GamePhase;

/// Top-level error type for the Aleph game.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for AlephError` so that `?` works across crate
/// boundaries. Everything that reaches the process boundary as an `AlephError`
/// is fatal to the session; recoverable per-round failures never surface here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AlephError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lexicon error: {0}")]
    Lexicon(String),

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: GamePhase, to: GamePhase },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for AlephError {
    fn from(err: toml::de::Error) -> Self {
        AlephError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AlephError {
    fn from(err: serde_json::Error) -> Self {
        AlephError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Aleph operations.
pub type Result<T> = std::result::Result<T, AlephError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AlephError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(AlephError, &str)> = vec![
            (
                AlephError::Lexicon("dict.json not found".to_string()),
                "Lexicon error: dict.json not found",
            ),
            (
                AlephError::Hardware("pin 7 busy".to_string()),
                "Hardware error: pin 7 busy",
            ),
            (
                AlephError::Audio("no player".to_string()),
                "Audio error: no player",
            ),
            (
                AlephError::Display("port closed".to_string()),
                "Display error: port closed",
            ),
            (
                AlephError::Speech("bad key".to_string()),
                "Speech error: bad key",
            ),
            (
                AlephError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                AlephError::Precondition("no internet connection".to_string()),
                "Precondition failed: no internet connection",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = AlephError::InvalidTransition {
            from: GamePhase::Attract,
            to: GamePhase::Scoring,
        };
        assert_eq!(err.to_string(), "Invalid phase transition: Attract -> Scoring");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let aleph_err: AlephError = io_err.into();
        assert!(matches!(aleph_err, AlephError::Io(_)));
        assert!(aleph_err.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let aleph_err: AlephError = err.unwrap_err().into();
        assert!(matches!(aleph_err, AlephError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let aleph_err: AlephError = err.unwrap_err().into();
        assert!(matches!(aleph_err, AlephError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<u8> {
            let parsed: std::result::Result<u8, std::io::Error> = Ok(4);
            Ok(parsed?)
        }

        assert_eq!(inner().unwrap(), 4);
    }
}
