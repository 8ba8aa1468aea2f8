use thiserror::Error;

use aleph_core::error::AlephError;

/// Failure kinds a speech backend reports for one capture.
///
/// Each variant maps to exactly one verification outcome, so backends must
/// classify their own faults instead of passing raw errors through.
#[derive(Error, Debug)]
pub enum SpeechError {
    /// Audio was captured but nothing could be recognized in it.
    #[error("speech could not be recognized")]
    Unrecognized { audio: Option<Vec<u8>> },

    /// No speech started within the listen timeout.
    #[error("timed out waiting for speech")]
    WaitTimeout,

    /// The recognition request failed.
    #[error("recognition request failed: {0}")]
    Request(String),

    /// Any other backend fault.
    #[error("speech backend error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        SpeechError::Request(err.to_string())
    }
}

impl From<SpeechError> for AlephError {
    fn from(err: SpeechError) -> Self {
        AlephError::Speech(err.to_string())
    }
}
