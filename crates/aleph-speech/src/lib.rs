//! Aleph Speech crate - speech capture and recognition behind one port.
//!
//! A backend records one spoken phrase and turns it into a transcript, or
//! reports which way it failed. `GoogleSpeechBackend` does this with an
//! external recorder and the Google Speech REST API; `ScriptedSpeechBackend`
//! replays canned results for tests.

pub mod error;
pub mod google;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

pub use error::SpeechError;
pub use google::GoogleSpeechBackend;

// =============================================================================
// Request / result types
// =============================================================================

/// Limits for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Maximum wait for speech to begin.
    pub listen_timeout: Duration,
    /// Maximum length of the recorded phrase.
    pub phrase_limit: Duration,
}

/// A successful capture: the transcript plus the raw WAV it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// May be empty when the service returned a blank result.
    pub transcript: String,
    pub audio: Option<Vec<u8>>,
}

impl Capture {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            audio: None,
        }
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = Some(audio);
        self
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Blocking capture-and-transcribe service.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Whether the credential the service needs is configured.
    fn has_credentials(&self) -> bool;

    /// Record one phrase within the given limits and transcribe it.
    async fn capture(&self, request: CaptureRequest) -> Result<Capture, SpeechError>;
}

// =============================================================================
// Scripted implementation
// =============================================================================

/// One scripted reply of [`ScriptedSpeechBackend`].
#[derive(Debug)]
pub enum ScriptedReply {
    Capture(Capture),
    Error(SpeechError),
    /// Panic inside `capture`, standing in for an unclassified backend fault.
    Panic,
}

/// Backend that replays queued replies in order.
///
/// Once the queue is empty every capture reports `WaitTimeout`.
#[derive(Debug)]
pub struct ScriptedSpeechBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<CaptureRequest>>,
    calls: AtomicUsize,
    credentials: bool,
    delay: Duration,
}

impl Default for ScriptedSpeechBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSpeechBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            credentials: true,
            delay: Duration::ZERO,
        }
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    /// Make every capture take `delay` before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, reply: ScriptedReply) -> &Self {
        self.lock_replies().push_back(reply);
        self
    }

    pub fn push_transcript(&self, transcript: &str) -> &Self {
        self.push(ScriptedReply::Capture(
            Capture::new(transcript).with_audio(transcript.as_bytes().to_vec()),
        ))
    }

    pub fn push_error(&self, error: SpeechError) -> &Self {
        self.push(ScriptedReply::Error(error))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CaptureRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptedReply>> {
        self.replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl SpeechBackend for ScriptedSpeechBackend {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn capture(&self, request: CaptureRequest) -> Result<Capture, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.lock_replies().pop_front();
        match reply {
            Some(ScriptedReply::Capture(capture)) => Ok(capture),
            Some(ScriptedReply::Error(error)) => Err(error),
            Some(ScriptedReply::Panic) => panic!("scripted speech backend fault"),
            None => Err(SpeechError::WaitTimeout),
        }
    }
}
