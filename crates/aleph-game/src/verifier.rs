//! One speech-verification attempt per call.
//!
//! While the backend records, a signal task blinks the feedback pins. It
//! polls a shared `listening` flag and exits within one period after the flag
//! drops. The flag is cleared by a guard, so every way out of the capture
//! (result, error, panic in the backend, or the attempt being dropped) stops
//! the blinking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use aleph_core::config::SpeechConfig;
use aleph_core::lexicon::RecognitionLexicon;
use aleph_core::types::{
    GameSound, Letter, Level, Pin, PreconditionFailure, VerificationOutcome,
};
use aleph_hardware::DigitalIo;
use aleph_speech::{Capture, CaptureRequest, SpeechBackend, SpeechError};
use aleph_storage::{RecordingKind, RecordingStore};

use crate::Board;

/// Toggle period of the recording feedback.
pub const SIGNAL_PERIOD: Duration = Duration::from_millis(200);

/// Limits and probe settings for verification attempts.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub listen_timeout: Duration,
    pub phrase_limit: Duration,
    /// Name of the credential reported when it is missing.
    pub credentials_name: String,
    pub connectivity_endpoint: String,
    pub connectivity_timeout: Duration,
    pub signal_period: Duration,
}

impl VerifierSettings {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            listen_timeout: config.listen_timeout(),
            phrase_limit: config.phrase_limit(),
            credentials_name: config.credentials_env.clone(),
            connectivity_endpoint: config.connectivity_endpoint.clone(),
            connectivity_timeout: config.connectivity_timeout(),
            signal_period: SIGNAL_PERIOD,
        }
    }
}

/// Clears the listening flag when dropped.
struct ListeningGuard(Arc<AtomicBool>);

impl Drop for ListeningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs single verification attempts and classifies their results.
pub struct SpeechVerifier {
    board: Board,
    backend: Arc<dyn SpeechBackend>,
    store: Arc<dyn RecordingStore>,
    lexicon: Arc<RecognitionLexicon>,
    settings: VerifierSettings,
}

impl SpeechVerifier {
    pub fn new(
        board: Board,
        backend: Arc<dyn SpeechBackend>,
        store: Arc<dyn RecordingStore>,
        lexicon: Arc<RecognitionLexicon>,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            board,
            backend,
            store,
            lexicon,
            settings,
        }
    }

    /// Run one attempt for `target`, blinking `feedback_pins` while recording.
    ///
    /// Never fails: every exit resolves to exactly one outcome. Feedback pins
    /// are left low.
    pub async fn verify(&self, target: &Letter, feedback_pins: &[Pin]) -> VerificationOutcome {
        if let Some(failure) = self.check_preconditions().await {
            error!(letter = %target.word, reason = %failure, "Verification cannot start");
            return VerificationOutcome::PreconditionFailed(failure);
        }

        self.board.play(GameSound::StartRecord).await;
        let captured = self.capture_with_feedback(feedback_pins).await;
        let outcome = self.classify(target, captured).await;
        info!(letter = %target.word, %outcome, "Verification finished");
        outcome
    }

    async fn check_preconditions(&self) -> Option<PreconditionFailure> {
        if !self.backend.has_credentials() {
            return Some(PreconditionFailure::MissingCredentials(
                self.settings.credentials_name.clone(),
            ));
        }

        let endpoint = &self.settings.connectivity_endpoint;
        let reachable = self
            .board
            .connectivity
            .is_reachable(endpoint, self.settings.connectivity_timeout)
            .await;
        if !reachable {
            self.board.play(GameSound::NoInternet).await;
            return Some(PreconditionFailure::NoConnectivity(endpoint.clone()));
        }
        None
    }

    async fn capture_with_feedback(
        &self,
        feedback_pins: &[Pin],
    ) -> Result<Result<Capture, SpeechError>, JoinError> {
        let listening = Arc::new(AtomicBool::new(true));
        let signal = tokio::spawn(signal_task(
            self.board.io.clone(),
            feedback_pins.to_vec(),
            listening.clone(),
            self.settings.signal_period,
        ));

        let captured = {
            let _guard = ListeningGuard(listening);
            let backend = self.backend.clone();
            let request = CaptureRequest {
                listen_timeout: self.settings.listen_timeout,
                phrase_limit: self.settings.phrase_limit,
            };
            tokio::spawn(async move { backend.capture(request).await }).await
        };

        match signal.await {
            Ok(toggles) => debug!(toggles, "Signal task stopped"),
            Err(e) => warn!(error = %e, "Signal task ended abnormally"),
        }
        captured
    }

    async fn classify(
        &self,
        target: &Letter,
        captured: Result<Result<Capture, SpeechError>, JoinError>,
    ) -> VerificationOutcome {
        match captured {
            Err(e) => {
                error!(error = %e, "Speech backend faulted");
                self.board.play(GameSound::RequestError).await;
                VerificationOutcome::ServiceError
            }
            Ok(Err(SpeechError::Request(msg))) | Ok(Err(SpeechError::Other(msg))) => {
                warn!(error = %msg, "Recognition request failed");
                self.board.play(GameSound::RequestError).await;
                VerificationOutcome::ServiceError
            }
            Ok(Err(SpeechError::Unrecognized { audio })) => {
                info!(letter = %target.word, "Speech could not be recognized");
                self.board.play(GameSound::RecognitionError).await;
                if let Some(audio) = audio {
                    self.persist(RecordingKind::Unrecognized, target, &audio).await;
                }
                VerificationOutcome::UnknownSpeech
            }
            Ok(Err(SpeechError::WaitTimeout)) => {
                info!(letter = %target.word, "No speech before timeout");
                self.board.play(GameSound::RecognitionTimeout).await;
                VerificationOutcome::Timeout
            }
            Ok(Ok(capture)) => self.classify_transcript(target, capture).await,
        }
    }

    async fn classify_transcript(&self, target: &Letter, capture: Capture) -> VerificationOutcome {
        let transcript = capture.transcript.as_str();
        if transcript.trim().is_empty() {
            info!(letter = %target.word, "Recognition returned an empty transcript");
            self.board.play(GameSound::RecognitionError).await;
            match &capture.audio {
                Some(audio) => self.persist(RecordingKind::Unrecognized, target, audio).await,
                None => debug!("No audio to keep for the empty transcript"),
            }
            return VerificationOutcome::UnknownSpeech;
        }

        match self.lexicon.lookup(transcript) {
            None => {
                info!(letter = %target.word, transcript, "Transcript is not in the lexicon");
                self.board.play(GameSound::RecognitionError).await;
                VerificationOutcome::UnknownSpeech
            }
            Some(word) if word == target.word => {
                info!(letter = %target.word, transcript, "Correct answer");
                VerificationOutcome::Hit
            }
            Some(word) => {
                info!(letter = %target.word, heard = word, transcript, "Wrong answer");
                if let Some(audio) = &capture.audio {
                    self.persist(RecordingKind::Misdetection, target, audio).await;
                }
                VerificationOutcome::Miss {
                    heard: word.to_string(),
                }
            }
        }
    }

    async fn persist(&self, kind: RecordingKind, target: &Letter, audio: &[u8]) {
        if let Err(e) = self.store.save(kind, &target.word, audio).await {
            warn!(%kind, letter = %target.word, error = %e, "Failed to keep recording");
        }
    }
}

/// Blink `pins` every `period` while `listening` holds, then drive them low.
/// Returns the number of toggles.
async fn signal_task(
    io: Arc<dyn DigitalIo>,
    pins: Vec<Pin>,
    listening: Arc<AtomicBool>,
    period: Duration,
) -> u32 {
    let mut level = Level::Low;
    let mut toggles = 0;
    while listening.load(Ordering::Acquire) {
        level = Level::from(!level.is_high());
        if let Err(e) = io.set_outputs(&pins, level).await {
            warn!(error = %e, "Feedback toggle failed");
        }
        toggles += 1;
        tokio::time::sleep(period).await;
    }
    if let Err(e) = io.set_outputs(&pins, Level::Low).await {
        warn!(error = %e, "Failed to clear feedback pins");
    }
    toggles
}

// =============================================================================
// Tests
// =============================================================================
