//! Aleph Game crate - the session state machine and its round components.
//!
//! `GameController` drives one `GameSession` through attract, selection,
//! recording, scoring and game over. `LetterSelector` and `SpeechVerifier`
//! run the two interactive parts of a round and hand back plain values; only
//! the controller touches the session.

pub mod attract;
pub mod controller;
pub mod selector;
pub mod state;
pub mod verifier;

use std::sync::Arc;

use tracing::warn;

use aleph_core::types::{Cue, Edge};
use aleph_hardware::{AudioCue, ConnectivityCheck, DigitalIo, LivesDisplay};

pub use attract::AttractAnimation;
pub use controller::GameController;
pub use selector::LetterSelector;
pub use state::GameSession;
pub use verifier::{SpeechVerifier, VerifierSettings, SIGNAL_PERIOD};

/// Edge of the start button line that counts as a press.
pub const START_EDGE: Edge = Edge::Falling;

/// The hardware collaborators shared by the game components.
#[derive(Clone)]
pub struct Board {
    pub io: Arc<dyn DigitalIo>,
    pub audio: Arc<dyn AudioCue>,
    pub display: Arc<dyn LivesDisplay>,
    pub connectivity: Arc<dyn ConnectivityCheck>,
}

impl Board {
    /// Play a cue, logging instead of failing if playback does not work.
    pub async fn play(&self, cue: impl Into<Cue>) {
        let cue = cue.into();
        if let Err(e) = self.audio.play(&cue).await {
            warn!(%cue, error = %e, "Audio cue failed");
        }
    }
}
