//! Letter selection by timed rotation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use aleph_core::error::{AlephError, Result};
use aleph_core::types::{Letter, Level, Pin};
use aleph_hardware::{DigitalIo, EdgeSignal};

use crate::START_EDGE;

/// Lights each letter in turn until the start button confirms one.
pub struct LetterSelector {
    io: Arc<dyn DigitalIo>,
    confirm_pin: Pin,
}

impl LetterSelector {
    pub fn new(io: Arc<dyn DigitalIo>, confirm_pin: Pin) -> Self {
        Self { io, confirm_pin }
    }

    /// Rotate through `letters` (on for `blink_interval`, off for
    /// `blink_interval`) until the confirm signal fires, then return the
    /// letter that was lit at that moment, or the one just turned off.
    ///
    /// The signal is armed once and disarmed once, and every letter LED is
    /// off on return. An empty letter set is rejected before arming.
    pub async fn select_letter(&self, letters: &[Letter], blink_interval: Duration) -> Result<Letter> {
        if letters.is_empty() {
            return Err(AlephError::Config(
                "cannot select from an empty letter set".to_string(),
            ));
        }

        let mut signal = self.io.arm_edge(self.confirm_pin, START_EDGE).await?;
        let selected = self.rotate(letters, blink_interval, &mut signal).await;

        let pins: Vec<Pin> = letters.iter().map(|l| l.pin).collect();
        let cleared = self.io.set_outputs(&pins, Level::Low).await;
        let disarmed = self.io.disarm_edge(signal).await;

        let letter = selected?;
        cleared?;
        disarmed?;
        info!(letter = %letter.word, pin = letter.pin, "Letter selected");
        Ok(letter)
    }

    async fn rotate(
        &self,
        letters: &[Letter],
        blink_interval: Duration,
        signal: &mut EdgeSignal,
    ) -> Result<Letter> {
        loop {
            for letter in letters {
                for level in [Level::High, Level::Low] {
                    self.io.set_output(letter.pin, level).await?;
                    tokio::select! {
                        biased;
                        _ = signal.fired() => {
                            debug!(letter = %letter.word, ?level, "Confirm signal received");
                            return Ok(letter.clone());
                        }
                        _ = tokio::time::sleep(blink_interval) => {}
                    }
                }
            }
        }
    }
}
