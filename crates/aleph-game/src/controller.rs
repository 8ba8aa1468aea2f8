//! Top-level game loop.
//!
//! The controller is the only owner of the `GameSession`. Each `step` runs
//! the current phase to completion and moves the session to the next one;
//! `run` repeats that until something fatal happens.

use std::time::Duration;

use tracing::{info, warn};

use aleph_core::config::GameConfig;
use aleph_core::error::{AlephError, Result};
use aleph_core::types::{Cue, GamePhase, GameSound, Letter, Level, Pin, VerificationOutcome};

use crate::attract::AttractAnimation;
use crate::selector::LetterSelector;
use crate::state::GameSession;
use crate::verifier::SpeechVerifier;
use crate::Board;

/// Drives the game session through its phases.
pub struct GameController {
    board: Board,
    session: GameSession,
    letters: Vec<Letter>,
    blink_interval: Duration,
    record_led_pin: Pin,
    attract: AttractAnimation,
    selector: LetterSelector,
    verifier: SpeechVerifier,
    pending_outcome: Option<VerificationOutcome>,
}

impl GameController {
    /// Build a controller for the letters and wiring in `config`.
    pub fn new(board: Board, verifier: SpeechVerifier, config: &GameConfig) -> Result<Self> {
        let letters = config.letters();
        if letters.is_empty() {
            return Err(AlephError::Config("game.letters must not be empty".to_string()));
        }
        if config.lives == 0 {
            return Err(AlephError::Config("game.lives must be at least 1".to_string()));
        }

        let attract = AttractAnimation::new(
            board.io.clone(),
            &letters,
            config.start_button_pin,
            config.record_led_pin,
            config.demo_interval(),
        );
        let selector = LetterSelector::new(board.io.clone(), config.start_button_pin);

        Ok(Self {
            session: GameSession::new(config.lives),
            letters,
            blink_interval: config.blink_interval(),
            record_led_pin: config.record_led_pin,
            attract,
            selector,
            verifier,
            board,
            pending_outcome: None,
        })
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn phase(&self) -> GamePhase {
        self.session.phase()
    }

    /// Push the current lives to the display. Failures are logged only.
    pub async fn show_lives(&self) -> bool {
        let lives = self.session.lives();
        let shown = self.board.display.show_lives(lives).await;
        if !shown {
            warn!(lives, "Lives display rejected update");
        }
        shown
    }

    /// Run the game until a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            session_id = %self.session.id,
            lives = self.session.k_lives(),
            letters = self.letters.len(),
            "Game started"
        );
        self.show_lives().await;
        loop {
            self.step().await?;
        }
    }

    /// Run the current phase and transition. Returns the new phase.
    pub async fn step(&mut self) -> Result<GamePhase> {
        match self.session.phase() {
            GamePhase::Attract => {
                self.attract.run_until_start().await?;
                self.session.transition(GamePhase::Selecting)?;
            }
            GamePhase::Selecting => {
                let letter = self.select().await?;
                self.session.begin_recording(letter)?;
            }
            GamePhase::Recording => {
                let letter = self.selected()?;
                let feedback = [self.record_led_pin, letter.pin];
                let outcome = self.verifier.verify(&letter, &feedback).await;
                self.session.transition(GamePhase::Scoring)?;
                self.pending_outcome = Some(outcome);
            }
            GamePhase::Scoring => {
                let outcome = self.pending_outcome.take().ok_or_else(|| {
                    AlephError::Precondition("no outcome to score".to_string())
                })?;
                self.score(outcome).await?;
            }
            GamePhase::GameOver => {
                info!(session_id = %self.session.id, rounds = self.session.rounds(), "Game over");
                self.board.play(GameSound::GameOver).await;
                self.session.transition(GamePhase::Attract)?;
                self.show_lives().await;
            }
        }
        Ok(self.session.phase())
    }

    async fn select(&self) -> Result<Letter> {
        let io = &self.board.io;
        io.set_output(self.record_led_pin, Level::High).await?;
        self.board.play(GameSound::StartGame).await;

        let selected = self
            .selector
            .select_letter(&self.letters, self.blink_interval)
            .await;
        io.set_output(self.record_led_pin, Level::Low).await?;

        let letter = selected?;
        io.set_output(letter.pin, Level::High).await?;
        Ok(letter)
    }

    async fn score(&mut self, outcome: VerificationOutcome) -> Result<()> {
        let letter = self.selected()?;
        let next = self.session.apply_outcome(&outcome)?;

        match &outcome {
            VerificationOutcome::Hit => {
                self.board.play(GameSound::CorrectAnswer).await;
            }
            VerificationOutcome::Miss { heard } => {
                info!(
                    expected = %letter.word,
                    heard = %heard,
                    lives = self.session.lives(),
                    "Life lost"
                );
                self.board.io.set_output(letter.pin, Level::High).await?;
                self.board.play(GameSound::IncorrectAnswer).await;
                self.board.play(Cue::Reference(letter.word.clone())).await;
            }
            other => {
                info!(outcome = %other, "Round retried without penalty");
            }
        }

        self.letters_off().await?;
        if matches!(outcome, VerificationOutcome::Miss { .. }) {
            self.show_lives().await;
        }
        self.session.transition(next)
    }

    fn selected(&self) -> Result<Letter> {
        self.session.selected_letter().cloned().ok_or_else(|| {
            AlephError::Precondition(format!("no letter selected in phase {}", self.session.phase()))
        })
    }

    async fn letters_off(&self) -> Result<()> {
        let pins: Vec<Pin> = self.letters.iter().map(|l| l.pin).collect();
        self.board.io.set_outputs(&pins, Level::Low).await
    }
}

// =============================================================================
// Tests
// =============================================================================
