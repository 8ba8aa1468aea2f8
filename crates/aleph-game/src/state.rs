//! Game session state with validated phase transitions.
//!
//! Valid transitions:
//! - Attract -> Selecting (start pressed)
//! - Selecting -> Recording (letter confirmed)
//! - Recording -> Scoring (verification finished)
//! - Scoring -> Selecting (round over, lives left)
//! - Scoring -> GameOver (last life lost)
//! - GameOver -> Attract (lives reset)

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aleph_core::error::{AlephError, Result};
use aleph_core::types::{GamePhase, Letter, VerificationOutcome};

/// The single mutable game state.
///
/// `selected_letter` is only ever `Some` in Recording and Scoring, and lives
/// change only when an outcome is scored or when GameOver resets them.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    lives: u32,
    k_lives: u32,
    phase: GamePhase,
    selected_letter: Option<Letter>,
    rounds: u64,
}

impl GameSession {
    /// Create a session in Attract with full lives.
    pub fn new(k_lives: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            lives: k_lives,
            k_lives,
            phase: GamePhase::Attract,
            selected_letter: None,
            rounds: 0,
        }
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn k_lives(&self) -> u32 {
        self.k_lives
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn selected_letter(&self) -> Option<&Letter> {
        self.selected_letter.as_ref()
    }

    /// Rounds scored since the session was created.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Move to `target`.
    ///
    /// Recording can only be entered through [`begin_recording`]. Leaving
    /// GameOver resets lives to the session's starting value.
    ///
    /// [`begin_recording`]: GameSession::begin_recording
    pub fn transition(&mut self, target: GamePhase) -> Result<()> {
        if target == GamePhase::Recording {
            return Err(AlephError::Precondition(
                "entering Recording requires a selected letter".to_string(),
            ));
        }
        self.apply_transition(target)
    }

    /// Selecting -> Recording with the confirmed letter.
    pub fn begin_recording(&mut self, letter: Letter) -> Result<()> {
        self.apply_transition(GamePhase::Recording)?;
        self.selected_letter = Some(letter);
        Ok(())
    }

    /// Apply a verification outcome to the lives counter and return the phase
    /// the session should move to next. Only valid in Scoring.
    ///
    /// A failed precondition is returned as an error and changes nothing.
    pub fn apply_outcome(&mut self, outcome: &VerificationOutcome) -> Result<GamePhase> {
        if self.phase != GamePhase::Scoring {
            return Err(AlephError::Precondition(format!(
                "outcome '{}' applied outside Scoring (phase {})",
                outcome, self.phase
            )));
        }
        if outcome.is_fatal() {
            return Err(AlephError::Precondition(outcome.to_string()));
        }
        self.rounds += 1;
        if outcome.is_retry() {
            return Ok(GamePhase::Selecting);
        }
        if let VerificationOutcome::Miss { .. } = outcome {
            self.lives = self.lives.saturating_sub(1);
            if self.lives == 0 {
                return Ok(GamePhase::GameOver);
            }
        }
        Ok(GamePhase::Selecting)
    }

    fn apply_transition(&mut self, target: GamePhase) -> Result<()> {
        if !self.phase.can_transition_to(&target) {
            return Err(AlephError::InvalidTransition {
                from: self.phase,
                to: target,
            });
        }
        tracing::debug!(session_id = %self.id, "Game phase: {} -> {}", self.phase, target);
        if self.phase == GamePhase::GameOver {
            self.lives = self.k_lives;
        }
        if !target.holds_letter() {
            self.selected_letter = None;
        }
        self.phase = target;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use aleph_core::types::PreconditionFailure;

    fn session_in_scoring(k_lives: u32) -> GameSession {
        let mut session = GameSession::new(k_lives);
        session.transition(GamePhase::Selecting).unwrap();
        session.begin_recording(Letter::new(11, "aleph")).unwrap();
        session.transition(GamePhase::Scoring).unwrap();
        session
    }

    #[test]
    fn test_new_session() {
        let session = GameSession::new(4);
        assert_eq!(session.lives(), 4);
        assert_eq!(session.k_lives(), 4);
        assert_eq!(session.phase(), GamePhase::Attract);
        assert!(session.selected_letter().is_none());
        assert_eq!(session.rounds(), 0);
    }

    #[test]
    fn test_full_round_transitions() {
        let mut session = session_in_scoring(4);
        assert_eq!(session.selected_letter(), Some(&Letter::new(11, "aleph")));

        let next = session.apply_outcome(&VerificationOutcome::Hit).unwrap();
        assert_eq!(next, GamePhase::Selecting);
        session.transition(next).unwrap();
        assert!(session.selected_letter().is_none());
        assert_eq!(session.lives(), 4);
    }

    #[test]
    fn test_recording_requires_letter() {
        let mut session = GameSession::new(4);
        session.transition(GamePhase::Selecting).unwrap();
        let err = session.transition(GamePhase::Recording).unwrap_err();
        assert!(matches!(err, AlephError::Precondition(_)));
        assert_eq!(session.phase(), GamePhase::Selecting);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut session = GameSession::new(4);
        let err = session.transition(GamePhase::Scoring).unwrap_err();
        match err {
            AlephError::InvalidTransition { from, to } => {
                assert_eq!(from, GamePhase::Attract);
                assert_eq!(to, GamePhase::Scoring);
            }
            other => panic!("Expected InvalidTransition, got {:?}", other),
        }
        assert_eq!(session.phase(), GamePhase::Attract);

        // begin_recording from Attract is also invalid and leaves no letter
        assert!(session.begin_recording(Letter::new(13, "bet")).is_err());
        assert!(session.selected_letter().is_none());
    }

    #[test]
    fn test_miss_decrements_lives() {
        let mut session = session_in_scoring(4);
        let next = session
            .apply_outcome(&VerificationOutcome::Miss { heard: "bet".into() })
            .unwrap();
        assert_eq!(next, GamePhase::Selecting);
        assert_eq!(session.lives(), 3);
        assert_eq!(session.rounds(), 1);
    }

    #[test]
    fn test_retry_outcomes_keep_lives() {
        for outcome in [
            VerificationOutcome::UnknownSpeech,
            VerificationOutcome::ServiceError,
            VerificationOutcome::Timeout,
        ] {
            let mut session = session_in_scoring(2);
            assert_eq!(session.apply_outcome(&outcome).unwrap(), GamePhase::Selecting);
            assert_eq!(session.lives(), 2);
            assert_eq!(session.rounds(), 1);
        }
    }

    #[test]
    fn test_last_life_leads_to_game_over_and_reset() {
        let mut session = session_in_scoring(1);
        let next = session
            .apply_outcome(&VerificationOutcome::Miss { heard: "gimel".into() })
            .unwrap();
        assert_eq!(next, GamePhase::GameOver);
        assert_eq!(session.lives(), 0);

        session.transition(next).unwrap();
        assert!(session.selected_letter().is_none());
        assert_eq!(session.lives(), 0);

        session.transition(GamePhase::Attract).unwrap();
        assert_eq!(session.lives(), 1);
        assert_eq!(session.phase(), GamePhase::Attract);
        assert!(session.selected_letter().is_none());
    }

    #[test]
    fn test_precondition_failure_is_error() {
        let mut session = session_in_scoring(3);
        let outcome = VerificationOutcome::PreconditionFailed(
            PreconditionFailure::MissingCredentials("GOOGLE_SPEECH_API_KEY".into()),
        );
        let err = session.apply_outcome(&outcome).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_SPEECH_API_KEY"));
        assert_eq!(session.phase(), GamePhase::Scoring);
        assert_eq!(session.lives(), 3);
        assert_eq!(session.rounds(), 0);
    }

    #[test]
    fn test_outcome_outside_scoring_rejected() {
        let mut session = GameSession::new(3);
        let result = session.apply_outcome(&VerificationOutcome::Miss { heard: "bet".into() });
        assert!(result.is_err());
        assert_eq!(session.lives(), 3);
    }
}
