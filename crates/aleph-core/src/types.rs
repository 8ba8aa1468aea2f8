use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Hardware primitives
// =============================================================================

/// Identifier of a physical input/output line (GPIO number).
pub type Pin = u32;

/// Output level of a digital line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(on: bool) -> Self {
        if on {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Signal edge a one-shot input source reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Rising,
    /// The start button is wired with a pull-down resistor and fires on release.
    Falling,
}

// =============================================================================
// Letters
// =============================================================================

/// A letter on the board: the LED line that shows it and the word it is read as.
///
/// The set of letters is fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Letter {
    pub pin: Pin,
    pub word: String,
}

impl Letter {
    pub fn new(pin: Pin, word: impl Into<String>) -> Self {
        Self {
            pin,
            word: word.into(),
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.word, self.pin)
    }
}

// =============================================================================
// Audio cues
// =============================================================================

/// Pre-defined game sounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameSound {
    StartGame,
    GameOver,
    StartRecord,
    CorrectAnswer,
    IncorrectAnswer,
    RecognitionError,
    RecognitionTimeout,
    RequestError,
    FatalError,
    NoInternet,
}

impl GameSound {
    pub const ALL: [GameSound; 10] = [
        GameSound::StartGame,
        GameSound::GameOver,
        GameSound::StartRecord,
        GameSound::CorrectAnswer,
        GameSound::IncorrectAnswer,
        GameSound::RecognitionError,
        GameSound::RecognitionTimeout,
        GameSound::RequestError,
        GameSound::FatalError,
        GameSound::NoInternet,
    ];

    /// Key used for per-sound overrides in the `[audio.files]` config table.
    pub fn key(self) -> &'static str {
        match self {
            GameSound::StartGame => "start_game",
            GameSound::GameOver => "game_over",
            GameSound::StartRecord => "start_record",
            GameSound::CorrectAnswer => "correct_answer",
            GameSound::IncorrectAnswer => "incorrect_answer",
            GameSound::RecognitionError => "recognition_error",
            GameSound::RecognitionTimeout => "recognition_timeout",
            GameSound::RequestError => "request_error",
            GameSound::FatalError => "fatal_error",
            GameSound::NoInternet => "no_internet",
        }
    }

    /// File name looked up inside the audio directory when no override is set.
    pub fn default_file(self) -> &'static str {
        match self {
            GameSound::StartGame => "start_game.mp3",
            GameSound::GameOver => "game_over.mp3",
            GameSound::StartRecord => "start_record.mp3",
            GameSound::CorrectAnswer => "correct_answer.mp3",
            GameSound::IncorrectAnswer => "incorrect_answer.mp3",
            GameSound::RecognitionError => "cant_understand.mp3",
            GameSound::RecognitionTimeout => "recognition_timeout.mp3",
            GameSound::RequestError => "request_error.mp3",
            GameSound::FatalError => "fatal_error.mp3",
            GameSound::NoInternet => "no_internet.mp3",
        }
    }
}

impl fmt::Display for GameSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Something the audio collaborator can play.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cue {
    /// One of the fixed game sounds.
    Sound(GameSound),
    /// Recording of the correct pronunciation of a word.
    Reference(String),
}

impl From<GameSound> for Cue {
    fn from(sound: GameSound) -> Self {
        Cue::Sound(sound)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::Sound(sound) => write!(f, "{}", sound),
            Cue::Reference(word) => write!(f, "reference:{}", word),
        }
    }
}

// =============================================================================
// Game phases
// =============================================================================

/// Phase of the game session. Exactly one is active at any instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Idle animation, waiting for the start signal.
    Attract,
    /// Letters rotate until the player confirms one.
    Selecting,
    /// The player's answer is being recorded and recognized.
    Recording,
    /// The verification outcome is applied to the lives counter.
    Scoring,
    /// Lives reached zero.
    GameOver,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Attract => write!(f, "Attract"),
            GamePhase::Selecting => write!(f, "Selecting"),
            GamePhase::Recording => write!(f, "Recording"),
            GamePhase::Scoring => write!(f, "Scoring"),
            GamePhase::GameOver => write!(f, "GameOver"),
        }
    }
}

impl GamePhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &GamePhase) -> bool {
        matches!(
            (self, target),
            (GamePhase::Attract, GamePhase::Selecting)
                | (GamePhase::Selecting, GamePhase::Recording)
                | (GamePhase::Recording, GamePhase::Scoring)
                | (GamePhase::Scoring, GamePhase::Selecting)
                | (GamePhase::Scoring, GamePhase::GameOver)
                | (GamePhase::GameOver, GamePhase::Attract)
        )
    }

    /// Phases during which a letter is selected.
    pub fn holds_letter(&self) -> bool {
        matches!(self, GamePhase::Recording | GamePhase::Scoring)
    }
}

// =============================================================================
// Verification outcomes
// =============================================================================

/// Why a verification attempt could not start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreconditionFailure {
    /// The recognition service credential is not configured.
    MissingCredentials(String),
    /// The connectivity probe did not reach the endpoint in time.
    NoConnectivity(String),
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionFailure::MissingCredentials(name) => {
                write!(f, "missing speech credential: {}", name)
            }
            PreconditionFailure::NoConnectivity(endpoint) => {
                write!(f, "no internet connection (probe to {} failed)", endpoint)
            }
        }
    }
}

/// Classified result of one speech-verification attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The player said the target word.
    Hit,
    /// A known but different word was recognized.
    Miss { heard: String },
    /// Nothing usable was recognized, or the transcript is not in the lexicon.
    UnknownSpeech,
    /// The recognition request failed.
    ServiceError,
    /// No speech was captured in time.
    Timeout,
    /// The attempt never started. Fatal to the session.
    PreconditionFailed(PreconditionFailure),
}

impl VerificationOutcome {
    /// Outcomes after which the round is retried without penalty.
    pub fn is_retry(&self) -> bool {
        matches!(
            self,
            VerificationOutcome::UnknownSpeech
                | VerificationOutcome::ServiceError
                | VerificationOutcome::Timeout
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, VerificationOutcome::PreconditionFailed(_))
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Hit => write!(f, "hit"),
            VerificationOutcome::Miss { heard } => write!(f, "miss ({})", heard),
            VerificationOutcome::UnknownSpeech => write!(f, "unknown speech"),
            VerificationOutcome::ServiceError => write!(f, "service error"),
            VerificationOutcome::Timeout => write!(f, "timeout"),
            VerificationOutcome::PreconditionFailed(reason) => {
                write!(f, "precondition failed: {}", reason)
            }
        }
    }
}
