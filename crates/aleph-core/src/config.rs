use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AlephError, Result};
use crate::types::{GameSound, Letter, Pin};

/// Top-level configuration for the Aleph game.
///
/// Loaded from `/etc/aleph/aleph.toml` by default. Every section falls back to
/// its defaults, so a partial file only needs to name what differs from a
/// stock board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlephConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AlephConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AlephConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Check the invariants the game loop relies on.
    pub fn validate(&self) -> Result<()> {
        let game = &self.game;
        if game.lives == 0 {
            return Err(AlephError::Config("game.lives must be at least 1".into()));
        }
        if game.letters.is_empty() {
            return Err(AlephError::Config("game.letters must not be empty".into()));
        }
        if game.blink_interval_ms == 0 || game.demo_interval_ms == 0 {
            return Err(AlephError::Config(
                "game.blink_interval_ms and game.demo_interval_ms must be positive".into(),
            ));
        }

        let mut seen = HashSet::new();
        for letter in &game.letters {
            if letter.word.trim().is_empty() {
                return Err(AlephError::Config(format!(
                    "letter on pin {} has an empty word",
                    letter.pin
                )));
            }
            if !seen.insert(letter.pin) {
                return Err(AlephError::Config(format!(
                    "pin {} is assigned to more than one letter",
                    letter.pin
                )));
            }
            if letter.pin == game.start_button_pin || letter.pin == game.record_led_pin {
                return Err(AlephError::Config(format!(
                    "letter '{}' reuses operative pin {}",
                    letter.word, letter.pin
                )));
            }
        }

        let speech = &self.speech;
        if speech.listen_timeout_secs == 0 || speech.phrase_limit_secs == 0 {
            return Err(AlephError::Config(
                "speech.listen_timeout_secs and speech.phrase_limit_secs must be positive".into(),
            ));
        }
        if speech.connectivity_timeout_ms == 0 {
            return Err(AlephError::Config(
                "speech.connectivity_timeout_ms must be positive".into(),
            ));
        }
        if speech.record_command.is_empty() {
            return Err(AlephError::Config("speech.record_command must not be empty".into()));
        }
        if self.audio.player.is_empty() {
            return Err(AlephError::Config("audio.player must not be empty".into()));
        }
        if self.display.enabled && self.display.baud_rate == 0 {
            return Err(AlephError::Config("display.baud_rate must be positive".into()));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Optional file that receives a copy of every log line.
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// A letter entry in the `[game]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterConfig {
    /// GPIO line of the letter's LED.
    pub pin: Pin,
    /// Canonical word for the letter, as found in the lexicon values.
    pub word: String,
}

/// Game rules and board wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Lives at the start of every game.
    pub lives: u32,
    /// Step length of the attract animation in milliseconds.
    pub demo_interval_ms: u64,
    /// On/off time of each letter during selection in milliseconds.
    pub blink_interval_ms: u64,
    /// Input line of the big start button.
    pub start_button_pin: Pin,
    /// LEDs under the start button dome, blinked while recording.
    pub record_led_pin: Pin,
    /// Letters in rotation order.
    pub letters: Vec<LetterConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            lives: 4,
            demo_interval_ms: 1000,
            blink_interval_ms: 100,
            start_button_pin: 38,
            record_led_pin: 40,
            letters: vec![
                LetterConfig { pin: 11, word: "aleph".to_string() },
                LetterConfig { pin: 13, word: "bet".to_string() },
                LetterConfig { pin: 15, word: "gimel".to_string() },
                LetterConfig { pin: 16, word: "dalet".to_string() },
            ],
        }
    }
}

impl GameConfig {
    pub fn letters(&self) -> Vec<Letter> {
        self.letters
            .iter()
            .map(|l| Letter::new(l.pin, l.word.clone()))
            .collect()
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    pub fn demo_interval(&self) -> Duration {
        Duration::from_millis(self.demo_interval_ms)
    }
}

/// Audio cue playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Player command line; the cue file path is appended as the last argument.
    pub player: Vec<String>,
    /// Directory holding the default game sounds.
    pub audio_dir: PathBuf,
    /// Directory holding `<word>.mp3` reference recordings.
    pub correct_answers_dir: PathBuf,
    /// Per-sound file overrides keyed by sound name (e.g. `game_over`).
    pub files: BTreeMap<String, PathBuf>,
    /// Fail at startup when a sound file is missing.
    pub validate_files: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            player: vec!["mpg123".to_string(), "-q".to_string()],
            audio_dir: PathBuf::from("audio"),
            correct_answers_dir: PathBuf::from("audio").join("correct_answers"),
            files: BTreeMap::new(),
            validate_files: true,
        }
    }
}

impl AudioConfig {
    /// Resolve the file for a game sound, honouring overrides.
    pub fn sound_path(&self, sound: GameSound) -> PathBuf {
        self.files
            .get(sound.key())
            .cloned()
            .unwrap_or_else(|| self.audio_dir.join(sound.default_file()))
    }

    pub fn reference_path(&self, word: &str) -> PathBuf {
        self.correct_answers_dir.join(format!("{}.mp3", word))
    }
}

/// Speech capture and recognition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Environment variable holding the recognition API key.
    pub credentials_env: String,
    /// JSON transcript -> word mapping.
    pub lexicon_path: PathBuf,
    /// Recognition language code.
    pub language: String,
    /// Maximum wait for speech to begin, in seconds.
    pub listen_timeout_secs: u64,
    /// Maximum recorded phrase length, in seconds.
    pub phrase_limit_secs: u64,
    /// Recorder command line writing a WAV stream to stdout. `{secs}` and
    /// `{rate}` are substituted.
    pub record_command: Vec<String>,
    /// Recording sample rate in Hz.
    pub sample_rate: u32,
    /// Peak amplitude (0..=32767) below which a recording counts as silence.
    pub silence_threshold: i16,
    /// Recognition REST endpoint.
    pub endpoint: String,
    /// `host:port` probed before each attempt.
    pub connectivity_endpoint: String,
    /// Connectivity probe timeout in milliseconds.
    pub connectivity_timeout_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            credentials_env: "GOOGLE_SPEECH_API_KEY".to_string(),
            lexicon_path: PathBuf::from("dict.json"),
            language: "he-IL".to_string(),
            listen_timeout_secs: 2,
            phrase_limit_secs: 3,
            record_command: vec![
                "arecord".to_string(),
                "-q".to_string(),
                "-f".to_string(),
                "S16_LE".to_string(),
                "-c".to_string(),
                "1".to_string(),
                "-r".to_string(),
                "{rate}".to_string(),
                "-d".to_string(),
                "{secs}".to_string(),
                "-t".to_string(),
                "wav".to_string(),
            ],
            sample_rate: 16000,
            silence_threshold: 500,
            endpoint: "https://speech.googleapis.com/v1/speech:recognize".to_string(),
            connectivity_endpoint: "8.8.8.8:53".to_string(),
            connectivity_timeout_ms: 2000,
        }
    }
}

impl SpeechConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_limit_secs)
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity_timeout_ms)
    }
}

/// Seven-segment lives display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Boards without a display run with a no-op one.
    pub enabled: bool,
    /// Serial device of the display.
    pub serial_port: PathBuf,
    /// Line speed. The SparkFun display ships at 9600 baud.
    pub baud_rate: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            serial_port: PathBuf::from("/dev/serial0"),
            baud_rate: 9600,
        }
    }
}

/// Folders for recordings kept for offline review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub unrecognized_dir: PathBuf,
    pub misdetection_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            unrecognized_dir: PathBuf::from("unrecognized"),
            misdetection_dir: PathBuf::from("misdetection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AlephConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.general.log_file.is_none());
        assert_eq!(config.game.lives, 4);
        assert_eq!(config.game.start_button_pin, 38);
        assert_eq!(config.game.record_led_pin, 40);
        assert_eq!(config.game.letters.len(), 4);
        assert_eq!(config.speech.language, "he-IL");
        assert_eq!(config.speech.listen_timeout_secs, 2);
        assert_eq!(config.speech.connectivity_timeout_ms, 2000);
        assert_eq!(config.display.serial_port, PathBuf::from("/dev/serial0"));
        assert_eq!(config.display.baud_rate, 9600);
        assert_eq!(config.storage.unrecognized_dir, PathBuf::from("unrecognized"));
        assert_eq!(config.storage.misdetection_dir, PathBuf::from("misdetection"));
    }

    #[test]
    fn test_default_config_is_valid() {
        AlephConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
log_file = "/var/log/aleph.log"

[game]
lives = 3
blink_interval_ms = 250
letters = [
    { pin = 7, word = "aleph" },
    { pin = 8, word = "bet" },
]

[speech]
language = "en-US"
listen_timeout_secs = 5

[display]
enabled = false
baud_rate = 115200
"#;
        let file = create_temp_config(content);
        let config = AlephConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_file, Some(PathBuf::from("/var/log/aleph.log")));
        assert_eq!(config.game.lives, 3);
        assert_eq!(config.game.blink_interval(), Duration::from_millis(250));
        assert_eq!(
            config.game.letters(),
            vec![Letter::new(7, "aleph"), Letter::new(8, "bet")]
        );
        assert_eq!(config.speech.language, "en-US");
        assert_eq!(config.speech.listen_timeout(), Duration::from_secs(5));
        assert!(!config.display.enabled);
        assert_eq!(config.display.baud_rate, 115200);
        // Untouched fields keep defaults
        assert_eq!(config.game.demo_interval_ms, 1000);
        assert_eq!(config.speech.phrase_limit_secs, 3);
    }

    #[test]
    fn test_shipped_example_matches_defaults() {
        let content = include_str!("../../../config/aleph.example.toml");
        let config: AlephConfig = toml::from_str(content).unwrap();
        config.validate().unwrap();
        let defaults = AlephConfig::default();
        assert_eq!(config.game.letters, defaults.game.letters);
        assert_eq!(config.speech.record_command, defaults.speech.record_command);
        assert_eq!(config.audio.player, defaults.audio.player);
        assert_eq!(config.display.baud_rate, defaults.display.baud_rate);
        assert!(config.audio.files.is_empty());
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(AlephConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = AlephConfig::load(file.path()).unwrap();
        assert_eq!(config.game.lives, 4);
        assert_eq!(config.speech.sample_rate, 16000);
    }

    #[test]
    fn test_sound_path_defaults_and_overrides() {
        let mut audio = AudioConfig::default();
        assert_eq!(
            audio.sound_path(GameSound::NoInternet),
            PathBuf::from("audio").join("no_internet.mp3")
        );
        audio
            .files
            .insert("no_internet".to_string(), PathBuf::from("offline.wav"));
        assert_eq!(audio.sound_path(GameSound::NoInternet), PathBuf::from("offline.wav"));
        assert_eq!(
            audio.reference_path("gimel"),
            PathBuf::from("audio").join("correct_answers").join("gimel.mp3")
        );
    }

    #[test]
    fn test_validate_rejects_zero_lives() {
        let mut config = AlephConfig::default();
        config.game.lives = 0;
        assert!(matches!(config.validate(), Err(AlephError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_letters() {
        let mut config = AlephConfig::default();
        config.game.letters.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("letters"));
    }

    #[test]
    fn test_validate_rejects_duplicate_pins() {
        let mut config = AlephConfig::default();
        config.game.letters.push(LetterConfig {
            pin: 11,
            word: "he".to_string(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pin 11"));
    }

    #[test]
    fn test_validate_rejects_operative_pin_reuse() {
        let mut config = AlephConfig::default();
        config.game.letters[0].pin = config.game.start_button_pin;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = AlephConfig::default();
        config.speech.listen_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AlephConfig::default();
        config.game.blink_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_baud_on_enabled_display() {
        let mut config = AlephConfig::default();
        config.display.baud_rate = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("baud_rate"));

        config.display.enabled = false;
        config.validate().unwrap();
    }
}
