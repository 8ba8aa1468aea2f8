//! Audio cue playback through an external player process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use aleph_core::config::AudioConfig;
use aleph_core::error::AlephError;
use aleph_core::types::{Cue, GameSound};

use crate::AudioCue;

/// Plays cue files by spawning the configured player (`mpg123 -q` by default)
/// and waiting for it to exit.
#[derive(Debug, Clone)]
pub struct PlayerAudioCue {
    config: AudioConfig,
}

impl PlayerAudioCue {
    /// Build the player. With `validate_files`, every game sound must exist.
    pub fn from_config(config: AudioConfig) -> Result<Self, AlephError> {
        if config.player.is_empty() {
            return Err(AlephError::Audio("player command is empty".to_string()));
        }
        if config.validate_files {
            let missing: Vec<String> = GameSound::ALL
                .iter()
                .map(|sound| config.sound_path(*sound))
                .filter(|path| !path.is_file())
                .map(|path| path.display().to_string())
                .collect();
            if !missing.is_empty() {
                return Err(AlephError::Audio(format!(
                    "missing sound files: {}",
                    missing.join(", ")
                )));
            }
        }
        info!(player = %config.player.join(" "), "Audio cue player ready");
        Ok(Self { config })
    }

    pub fn resolve(&self, cue: &Cue) -> PathBuf {
        match cue {
            Cue::Sound(sound) => self.config.sound_path(*sound),
            Cue::Reference(word) => self.config.reference_path(word),
        }
    }
}

#[async_trait]
impl AudioCue for PlayerAudioCue {
    async fn play(&self, cue: &Cue) -> Result<(), AlephError> {
        let path = self.resolve(cue);
        if !path.is_file() {
            return Err(AlephError::Audio(format!(
                "cue file not found: {}",
                path.display()
            )));
        }

        let (program, args) = match self.config.player.split_first() {
            Some(split) => split,
            None => return Err(AlephError::Audio("player command is empty".to_string())),
        };
        debug!(%cue, path = %path.display(), "Playing cue");

        let status = Command::new(program)
            .args(args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| AlephError::Audio(format!("failed to start {}: {}", program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(AlephError::Audio(format!(
                "{} exited with {} playing {}",
                program,
                status,
                path.display()
            )))
        }
    }
}
