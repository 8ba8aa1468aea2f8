//! CLI argument definitions for the Aleph game.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use aleph_core::config::AlephConfig;

const DEFAULT_CONFIG_PATH: &str = "/etc/aleph/aleph.toml";

/// Aleph - a letter-recognition game for a board with buttons, LEDs and a microphone.
#[derive(Parser, Debug)]
#[command(name = "aleph", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Lives at the start of each game.
    #[arg(long = "lives")]
    pub lives: Option<u32>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ALEPH_CONFIG env var > /etc/aleph/aleph.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ALEPH_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AlephConfig) {
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(lives) = self.lives {
            config.game.lives = lives;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from(["aleph", "-c", "/tmp/a.toml", "--log-level", "debug", "--lives", "6"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/a.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.lives, Some(6));
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/a.toml"));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let args = CliArgs::parse_from(["aleph", "--lives", "2"]);
        let mut config = AlephConfig::default();
        config.general.log_level = "warn".to_string();
        args.apply_overrides(&mut config);
        assert_eq!(config.game.lives, 2);
        assert_eq!(config.general.log_level, "warn");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = CliArgs::parse_from(["aleph"]);
        let mut config = AlephConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.game.lives, 4);
        assert_eq!(config.general.log_level, "info");
    }
}
