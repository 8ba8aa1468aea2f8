//! Aleph application binary - composition root.
//!
//! 1. Resolve and load configuration (CLI > env > file > defaults)
//! 2. Set up logging
//! 3. Build the board collaborators (GPIO, audio cues, lives display,
//!    connectivity probe), the speech backend and the recording store
//! 4. Run the game loop until a fatal error or Ctrl-C
//!
//! Any fatal error plays the fatal-error cue when audio is up, and every
//! output line is driven low before the process exits.

mod cli;

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use aleph_core::config::AlephConfig;
use aleph_core::error::{AlephError, Result};
use aleph_core::lexicon::RecognitionLexicon;
use aleph_core::types::{Cue, GameSound, Pin};
use aleph_game::{Board, GameController, SpeechVerifier, VerifierSettings};
use aleph_hardware::{
    AudioCue, LivesDisplay, NoDisplay, PlayerAudioCue, SevenSegmentDisplay, SysfsGpio,
    TcpConnectivityCheck,
};
use aleph_speech::GoogleSpeechBackend;
use aleph_storage::FolderRecordingStore;

use cli::CliArgs;

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| AlephError::Config(format!("failed to initialise logging: {}", e)))
}

/// Every output line the game drives.
fn output_pins(config: &AlephConfig) -> Vec<Pin> {
    let mut pins: Vec<Pin> = config.game.letters.iter().map(|l| l.pin).collect();
    pins.push(config.game.record_led_pin);
    pins
}

async fn run(
    config: &AlephConfig,
    gpio: Arc<SysfsGpio>,
    audio_slot: &mut Option<Arc<PlayerAudioCue>>,
) -> Result<()> {
    config.validate()?;

    let audio = Arc::new(PlayerAudioCue::from_config(config.audio.clone())?);
    *audio_slot = Some(audio.clone());

    let lexicon = Arc::new(RecognitionLexicon::load(&config.speech.lexicon_path)?);

    gpio.setup(&output_pins(config), &[config.game.start_button_pin])
        .await?;

    let display: Arc<dyn LivesDisplay> = if config.display.enabled {
        Arc::new(SevenSegmentDisplay::open(&config.display).await?)
    } else {
        info!("Lives display disabled");
        Arc::new(NoDisplay)
    };

    let backend = Arc::new(GoogleSpeechBackend::new(config.speech.clone())?);
    let store = Arc::new(FolderRecordingStore::from_config(&config.storage));

    let board = Board {
        io: gpio,
        audio,
        display,
        connectivity: Arc::new(TcpConnectivityCheck),
    };
    let verifier = SpeechVerifier::new(
        board.clone(),
        backend,
        store,
        lexicon,
        VerifierSettings::from_config(&config.speech),
    );
    let mut controller = GameController::new(board, verifier, &config.game)?;

    tokio::select! {
        result = controller.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config_path = args.resolve_config_path();
    let loaded = AlephConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => AlephConfig::default(),
    };
    args.apply_overrides(&mut config);

    if let Err(e) = init_tracing(&config.general.log_level, config.general.log_file.as_deref()) {
        eprintln!("aleph: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting Aleph v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => info!(path = %config_path.display(), "Configuration loaded"),
        Err(e) => warn!(
            path = %config_path.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    let gpio = Arc::new(SysfsGpio::new());
    let mut audio: Option<Arc<PlayerAudioCue>> = None;
    let result = run(&config, gpio.clone(), &mut audio).await;

    if let Err(ref e) = result {
        error!(error = %e, "Fatal error");
        if let Some(audio) = &audio {
            if let Err(cue_err) = audio.play(&Cue::Sound(GameSound::FatalError)).await {
                warn!(error = %cue_err, "Fatal-error cue failed");
            }
        }
    }

    if let Err(e) = gpio.cleanup(&output_pins(&config)).await {
        warn!(error = %e, "GPIO cleanup incomplete");
    }
    info!("Aleph stopped");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
