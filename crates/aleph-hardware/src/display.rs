//! Serial seven-segment lives display.
//!
//! The display module speaks a small byte protocol: `0x7A <level>` sets the
//! brightness and `0x76` clears the digits. After a clear, the next ASCII
//! digits fill positions left to right.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPort;
use tracing::{debug, info, warn};

use aleph_core::config::DisplayConfig;
use aleph_core::error::AlephError;

use crate::{lock, LivesDisplay};

const CMD_BRIGHTNESS: u8 = 0x7A;
const CMD_CLEAR: u8 = 0x76;
const FULL_BRIGHTNESS: u8 = 0xFF;
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Bytes shown for a lives count: one digit per remaining life, `1..=n`.
pub fn lives_frame(lives: u32) -> Vec<u8> {
    let mut frame = vec![CMD_CLEAR];
    for n in 1..=lives {
        frame.extend(n.to_string().bytes());
    }
    frame
}

/// Seven-segment display attached to a byte sink, normally a serial port.
///
/// Writes run on the blocking pool, since serial writes block until the
/// driver accepts the bytes.
pub struct SevenSegmentDisplay<W> {
    port: Arc<Mutex<W>>,
}

impl SevenSegmentDisplay<Box<dyn SerialPort>> {
    /// Open the serial device at the configured line speed and initialise
    /// the display.
    pub async fn open(config: &DisplayConfig) -> Result<Self, AlephError> {
        let path = config.serial_port.to_string_lossy().into_owned();
        let port = serialport::new(path.as_str(), config.baud_rate)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|e| AlephError::Display(format!("failed to open {}: {}", path, e)))?;
        info!(port = %path, baud = config.baud_rate, "Serial display opened");
        Self::init(port).await
    }
}

impl<W> SevenSegmentDisplay<W>
where
    W: Write + Send + 'static,
{
    /// Wrap an already-open sink and set full brightness.
    pub async fn init(port: W) -> Result<Self, AlephError> {
        let display = Self {
            port: Arc::new(Mutex::new(port)),
        };
        display.send(vec![CMD_BRIGHTNESS, FULL_BRIGHTNESS]).await?;
        debug!("Seven-segment display initialised");
        Ok(display)
    }

    pub async fn write_lives(&self, lives: u32) -> Result<(), AlephError> {
        self.send(lives_frame(lives)).await
    }

    async fn send(&self, bytes: Vec<u8>) -> Result<(), AlephError> {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let mut port = lock(&port);
            port.write_all(&bytes)?;
            port.flush()
        })
        .await
        .map_err(|e| AlephError::Display(format!("display write task failed: {}", e)))?
        .map_err(|e| AlephError::Display(e.to_string()))
    }
}

#[async_trait]
impl<W> LivesDisplay for SevenSegmentDisplay<W>
where
    W: Write + Send + 'static,
{
    async fn show_lives(&self, lives: u32) -> bool {
        match self.write_lives(lives).await {
            Ok(()) => true,
            Err(e) => {
                warn!(lives, error = %e, "Lives display update failed");
                false
            }
        }
    }
}

/// Display stand-in for boards without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisplay;

#[async_trait]
impl LivesDisplay for NoDisplay {
    async fn show_lives(&self, lives: u32) -> bool {
        debug!(lives, "No display attached");
        true
    }
}
