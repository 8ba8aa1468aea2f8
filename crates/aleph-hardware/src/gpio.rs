//! Linux sysfs GPIO backend.
//!
//! Lines are exported through `<root>/export` and driven through
//! `<root>/gpio<N>/value`. Edge detection polls the value file from a
//! background task and fires the armed `EdgeSignal` once the new level has
//! held for one extra poll.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aleph_core::error::AlephError;
use aleph_core::types::{Edge, Level, Pin};

use crate::{lock, DigitalIo, EdgeSignal, EdgeTrigger};

const DEFAULT_ROOT: &str = "/sys/class/gpio";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// GPIO lines driven through the kernel's sysfs interface.
pub struct SysfsGpio {
    root: PathBuf,
    poll_interval: Duration,
    exported: Mutex<HashSet<Pin>>,
    watchers: Mutex<HashMap<Pin, JoinHandle<()>>>,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT)
    }

    /// Use a different sysfs root. Tests point this at a temp directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            exported: Mutex::new(HashSet::new()),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Export and configure every line the game uses. Outputs start low.
    pub async fn setup(&self, outputs: &[Pin], inputs: &[Pin]) -> Result<(), AlephError> {
        for &pin in outputs {
            self.export(pin).await?;
            self.write_attr(pin, "direction", "out").await?;
            self.set_output(pin, Level::Low).await?;
        }
        for &pin in inputs {
            self.export(pin).await?;
            self.write_attr(pin, "direction", "in").await?;
        }
        info!(
            outputs = outputs.len(),
            inputs = inputs.len(),
            root = %self.root.display(),
            "GPIO lines configured"
        );
        Ok(())
    }

    /// Stop all edge watchers, drive the given outputs low and unexport every
    /// line this instance exported.
    pub async fn cleanup(&self, outputs: &[Pin]) -> Result<(), AlephError> {
        let watchers: Vec<JoinHandle<()>> = lock(&self.watchers).drain().map(|(_, h)| h).collect();
        for handle in watchers {
            handle.abort();
        }

        let mut first_error = None;
        for &pin in outputs {
            if let Err(e) = self.set_output(pin, Level::Low).await {
                warn!(pin, error = %e, "Failed to drive line low during cleanup");
                first_error.get_or_insert(e);
            }
        }

        let exported: Vec<Pin> = lock(&self.exported).drain().collect();
        for pin in exported {
            let path = self.root.join("unexport");
            if let Err(e) = tokio::fs::write(&path, pin.to_string()).await {
                warn!(pin, error = %e, "Failed to unexport line");
            }
        }
        debug!("GPIO cleanup finished");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Read the current level of a line.
    pub async fn read_level(&self, pin: Pin) -> Result<Level, AlephError> {
        read_value(&self.value_path(pin)).await
    }

    fn line_dir(&self, pin: Pin) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn value_path(&self, pin: Pin) -> PathBuf {
        self.line_dir(pin).join("value")
    }

    async fn export(&self, pin: Pin) -> Result<(), AlephError> {
        if !self.line_dir(pin).exists() {
            tokio::fs::write(self.root.join("export"), pin.to_string())
                .await
                .map_err(|e| AlephError::Hardware(format!("failed to export pin {}: {}", pin, e)))?;
        }
        lock(&self.exported).insert(pin);
        Ok(())
    }

    async fn write_attr(&self, pin: Pin, attr: &str, value: &str) -> Result<(), AlephError> {
        let path = self.line_dir(pin).join(attr);
        tokio::fs::write(&path, value).await.map_err(|e| {
            AlephError::Hardware(format!("failed to write {} of pin {}: {}", attr, pin, e))
        })
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_value(path: &Path) -> Result<Level, AlephError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AlephError::Hardware(format!("failed to read {}: {}", path.display(), e)))?;
    match raw.trim() {
        "1" => Ok(Level::High),
        "0" => Ok(Level::Low),
        other => Err(AlephError::Hardware(format!(
            "unexpected value '{}' in {}",
            other,
            path.display()
        ))),
    }
}

fn is_edge(edge: Edge, from: Level, to: Level) -> bool {
    match edge {
        Edge::Rising => !from.is_high() && to.is_high(),
        Edge::Falling => from.is_high() && !to.is_high(),
    }
}

async fn watch_edge(path: PathBuf, edge: Edge, interval: Duration, mut trigger: EdgeTrigger) {
    let mut previous = read_value(&path).await.ok();
    loop {
        tokio::time::sleep(interval).await;
        // A half-written value file reads as garbage; skip that sample.
        let Ok(current) = read_value(&path).await else {
            continue;
        };
        if let Some(prev) = previous {
            if is_edge(edge, prev, current) {
                tokio::time::sleep(interval).await;
                if matches!(read_value(&path).await, Ok(settled) if settled == current) {
                    trigger.fire();
                    return;
                }
                continue;
            }
        }
        previous = Some(current);
    }
}

#[async_trait]
impl DigitalIo for SysfsGpio {
    async fn set_output(&self, pin: Pin, level: Level) -> Result<(), AlephError> {
        let value = if level.is_high() { "1" } else { "0" };
        self.write_attr(pin, "value", value).await
    }

    async fn arm_edge(&self, pin: Pin, edge: Edge) -> Result<EdgeSignal, AlephError> {
        let mut watchers = lock(&self.watchers);
        if watchers.contains_key(&pin) {
            return Err(AlephError::Hardware(format!(
                "edge detection already armed on pin {}",
                pin
            )));
        }
        let (trigger, signal) = EdgeSignal::channel(pin, edge);
        let handle = tokio::spawn(watch_edge(
            self.value_path(pin),
            edge,
            self.poll_interval,
            trigger,
        ));
        watchers.insert(pin, handle);
        debug!(pin, ?edge, "Edge detection armed");
        Ok(signal)
    }

    async fn disarm_edge(&self, signal: EdgeSignal) -> Result<(), AlephError> {
        let pin = signal.pin();
        match lock(&self.watchers).remove(&pin) {
            Some(handle) => {
                handle.abort();
                debug!(pin, edge = ?signal.edge(), "Edge detection disarmed");
                Ok(())
            }
            None => Err(AlephError::Hardware(format!(
                "edge detection not armed on pin {}",
                pin
            ))),
        }
    }
}
