//! Aleph Hardware crate - board collaborators behind async traits.
//!
//! Provides the ports the game core drives (digital lines, audio cues, the
//! lives display, the connectivity probe), the one-shot `EdgeSignal` used for
//! the start button, Linux adapters for each port, and in-memory mocks for
//! running the game without a board.

pub mod connectivity;
pub mod cue;
pub mod display;
pub mod gpio;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use aleph_core::error::AlephError;
use aleph_core::types::{Cue, Edge, Level, Pin};

pub use connectivity::TcpConnectivityCheck;
pub use cue::PlayerAudioCue;
pub use display::{NoDisplay, SevenSegmentDisplay};
pub use gpio::SysfsGpio;

// =============================================================================
// One-shot edge signal
// =============================================================================

/// Receiving half of an armed input edge.
///
/// Fires at most once. Repeated edges before the signal is disarmed are
/// dropped, so a bouncing button still yields a single confirmation.
#[derive(Debug)]
pub struct EdgeSignal {
    pin: Pin,
    edge: Edge,
    rx: oneshot::Receiver<()>,
    fired: bool,
}

/// Sending half of an armed input edge, held by the line watcher.
#[derive(Debug)]
pub struct EdgeTrigger {
    tx: Option<oneshot::Sender<()>>,
}

impl EdgeSignal {
    /// Create a connected trigger/signal pair for `pin`.
    pub fn channel(pin: Pin, edge: Edge) -> (EdgeTrigger, EdgeSignal) {
        let (tx, rx) = oneshot::channel();
        (
            EdgeTrigger { tx: Some(tx) },
            EdgeSignal {
                pin,
                edge,
                rx,
                fired: false,
            },
        )
    }

    pub fn pin(&self) -> Pin {
        self.pin
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// Wait until the edge fires.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` next to a timer. If
    /// the watcher goes away without firing, this never completes.
    pub async fn fired(&mut self) {
        if self.fired {
            return;
        }
        match (&mut self.rx).await {
            Ok(()) => self.fired = true,
            Err(_) => std::future::pending::<()>().await,
        }
    }

    /// Non-blocking check.
    pub fn has_fired(&mut self) -> bool {
        if !self.fired && self.rx.try_recv().is_ok() {
            self.fired = true;
        }
        self.fired
    }
}

impl EdgeTrigger {
    /// Fire the signal. Returns `false` if it already fired or nobody listens.
    pub fn fire(&mut self) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Digital input/output lines.
#[async_trait]
pub trait DigitalIo: Send + Sync {
    /// Drive an output line.
    async fn set_output(&self, pin: Pin, level: Level) -> Result<(), AlephError>;

    /// Drive several output lines to the same level.
    async fn set_outputs(&self, pins: &[Pin], level: Level) -> Result<(), AlephError> {
        for &pin in pins {
            self.set_output(pin, level).await?;
        }
        Ok(())
    }

    /// Arm a one-shot edge detector on an input line.
    async fn arm_edge(&self, pin: Pin, edge: Edge) -> Result<EdgeSignal, AlephError>;

    /// Disarm a previously armed edge. Consumes the signal, so each arming is
    /// disarmed exactly once.
    async fn disarm_edge(&self, signal: EdgeSignal) -> Result<(), AlephError>;
}

/// Blocking audio cue playback.
#[async_trait]
pub trait AudioCue: Send + Sync {
    /// Play a cue and return once playback has finished.
    async fn play(&self, cue: &Cue) -> Result<(), AlephError>;
}

/// Numeric display of the remaining lives.
#[async_trait]
pub trait LivesDisplay: Send + Sync {
    /// Show `lives`. Returns `false` if the display rejected the write.
    async fn show_lives(&self, lives: u32) -> bool;
}

/// Network reachability probe.
#[async_trait]
pub trait ConnectivityCheck: Send + Sync {
    async fn is_reachable(&self, endpoint: &str, timeout: Duration) -> bool;
}

// =============================================================================
// Mock implementations
// =============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MockIoState {
    levels: HashMap<Pin, Level>,
    writes: Vec<(Pin, Level)>,
    armed: HashMap<Pin, (u64, EdgeTrigger)>,
    arm_counts: HashMap<Pin, usize>,
    disarm_counts: HashMap<Pin, usize>,
    scheduled_presses: HashMap<Pin, VecDeque<Duration>>,
    generation: u64,
}

/// In-memory digital lines for tests and board-less runs.
///
/// Records every output write. Input edges are fired with [`press`] or by
/// scheduling presses that trigger a fixed delay after each arming.
///
/// [`press`]: MockDigitalIo::press
#[derive(Debug, Clone, Default)]
pub struct MockDigitalIo {
    state: Arc<Mutex<MockIoState>>,
}

impl MockDigitalIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue presses for `pin`: the n-th arming of the pin fires after the
    /// n-th delay. Armings beyond the queue wait for a manual [`press`].
    ///
    /// [`press`]: MockDigitalIo::press
    pub fn schedule_presses(&self, pin: Pin, delays: impl IntoIterator<Item = Duration>) {
        lock(&self.state)
            .scheduled_presses
            .entry(pin)
            .or_default()
            .extend(delays);
    }

    /// Fire the armed edge on `pin`. Returns `false` if nothing was armed or
    /// it already fired.
    pub fn press(&self, pin: Pin) -> bool {
        let mut state = lock(&self.state);
        match state.armed.get_mut(&pin) {
            Some((_, trigger)) => trigger.fire(),
            None => false,
        }
    }

    fn press_generation(&self, pin: Pin, generation: u64) -> bool {
        let mut state = lock(&self.state);
        match state.armed.get_mut(&pin) {
            Some((armed_generation, trigger)) if *armed_generation == generation => {
                trigger.fire()
            }
            _ => false,
        }
    }

    pub fn level(&self, pin: Pin) -> Level {
        lock(&self.state)
            .levels
            .get(&pin)
            .copied()
            .unwrap_or(Level::Low)
    }

    /// Pins currently driven high, sorted.
    pub fn high_pins(&self) -> Vec<Pin> {
        let state = lock(&self.state);
        let mut pins: Vec<Pin> = state
            .levels
            .iter()
            .filter(|(_, level)| level.is_high())
            .map(|(pin, _)| *pin)
            .collect();
        pins.sort_unstable();
        pins
    }

    pub fn writes(&self) -> Vec<(Pin, Level)> {
        lock(&self.state).writes.clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.state).writes.len()
    }

    pub fn writes_to(&self, pin: Pin) -> Vec<Level> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|(p, _)| *p == pin)
            .map(|(_, level)| *level)
            .collect()
    }

    pub fn arm_count(&self, pin: Pin) -> usize {
        lock(&self.state).arm_counts.get(&pin).copied().unwrap_or(0)
    }

    pub fn disarm_count(&self, pin: Pin) -> usize {
        lock(&self.state).disarm_counts.get(&pin).copied().unwrap_or(0)
    }

    pub fn is_armed(&self, pin: Pin) -> bool {
        lock(&self.state).armed.contains_key(&pin)
    }
}

#[async_trait]
impl DigitalIo for MockDigitalIo {
    async fn set_output(&self, pin: Pin, level: Level) -> Result<(), AlephError> {
        let mut state = lock(&self.state);
        state.levels.insert(pin, level);
        state.writes.push((pin, level));
        tracing::trace!(pin, ?level, "Mock output set");
        Ok(())
    }

    async fn arm_edge(&self, pin: Pin, edge: Edge) -> Result<EdgeSignal, AlephError> {
        let (trigger, signal) = EdgeSignal::channel(pin, edge);
        let (generation, delay) = {
            let mut state = lock(&self.state);
            if state.armed.contains_key(&pin) {
                return Err(AlephError::Hardware(format!(
                    "edge detection already armed on pin {}",
                    pin
                )));
            }
            state.generation += 1;
            let generation = state.generation;
            state.armed.insert(pin, (generation, trigger));
            *state.arm_counts.entry(pin).or_default() += 1;
            let delay = state
                .scheduled_presses
                .get_mut(&pin)
                .and_then(VecDeque::pop_front);
            (generation, delay)
        };

        if let Some(delay) = delay {
            let io = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                io.press_generation(pin, generation);
            });
        }
        Ok(signal)
    }

    async fn disarm_edge(&self, signal: EdgeSignal) -> Result<(), AlephError> {
        let pin = signal.pin();
        let mut state = lock(&self.state);
        if state.armed.remove(&pin).is_none() {
            return Err(AlephError::Hardware(format!(
                "edge detection not armed on pin {}",
                pin
            )));
        }
        *state.disarm_counts.entry(pin).or_default() += 1;
        Ok(())
    }
}

/// Mock audio cue player that records what was played.
#[derive(Debug, Clone, Default)]
pub struct MockAudioCue {
    played: Arc<Mutex<Vec<Cue>>>,
    play_duration: Duration,
}

impl MockAudioCue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `play` block for `duration`.
    pub fn with_play_duration(mut self, duration: Duration) -> Self {
        self.play_duration = duration;
        self
    }

    pub fn played(&self) -> Vec<Cue> {
        lock(&self.played).clone()
    }

    pub fn clear(&self) {
        lock(&self.played).clear();
    }
}

#[async_trait]
impl AudioCue for MockAudioCue {
    async fn play(&self, cue: &Cue) -> Result<(), AlephError> {
        if !self.play_duration.is_zero() {
            tokio::time::sleep(self.play_duration).await;
        }
        lock(&self.played).push(cue.clone());
        Ok(())
    }
}

/// Mock lives display that records every value shown.
#[derive(Debug, Clone, Default)]
pub struct MockLivesDisplay {
    shown: Arc<Mutex<Vec<u32>>>,
    failing: Arc<AtomicBool>,
}

impl MockLivesDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn shown(&self) -> Vec<u32> {
        lock(&self.shown).clone()
    }

    pub fn last(&self) -> Option<u32> {
        lock(&self.shown).last().copied()
    }
}

#[async_trait]
impl LivesDisplay for MockLivesDisplay {
    async fn show_lives(&self, lives: u32) -> bool {
        if self.failing.load(Ordering::Relaxed) {
            return false;
        }
        lock(&self.shown).push(lives);
        true
    }
}

/// Mock connectivity probe with a switchable answer.
#[derive(Debug, Clone)]
pub struct MockConnectivity {
    reachable: Arc<AtomicBool>,
    probes: Arc<AtomicUsize>,
}

impl MockConnectivity {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: Arc::new(AtomicBool::new(reachable)),
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConnectivityCheck for MockConnectivity {
    async fn is_reachable(&self, _endpoint: &str, _timeout: Duration) -> bool {
        self.probes.fetch_add(1, Ordering::Relaxed);
        self.reachable.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
