//! Idle animation shown while waiting for a player.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use aleph_core::error::Result;
use aleph_core::types::{Letter, Level, Pin};
use aleph_hardware::{DigitalIo, EdgeSignal};

use crate::START_EDGE;

const BLINKS_PER_CYCLE: usize = 3;

/// Attract-mode LED animation over the letter indicators.
///
/// One cycle: blink all letters three times (on for twice the demo interval),
/// light them one by one, then turn them off one by one. Cycles repeat until
/// the start button is pressed.
pub struct AttractAnimation {
    io: Arc<dyn DigitalIo>,
    letter_pins: Vec<Pin>,
    start_pin: Pin,
    record_led_pin: Pin,
    demo_interval: Duration,
}

/// The start button was pressed.
struct Started;

impl AttractAnimation {
    pub fn new(
        io: Arc<dyn DigitalIo>,
        letters: &[Letter],
        start_pin: Pin,
        record_led_pin: Pin,
        demo_interval: Duration,
    ) -> Self {
        Self {
            io,
            letter_pins: letters.iter().map(|l| l.pin).collect(),
            start_pin,
            record_led_pin,
            demo_interval,
        }
    }

    /// Run the animation until the start button is pressed. All letters are
    /// off on return.
    pub async fn run_until_start(&self) -> Result<()> {
        let mut signal = self.io.arm_edge(self.start_pin, START_EDGE).await?;
        info!("Attract mode, waiting for start");

        let animated = self.animate(&mut signal).await;
        let cleared = self.io.set_outputs(&self.letter_pins, Level::Low).await;
        let disarmed = self.io.disarm_edge(signal).await;

        animated?;
        cleared?;
        disarmed?;
        info!("Start pressed");
        Ok(())
    }

    async fn animate(&self, signal: &mut EdgeSignal) -> Result<()> {
        let mut cycles: u64 = 0;
        loop {
            self.io.set_output(self.record_led_pin, Level::Low).await?;

            for _ in 0..BLINKS_PER_CYCLE {
                self.io.set_outputs(&self.letter_pins, Level::High).await?;
                if self.hold(signal, self.demo_interval * 2).await.is_some() {
                    return Ok(());
                }
                self.io.set_outputs(&self.letter_pins, Level::Low).await?;
            }

            for level in [Level::High, Level::Low] {
                for &pin in &self.letter_pins {
                    self.io.set_output(pin, level).await?;
                    if self.hold(signal, self.demo_interval).await.is_some() {
                        return Ok(());
                    }
                }
            }

            cycles += 1;
            debug!(cycles, "Attract cycle finished");
        }
    }

    async fn hold(&self, signal: &mut EdgeSignal, duration: Duration) -> Option<Started> {
        tokio::select! {
            biased;
            _ = signal.fired() => Some(Started),
            _ = tokio::time::sleep(duration) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aleph_hardware::MockDigitalIo;

    const START: Pin = 38;
    const RECORD_LED: Pin = 40;

    fn animation(io: &MockDigitalIo) -> AttractAnimation {
        let letters = vec![Letter::new(11, "aleph"), Letter::new(13, "bet")];
        AttractAnimation::new(
            Arc::new(io.clone()),
            &letters,
            START,
            RECORD_LED,
            Duration::from_millis(100),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_during_blink_stops_with_letters_off() {
        let io = MockDigitalIo::new();
        io.schedule_presses(START, [Duration::from_millis(50)]);

        animation(&io).run_until_start().await.unwrap();

        assert!(io.high_pins().is_empty());
        assert_eq!(io.arm_count(START), 1);
        assert_eq!(io.disarm_count(START), 1);
        assert_eq!(io.writes_to(RECORD_LED), vec![Level::Low]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_sequence() {
        let io = MockDigitalIo::new();
        // 3 blinks x 200ms + 4 steps x 100ms = 1000ms per cycle; press early
        // in the second cycle.
        io.schedule_presses(START, [Duration::from_millis(1050)]);

        animation(&io).run_until_start().await.unwrap();

        let letter_writes: Vec<(Pin, Level)> = io
            .writes()
            .into_iter()
            .filter(|(pin, _)| *pin != RECORD_LED)
            .collect();
        let mut expected = Vec::new();
        for _ in 0..3 {
            expected.extend([(11, Level::High), (13, Level::High)]);
            expected.extend([(11, Level::Low), (13, Level::Low)]);
        }
        expected.extend([
            (11, Level::High),
            (13, Level::High),
            (11, Level::Low),
            (13, Level::Low),
        ]);
        // Second cycle: first blink on, then the exit clear
        expected.extend([(11, Level::High), (13, Level::High)]);
        expected.extend([(11, Level::Low), (13, Level::Low)]);
        assert_eq!(letter_writes, expected);
        assert_eq!(io.writes_to(RECORD_LED), vec![Level::Low, Level::Low]);
    }
}
