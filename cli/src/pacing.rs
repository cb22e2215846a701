//! Keeps the emulated display to its real frame rate.
//!
//! The Imlac refreshes its display 40 times a second.  Left alone the
//! emulator runs as fast as the host allows, so [`PacedConsole`]
//! sleeps at the end of each frame until the frame's share of real
//! time has passed.  The sleeping is done by a [`MinimalSleeper`],
//! which avoids making a system call for every frame.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{event, Level};

use base::prelude::*;
use cpu::console::{DataSwitchSource, DrawingMode};
use cpu::io::keyboard::{ImlacKey, KeyModifiers};
use cpu::{Console, HeadlessConsole};

/// Real time taken by one display frame.
pub const FRAME_TIME: Duration = Duration::from_millis(25);

/// A duration which may be negative: the sleeper can oversleep, and
/// then owes the program running time rather than sleep.
#[derive(Debug, Clone, Copy)]
struct SignedDuration {
    negative: bool,
    magnitude: Duration,
}

impl SignedDuration {
    const ZERO: SignedDuration = SignedDuration {
        negative: false,
        magnitude: Duration::ZERO,
    };

    fn add(self, d: Duration) -> SignedDuration {
        if !self.negative {
            return SignedDuration {
                negative: false,
                magnitude: self.magnitude.saturating_add(d),
            };
        }
        match d.checked_sub(self.magnitude) {
            Some(diff) => SignedDuration {
                negative: false,
                magnitude: diff,
            },
            None => SignedDuration {
                negative: true,
                magnitude: self.magnitude - d,
            },
        }
    }

    fn sub(self, d: Duration) -> SignedDuration {
        if self.negative {
            return SignedDuration {
                negative: true,
                magnitude: self.magnitude.saturating_add(d),
            };
        }
        match self.magnitude.checked_sub(d) {
            Some(diff) => SignedDuration {
                negative: false,
                magnitude: diff,
            },
            None => SignedDuration {
                negative: true,
                magnitude: d - self.magnitude,
            },
        }
    }
}

/// Sleeps such that on average we sleep for the requested amount of
/// time, even though we don't necessarily sleep on every call.
#[derive(Debug)]
pub struct MinimalSleeper {
    /// Minimum period for which we will try to sleep.
    min_sleep: Duration,
    sleep_owed: SignedDuration,
    total_cumulative_sleep: Duration,
}

impl MinimalSleeper {
    pub fn new(min_sleep: Duration) -> MinimalSleeper {
        MinimalSleeper {
            min_sleep,
            sleep_owed: SignedDuration::ZERO,
            total_cumulative_sleep: Duration::ZERO,
        }
    }

    fn really_sleep(&mut self, magnitude: Duration) {
        let then = Instant::now();
        sleep(magnitude);
        let slept_for = then.elapsed();
        self.total_cumulative_sleep += slept_for;
        self.sleep_owed = self.sleep_owed.sub(slept_for);
        event!(
            Level::TRACE,
            "MinimalSleeper: asked for {:?}, slept for {:?}, now owe {:?}",
            magnitude,
            slept_for,
            self.sleep_owed
        );
    }

    pub fn sleep(&mut self, duration: Duration) {
        self.sleep_owed = self.sleep_owed.add(duration);
        match self.sleep_owed {
            SignedDuration {
                negative: false,
                magnitude,
            } if magnitude > self.min_sleep => self.really_sleep(magnitude),
            _ => {
                // Not enough sleep debt yet (or we overslept last
                // time); wait for more calls.
            }
        }
    }
}

impl Drop for MinimalSleeper {
    fn drop(&mut self) {
        event!(
            Level::DEBUG,
            "MinimalSleeper: drop: total cumulative sleep is {:?}",
            self.total_cumulative_sleep
        );
    }
}

/// A [`HeadlessConsole`] which paces frames to real time and stops
/// the run loop once a number of frames has been displayed.
pub struct PacedConsole {
    inner: HeadlessConsole,
    /// `None` means run as fast as possible.
    frame_time: Option<Duration>,
    sleeper: MinimalSleeper,
    frame_started: Instant,
    frame_budget: Option<u64>,
    frames: u64,
    stop: Arc<AtomicBool>,
}

impl PacedConsole {
    /// `multiplier` is how many times faster than real time to run.
    pub fn new(
        multiplier: Option<f64>,
        frame_budget: Option<u64>,
        stop: Arc<AtomicBool>,
    ) -> PacedConsole {
        PacedConsole {
            inner: HeadlessConsole::new(),
            frame_time: multiplier.map(|m| FRAME_TIME.div_f64(m)),
            sleeper: MinimalSleeper::new(Duration::from_millis(2)),
            frame_started: Instant::now(),
            frame_budget,
            frames: 0,
            stop,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn budget_exhausted(&self) -> bool {
        matches!(self.frame_budget, Some(budget) if self.frames >= budget)
    }
}

impl Console for PacedConsole {
    fn new_key_pressed(&self) -> bool {
        self.inner.new_key_pressed()
    }

    fn key(&self) -> ImlacKey {
        self.inner.key()
    }

    fn key_modifiers(&self) -> KeyModifiers {
        self.inner.key_modifiers()
    }

    fn unlatch_key(&mut self) {
        self.inner.unlatch_key();
    }

    fn data_switches(&self) -> Word {
        self.inner.data_switches()
    }

    fn set_data_switches(&mut self, value: Word) {
        self.inner.set_data_switches(value);
    }

    fn data_switch_mapping_enabled(&self) -> bool {
        self.inner.data_switch_mapping_enabled()
    }

    fn map_data_switch(&mut self, switch: usize, source: DataSwitchSource) {
        self.inner.map_data_switch(switch, source);
    }

    fn clear_display(&mut self) {
        self.inner.clear_display();
    }

    fn move_absolute(&mut self, x: Word, y: Word, mode: DrawingMode) {
        self.inner.move_absolute(x, y, mode);
    }

    fn draw_point(&mut self, x: Word, y: Word) {
        self.inner.draw_point(x, y);
    }

    fn render_current(&mut self, complete: bool) {
        self.inner.render_current(complete);
    }

    fn frame_done(&mut self) {
        self.inner.frame_done();
        self.frames += 1;
        if let Some(frame_time) = self.frame_time {
            let elapsed = self.frame_started.elapsed();
            self.sleeper.sleep(frame_time.saturating_sub(elapsed));
        }
        self.frame_started = Instant::now();
        if self.budget_exhausted() {
            event!(Level::DEBUG, "displayed {} frames; stopping", self.frames);
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    fn set_scale(&mut self, scale: f32) {
        self.inner.set_scale(scale);
    }

    fn set_intensity(&mut self, intensity: Word) {
        self.inner.set_intensity(intensity);
    }

    fn set_blink(&mut self, on: bool) {
        self.inner.set_blink(on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_duration() {
        let d = SignedDuration::ZERO.sub(Duration::from_millis(3));
        assert!(d.negative);
        assert_eq!(d.magnitude, Duration::from_millis(3));
        let d = d.add(Duration::from_millis(5));
        assert!(!d.negative);
        assert_eq!(d.magnitude, Duration::from_millis(2));
    }

    #[test]
    fn test_frame_budget_sets_stop_flag() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut console = PacedConsole::new(None, Some(2), Arc::clone(&stop));
        console.frame_done();
        assert!(!stop.load(Ordering::Relaxed));
        console.frame_done();
        assert!(stop.load(Ordering::Relaxed));
        assert!(console.budget_exhausted());
        assert_eq!(console.frames(), 2);
    }
}
