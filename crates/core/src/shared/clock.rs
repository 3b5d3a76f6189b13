//! Session time sources.
//!
//! Dwell accumulation works on timestamp deltas, never frame counts, so every
//! frame must be stamped by a clock. Live sources use the monotonic wall clock;
//! recorded files use their presentation timeline so replay is deterministic.

use std::time::{Duration, Instant};

use crate::shared::frame::Frame;

/// Supplies the timestamp for a frame, measured from the session epoch.
pub trait Clock: Send {
    fn now(&mut self, frame: &Frame) -> Duration;
}

/// Wall-clock time since the clock was created.
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self, _frame: &Frame) -> Duration {
        self.epoch.elapsed()
    }
}

/// Presentation time derived from the frame index and a fixed frame rate.
pub struct FrameRateClock {
    fps: f64,
}

impl FrameRateClock {
    pub fn new(fps: f64) -> Result<Self, &'static str> {
        if !(fps > 0.0) || !fps.is_finite() {
            return Err("fps must be a positive finite number");
        }
        Ok(Self { fps })
    }
}

impl Clock for FrameRateClock {
    fn now(&mut self, frame: &Frame) -> Duration {
        Duration::from_secs_f64(frame.index() as f64 / self.fps)
    }
}
