//! Continuous-dwell timing for the joint frontal ∧ centered condition.
//!
//! Any frame where the condition fails resets the window completely: there
//! is no partial credit and no decay. Elapsed time comes from timestamps, so
//! the result is independent of frame rate.

use std::time::Duration;

/// Invariant: `accumulation_start` is `None` exactly when the last frame failed
/// the condition (or no frame was seen), and then `progress` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DwellState {
    accumulation_start: Option<Duration>,
    progress: f64,
}

impl DwellState {
    pub fn accumulation_start(&self) -> Option<Duration> {
        self.accumulation_start
    }

    /// Fraction of the required dwell completed, in [0, 1].
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_accumulating(&self) -> bool {
        self.accumulation_start.is_some()
    }
}

/// Advances the dwell window by one frame. Returns the new state and whether
/// the required dwell has been reached on this frame.
pub fn advance(
    state: DwellState,
    joint_condition_holds: bool,
    now: Duration,
    required: Duration,
) -> (DwellState, bool) {
    if !joint_condition_holds {
        return (DwellState::default(), false);
    }

    let start = state.accumulation_start.unwrap_or(now);
    let elapsed = now.saturating_sub(start);

    let progress = if required.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / required.as_secs_f64()).min(1.0)
    };

    (
        DwellState {
            accumulation_start: Some(start),
            progress,
        },
        elapsed >= required,
    )
}
